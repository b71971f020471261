pub mod aggregate;
pub mod choices;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalizer;
pub mod output;
pub mod parsers;

pub use aggregate::aggregate;
pub use error::{ConfigError, FetchError};
pub use fetch::{run_pipeline, Dashboard, DashboardState, PublishPolicy};
pub use model::{AggregateSnapshot, CategorySegment, ChartDatum, Location, NormalizedReport, RawPost, Snapshot};
pub use normalizer::{normalize, normalize_all};
