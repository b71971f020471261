use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use drillnorm::choices::load_category_choices;
use drillnorm::config::Config;
use drillnorm::fetch::{
    http_client, Dashboard, DashboardState, FileSource, HttpMediaResolver, HttpPostSource,
    SessionContext,
};
use drillnorm::output;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "stdout")]
    output: String,

    /// Read posts from a JSON / JSON Lines dump instead of the backend
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    per_page: Option<u32>,

    #[arg(long)]
    max_pages: Option<u32>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Resolve featured-media thumbnails and write their URLs with each report
    #[arg(long)]
    thumbnails: bool,

    /// Print the selectable values of a custom field and exit
    #[arg(long, value_name = "FIELD")]
    choices: Option<String>,

    #[arg(long)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing()?;

    let args = Args::parse();
    let config = load_config(&args)?;
    let session = match &config.auth_token {
        Some(token) => SessionContext::with_token(token.clone()),
        None => SessionContext::anonymous(),
    };
    let client = http_client(&config).context("Failed to build HTTP client")?;

    if let Some(field) = &args.choices {
        for choice in load_category_choices(&client, &config, &session, field).await {
            println!("{choice}");
        }
        return Ok(());
    }

    let start_time = Instant::now();
    let dashboard = match &args.input {
        Some(path) => {
            info!(path = %path.display(), "Reading posts from dump");
            Dashboard::new(FileSource::new(path), session)
        }
        None => {
            info!(url = %config.posts_url(), "Fetching posts");
            Dashboard::new(HttpPostSource::new(client.clone(), &config), session)
        }
    };
    dashboard.refetch().await;
    let state = dashboard.state();

    if let Some(err) = state.error() {
        warn!("Live fetch failed, showing sample data: {err}");
    }

    if args.thumbnails {
        let resolver = HttpMediaResolver::new(client, &config);
        let resolved = dashboard.resolve_thumbnails(&resolver).await;
        info!(resolved, "Thumbnails resolved");
    }

    let mut writer = output::create_writer(&args.output)?;
    writer.write_reports(state.reports(), dashboard.thumbnails())?;
    writer.finish()?;

    if args.summary {
        print_summary(&state, start_time.elapsed());
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = &args.base_url {
        config.api_base = base_url.clone();
    }
    if let Some(per_page) = args.per_page {
        config.per_page = per_page;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,drillnorm=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // logs go to stderr so stdout stays clean for the dataset
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }
    Ok(())
}

fn print_summary(state: &DashboardState, duration: Duration) {
    eprintln!("\n=== DRILL SUMMARY ===");
    eprintln!("Reports: {}", state.total_drills());
    eprintln!("Participants: {}", state.total_participants());
    eprintln!(
        "Mapped: {}",
        state.reports().iter().filter(|r| r.location.is_some()).count()
    );
    if state.used_fallback {
        eprintln!("Source: built-in sample data");
    }
    for datum in state.chart_data() {
        eprintln!("  {:<20} {:>5}  {}", datum.name, datum.value, datum.color);
    }
    eprintln!("Elapsed: {:.3}s", duration.as_secs_f64());
}
