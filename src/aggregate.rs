use indexmap::IndexMap;

use crate::model::{AggregateSnapshot, CategorySegment, NormalizedReport};

/// Chart colors, assigned by first-seen category index and cycled.
pub const PALETTE: &[&str] = &[
    "#4F46E5", "#06B6D4", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899",
];

pub fn aggregate(reports: &[NormalizedReport]) -> AggregateSnapshot {
    let mut total_participants = 0i64;
    let mut total_drills = 0u64;
    let mut counts: IndexMap<String, u64> = IndexMap::new();

    for report in reports {
        total_drills += 1;
        if let Some(n) = report.participant_count {
            total_participants = total_participants.saturating_add(n);
        }
        for category in &report.categories {
            *counts.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let category_breakdown = counts
        .into_iter()
        .enumerate()
        .map(|(i, (name, count))| CategorySegment {
            name,
            count,
            color: PALETTE[i % PALETTE.len()].to_string(),
        })
        .collect();

    AggregateSnapshot {
        total_participants,
        total_drills,
        category_breakdown,
    }
}
