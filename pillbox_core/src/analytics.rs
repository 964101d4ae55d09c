//! Adherence totals across bottles.

use serde::Serialize;
use uuid::Uuid;

use crate::model::PillBottle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsRange {
    /// Sum of the last 7 daily tallies.
    Week,
    /// Sum of the last 4 weekly totals.
    Month,
    /// Sum of the last 12 monthly totals.
    Year,
}

impl AnalyticsRange {
    fn window(self, b: &PillBottle) -> &[u32] {
        match self {
            Self::Week => &b.adherence.daily_last7,
            Self::Month => &b.adherence.weekly_last4,
            Self::Year => &b.adherence.monthly_last12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BottleTotal {
    pub bottle_id: Uuid,
    pub pill: String,
    pub pills: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub range: AnalyticsRange,
    pub total_pills: u64,
    pub bottles_tracked: usize,
    pub per_bottle: Vec<BottleTotal>,
}

/// Totals for `range` over `bottles`, optionally limited to one owner.
pub fn summarize<'a>(
    bottles: impl IntoIterator<Item = &'a PillBottle>,
    range: AnalyticsRange,
    owner: Option<Uuid>,
) -> AnalyticsSummary {
    let per_bottle: Vec<BottleTotal> = bottles
        .into_iter()
        .filter(|b| owner.is_none() || b.owner == owner)
        .map(|b| BottleTotal {
            bottle_id: b.id,
            pill: b.pill.name.clone(),
            pills: range.window(b).iter().map(|&x| u64::from(x)).sum(),
        })
        .collect();
    AnalyticsSummary {
        range,
        total_pills: per_bottle.iter().map(|t| t.pills).sum(),
        bottles_tracked: per_bottle.len(),
        per_bottle,
    }
}
