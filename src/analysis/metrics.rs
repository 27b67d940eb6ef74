use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::CohortKey;
use super::timeline::MemberTimeline;
use crate::error::{PrLensError, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TimeToFirstPr,
    TimeToTenthPr,
}

impl MetricKind {
    pub const ALL: [MetricKind; 2] = [MetricKind::TimeToFirstPr, MetricKind::TimeToTenthPr];

    /// Ordinal position of the pull request this metric waits for.
    pub fn ordinal(self) -> usize {
        match self {
            MetricKind::TimeToFirstPr => 1,
            MetricKind::TimeToTenthPr => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::TimeToFirstPr => "time_to_first_pr",
            MetricKind::TimeToTenthPr => "time_to_tenth_pr",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::TimeToFirstPr => "Time to first PR",
            MetricKind::TimeToTenthPr => "Time to tenth PR",
        }
    }
}

/// Elapsed time from joining to the Nth post-join pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimeToPr {
    Observed {
        seconds: i64,
        pull_request: String,
        created_at: DateTime<Utc>,
    },
    /// Fewer than N pull requests observed so far.
    Censored { observed: usize },
}

impl TimeToPr {
    pub fn seconds(&self) -> Option<i64> {
        match self {
            TimeToPr::Observed { seconds, .. } => Some(*seconds),
            TimeToPr::Censored { .. } => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn days(&self) -> Option<f64> {
        self.seconds().map(|s| s as f64 / SECONDS_PER_DAY)
    }

    pub fn is_censored(&self) -> bool {
        matches!(self, TimeToPr::Censored { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberMetrics {
    pub login: String,
    pub joined_at: DateTime<Utc>,
    /// Join period key, `YYYY-MM` of the period's first month.
    pub cohort: String,
    pub pull_requests: usize,
    pub pre_membership_pull_requests: usize,
    pub time_to_first_pr: TimeToPr,
    pub time_to_tenth_pr: TimeToPr,
}

impl MemberMetrics {
    pub fn get(&self, kind: MetricKind) -> &TimeToPr {
        match kind {
            MetricKind::TimeToFirstPr => &self.time_to_first_pr,
            MetricKind::TimeToTenthPr => &self.time_to_tenth_pr,
        }
    }
}

pub fn compute_metrics(timeline: &MemberTimeline, cohort_months: u32) -> Result<MemberMetrics> {
    let member = timeline.member();

    Ok(MemberMetrics {
        login: member.login.clone(),
        joined_at: member.joined_at,
        cohort: CohortKey::from_join(member.joined_at, cohort_months).to_string(),
        pull_requests: timeline.post_join_count(),
        pre_membership_pull_requests: timeline.pre_membership_count(),
        time_to_first_pr: time_to_nth_pr(timeline, MetricKind::TimeToFirstPr.ordinal())?,
        time_to_tenth_pr: time_to_nth_pr(timeline, MetricKind::TimeToTenthPr.ordinal())?,
    })
}

fn time_to_nth_pr(timeline: &MemberTimeline, n: usize) -> Result<TimeToPr> {
    let member = timeline.member();

    let Some(event) = timeline.nth(n) else {
        return Ok(TimeToPr::Censored {
            observed: timeline.post_join_count(),
        });
    };

    let seconds = (event.event.created_at - member.joined_at).num_seconds();
    if seconds < 0 {
        return Err(PrLensError::Invariant(format!(
            "negative time to PR #{n} for '{}' ({seconds}s, pull request {})",
            member.login, event.event.id
        )));
    }

    Ok(TimeToPr::Observed {
        seconds,
        pull_request: event.event.url.clone(),
        created_at: event.event.created_at,
    })
}
