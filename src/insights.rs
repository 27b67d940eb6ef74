use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analysis::metrics::{MemberMetrics, MetricKind};
use crate::models::ExcludedMember;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub organization: String,
    pub collected_at: DateTime<Utc>,
    pub cohort_months: u32,
    pub total_members: usize,
    pub excluded_members: Vec<ExcludedMember>,
    pub members: IndexMap<String, MemberMetrics>,
    pub overall: IndexMap<MetricKind, MetricStatistics>,
    pub cohorts: IndexMap<String, CohortStatistics>,
}

/// Statistics for one metric. Durations are in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub count: usize,
    pub censored_count: usize,
    pub observed_count: usize,
    pub observed_percentage: f64,
    /// Absent when every member in the set is censored for this metric.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Per-cohort statistics. Metric keys sit beside `members`, in the same shape
/// as [`AnalysisReport::overall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStatistics {
    pub members: Vec<String>,
    #[serde(flatten)]
    pub metrics: IndexMap<MetricKind, MetricStatistics>,
}
