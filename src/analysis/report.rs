use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::aggregate::Aggregation;
use super::metrics::MemberMetrics;
use crate::error::{PrLensError, Result};
use crate::insights::AnalysisReport;
use crate::models::ExcludedMember;

pub struct ReportContext {
    pub organization: String,
    pub collected_at: DateTime<Utc>,
    pub cohort_months: u32,
    pub excluded_members: Vec<ExcludedMember>,
}

/// Merges per-member metrics and aggregate statistics into the final report.
///
/// # Errors
/// Returns [`PrLensError::Invariant`] if a cohort lists a member that has no
/// metrics.
pub fn assemble(
    context: ReportContext,
    members: IndexMap<String, MemberMetrics>,
    aggregation: Aggregation,
) -> Result<AnalysisReport> {
    for (key, cohort) in &aggregation.cohorts {
        if let Some(unknown) = cohort.members.iter().find(|login| !members.contains_key(*login)) {
            return Err(PrLensError::Invariant(format!(
                "cohort {key} references unknown member '{unknown}'"
            )));
        }
    }

    let cohorts = aggregation
        .cohorts
        .into_iter()
        .map(|(key, stats)| (key.to_string(), stats))
        .collect();

    Ok(AnalysisReport {
        organization: context.organization,
        collected_at: context.collected_at,
        cohort_months: context.cohort_months,
        total_members: members.len(),
        excluded_members: context.excluded_members,
        members,
        overall: aggregation.overall,
        cohorts,
    })
}
