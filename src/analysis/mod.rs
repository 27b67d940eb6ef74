//! Time-to-Nth-PR analysis over an organization snapshot.
//!
//! Data flows one way: each member's pull requests become a
//! [`timeline::MemberTimeline`], every timeline yields
//! [`metrics::MemberMetrics`], the full metric set is reduced by
//! [`aggregate::aggregate`], and [`report::assemble`] merges the results.

pub mod aggregate;
pub mod metrics;
pub mod report;
pub mod stats;
pub mod timeline;

use indexmap::IndexMap;
use log::{debug, info};

use crate::error::Result;
use crate::insights::AnalysisReport;
use crate::models::OrgSnapshot;
use aggregate::aggregate;
use metrics::{compute_metrics, MemberMetrics};
use report::{assemble, ReportContext};
use timeline::MemberTimeline;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Length of a cohort period in months (1 = calendar months).
    pub cohort_months: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { cohort_months: 1 }
    }
}

pub fn analyze(snapshot: &OrgSnapshot, options: &AnalysisOptions) -> Result<AnalysisReport> {
    info!(
        "Building timelines for {} members of {}",
        snapshot.members.len(),
        snapshot.organization
    );

    let members = snapshot
        .members
        .iter()
        .map(|member| {
            let events = snapshot.pull_requests_for(&member.login).iter().cloned();
            let timeline = MemberTimeline::build(member.clone(), events)?;
            let metrics = compute_metrics(&timeline, options.cohort_months)?;

            debug!(
                "{}: {} post-join PRs, {} pre-membership",
                metrics.login, metrics.pull_requests, metrics.pre_membership_pull_requests
            );

            Ok((metrics.login.clone(), metrics))
        })
        .collect::<Result<IndexMap<String, MemberMetrics>>>()?;

    info!("Aggregating statistics for {} members", members.len());
    let aggregation = aggregate(members.values(), options.cohort_months);

    let context = ReportContext {
        organization: snapshot.organization.clone(),
        collected_at: snapshot.collected_at,
        cohort_months: options.cohort_months,
        excluded_members: snapshot.excluded.clone(),
    };

    assemble(context, members, aggregation)
}
