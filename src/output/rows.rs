use std::io::Write;

use serde::Serialize;

use crate::analysis::metrics::{MemberMetrics, TimeToPr};
use crate::error::Result;
use crate::insights::AnalysisReport;

/// One flattened CSV row per member.
#[derive(Debug, Serialize)]
struct MemberRow<'a> {
    login: &'a str,
    joined_at: String,
    cohort: &'a str,
    pull_requests: usize,
    pre_membership_pull_requests: usize,
    first_pr_status: &'static str,
    days_to_first_pr: Option<f64>,
    hours_to_first_pr: Option<f64>,
    first_pr_url: Option<&'a str>,
    tenth_pr_status: &'static str,
    days_to_tenth_pr: Option<f64>,
    hours_to_tenth_pr: Option<f64>,
    tenth_pr_url: Option<&'a str>,
}

fn status(value: &TimeToPr) -> &'static str {
    if value.is_censored() {
        "censored"
    } else {
        "observed"
    }
}

#[allow(clippy::cast_precision_loss)]
fn hours(value: &TimeToPr) -> Option<f64> {
    value.seconds().map(|s| s as f64 / 3600.0)
}

fn url(value: &TimeToPr) -> Option<&str> {
    match value {
        TimeToPr::Observed { pull_request, .. } => Some(pull_request.as_str()),
        TimeToPr::Censored { .. } => None,
    }
}

fn row(metrics: &MemberMetrics) -> MemberRow<'_> {
    let first = &metrics.time_to_first_pr;
    let tenth = &metrics.time_to_tenth_pr;

    MemberRow {
        login: &metrics.login,
        joined_at: metrics.joined_at.to_rfc3339(),
        cohort: &metrics.cohort,
        pull_requests: metrics.pull_requests,
        pre_membership_pull_requests: metrics.pre_membership_pull_requests,
        first_pr_status: status(first),
        days_to_first_pr: first.days(),
        hours_to_first_pr: hours(first),
        first_pr_url: url(first),
        tenth_pr_status: status(tenth),
        days_to_tenth_pr: tenth.days(),
        hours_to_tenth_pr: hours(tenth),
        tenth_pr_url: url(tenth),
    }
}

pub fn write_members<W: Write>(report: &AnalysisReport, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    for metrics in report.members.values() {
        writer.serialize(row(metrics))?;
    }

    writer.flush()?;
    Ok(())
}
