use std::fmt;

use crate::analysis::metrics::MetricKind;
use crate::insights::AnalysisReport;

const BAR_WIDTH: usize = 50;

struct Bin {
    label: String,
    count: usize,
}

/// Caps the x-axis so a few stragglers don't flatten the chart. Values past
/// the cap land in a trailing overflow bin.
fn axis_cap(kind: MetricKind) -> f64 {
    match kind {
        MetricKind::TimeToFirstPr => 365.0,
        MetricKind::TimeToTenthPr => 730.0,
    }
}

/// Daily, weekly, monthly or quarterly bins depending on the spread.
fn bin_width(kind: MetricKind, max_days: f64) -> f64 {
    match kind {
        MetricKind::TimeToFirstPr if max_days <= 30.0 => 1.0,
        MetricKind::TimeToFirstPr if max_days <= 90.0 => 7.0,
        MetricKind::TimeToFirstPr => 30.0,
        MetricKind::TimeToTenthPr if max_days <= 90.0 => 7.0,
        MetricKind::TimeToTenthPr if max_days <= 365.0 => 30.0,
        MetricKind::TimeToTenthPr => 90.0,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn histogram(kind: MetricKind, days: &[f64]) -> Vec<Bin> {
    let cap = axis_cap(kind);
    let max_days = days.iter().copied().fold(0.0_f64, f64::max).min(cap);
    let width = bin_width(kind, max_days);
    let bin_count = (max_days / width).floor() as usize + 1;

    let mut counts = vec![0usize; bin_count];
    let mut overflow = 0;
    for &d in days {
        if d > cap {
            overflow += 1;
        } else {
            let index = ((d / width).floor() as usize).min(bin_count - 1);
            counts[index] += 1;
        }
    }

    let mut bins: Vec<Bin> = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = i as f64 * width;
            Bin {
                label: format!("{:>4}-{:<4}", lower, lower + width),
                count,
            }
        })
        .collect();

    if overflow > 0 {
        bins.push(Bin {
            label: format!("{cap:>4}+    "),
            count: overflow,
        });
    }

    bins
}

fn bar(count: usize, max_count: usize) -> String {
    "#".repeat(count * BAR_WIDTH / max_count.max(1))
}

/// Upper bounds (days) of the columns in the join cohort table.
const DAY_BANDS: [(f64, &str); 5] = [
    (1.0, "<1d"),
    (7.0, "<1w"),
    (30.0, "<1m"),
    (90.0, "<3m"),
    (365.0, "<1y"),
];

fn day_band(days: f64) -> usize {
    DAY_BANDS
        .iter()
        .position(|(upper, _)| days < *upper)
        .unwrap_or(DAY_BANDS.len())
}

/// Plain-text histograms, a join cohort table and cohort trend charts for a
/// report.
pub struct Charts<'a>(pub &'a AnalysisReport);

impl fmt::Display for Charts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in MetricKind::ALL {
            render_histogram(f, self.0, kind)?;
        }
        render_join_table(f, self.0)?;
        for kind in MetricKind::ALL {
            render_cohort_trend(f, self.0, kind)?;
        }
        Ok(())
    }
}

fn render_histogram(f: &mut fmt::Formatter<'_>, report: &AnalysisReport, kind: MetricKind) -> fmt::Result {
    let days: Vec<f64> = report
        .members
        .values()
        .filter_map(|m| m.get(kind).days())
        .collect();

    writeln!(f, "{} in {} (days)", kind.label(), report.organization)?;

    if days.is_empty() {
        return writeln!(f, "  no observed values\n");
    }

    let bins = histogram(kind, &days);
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0);
    for b in &bins {
        writeln!(f, "  {} | {:>4} {}", b.label, b.count, bar(b.count, max_count))?;
    }

    if let Some(dist) = report.overall.get(&kind).and_then(|s| s.distribution.as_ref()) {
        writeln!(f, "  mean {:.1}  median {:.1}", dist.mean, dist.median)?;
    }
    writeln!(f)
}

/// Members per join cohort and days-to-first-PR band.
fn render_join_table(f: &mut fmt::Formatter<'_>, report: &AnalysisReport) -> fmt::Result {
    writeln!(f, "Join cohort vs days to first PR (members)")?;

    write!(f, "  {:<7} |", "cohort")?;
    for (_, label) in DAY_BANDS {
        write!(f, " {label:>5}")?;
    }
    writeln!(f, " {:>5} {:>5}", ">=1y", "none")?;

    for (key, cohort) in &report.cohorts {
        // one column per band, then overflow, then censored
        let mut counts = [0usize; DAY_BANDS.len() + 2];
        for metrics in cohort.members.iter().filter_map(|login| report.members.get(login)) {
            let column = metrics
                .time_to_first_pr
                .days()
                .map_or(DAY_BANDS.len() + 1, day_band);
            counts[column] += 1;
        }

        write!(f, "  {key:<7} |")?;
        for count in counts {
            write!(f, " {count:>5}")?;
        }
        writeln!(f)?;
    }
    writeln!(f)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn render_cohort_trend(f: &mut fmt::Formatter<'_>, report: &AnalysisReport, kind: MetricKind) -> fmt::Result {
    writeln!(f, "Median {} by join cohort (days)", kind.as_str())?;

    let medians: Vec<(&str, Option<f64>)> = report
        .cohorts
        .iter()
        .map(|(key, cohort)| {
            let median = cohort
                .metrics
                .get(&kind)
                .and_then(|s| s.distribution.as_ref())
                .map(|d| d.median);
            (key.as_str(), median)
        })
        .collect();

    let max_median = medians
        .iter()
        .filter_map(|(_, m)| *m)
        .fold(0.0_f64, f64::max);

    for (key, median) in medians {
        match median {
            Some(m) => {
                let scaled = if max_median > 0.0 {
                    (m / max_median * BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                writeln!(f, "  {key} | {m:>7.1} {}", "#".repeat(scaled))?;
            }
            None => writeln!(f, "  {key} |       - (all censored)")?,
        }
    }
    writeln!(f)
}
