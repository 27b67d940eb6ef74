mod charts;
mod rows;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;

use crate::analysis::metrics::MetricKind;
use crate::error::Result;
use crate::insights::AnalysisReport;

pub struct OutputFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub charts: PathBuf,
}

/// Writes the member CSV, the JSON report and the text charts into `dir`.
pub fn write_all(report: &AnalysisReport, dir: &Path, pretty: bool) -> Result<OutputFiles> {
    fs::create_dir_all(dir)?;

    let stamp = report.collected_at.format("%Y%m%d_%H%M%S");
    let org = &report.organization;
    let files = OutputFiles {
        csv: dir.join(format!("{org}_members_{stamp}.csv")),
        json: dir.join(format!("{org}_analysis_{stamp}.json")),
        charts: dir.join(format!("{org}_charts_{stamp}.txt")),
    };

    rows::write_members(report, BufWriter::new(File::create(&files.csv)?))?;
    info!("Member data written to: {}", files.csv.display());

    let json_output = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    fs::write(&files.json, json_output)?;
    info!("Analysis report written to: {}", files.json.display());

    fs::write(&files.charts, charts::Charts(report).to_string())?;
    info!("Charts written to: {}", files.charts.display());

    Ok(files)
}

pub fn print_summary(report: &AnalysisReport, files: &OutputFiles) {
    let rule = "=".repeat(50);

    println!("\n{rule}");
    println!("GitHub Organization PR Analysis: {}", report.organization);
    println!("{rule}");
    println!("Total members: {}", report.total_members);
    if !report.excluded_members.is_empty() {
        println!("Excluded members: {}", report.excluded_members.len());
    }

    for kind in MetricKind::ALL {
        let Some(stats) = report.overall.get(&kind) else {
            continue;
        };

        println!(
            "Members with at least {} PR(s): {} ({:.1}%)",
            kind.ordinal(),
            stats.observed_count,
            stats.observed_percentage
        );

        if let Some(dist) = &stats.distribution {
            println!("\n{}:", kind.label());
            println!("  Median: {:.1} days", dist.median);
            println!("  Mean: {:.1} days", dist.mean);
            println!("  P25/P75/P90: {:.1} / {:.1} / {:.1} days", dist.p25, dist.p75, dist.p90);
            println!("  Range: {:.1} to {:.1} days", dist.min, dist.max);
            println!("  Censored: {} of {}\n", stats.censored_count, stats.count);
        }
    }

    println!("Output files:");
    println!("  CSV data: {}", files.csv.display());
    println!("  JSON analysis: {}", files.json.display());
    println!("  Charts: {}", files.charts.display());
    println!("{rule}");
}
