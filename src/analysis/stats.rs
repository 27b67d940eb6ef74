//! Statistics primitives shared by the overall and cohort aggregations.

use std::ops::Add;

use crate::insights::Distribution;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Order-independent running totals for one metric over a set of members.
///
/// Partials computed over any partition of the members combine with `+` into
/// the same totals as a single pass. Sums are kept in whole seconds so the
/// combined mean is exact regardless of grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialAggregate {
    pub count: usize,
    pub censored_count: usize,
    pub sum_seconds: i128,
}

impl PartialAggregate {
    pub fn observe(mut self, seconds: Option<i64>) -> Self {
        self.count += 1;
        match seconds {
            Some(s) => self.sum_seconds += i128::from(s),
            None => self.censored_count += 1,
        }
        self
    }

    pub fn observed_count(&self) -> usize {
        self.count - self.censored_count
    }

    /// Mean in days, absent when nothing was observed.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_days(&self) -> Option<f64> {
        let observed = self.observed_count();
        (observed > 0).then(|| self.sum_seconds as f64 / observed as f64 / SECONDS_PER_DAY)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn observed_percentage(&self) -> f64 {
        (self.observed_count() as f64 / self.count.max(1) as f64) * 100.0
    }
}

impl Add for PartialAggregate {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            censored_count: self.censored_count + other.censored_count,
            sum_seconds: self.sum_seconds + other.sum_seconds,
        }
    }
}

/// Percentile of an ascending slice using linear interpolation between
/// order statistics. `p` is in `[0, 100]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Full distribution over the observed (non-censored) values.
///
/// Needs every observed value, so it can only run after all members are
/// collected. Returns `None` when nothing was observed.
#[allow(clippy::cast_precision_loss)]
pub fn distribution(partial: &PartialAggregate, observed_seconds: &[i64]) -> Option<Distribution> {
    let mean = partial.mean_days()?;

    let mut days: Vec<f64> = observed_seconds
        .iter()
        .map(|&s| s as f64 / SECONDS_PER_DAY)
        .collect();
    days.sort_by(f64::total_cmp);

    let variance = days.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / days.len() as f64;

    Some(Distribution {
        mean,
        median: percentile(&days, 50.0)?,
        p25: percentile(&days, 25.0)?,
        p75: percentile(&days, 75.0)?,
        p90: percentile(&days, 90.0)?,
        min: *days.first()?,
        max: *days.last()?,
        std_dev: variance.sqrt(),
    })
}
