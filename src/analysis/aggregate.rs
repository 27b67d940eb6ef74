use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use indexmap::IndexMap;

use super::metrics::{MemberMetrics, MetricKind};
use super::stats::{distribution, PartialAggregate};
use crate::insights::{CohortStatistics, MetricStatistics};

/// Calendar period (UTC) a member joined in, identified by its first month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CohortKey {
    pub year: i32,
    pub month: u32,
}

impl CohortKey {
    /// Truncates `joined_at` to the start of its `period_months`-long period.
    /// Periods are aligned to January, so 6 yields half-years and 1 plain
    /// calendar months.
    pub fn from_join(joined_at: DateTime<Utc>, period_months: u32) -> Self {
        let period = period_months.clamp(1, 12);
        let month0 = joined_at.month0();
        Self {
            year: joined_at.year(),
            month: month0 / period * period + 1,
        }
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

struct CohortBucket<'a> {
    members: Vec<&'a MemberMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub overall: IndexMap<MetricKind, MetricStatistics>,
    pub cohorts: BTreeMap<CohortKey, CohortStatistics>,
}

pub fn aggregate<'a, I>(members: I, cohort_months: u32) -> Aggregation
where
    I: IntoIterator<Item = &'a MemberMetrics>,
{
    let members: Vec<&MemberMetrics> = members.into_iter().collect();

    let overall = statistics_for(&members);

    let buckets = members.iter().fold(
        BTreeMap::<CohortKey, CohortBucket>::new(),
        |mut buckets, &m| {
            buckets
                .entry(CohortKey::from_join(m.joined_at, cohort_months))
                .or_insert_with(|| CohortBucket { members: vec![] })
                .members
                .push(m);
            buckets
        },
    );

    let cohorts = buckets
        .into_iter()
        .map(|(key, bucket)| {
            let stats = CohortStatistics {
                members: bucket.members.iter().map(|m| m.login.clone()).collect(),
                metrics: statistics_for(&bucket.members),
            };
            (key, stats)
        })
        .collect();

    Aggregation { overall, cohorts }
}

fn statistics_for(members: &[&MemberMetrics]) -> IndexMap<MetricKind, MetricStatistics> {
    MetricKind::ALL
        .iter()
        .map(|&kind| (kind, metric_statistics(members, kind)))
        .collect()
}

fn metric_statistics(members: &[&MemberMetrics], kind: MetricKind) -> MetricStatistics {
    let values: Vec<Option<i64>> = members.iter().map(|m| m.get(kind).seconds()).collect();

    let partial = values
        .iter()
        .fold(PartialAggregate::default(), |acc, v| acc.observe(*v));
    let observed: Vec<i64> = values.into_iter().flatten().collect();

    MetricStatistics {
        count: partial.count,
        censored_count: partial.censored_count,
        observed_count: partial.observed_count(),
        observed_percentage: partial.observed_percentage(),
        distribution: distribution(&partial, &observed),
    }
}
