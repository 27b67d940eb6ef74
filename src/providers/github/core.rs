use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use log::{info, warn};

use super::client::{ClientConfig, GitHubClient};
use crate::auth::Token;
use crate::error::{PrLensError, Result};
use crate::models::{ExcludedMember, Member, OrgSnapshot, PullRequestEvent};

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Only members who joined on or after this day.
    pub since: Option<NaiveDate>,
    /// Only members who joined on or before this day; later PRs are ignored.
    pub until: Option<NaiveDate>,
    pub concurrency: usize,
    /// Cap on pull requests fetched per member.
    pub max_prs: Option<usize>,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            since: None,
            until: None,
            concurrency: 5,
            max_prs: None,
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

impl CollectOptions {
    /// First instant excluded by `until`.
    fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.until.and_then(|d| d.succ_opt()).map(start_of_day)
    }

    fn joined_in_range(&self, joined_at: DateTime<Utc>) -> bool {
        let after_start = self.since.map_or(true, |d| joined_at >= start_of_day(d));
        let before_end = self.cutoff().map_or(true, |cutoff| joined_at < cutoff);
        after_start && before_end
    }

    fn before_cutoff(&self, created_at: DateTime<Utc>) -> bool {
        self.cutoff().map_or(true, |cutoff| created_at < cutoff)
    }
}

enum MemberOutcome {
    Included(Member, Vec<PullRequestEvent>),
    Excluded(ExcludedMember),
}

fn excluded(login: &str, reason: String) -> MemberOutcome {
    MemberOutcome::Excluded(ExcludedMember {
        login: login.to_string(),
        reason,
    })
}

pub struct GitHubProvider {
    pub client: GitHubClient,
    pub organization: String,
}

impl GitHubProvider {
    pub fn new(
        base_url: &str,
        organization: String,
        token: Option<Token>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = GitHubClient::new(base_url, token, config)?;

        Ok(Self {
            client,
            organization,
        })
    }

    /// Fetches members, join dates and pull requests and merges them into a
    /// complete snapshot. Nothing is handed on until every member is done.
    pub async fn collect_snapshot(&self, options: &CollectOptions) -> Result<OrgSnapshot> {
        info!("Fetching members of {}", self.organization);
        let logins = self.client.fetch_members(&self.organization).await?;
        info!(
            "Fetching join dates and PRs for {} members ({} at a time)...",
            logins.len(),
            options.concurrency.max(1)
        );

        let outcomes: Vec<MemberOutcome> = stream::iter(logins)
            .map(|login| async move { self.collect_member(login, options).await })
            .buffered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let mut members = Vec::new();
        let mut pull_requests = HashMap::new();
        let mut excluded = Vec::new();

        for outcome in outcomes {
            match outcome {
                MemberOutcome::Included(member, prs) => {
                    pull_requests.insert(member.login.clone(), prs);
                    members.push(member);
                }
                MemberOutcome::Excluded(member) => excluded.push(member),
            }
        }

        info!(
            "Collected {} members ({} excluded)",
            members.len(),
            excluded.len()
        );

        Ok(OrgSnapshot {
            organization: self.organization.clone(),
            collected_at: Utc::now(),
            members,
            pull_requests,
            excluded,
        })
    }

    async fn collect_member(&self, login: String, options: &CollectOptions) -> Result<MemberOutcome> {
        match self.fetch_member(&login, options).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ PrLensError::Unauthorized(_)) => Err(e),
            Err(e) => {
                warn!("Excluding {login}: {e}");
                Ok(excluded(&login, e.to_string()))
            }
        }
    }

    async fn fetch_member(&self, login: &str, options: &CollectOptions) -> Result<MemberOutcome> {
        let org = &self.organization;

        let Some(joined_at) = self.client.fetch_membership_date(org, login).await? else {
            warn!("Excluding {login}: no membership creation date");
            return Ok(excluded(login, "no membership creation date".to_string()));
        };

        if !options.joined_in_range(joined_at) {
            info!("Skipping {login}: joined {joined_at} outside the requested range");
            return Ok(excluded(
                login,
                format!("joined {joined_at} outside the requested date range"),
            ));
        }

        let mut prs = self
            .client
            .fetch_pull_requests(org, login, options.max_prs)
            .await?;
        prs.retain(|pr| options.before_cutoff(pr.created_at));

        Ok(MemberOutcome::Included(
            Member {
                login: login.to_string(),
                joined_at,
            },
            prs,
        ))
    }
}
