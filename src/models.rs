use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An organization member and the moment their membership was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub login: String,
    pub joined_at: DateTime<Utc>,
}

/// A pull request opened by a member in one of the organization's repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    /// Global node id, unique across repositories.
    pub id: String,
    pub author: String,
    pub repository: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A member dropped at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedMember {
    pub login: String,
    pub reason: String,
}

/// Everything fetched for one organization, fully merged across pages.
///
/// The analysis engine only ever reads a snapshot; it never fetches or caches
/// anything itself.
#[derive(Debug, Clone)]
pub struct OrgSnapshot {
    pub organization: String,
    pub collected_at: DateTime<Utc>,
    pub members: Vec<Member>,
    /// Pull requests keyed by member login. Members without pull requests may
    /// be missing from the map.
    pub pull_requests: HashMap<String, Vec<PullRequestEvent>>,
    pub excluded: Vec<ExcludedMember>,
}

impl OrgSnapshot {
    pub fn pull_requests_for(&self, login: &str) -> &[PullRequestEvent] {
        self.pull_requests
            .get(login)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
