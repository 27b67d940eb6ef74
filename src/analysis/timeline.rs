use std::collections::HashMap;

use crate::error::{PrLensError, Result};
use crate::models::{Member, PullRequestEvent};

/// A pull request placed on a member's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub event: PullRequestEvent,
    /// 1-based position among post-join pull requests. `None` marks a
    /// pre-membership event.
    pub ordinal: Option<usize>,
}

impl TimelineEvent {
    pub fn is_pre_membership(&self) -> bool {
        self.ordinal.is_none()
    }
}

/// A member's deduplicated pull requests in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberTimeline {
    member: Member,
    events: Vec<TimelineEvent>,
    post_join_count: usize,
}

impl MemberTimeline {
    /// Builds a timeline from an unordered, possibly duplicated collection.
    ///
    /// Duplicates (same PR id) collapse to the earliest creation timestamp.
    /// Events are ordered by timestamp, then by PR id. Events created before
    /// the member joined stay on the timeline but receive no ordinal.
    ///
    /// # Errors
    /// Returns [`PrLensError::Invariant`] if an event belongs to another
    /// member or the sorted sequence is not monotonic.
    pub fn build<I>(member: Member, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = PullRequestEvent>,
    {
        let deduplicated = deduplicate(&member, events)?;
        let sorted = sort_chronologically(deduplicated);
        ensure_monotonic(&member, &sorted)?;

        let mut post_join_count = 0;
        let events = sorted
            .into_iter()
            .map(|event| {
                let ordinal = (event.created_at >= member.joined_at).then(|| {
                    post_join_count += 1;
                    post_join_count
                });
                TimelineEvent { event, ordinal }
            })
            .collect();

        Ok(Self {
            member,
            events,
            post_join_count,
        })
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn post_join(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter().filter(|e| !e.is_pre_membership())
    }

    pub fn post_join_count(&self) -> usize {
        self.post_join_count
    }

    pub fn pre_membership_count(&self) -> usize {
        self.events.len() - self.post_join_count
    }

    /// The post-join event at 1-based ordinal `n`.
    pub fn nth(&self, n: usize) -> Option<&TimelineEvent> {
        self.post_join().find(|e| e.ordinal == Some(n))
    }
}

fn deduplicate<I>(member: &Member, events: I) -> Result<Vec<PullRequestEvent>>
where
    I: IntoIterator<Item = PullRequestEvent>,
{
    let mut by_id: HashMap<String, PullRequestEvent> = HashMap::new();

    for event in events {
        if event.author != member.login {
            return Err(PrLensError::Invariant(format!(
                "pull request {} by '{}' handed to the timeline of '{}'",
                event.id, event.author, member.login
            )));
        }

        match by_id.get_mut(&event.id) {
            Some(existing) if event.created_at < existing.created_at => *existing = event,
            Some(_) => {}
            None => {
                by_id.insert(event.id.clone(), event);
            }
        }
    }

    Ok(by_id.into_values().collect())
}

fn sort_chronologically(mut events: Vec<PullRequestEvent>) -> Vec<PullRequestEvent> {
    events.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    events
}

fn ensure_monotonic(member: &Member, events: &[PullRequestEvent]) -> Result<()> {
    match events
        .windows(2)
        .find(|pair| pair[1].created_at < pair[0].created_at)
    {
        Some(pair) => Err(PrLensError::Invariant(format!(
            "timeline of '{}' is not monotonic: {} precedes {}",
            member.login, pair[0].id, pair[1].id
        ))),
        None => Ok(()),
    }
}
