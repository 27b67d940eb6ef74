use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::core::{GitHubClient, PageInfo};
use crate::error::{PrLensError, Result};
use crate::models::PullRequestEvent;

/// Pull requests authored by a user, oldest first. Repository ownership is
/// filtered client-side since the connection spans every repository.
const PULL_REQUESTS_QUERY: &str = r#"
query UserPullRequests($login: String!, $first: Int!, $after: String) {
  user(login: $login) {
    pullRequests(first: $first, after: $after, orderBy: {field: CREATED_AT, direction: ASC}) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        id
        url
        createdAt
        repository {
          nameWithOwner
          owner {
            login
          }
        }
      }
    }
  }
}
"#;

const PAGE_SIZE: i64 = 100;

#[derive(Debug, Serialize)]
struct PullRequestVariables<'a> {
    login: &'a str,
    first: i64,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestData {
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestConnection {
    page_info: PageInfo,
    nodes: Vec<Option<PullRequestNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    id: String,
    url: String,
    created_at: DateTime<Utc>,
    repository: RepositoryNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name_with_owner: String,
    owner: OwnerNode,
}

#[derive(Debug, Deserialize)]
struct OwnerNode {
    login: String,
}

impl PullRequestNode {
    fn belongs_to(&self, org: &str) -> bool {
        self.repository.owner.login.eq_ignore_ascii_case(org)
    }

    fn into_event(self, author: &str) -> PullRequestEvent {
        PullRequestEvent {
            id: self.id,
            author: author.to_string(),
            repository: self.repository.name_with_owner,
            url: self.url,
            created_at: self.created_at,
        }
    }
}

impl GitHubClient {
    /// Every pull request `login` opened in repositories owned by `org`,
    /// merged across pages with duplicates removed. Stops early once `limit`
    /// pull requests are collected.
    pub async fn fetch_pull_requests(
        &self,
        org: &str,
        login: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PullRequestEvent>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut seen = HashSet::new();
        let mut all_pull_requests = Vec::new();
        let mut cursor: Option<String> = None;

        while all_pull_requests.len() < limit {
            let variables = PullRequestVariables {
                login,
                first: PAGE_SIZE,
                after: cursor.clone(),
            };

            let data: PullRequestData = self
                .graphql_query(PULL_REQUESTS_QUERY, "UserPullRequests", variables)
                .await?;

            let user = data
                .user
                .ok_or_else(|| PrLensError::Api(format!("User '{login}' not found")))?;
            let pull_requests = user.pull_requests;

            all_pull_requests.extend(
                pull_requests
                    .nodes
                    .into_iter()
                    .flatten()
                    .filter(|pr| pr.belongs_to(org))
                    .filter(|pr| seen.insert(pr.id.clone()))
                    .map(|pr| pr.into_event(login)),
            );

            if !pull_requests.page_info.has_next_page {
                break;
            }

            cursor = pull_requests.page_info.end_cursor;

            if cursor.is_none() {
                break;
            }
        }

        all_pull_requests.truncate(limit);
        debug!("Fetched {} PRs for {login} in {org}", all_pull_requests.len());

        Ok(all_pull_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::github::client::core::tests::test_config;
    use mockito::Matcher;
    use serde_json::{json, Value};

    fn node(id: &str, owner: &str, created_at: &str) -> Value {
        json!({
            "id": id,
            "url": format!("https://github.com/{owner}/repo/pull/{id}"),
            "createdAt": created_at,
            "repository": {"nameWithOwner": format!("{owner}/repo"), "owner": {"login": owner}}
        })
    }

    fn page(nodes: Vec<Value>, next: Option<&str>) -> String {
        json!({"data": {"user": {"pullRequests": {
            "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next},
            "nodes": nodes
        }}}})
        .to_string()
    }

    async fn mock_page(server: &mut mockito::Server, after: Option<&str>, body: String) {
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "operationName": "UserPullRequests",
                "variables": {"login": "alice", "after": after}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_filters_by_owner_and_dedupes_across_pages() {
        let mut server = mockito::Server::new_async().await;
        mock_page(
            &mut server,
            None,
            page(
                vec![
                    node("A", "acme", "2024-01-01T00:00:00Z"),
                    node("B", "elsewhere", "2024-01-02T00:00:00Z"),
                    node("C", "ACME", "2024-01-03T00:00:00Z"),
                ],
                Some("p2"),
            ),
        )
        .await;
        mock_page(
            &mut server,
            Some("p2"),
            page(
                vec![
                    node("C", "ACME", "2024-01-03T00:00:00Z"),
                    node("D", "acme", "2024-01-04T00:00:00Z"),
                ],
                None,
            ),
        )
        .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let prs = client.fetch_pull_requests("acme", "alice", None).await.unwrap();

        let ids: Vec<_> = prs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C", "D"]);
        assert!(prs.iter().all(|p| p.author == "alice"));
        assert_eq!(prs[1].repository, "ACME/repo");
    }

    #[tokio::test]
    async fn test_limit_stops_pagination() {
        let mut server = mockito::Server::new_async().await;
        mock_page(
            &mut server,
            None,
            page(
                vec![
                    node("A", "acme", "2024-01-01T00:00:00Z"),
                    node("B", "acme", "2024-01-02T00:00:00Z"),
                ],
                Some("p2"),
            ),
        )
        .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let prs = client
            .fetch_pull_requests("acme", "alice", Some(1))
            .await
            .unwrap();

        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].id, "A");
    }

    #[tokio::test]
    async fn test_missing_user_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        mock_page(&mut server, None, r#"{"data":{"user":null}}"#.to_string()).await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result = client.fetch_pull_requests("acme", "alice", None).await;

        assert!(matches!(result, Err(PrLensError::Api(msg)) if msg.contains("alice")));
    }
}
