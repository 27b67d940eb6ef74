use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::core::{GitHubClient, PageInfo};
use crate::error::{PrLensError, Result};

const MEMBERS_QUERY: &str = r#"
query OrgMembers($org: String!, $first: Int!, $after: String) {
  organization(login: $org) {
    membersWithRole(first: $first, after: $after) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        login
      }
    }
  }
}
"#;

const PAGE_SIZE: i64 = 100;

#[derive(Debug, Serialize)]
struct MembersVariables<'a> {
    org: &'a str,
    first: i64,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembersData {
    organization: Option<OrganizationNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationNode {
    members_with_role: MemberConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberConnection {
    page_info: PageInfo,
    nodes: Vec<Option<MemberNode>>,
}

#[derive(Debug, Deserialize)]
struct MemberNode {
    login: String,
}

#[derive(Debug, Deserialize)]
struct MembershipDto {
    created_at: Option<DateTime<Utc>>,
}

impl GitHubClient {
    /// Logins of every member of `org`, following cursor pagination.
    pub async fn fetch_members(&self, org: &str) -> Result<Vec<String>> {
        let mut all_members = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let variables = MembersVariables {
                org,
                first: PAGE_SIZE,
                after: cursor.clone(),
            };

            let data: MembersData = self
                .graphql_query(MEMBERS_QUERY, "OrgMembers", variables)
                .await?;

            let organization = data.organization.ok_or_else(|| {
                PrLensError::Api(format!("Organization '{org}' not found"))
            })?;
            let members = organization.members_with_role;

            all_members.extend(
                members
                    .nodes
                    .into_iter()
                    .flatten()
                    .map(|m| m.login)
                    .filter(|login| seen.insert(login.clone())),
            );
            debug!("Fetched {} members so far", all_members.len());

            if !members.page_info.has_next_page {
                break;
            }

            cursor = members.page_info.end_cursor;

            if cursor.is_none() {
                break;
            }
        }

        Ok(all_members)
    }

    /// When `login` joined `org`, if GitHub reports it.
    pub async fn fetch_membership_date(
        &self,
        org: &str,
        login: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let membership: MembershipDto = self
            .rest_get(&format!("orgs/{org}/memberships/{login}"))
            .await?;

        Ok(membership.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::github::client::core::tests::test_config;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_members_follows_cursor_and_skips_repeats() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "operationName": "OrgMembers",
                "variables": {"after": null}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": {"organization": {"membersWithRole": {
                    "pageInfo": {"hasNextPage": true, "endCursor": "c1"},
                    "nodes": [{"login": "alice"}, {"login": "bob"}]
                }}}})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJson(json!({
                "operationName": "OrgMembers",
                "variables": {"after": "c1"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"data": {"organization": {"membersWithRole": {
                    "pageInfo": {"hasNextPage": false, "endCursor": null},
                    "nodes": [{"login": "carol"}, {"login": "bob"}, null]
                }}}})
                .to_string(),
            )
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let members = client.fetch_members("acme").await.unwrap();

        assert_eq!(members, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_unknown_organization() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"organization":null}}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();
        let result = client.fetch_members("nope").await;

        assert!(matches!(result, Err(PrLensError::Api(msg)) if msg.contains("nope")));
    }

    #[tokio::test]
    async fn test_fetch_membership_date() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/orgs/acme/memberships/alice")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"state":"active","role":"member","created_at":"2023-04-05T06:07:08Z"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/orgs/acme/memberships/bob")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"state":"active","role":"member"}"#)
            .create_async()
            .await;

        let client = GitHubClient::new(&server.url(), None, test_config()).unwrap();

        assert_eq!(
            client.fetch_membership_date("acme", "alice").await.unwrap(),
            Some(Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap())
        );
        assert_eq!(client.fetch_membership_date("acme", "bob").await.unwrap(), None);
    }
}
