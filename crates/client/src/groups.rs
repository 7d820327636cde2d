//! Workspace groups (`groups/*`).

use async_trait::async_trait;
use serde_json::{Value, json};
use warden_core::{CreateOutcome, GroupsApi, Result};

use crate::client::{WorkspaceClient, create_outcome, items};

#[async_trait]
impl GroupsApi for WorkspaceClient {
    async fn list_groups(&self) -> Result<Vec<String>> {
        let response = self.get("groups/list", &[]).await?;
        Ok(items(&response, "group_names")
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn create_group(&self, name: &str) -> Result<CreateOutcome> {
        create_outcome(self.post("groups/create", &json!({ "group_name": name })).await)
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        self.post("groups/delete", &json!({ "group_name": name }))
            .await?;
        Ok(())
    }

    async fn list_members(&self, group: &str) -> Result<Vec<String>> {
        let response = self
            .get("groups/list-members", &[("group_name", group)])
            .await?;
        // Nested groups are reported with `group_name` and are not principals.
        Ok(items(&response, "members")
            .iter()
            .filter_map(|member| member.get("user_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn add_member(&self, group: &str, user_name: &str) -> Result<()> {
        self.post(
            "groups/add-member",
            &json!({ "user_name": user_name, "parent_name": group }),
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, group: &str, user_name: &str) -> Result<()> {
        self.post(
            "groups/remove-member",
            &json!({ "user_name": user_name, "parent_name": group }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_members_skips_nested_groups()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/groups/list-members"))
            .and(query_param("group_name", "eng"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [
                    {"user_name": "ada@example.com"},
                    {"group_name": "platform"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let members = client.list_members("eng").await?;

        assert_eq!(members, vec!["ada@example.com".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_groups_without_groups() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/groups/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        assert!(client.list_groups().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_existing_group_is_already_exists()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/groups/create"))
            .and(body_json(json!({"group_name": "eng"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "RESOURCE_ALREADY_EXISTS",
                "message": "Group with name eng already exists."
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        assert_eq!(client.create_group("eng").await?, CreateOutcome::AlreadyExists);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_member_body() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/groups/add-member"))
            .and(body_json(json!({"user_name": "ada@example.com", "parent_name": "eng"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        client.add_member("eng", "ada@example.com").await?;
        Ok(())
    }
}
