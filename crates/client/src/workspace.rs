//! Workspace tree (`workspace/*`).

use async_trait::async_trait;
use serde_json::json;
use warden_core::{Error, Result, WorkspaceApi, WorkspaceObject};

use crate::client::{WorkspaceClient, items};

#[async_trait]
impl WorkspaceApi for WorkspaceClient {
    async fn list_objects(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        let response = self.get("workspace/list", &[("path", path)]).await?;
        items(&response, "objects")
            .iter()
            .map(|object| {
                serde_json::from_value::<WorkspaceObject>(object.clone()).map_err(Error::from)
            })
            .collect()
    }

    async fn get_status(&self, path: &str) -> Result<Option<WorkspaceObject>> {
        match self.get("workspace/get-status", &[("path", path)]).await {
            Ok(response) => Ok(Some(serde_json::from_value(response)?)),
            Err(e) if e.indicates_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        self.post("workspace/mkdirs", &json!({ "path": path })).await?;
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.post(
            "workspace/delete",
            &json!({ "path": path, "recursive": recursive }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use warden_core::ObjectType;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_status_missing_is_none() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/workspace/get-status"))
            .and(query_param("path", "/Projects"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "Path (/Projects) doesn't exist."
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        assert!(client.get_status("/Projects").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_status_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/workspace/get-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object_type": "DIRECTORY",
                "path": "/Projects",
                "object_id": 4213
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let status = client.get_status("/Projects").await?;

        assert_eq!(status.as_ref().map(|s| s.object_id), Some(4213));
        assert_eq!(status.map(|s| s.object_type), Some(ObjectType::Directory));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_objects() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/workspace/list"))
            .and(query_param("path", "/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objects": [
                    {"object_type": "DIRECTORY", "path": "/Users", "object_id": 1},
                    {"object_type": "NOTEBOOK", "path": "/scratch", "object_id": 2, "language": "PYTHON"},
                    {"object_type": "DASHBOARD", "path": "/board", "object_id": 3}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let objects = client.list_objects("/").await?;

        assert_eq!(objects.len(), 3);
        assert_eq!(
            objects.last().map(|o| o.object_type),
            Some(ObjectType::Unknown)
        );
        Ok(())
    }
}
