//! Cluster lifecycle (`clusters/*`) and cluster libraries (`libraries/*`).

use async_trait::async_trait;
use serde_json::{Value, json};
use warden_core::{ClusterInfo, ClusterSpec, ClustersApi, LibrariesApi, Library, Result};

use crate::client::{WorkspaceClient, items, text_field};

#[async_trait]
impl ClustersApi for WorkspaceClient {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let response = self.get("clusters/list", &[]).await?;
        items(&response, "clusters")
            .iter()
            .cloned()
            .map(ClusterInfo::from_value)
            .collect()
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        let response = self
            .get("clusters/get", &[("cluster_id", cluster_id)])
            .await?;
        ClusterInfo::from_value(response)
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        let response = self
            .post("clusters/create", &Value::Object(spec.to_body()))
            .await?;
        text_field(&response, "cluster_id")
    }

    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()> {
        let mut body = spec.to_body();
        body.insert("cluster_id".to_string(), json!(cluster_id));
        self.post("clusters/edit", &Value::Object(body)).await?;
        Ok(())
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        self.post("clusters/start", &json!({ "cluster_id": cluster_id }))
            .await?;
        Ok(())
    }

    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()> {
        self.post(
            "clusters/permanent-delete",
            &json!({ "cluster_id": cluster_id }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LibrariesApi for WorkspaceClient {
    async fn cluster_libraries(&self, cluster_id: &str) -> Result<Vec<Library>> {
        let response = self
            .get("libraries/cluster-status", &[("cluster_id", cluster_id)])
            .await?;
        Ok(items(&response, "library_statuses")
            .iter()
            .filter_map(|status| status.get("library").cloned())
            .collect())
    }

    async fn install_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        self.post(
            "libraries/install",
            &json!({ "cluster_id": cluster_id, "libraries": libraries }),
        )
        .await?;
        Ok(())
    }

    async fn uninstall_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        self.post(
            "libraries/uninstall",
            &json!({ "cluster_id": cluster_id, "libraries": libraries }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use warden_core::ClusterState;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_cluster_by_name() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/clusters/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clusters": [
                    {"cluster_id": "1", "cluster_name": "adhoc", "state": "RUNNING", "cluster_source": "UI"},
                    {"cluster_id": "2", "cluster_name": "etl", "state": "TERMINATED", "cluster_source": "API"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let found = client.find_cluster_by_name("etl").await?;

        assert_eq!(found.as_ref().map(|c| c.cluster_id.as_str()), Some("2"));
        assert_eq!(found.map(|c| c.state), Some(ClusterState::Terminated));
        assert!(client.find_cluster_by_name("missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_sends_id_with_spec() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/clusters/edit"))
            .and(body_json(json!({
                "cluster_id": "2",
                "cluster_name": "etl",
                "num_workers": 4
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let spec = ClusterSpec::new("etl").with_setting("num_workers", json!(4));
        client.edit_cluster("2", &spec).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_returns_cluster_id() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/2.0/clusters/create"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"cluster_id": "0101-new"})),
            )
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let id = client.create_cluster(&ClusterSpec::new("etl")).await?;

        assert_eq!(id, "0101-new");
        Ok(())
    }

    #[tokio::test]
    async fn test_cluster_libraries_unwraps_statuses()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/2.0/libraries/cluster-status"))
            .and(query_param("cluster_id", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster_id": "2",
                "library_statuses": [
                    {"library": {"pypi": {"package": "requests"}}, "status": "INSTALLED"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = WorkspaceClient::with_config(ClientConfig::new(mock_server.uri(), "t"))?;
        let libraries = client.cluster_libraries("2").await?;

        assert_eq!(libraries, vec![json!({"pypi": {"package": "requests"}})]);
        Ok(())
    }
}
