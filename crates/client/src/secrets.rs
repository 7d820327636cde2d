//! Secret scope ACLs (`secrets/*`).

use async_trait::async_trait;
use serde_json::{Value, json};
use warden_core::{AclItem, Error, GrantStore, Result};

use crate::client::{WorkspaceClient, items};

#[async_trait]
impl GrantStore for WorkspaceClient {
    async fn list_scopes(&self) -> Result<Vec<String>> {
        let response = self.get("secrets/scopes/list", &[]).await?;
        Ok(items(&response, "scopes")
            .iter()
            .filter_map(|scope| scope.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn list_grants(&self, scope: &str) -> Result<Vec<AclItem>> {
        let response = self.get("secrets/acls/list", &[("scope", scope)]).await?;
        items(&response, "items")
            .iter()
            .map(|item| serde_json::from_value::<AclItem>(item.clone()).map_err(Error::from))
            .collect()
    }

    async fn apply_grant(&self, scope: &str, principal: &str, permission: &str) -> Result<()> {
        self.post(
            "secrets/acls/put",
            &json!({ "scope": scope, "principal": principal, "permission": permission }),
        )
        .await?;
        Ok(())
    }

    async fn remove_grant(&self, scope: &str, principal: &str) -> Result<()> {
        self.post(
            "secrets/acls/delete",
            &json!({ "scope": scope, "principal": principal }),
        )
        .await?;
        Ok(())
    }
}
