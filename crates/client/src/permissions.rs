//! Object permissions (`preview/permissions/{clusters|directories}`).

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use warden_core::{Grant, ObjectKind, PermissionsApi, Result};

use crate::client::WorkspaceClient;

fn object_path(kind: ObjectKind, object_id: &str) -> String {
    format!("preview/permissions/{}/{object_id}", kind.path_segment())
}

fn acl_body(grants: &[Grant]) -> Value {
    json!({
        "access_control_list": grants.iter().map(Grant::to_access_control).collect::<Vec<_>>()
    })
}

#[async_trait]
impl PermissionsApi for WorkspaceClient {
    async fn get_permissions(&self, kind: ObjectKind, object_id: &str) -> Result<Value> {
        self.get(&object_path(kind, object_id), &[]).await
    }

    async fn get_permission_levels(&self, kind: ObjectKind, object_id: &str) -> Result<Value> {
        self.get(
            &format!("{}/permissionLevels", object_path(kind, object_id)),
            &[],
        )
        .await
    }

    async fn update_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value> {
        self.request(
            Method::PATCH,
            &object_path(kind, object_id),
            Some(&acl_body(grants)),
        )
        .await
    }

    async fn replace_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value> {
        self.request(
            Method::PUT,
            &object_path(kind, object_id),
            Some(&acl_body(grants)),
        )
        .await
    }
}
