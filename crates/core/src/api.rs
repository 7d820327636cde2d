//! Capabilities the reconcilers consume.
//!
//! Each trait covers one resource family of the remote platform. The HTTP
//! client implements all of them; [`crate::memory::InMemoryPlatform`] does
//! too. Reconcilers hold them as `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::{
    AclItem, ClusterInfo, ClusterSpec, CreateOutcome, Grant, Library, ObjectKind,
    WorkspaceObject,
};

/// Workspace-local groups and their direct members.
#[async_trait]
pub trait GroupsApi: Send + Sync {
    /// Names of every group in the workspace.
    async fn list_groups(&self) -> Result<Vec<String>>;

    async fn create_group(&self, name: &str) -> Result<CreateOutcome>;

    async fn delete_group(&self, name: &str) -> Result<()>;

    /// `user_name` of every direct member. Service principals are reported by
    /// application id.
    async fn list_members(&self, group: &str) -> Result<Vec<String>>;

    async fn add_member(&self, group: &str, user_name: &str) -> Result<()>;

    async fn remove_member(&self, group: &str, user_name: &str) -> Result<()>;
}

/// SCIM identity management.
#[async_trait]
pub trait ScimApi: Send + Sync {
    /// Create a user already attached to `groups`.
    async fn add_user(
        &self,
        user_name: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome>;

    /// Rewrite the display name of an existing user, keeping its groups.
    async fn update_user(&self, user_name: &str, display_name: &str) -> Result<()>;

    async fn delete_user(&self, user_name: &str) -> Result<()>;

    /// User names containing `fragment`.
    async fn find_users(&self, fragment: &str) -> Result<Vec<String>>;

    /// Create a service principal already attached to `groups`.
    async fn add_service_principal(
        &self,
        application_id: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome>;

    /// Attach an existing service principal to `groups`.
    async fn update_service_principal_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()>;

    /// Detach a service principal from `groups`.
    async fn remove_service_principal_from_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()>;

    async fn delete_service_principal(&self, application_id: &str) -> Result<()>;

    /// Application ids of every service principal.
    async fn list_service_principals(&self) -> Result<Vec<String>>;
}

/// Per-principal ACL on named scopes (secret scopes).
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn list_scopes(&self) -> Result<Vec<String>>;

    async fn list_grants(&self, scope: &str) -> Result<Vec<AclItem>>;

    /// Put-style write; an existing grant for the principal is overwritten.
    async fn apply_grant(&self, scope: &str, principal: &str, permission: &str) -> Result<()>;

    async fn remove_grant(&self, scope: &str, principal: &str) -> Result<()>;
}

/// Whole-object permissions (clusters, directories).
#[async_trait]
pub trait PermissionsApi: Send + Sync {
    async fn get_permissions(&self, kind: ObjectKind, object_id: &str) -> Result<Value>;

    async fn get_permission_levels(&self, kind: ObjectKind, object_id: &str) -> Result<Value>;

    /// Merge `grants` into the existing ACL.
    async fn update_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value>;

    /// Overwrite the ACL with exactly `grants`.
    async fn replace_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value>;
}

/// Cluster lifecycle.
#[async_trait]
pub trait ClustersApi: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>>;

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo>;

    /// First cluster with this name, if any.
    async fn find_cluster_by_name(&self, name: &str) -> Result<Option<ClusterInfo>> {
        Ok(self
            .list_clusters()
            .await?
            .into_iter()
            .find(|c| c.cluster_name == name))
    }

    /// Returns the new cluster id.
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String>;

    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()>;

    async fn start_cluster(&self, cluster_id: &str) -> Result<()>;

    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()>;
}

/// Cluster-scoped library installs.
#[async_trait]
pub trait LibrariesApi: Send + Sync {
    /// Library specs currently attached to the cluster.
    async fn cluster_libraries(&self, cluster_id: &str) -> Result<Vec<Library>>;

    async fn install_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()>;

    async fn uninstall_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()>;
}

/// Workspace tree.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    async fn list_objects(&self, path: &str) -> Result<Vec<WorkspaceObject>>;

    /// `None` when the path does not exist.
    async fn get_status(&self, path: &str) -> Result<Option<WorkspaceObject>>;

    /// Create the directory and missing parents; existing directories are fine.
    async fn mkdirs(&self, path: &str) -> Result<()>;

    async fn delete(&self, path: &str, recursive: bool) -> Result<()>;
}
