//! ACL engine: runs the passes over a desired state in a fixed order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};
use ulid::Ulid;
use warden_core::{
    ClustersApi, DesiredState, Error, GrantStore, GroupsApi, PermissionsApi, Result, ScimApi,
    WorkspaceApi,
};

use crate::acl::{ClusterAclReconciler, DirectoryAclReconciler};
use crate::groups::GroupReconciler;
use crate::secrets::GrantReconciler;
use crate::types::{PassReport, RunReport};

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Delete unmanaged groups and remove unmanaged members.
    #[serde(default)]
    pub remove_unmanaged: bool,
    /// Top-level workspace folders never deleted as unmanaged.
    #[serde(default = "default_ignored_workspace_folders")]
    pub ignored_workspace_folders: Vec<String>,
    /// Built-in groups never deleted and never compared.
    #[serde(default = "default_reserved_groups")]
    pub reserved_groups: Vec<String>,
}

fn default_ignored_workspace_folders() -> Vec<String> {
    vec!["Shared".to_string(), "Users".to_string()]
}

fn default_reserved_groups() -> Vec<String> {
    vec!["admins".to_string(), "users".to_string()]
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            remove_unmanaged: false,
            ignored_workspace_folders: default_ignored_workspace_folders(),
            reserved_groups: default_reserved_groups(),
        }
    }
}

impl ReconcilerConfig {
    #[must_use]
    pub const fn remove_unmanaged(mut self, enabled: bool) -> Self {
        self.remove_unmanaged = enabled;
        self
    }

    pub fn is_reserved_group(&self, name: &str) -> bool {
        self.reserved_groups.iter().any(|g| g == name)
    }
}

/// Runs the groups, secrets, cluster ACL and workspace passes.
pub struct AclEngine {
    groups: GroupReconciler,
    secrets: GrantReconciler,
    cluster_acl: ClusterAclReconciler,
    workspace: DirectoryAclReconciler,
    config: ReconcilerConfig,
}

impl AclEngine {
    /// Engine over a single backend implementing every capability.
    pub fn new<P>(platform: &Arc<P>, config: ReconcilerConfig) -> Self
    where
        P: GroupsApi + ScimApi + GrantStore + PermissionsApi + ClustersApi + WorkspaceApi + 'static,
    {
        Self {
            groups: GroupReconciler::new(platform.clone(), platform.clone(), config.clone()),
            secrets: GrantReconciler::secret_scopes(platform.clone()),
            cluster_acl: ClusterAclReconciler::new(platform.clone(), platform.clone()),
            workspace: DirectoryAclReconciler::new(
                platform.clone(),
                platform.clone(),
                config.ignored_workspace_folders.clone(),
            ),
            config,
        }
    }

    /// Run every pass once.
    ///
    /// A pass that aborts is reported and the next pass still runs. The
    /// cluster ACL pass only runs when the declaration has a `CLUSTERS`
    /// section with at least one entry.
    pub async fn run(&self, desired: &DesiredState) -> RunReport {
        let run_id = Ulid::new();
        let span = info_span!("acl_run", %run_id);
        async {
            info!(
                groups = desired.groups.len(),
                scopes = desired.secrets.as_ref().map_or(0, Vec::len),
                clusters = desired.clusters.as_ref().map_or(0, Vec::len),
                folders = desired.workspace.len(),
                remove_unmanaged = self.config.remove_unmanaged,
                "Starting reconciliation"
            );
            let mut report = RunReport::new(run_id);

            report.passes.push(
                self.groups
                    .reconcile(&desired.groups)
                    .instrument(info_span!("groups"))
                    .await,
            );
            report.passes.push(
                self.secrets
                    .reconcile(desired.secrets.as_deref())
                    .instrument(info_span!("secrets"))
                    .await,
            );
            match desired.clusters.as_deref() {
                Some(entries) if !entries.is_empty() => report.passes.push(
                    self.cluster_acl
                        .reconcile(entries)
                        .instrument(info_span!("cluster_acl"))
                        .await,
                ),
                _ => info!("No cluster ACLs declared, skipping"),
            }
            report.passes.push(
                self.workspace
                    .reconcile(&desired.workspace)
                    .instrument(info_span!("workspace"))
                    .await,
            );

            for aborted in report.passes.iter().filter(|p| p.is_aborted()) {
                warn!(pass = %aborted.pass, reason = ?aborted.aborted, "Pass aborted");
            }
            if report.converged() {
                info!("System converged");
            } else {
                info!(
                    actions_taken = report.actions_taken(),
                    actions_failed = report.actions_failed(),
                    "Reconciliation complete"
                );
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for [`AclEngine`] when capabilities come from separate backends.
pub struct ReconcilerBuilder {
    groups: Option<Arc<dyn GroupsApi>>,
    scim: Option<Arc<dyn ScimApi>>,
    grants: Option<Arc<dyn GrantStore>>,
    permissions: Option<Arc<dyn PermissionsApi>>,
    clusters: Option<Arc<dyn ClustersApi>>,
    workspace: Option<Arc<dyn WorkspaceApi>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            groups: None,
            scim: None,
            grants: None,
            permissions: None,
            clusters: None,
            workspace: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Use one backend for every capability.
    #[must_use]
    pub fn with_platform<P>(self, platform: &Arc<P>) -> Self
    where
        P: GroupsApi + ScimApi + GrantStore + PermissionsApi + ClustersApi + WorkspaceApi + 'static,
    {
        self.with_groups(platform.clone())
            .with_scim(platform.clone())
            .with_grant_store(platform.clone())
            .with_permissions(platform.clone())
            .with_clusters(platform.clone())
            .with_workspace(platform.clone())
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Arc<dyn GroupsApi>) -> Self {
        self.groups = Some(groups);
        self
    }

    #[must_use]
    pub fn with_scim(mut self, scim: Arc<dyn ScimApi>) -> Self {
        self.scim = Some(scim);
        self
    }

    #[must_use]
    pub fn with_grant_store(mut self, grants: Arc<dyn GrantStore>) -> Self {
        self.grants = Some(grants);
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionsApi>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    #[must_use]
    pub fn with_clusters(mut self, clusters: Arc<dyn ClustersApi>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceApi>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable removal of unmanaged groups and members.
    #[must_use]
    pub fn remove_unmanaged(mut self, enabled: bool) -> Self {
        self.config.remove_unmanaged = enabled;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when a capability was not provided.
    pub fn build(self) -> Result<AclEngine> {
        let groups = required(self.groups, "groups")?;
        let scim = required(self.scim, "SCIM")?;
        let grants = required(self.grants, "grant store")?;
        let permissions = required(self.permissions, "permissions")?;
        let clusters = required(self.clusters, "clusters")?;
        let workspace = required(self.workspace, "workspace")?;

        Ok(AclEngine {
            groups: GroupReconciler::new(groups, scim, self.config.clone()),
            secrets: GrantReconciler::secret_scopes(grants),
            cluster_acl: ClusterAclReconciler::new(clusters, Arc::clone(&permissions)),
            workspace: DirectoryAclReconciler::new(
                workspace,
                permissions,
                self.config.ignored_workspace_folders.clone(),
            ),
            config: self.config,
        })
    }
}

fn required<T: ?Sized>(capability: Option<Arc<T>>, name: &str) -> Result<Arc<T>> {
    capability.ok_or_else(|| Error::invalid_config(format!("{name} backend is required")))
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summaries of every pass, one line each.
pub fn summarize(report: &RunReport) -> Vec<String> {
    report.passes.iter().map(summarize_pass).collect()
}

/// One-line summary of a single pass.
pub fn summarize_pass(pass: &PassReport) -> String {
    match &pass.aborted {
        Some(reason) => format!("{}: aborted ({reason})", pass.pass),
        None => format!(
            "{}: {} applied, {} failed, {} skipped",
            pass.pass,
            pass.actions_taken.len(),
            pass.actions_failed.len(),
            pass.skipped.len()
        ),
    }
}
