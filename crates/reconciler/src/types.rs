//! Core types for the reconciler.

use std::fmt;

use tracing::{error, info, warn};
use ulid::Ulid;
use warden_core::{Error, ObjectKind, Result};

/// One reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Groups,
    Secrets,
    ClusterAcl,
    Workspace,
    UnmanagedClusters,
    Cluster,
    UserCleanup,
}

impl Pass {
    /// Name used for tracing spans and summaries.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Secrets => "secrets",
            Self::ClusterAcl => "cluster_acl",
            Self::Workspace => "workspace",
            Self::UnmanagedClusters => "unmanaged_clusters",
            Self::Cluster => "cluster",
            Self::UserCleanup => "user_cleanup",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote mutation issued by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    CreateGroup {
        group: String,
    },
    DeleteGroup {
        group: String,
    },
    AddUser {
        group: String,
        user_name: String,
    },
    UpdateUser {
        user_name: String,
        display_name: String,
    },
    AddMember {
        group: String,
        user_name: String,
    },
    RemoveMember {
        group: String,
        user_name: String,
    },
    AddServicePrincipal {
        group: String,
        application_id: String,
    },
    UpdateServicePrincipalGroups {
        group: String,
        application_id: String,
    },
    RemoveServicePrincipal {
        group: String,
        application_id: String,
    },
    DeleteUser {
        user_name: String,
    },
    PutGrant {
        scope: String,
        principal: String,
        permission: String,
    },
    RemoveGrant {
        scope: String,
        principal: String,
    },
    ReplacePermissions {
        kind: ObjectKind,
        name: String,
        object_id: String,
    },
    CreateDirectory {
        path: String,
    },
    DeleteWorkspaceObject {
        path: String,
    },
    CreateCluster {
        cluster_name: String,
    },
    EditCluster {
        cluster_name: String,
        cluster_id: String,
    },
    StartCluster {
        cluster_name: String,
        cluster_id: String,
    },
    DeleteCluster {
        cluster_name: String,
        cluster_id: String,
    },
    InstallLibraries {
        cluster_name: String,
        count: usize,
    },
    UninstallLibraries {
        cluster_name: String,
        count: usize,
    },
}

impl ReconcileAction {
    /// Get a human-readable description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::CreateGroup { group } => format!("Create group {group}"),
            Self::DeleteGroup { group } => format!("Delete unmanaged group {group}"),
            Self::AddUser { group, user_name } => {
                format!("Create user {user_name} in group {group}")
            }
            Self::UpdateUser {
                user_name,
                display_name,
            } => format!("Set display name of {user_name} to '{display_name}'"),
            Self::AddMember { group, user_name } => {
                format!("Add {user_name} to group {group}")
            }
            Self::RemoveMember { group, user_name } => {
                format!("Remove {user_name} from group {group}")
            }
            Self::AddServicePrincipal {
                group,
                application_id,
            } => format!("Create service principal {application_id} in group {group}"),
            Self::UpdateServicePrincipalGroups {
                group,
                application_id,
            } => format!("Attach service principal {application_id} to group {group}"),
            Self::RemoveServicePrincipal {
                group,
                application_id,
            } => format!("Detach service principal {application_id} from group {group}"),
            Self::DeleteUser { user_name } => format!("Delete user {user_name}"),
            Self::PutGrant {
                scope,
                principal,
                permission,
            } => format!("Grant {permission} on scope {scope} to {principal}"),
            Self::RemoveGrant { scope, principal } => {
                format!("Revoke {principal} on scope {scope}")
            }
            Self::ReplacePermissions {
                kind,
                name,
                object_id,
            } => format!(
                "Replace ACL of {} {name} ({object_id})",
                kind.resource_kind()
            ),
            Self::CreateDirectory { path } => format!("Create folder {path}"),
            Self::DeleteWorkspaceObject { path } => format!("Delete workspace object {path}"),
            Self::CreateCluster { cluster_name } => format!("Create cluster {cluster_name}"),
            Self::EditCluster {
                cluster_name,
                cluster_id,
            } => format!("Edit cluster {cluster_name} ({cluster_id})"),
            Self::StartCluster {
                cluster_name,
                cluster_id,
            } => format!("Start cluster {cluster_name} ({cluster_id})"),
            Self::DeleteCluster {
                cluster_name,
                cluster_id,
            } => format!("Permanently delete cluster {cluster_name} ({cluster_id})"),
            Self::InstallLibraries {
                cluster_name,
                count,
            } => format!("Install {count} libraries on {cluster_name}"),
            Self::UninstallLibraries {
                cluster_name,
                count,
            } => format!("Uninstall {count} libraries from {cluster_name}"),
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Result of one pass.
///
/// Failures scoped to a single unit are recorded and the pass carries on;
/// `aborted` is set only when the pass could not start or had to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub pass: Pass,
    /// Mutations that succeeded.
    pub actions_taken: Vec<ReconcileAction>,
    /// Mutations that failed, with the error text.
    pub actions_failed: Vec<(ReconcileAction, String)>,
    /// Units skipped before any mutation, with the reason.
    pub skipped: Vec<(String, String)>,
    pub aborted: Option<String>,
}

impl PassReport {
    pub const fn new(pass: Pass) -> Self {
        Self {
            pass,
            actions_taken: Vec::new(),
            actions_failed: Vec::new(),
            skipped: Vec::new(),
            aborted: None,
        }
    }

    /// Record a mutation that succeeded.
    pub fn taken(&mut self, action: ReconcileAction) {
        info!(pass = %self.pass, action = %action, "Applied");
        self.actions_taken.push(action);
    }

    /// Record a mutation that failed.
    pub fn failed(&mut self, action: ReconcileAction, error: &Error) {
        warn!(pass = %self.pass, action = ?action, error = %error, "Action failed");
        self.actions_failed.push((action, error.to_string()));
    }

    /// Record the outcome of a mutation, returning its value on success.
    pub fn record<T>(&mut self, action: ReconcileAction, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.taken(action);
                Some(value)
            }
            Err(e) => {
                self.failed(action, &e);
                None
            }
        }
    }

    /// Record a unit that was skipped.
    pub fn skip(&mut self, unit: impl Into<String>, error: &Error) {
        let unit = unit.into();
        error!(pass = %self.pass, unit = %unit, error = %error, "Skipping");
        self.skipped.push((unit, error.to_string()));
    }

    /// Mark the pass as aborted.
    #[must_use]
    pub fn abort(mut self, error: &Error) -> Self {
        error!(pass = %self.pass, error = %error, "Pass aborted");
        self.aborted = Some(error.to_string());
        self
    }

    pub const fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// No mutation was needed and nothing went wrong.
    pub fn converged(&self) -> bool {
        self.actions_taken.is_empty()
            && self.actions_failed.is_empty()
            && self.skipped.is_empty()
            && self.aborted.is_none()
    }

    /// Whether any failure was recorded.
    pub fn has_failures(&self) -> bool {
        !self.actions_failed.is_empty() || !self.skipped.is_empty() || self.aborted.is_some()
    }
}

/// Result of a full ACL run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Ulid,
    pub passes: Vec<PassReport>,
}

impl RunReport {
    pub const fn new(run_id: Ulid) -> Self {
        Self {
            run_id,
            passes: Vec::new(),
        }
    }

    pub fn pass(&self, pass: Pass) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.pass == pass)
    }

    pub fn has_aborted_passes(&self) -> bool {
        self.passes.iter().any(PassReport::is_aborted)
    }

    pub fn has_failures(&self) -> bool {
        self.passes.iter().any(PassReport::has_failures)
    }

    pub fn converged(&self) -> bool {
        self.passes.iter().all(PassReport::converged)
    }

    pub fn actions_taken(&self) -> usize {
        self.passes.iter().map(|p| p.actions_taken.len()).sum()
    }

    pub fn actions_failed(&self) -> usize {
        self.passes.iter().map(|p| p.actions_failed.len()).sum()
    }
}
