//! Drift detection and convergence for Databricks access control.
//!
//! Each pass reads live state through the capability traits of
//! `warden-core`, compares it with the declaration and issues the mutations
//! that close the gap:
//!
//! - **Groups**: create groups, add missing users and service principals,
//!   report (and optionally remove) unmanaged ones
//! - **Secrets**: replace every declared scope ACL, lock down the rest
//! - **Cluster ACL**: overwrite the ACL of each declared cluster
//! - **Workspace**: delete unmanaged top-level objects, create declared
//!   folders, overwrite their ACL
//!
//! The cluster controller is separate: it prunes unmanaged clusters, then
//! drives every declared cluster to `RUNNING` with its libraries installed.
//!
//! Failures are contained at the smallest unit (member, scope, folder,
//! cluster) and collected into [`PassReport`]s instead of stopping the run.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_core::{DesiredState, InMemoryPlatform};
//! use warden_reconciler::{AclEngine, ReconcilerConfig};
//!
//! let platform = Arc::new(InMemoryPlatform::new());
//! let engine = AclEngine::new(&platform, ReconcilerConfig::default());
//! let report = engine.run(&DesiredState::from_yaml_str(yaml)?).await;
//! assert!(!report.has_aborted_passes());
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod acl;
pub mod cluster;
pub mod groups;
pub mod maintenance;
pub mod permissions;
pub mod reconciler;
pub mod secrets;
pub mod types;

pub use acl::{ClusterAclReconciler, DirectoryAclReconciler};
pub use cluster::{ClusterController, ClusterControllerConfig, ClusterOutcome, ClusterRunReport};
pub use groups::GroupReconciler;
pub use maintenance::{UserSelection, delete_users};
pub use permissions::{aggregate_by_permission, normalize_acl, validate};
pub use reconciler::{AclEngine, ReconcilerBuilder, ReconcilerConfig, summarize, summarize_pass};
pub use secrets::GrantReconciler;
pub use types::{Pass, PassReport, ReconcileAction, RunReport};
