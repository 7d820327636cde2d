//! # warden-core
//!
//! Shared vocabulary for the warden reconciliation engine:
//!
//! - [`error`]: the error taxonomy every crate reports through
//! - [`model`]: principals, grants, permission levels, cluster records
//! - [`config`]: the declarative document schema and its validated [`DesiredState`]
//! - [`api`]: the narrow capability traits the reconcilers consume
//! - [`memory`]: an in-memory platform implementing every capability

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod result;

pub use api::{
    ClustersApi, GrantStore, GroupsApi, LibrariesApi, PermissionsApi, ScimApi, WorkspaceApi,
};
pub use config::{
    AclDocument, ClusterAclEntry, ClusterDocument, DesiredState, DirectoryAclEntry, Group,
    GroupDecl, LibraryDocument, MemberDecl, SecretScopeEntry,
};
pub use error::{Error, Result};
pub use memory::{InMemoryPlatform, MutationCall};
pub use model::{
    AclBlock, AclItem, ClusterInfo, ClusterSpec, ClusterState, CreateOutcome, Grant, Library,
    ObjectKind, ObjectType, PermissionLevel, Principal, PrincipalKind, PrincipalRef,
    ResourceKind, WorkspaceObject,
};
pub use result::ResultExt;
