#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # warden-client
//!
//! HTTP client for the Databricks REST API (`{host}/api/2.0`).
//!
//! [`WorkspaceClient`] implements every capability trait from `warden-core`,
//! so a reconciler can be handed the same client as groups, SCIM, secrets,
//! permissions, clusters, libraries and workspace backend.
//!
//! ## Example
//!
//! ```ignore
//! use warden_client::{ClientConfig, WorkspaceClient};
//! use warden_core::GroupsApi;
//!
//! let client = WorkspaceClient::with_config(ClientConfig::from_env())?;
//! let groups = client.list_groups().await?;
//! ```

pub mod client;
pub mod clusters;
pub mod config;
pub mod groups;
pub mod permissions;
pub mod scim;
pub mod secrets;
pub mod workspace;

pub use client::WorkspaceClient;
pub use config::{ClientConfig, HOST_ENV, TOKEN_ENV};
