//! Error taxonomy for warden operations.
//!
//! Two families live here. Declaration errors (`InvalidPermission`,
//! `InvalidConfig`, parse failures) are structural and may abort a pass.
//! Remote errors (`RemoteCall`, `Transport`, `ResolutionFailed`, ...) belong
//! to a single principal, group, scope or cluster and are logged at that
//! unit's boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for warden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for warden operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform answered with a status outside 200/201/204.
    #[error("{method} {url} returned {status}: {body}")]
    RemoteCall {
        method: String,
        url: String,
        status: u16,
        body: serde_json::Value,
    },

    /// The request never produced a response.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// A declared permission level is not allowed for the resource kind.
    #[error("permission '{level}' not allowed for {kind}; allowed: {allowed:?}")]
    InvalidPermission {
        level: String,
        kind: String,
        allowed: Vec<String>,
    },

    /// A create call hit an existing object.
    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    /// A human name could not be mapped to a remote object id.
    #[error("could not resolve {kind} '{name}'")]
    ResolutionFailed { kind: String, name: String },

    /// A declared workspace path exists but is not a directory.
    #[error("path '{path}' is not a directory")]
    NotADirectory { path: String },

    /// The declarative document is structurally invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A response body did not have the expected shape.
    #[error("unexpected response: {reason}")]
    UnexpectedResponse { reason: String },

    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("YAML parse error: {0}")]
    YamlParseFailed(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a remote call failure.
    pub fn remote_call(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: serde_json::Value,
    ) -> Self {
        Self::RemoteCall {
            method: method.into(),
            url: url.into(),
            status,
            body,
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create an invalid permission error.
    pub fn invalid_permission(
        level: impl Into<String>,
        kind: impl Into<String>,
        allowed: &[&str],
    ) -> Self {
        Self::InvalidPermission {
            level: level.into(),
            kind: kind.into(),
            allowed: allowed.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Create a resolution failure.
    pub fn resolution_failed(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a not-a-directory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an unexpected response error.
    pub fn unexpected_response(reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from the declaration rather than the platform.
    ///
    /// Structural errors may abort a whole pass; everything else is scoped to
    /// the unit that raised it.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidPermission { .. }
                | Self::InvalidConfig { .. }
                | Self::YamlParseFailed(_)
                | Self::FileReadFailed { .. }
        )
    }

    /// HTTP status of a remote call failure, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteCall { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the platform reported that the target already exists.
    ///
    /// Covers the conflict status, the REST `error_code` and the SCIM
    /// `detail` message.
    pub fn indicates_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::RemoteCall { status, body, .. } => {
                *status == 409
                    || body_field(body, "error_code")
                        .is_some_and(|code| code == "RESOURCE_ALREADY_EXISTS")
                    || body_field(body, "detail")
                        .is_some_and(|d| d.to_lowercase().contains("already exists"))
            }
            _ => false,
        }
    }

    /// Whether the platform reported that the target does not exist.
    pub fn indicates_not_found(&self) -> bool {
        match self {
            Self::RemoteCall { status, body, .. } => {
                *status == 404
                    || body_field(body, "error_code")
                        .is_some_and(|code| code == "RESOURCE_DOES_NOT_EXIST")
            }
            _ => false,
        }
    }
}

fn body_field<'a>(body: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(serde_json::Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_call_display_carries_body() {
        let err = Error::remote_call("POST", "/groups/create", 400, json!({"message": "bad"}));
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("bad"));
    }

    #[test]
    fn test_already_exists_detection() {
        let conflict = Error::remote_call("POST", "/Users", 409, json!({}));
        assert!(conflict.indicates_already_exists());

        let coded = Error::remote_call(
            "POST",
            "/groups/create",
            400,
            json!({"error_code": "RESOURCE_ALREADY_EXISTS"}),
        );
        assert!(coded.indicates_already_exists());

        let scim = Error::remote_call(
            "POST",
            "/ServicePrincipals",
            400,
            json!({"detail": "Service principal with application ID abc already exists."}),
        );
        assert!(scim.indicates_already_exists());

        let other = Error::remote_call("POST", "/Users", 500, json!("boom"));
        assert!(!other.indicates_already_exists());
    }

    #[test]
    fn test_not_found_detection() {
        let err = Error::remote_call(
            "GET",
            "/workspace/get-status",
            400,
            json!({"error_code": "RESOURCE_DOES_NOT_EXIST"}),
        );
        assert!(err.indicates_not_found());
        assert!(!Error::transport("reset").indicates_not_found());
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::invalid_permission("CAN_DELETE", "cluster", &["CAN_MANAGE"]).is_structural());
        assert!(Error::invalid_config("GROUPS missing").is_structural());
        assert!(!Error::resolution_failed("cluster", "etl").is_structural());
        assert!(!Error::remote_call("GET", "/x", 500, json!(null)).is_structural());
    }
}
