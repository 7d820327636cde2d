//! Data model shared by the client and the reconcilers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Kind of identity a group holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
    /// Human user keyed by user name.
    #[serde(rename = "user")]
    User,
    /// Service principal keyed by application id.
    #[serde(rename = "spn")]
    ServicePrincipal,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::ServicePrincipal => write!(f, "spn"),
        }
    }
}

/// A declared identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    /// User name or application id.
    pub id: String,
    pub display_name: Option<String>,
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::User,
            id: id.into(),
            display_name: None,
        }
    }

    pub fn service_principal(id: impl Into<String>) -> Self {
        Self {
            kind: PrincipalKind::ServicePrincipal,
            id: id.into(),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Who a grant is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrincipalRef {
    Group(String),
    User(String),
    ServicePrincipal(String),
}

impl PrincipalRef {
    /// The principal's name as the platform knows it.
    pub fn name(&self) -> &str {
        match self {
            Self::Group(name) | Self::User(name) | Self::ServicePrincipal(name) => name,
        }
    }

    /// Key used in permissions API access control entries.
    pub const fn acl_key(&self) -> &'static str {
        match self {
            Self::Group(_) => "group_name",
            Self::User(_) => "user_name",
            Self::ServicePrincipal(_) => "service_principal_name",
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(name) => write!(f, "group:{name}"),
            Self::User(name) => write!(f, "user:{name}"),
            Self::ServicePrincipal(name) => write!(f, "spn:{name}"),
        }
    }
}

/// Securable resource kinds and their permission vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SecretScope,
    Cluster,
    Directory,
}

impl ResourceKind {
    const SECRET_SCOPE_LEVELS: &'static [&'static str] = &["READ", "WRITE", "MANAGE"];
    const CLUSTER_LEVELS: &'static [&'static str] = &["CAN_ATTACH_TO", "CAN_RESTART", "CAN_MANAGE"];
    const DIRECTORY_LEVELS: &'static [&'static str] =
        &["CAN_READ", "CAN_RUN", "CAN_EDIT", "CAN_MANAGE"];

    /// Permission levels the platform accepts for this kind.
    pub const fn allowed_permissions(self) -> &'static [&'static str] {
        match self {
            Self::SecretScope => Self::SECRET_SCOPE_LEVELS,
            Self::Cluster => Self::CLUSTER_LEVELS,
            Self::Directory => Self::DIRECTORY_LEVELS,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretScope => write!(f, "secret scope"),
            Self::Cluster => write!(f, "cluster"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A permission level already checked against a resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PermissionLevel(String);

impl PermissionLevel {
    /// Upper-case `level` and check it against the kind's allowed set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPermission` when the level is not allowed.
    pub fn parse(level: &str, kind: ResourceKind) -> Result<Self> {
        let normalized = level.trim().to_uppercase();
        let allowed = kind.allowed_permissions();
        if allowed.contains(&normalized.as_str()) {
            Ok(Self(normalized))
        } else {
            Err(Error::invalid_permission(normalized, kind.to_string(), allowed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One flat `(principal, level)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grant {
    pub principal: PrincipalRef,
    pub level: PermissionLevel,
}

impl Grant {
    pub const fn new(principal: PrincipalRef, level: PermissionLevel) -> Self {
        Self { principal, level }
    }

    /// Access control entry in the permissions API shape.
    pub fn to_access_control(&self) -> Value {
        let mut entry = Map::new();
        entry.insert(
            self.principal.acl_key().to_string(),
            Value::String(self.principal.name().to_string()),
        );
        entry.insert(
            "permission_level".to_string(),
            Value::String(self.level.to_string()),
        );
        Value::Object(entry)
    }
}

/// Declared ACL block: several principals sharing one permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclBlock {
    pub permission: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal: Option<Vec<String>>,
}

impl AclBlock {
    pub fn for_groups<I, S>(permission: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permission: permission.into(),
            group: Some(groups.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn for_users<I, S>(permission: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permission: permission.into(),
            user: Some(users.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Every principal named in the block, whatever its kind.
    pub fn principal_names(&self) -> BTreeSet<&str> {
        [&self.group, &self.user, &self.service_principal]
            .into_iter()
            .flatten()
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// Live secret scope ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclItem {
    pub principal: String,
    pub permission: String,
}

/// Outcome of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Lifecycle state reported by the platform for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Pending,
    Running,
    Restarting,
    Resizing,
    Terminating,
    Terminated,
    Error,
    #[serde(other)]
    Unknown,
}

impl ClusterState {
    /// Platform-driven transitions the controller only waits out.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Restarting | Self::Resizing | Self::Terminating)
    }

    /// States the controller drives towards running.
    pub const fn awaits_start(self) -> bool {
        matches!(self, Self::Terminated | Self::Pending)
    }

    /// Whether the wait loop keeps polling in this state.
    pub const fn keeps_polling(self) -> bool {
        self.is_transient() || self.awaits_start()
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Restarting => "RESTARTING",
            Self::Resizing => "RESIZING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Opaque library specification (`{"pypi": {...}}`, `{"jar": "..."}`, ...).
pub type Library = Value;

/// Declared cluster settings. Only `cluster_name` is interpreted; every other
/// key is sent to the platform as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub cluster_name: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ClusterSpec {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            settings: Map::new(),
        }
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Full request body, `cluster_name` included.
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = self.settings.clone();
        body.insert(
            "cluster_name".to_string(),
            Value::String(self.cluster_name.clone()),
        );
        body
    }

    /// True when every declared key has the same value on the live cluster.
    pub fn is_subset_of(&self, live: &ClusterInfo) -> bool {
        self.to_body()
            .iter()
            .all(|(key, value)| live.attributes.get(key) == Some(value))
    }
}

/// Live cluster record.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    pub cluster_id: String,
    pub cluster_name: String,
    pub state: ClusterState,
    pub cluster_source: Option<String>,
    /// Every attribute the platform returned.
    pub attributes: Map<String, Value>,
}

impl ClusterInfo {
    /// Build from a platform response object.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedResponse` when the id or name is missing.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(attributes) = value else {
            return Err(Error::unexpected_response("cluster record is not an object"));
        };
        let text = |key: &str| {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let cluster_id = text("cluster_id")
            .ok_or_else(|| Error::unexpected_response("cluster record without cluster_id"))?;
        let cluster_name = text("cluster_name").unwrap_or_default();
        let state = attributes
            .get("state")
            .cloned()
            .map(serde_json::from_value::<ClusterState>)
            .transpose()?
            .unwrap_or(ClusterState::Unknown);
        let cluster_source = text("cluster_source");
        Ok(Self {
            cluster_id,
            cluster_name,
            state,
            cluster_source,
            attributes,
        })
    }

    /// Clusters started by the job scheduler are never managed here.
    pub fn is_job_cluster(&self) -> bool {
        self.cluster_source
            .as_deref()
            .is_some_and(|source| source.eq_ignore_ascii_case("JOB"))
    }
}

/// Object kinds addressable through the permissions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Clusters,
    Directories,
}

impl ObjectKind {
    /// Path segment under `preview/permissions`.
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Clusters => "clusters",
            Self::Directories => "directories",
        }
    }

    pub const fn resource_kind(self) -> ResourceKind {
        match self {
            Self::Clusters => ResourceKind::Cluster,
            Self::Directories => ResourceKind::Directory,
        }
    }
}

/// Workspace object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Directory,
    Notebook,
    Library,
    File,
    Repo,
    #[serde(other)]
    Unknown,
}

/// Workspace listing / status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceObject {
    pub path: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub object_id: i64,
}

impl WorkspaceObject {
    pub fn is_dir(&self) -> bool {
        self.object_type == ObjectType::Directory
    }

    /// Last path segment.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_level_is_case_insensitive() -> Result<()> {
        let level = PermissionLevel::parse("can_manage", ResourceKind::Cluster)?;
        assert_eq!(level.as_str(), "CAN_MANAGE");
        Ok(())
    }

    #[test]
    fn test_permission_level_rejects_foreign_level() {
        let result = PermissionLevel::parse("CAN_DELETE", ResourceKind::Cluster);
        assert!(matches!(result, Err(Error::InvalidPermission { .. })));

        let result = PermissionLevel::parse("CAN_READ", ResourceKind::SecretScope);
        assert!(result.is_err());
    }

    #[test]
    fn test_grant_access_control_shape() -> Result<()> {
        let grant = Grant::new(
            PrincipalRef::Group("eng".to_string()),
            PermissionLevel::parse("can_read", ResourceKind::Directory)?,
        );
        assert_eq!(
            grant.to_access_control(),
            json!({"group_name": "eng", "permission_level": "CAN_READ"})
        );
        Ok(())
    }

    #[test]
    fn test_cluster_state_sets() {
        assert!(ClusterState::Restarting.is_transient());
        assert!(ClusterState::Terminated.awaits_start());
        assert!(ClusterState::Pending.keeps_polling());
        assert!(!ClusterState::Running.keeps_polling());
        assert!(!ClusterState::Error.keeps_polling());
    }

    #[test]
    fn test_cluster_state_unknown_fallback() -> Result<()> {
        let state: ClusterState = serde_json::from_value(json!("SOMETHING_NEW"))?;
        assert_eq!(state, ClusterState::Unknown);
        Ok(())
    }

    #[test]
    fn test_cluster_spec_subset() -> Result<()> {
        let live = ClusterInfo::from_value(json!({
            "cluster_id": "0101-abc",
            "cluster_name": "etl",
            "state": "RUNNING",
            "spark_version": "13.3.x-scala2.12",
            "num_workers": 2
        }))?;

        let matching = ClusterSpec::new("etl").with_setting("num_workers", json!(2));
        assert!(matching.is_subset_of(&live));

        let drifted = ClusterSpec::new("etl").with_setting("num_workers", json!(4));
        assert!(!drifted.is_subset_of(&live));

        let extra = ClusterSpec::new("etl").with_setting("autotermination_minutes", json!(30));
        assert!(!extra.is_subset_of(&live));
        Ok(())
    }

    #[test]
    fn test_job_cluster_detection() -> Result<()> {
        let job = ClusterInfo::from_value(json!({
            "cluster_id": "1", "cluster_name": "job-1", "cluster_source": "JOB"
        }))?;
        let ui = ClusterInfo::from_value(json!({
            "cluster_id": "2", "cluster_name": "adhoc", "cluster_source": "UI"
        }))?;
        assert!(job.is_job_cluster());
        assert!(!ui.is_job_cluster());
        Ok(())
    }

    #[test]
    fn test_workspace_object_basename() {
        let object = WorkspaceObject {
            path: "/Projects/etl".to_string(),
            object_type: ObjectType::Directory,
            object_id: 7,
        };
        assert_eq!(object.basename(), "etl");
        assert!(object.is_dir());
    }
}
