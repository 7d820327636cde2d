//! Declarative document schema.
//!
//! Documents are parsed into the `*Decl`/`*Entry` types as written, then
//! converted once into [`DesiredState`]. Member keys, duplicate names and
//! folder paths are checked during that conversion; nothing downstream
//! re-validates the shape. Permission levels are checked per pass by the
//! reconciler, before any remote call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{AclBlock, ClusterSpec, Library, Principal, PrincipalKind};

/// Top-level ACL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclDocument {
    #[serde(rename = "GROUPS")]
    pub groups: Vec<GroupDecl>,
    #[serde(rename = "SECRETS", default)]
    pub secrets: Option<Vec<SecretScopeEntry>>,
    #[serde(rename = "CLUSTERS", default)]
    pub clusters: Option<Vec<ClusterAclEntry>>,
    #[serde(rename = "WORKSPACE")]
    pub workspace: Vec<DirectoryAclEntry>,
}

impl AclDocument {
    /// Parse an already rendered YAML document.
    ///
    /// # Errors
    ///
    /// Returns `YamlParseFailed` when a mandatory section is missing or a
    /// value has the wrong shape.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

/// Declared group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PrincipalKind,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

/// Declared group member, keyed by `user_name` or `application_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Secret scope ACL declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretScopeEntry {
    pub scope: String,
    #[serde(default)]
    pub acl: Vec<AclBlock>,
}

/// Cluster ACL declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAclEntry {
    pub name: String,
    #[serde(default)]
    pub acl: Vec<AclBlock>,
}

/// Workspace directory ACL declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAclEntry {
    pub folder: String,
    #[serde(default)]
    pub acl: Vec<AclBlock>,
}

/// Validated group: members are typed principals of the group's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub kind: PrincipalKind,
    pub members: Vec<Principal>,
}

impl Group {
    pub fn new(name: impl Into<String>, kind: PrincipalKind) -> Self {
        Self {
            name: name.into(),
            kind,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_member(mut self, member: Principal) -> Self {
        self.members.push(member);
        self
    }
}

/// The full declarative snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub groups: Vec<Group>,
    pub secrets: Option<Vec<SecretScopeEntry>>,
    pub clusters: Option<Vec<ClusterAclEntry>>,
    pub workspace: Vec<DirectoryAclEntry>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a parsed document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for members without the key their group type
    /// needs, duplicate group/scope/folder names, or empty names.
    pub fn from_document(document: AclDocument) -> Result<Self> {
        let groups = document
            .groups
            .into_iter()
            .map(validate_group)
            .collect::<Result<Vec<_>>>()?;
        ensure_unique("group", groups.iter().map(|g| g.name.as_str()))?;

        if let Some(secrets) = &document.secrets {
            ensure_unique("secret scope", secrets.iter().map(|s| s.scope.as_str()))?;
        }
        if let Some(clusters) = &document.clusters {
            ensure_unique("cluster", clusters.iter().map(|c| c.name.as_str()))?;
        }

        let workspace = document
            .workspace
            .into_iter()
            .map(|mut entry| {
                entry.folder = normalize_folder(&entry.folder)?;
                Ok(entry)
            })
            .collect::<Result<Vec<_>>>()?;
        ensure_unique("folder", workspace.iter().map(|w| w.folder.as_str()))?;

        Ok(Self {
            groups,
            secrets: document.secrets,
            clusters: document.clusters,
            workspace,
        })
    }

    /// Parse and validate in one step.
    ///
    /// # Errors
    ///
    /// See [`AclDocument::from_yaml_str`] and [`DesiredState::from_document`].
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Self::from_document(AclDocument::from_yaml_str(contents)?)
    }

    #[must_use]
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn with_secret_scope(mut self, entry: SecretScopeEntry) -> Self {
        self.secrets.get_or_insert_with(Vec::new).push(entry);
        self
    }

    #[must_use]
    pub fn with_cluster_acl(mut self, entry: ClusterAclEntry) -> Self {
        self.clusters.get_or_insert_with(Vec::new).push(entry);
        self
    }

    #[must_use]
    pub fn with_directory(mut self, entry: DirectoryAclEntry) -> Self {
        self.workspace.push(entry);
        self
    }
}

fn validate_group(decl: GroupDecl) -> Result<Group> {
    if decl.name.trim().is_empty() {
        return Err(Error::invalid_config("group with empty name"));
    }
    let members = decl
        .members
        .into_iter()
        .map(|member| {
            let id = match decl.kind {
                PrincipalKind::User => member.user_name,
                PrincipalKind::ServicePrincipal => member.application_id,
            };
            let id = id.filter(|id| !id.trim().is_empty()).ok_or_else(|| {
                let key = match decl.kind {
                    PrincipalKind::User => "user_name",
                    PrincipalKind::ServicePrincipal => "application_id",
                };
                Error::invalid_config(format!(
                    "member of {} group '{}' has no {key}",
                    decl.kind, decl.name
                ))
            })?;
            Ok(Principal {
                kind: decl.kind,
                id,
                display_name: member.display_name,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ensure_unique(
        &format!("member of group '{}'", decl.name),
        members.iter().map(|m| m.id.as_str()),
    )?;
    Ok(Group {
        name: decl.name,
        kind: decl.kind,
        members,
    })
}

fn normalize_folder(folder: &str) -> Result<String> {
    let trimmed = folder.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::invalid_config(format!(
            "workspace folder '{folder}' is empty or the root"
        )));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}

fn ensure_unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::invalid_config(format!("duplicate {what} '{name}'")));
        }
    }
    Ok(())
}

/// Cluster document: a sequence of cluster specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterDocument(pub Vec<ClusterSpec>);

impl ClusterDocument {
    /// # Errors
    ///
    /// Returns `YamlParseFailed` when the document is not a sequence of specs
    /// or a spec lacks `cluster_name`, and `InvalidConfig` for duplicates.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: Self = serde_yaml::from_str(contents)?;
        ensure_unique("cluster", document.0.iter().map(|c| c.cluster_name.as_str()))?;
        Ok(document)
    }

    pub fn specs(&self) -> &[ClusterSpec] {
        &self.0
    }
}

/// Library document: a sequence of library specs installed on every cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryDocument(pub Vec<Library>);

impl LibraryDocument {
    /// # Errors
    ///
    /// Returns `YamlParseFailed` when the document is not a sequence.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn libraries(&self) -> &[Library] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACL: &str = r#"
GROUPS:
  - name: eng
    type: user
    members:
      - user_name: ada@example.com
        display_name: Ada
  - name: pipelines
    type: spn
    members:
      - application_id: 7f1c
SECRETS:
  - scope: kv
    acl:
      - permission: READ
        group: [eng]
WORKSPACE:
  - folder: Projects
    acl:
      - permission: CAN_READ
        group: [eng]
"#;

    #[test]
    fn test_parse_full_document() -> Result<()> {
        let desired = DesiredState::from_yaml_str(ACL)?;
        assert_eq!(desired.groups.len(), 2);
        assert_eq!(desired.groups.first().map(|g| g.kind), Some(PrincipalKind::User));
        assert_eq!(
            desired
                .groups
                .get(1)
                .and_then(|g| g.members.first())
                .map(|m| m.id.as_str()),
            Some("7f1c")
        );
        assert!(desired.clusters.is_none());
        assert_eq!(
            desired.workspace.first().map(|w| w.folder.as_str()),
            Some("/Projects")
        );
        Ok(())
    }

    #[test]
    fn test_missing_workspace_section_is_rejected() {
        let result = DesiredState::from_yaml_str("GROUPS: []\n");
        assert!(matches!(result, Err(Error::YamlParseFailed(_))));
    }

    #[test]
    fn test_member_key_must_match_group_type() {
        let yaml = r"
GROUPS:
  - name: pipelines
    type: spn
    members:
      - user_name: ada@example.com
WORKSPACE: []
";
        let result = DesiredState::from_yaml_str(yaml);
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_duplicate_scope_is_rejected() {
        let yaml = r"
GROUPS: []
SECRETS:
  - scope: kv
  - scope: kv
WORKSPACE: []
";
        let result = DesiredState::from_yaml_str(yaml);
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_null_secrets_section_means_absent() -> Result<()> {
        let desired = DesiredState::from_yaml_str("GROUPS: []\nSECRETS:\nWORKSPACE: []\n")?;
        assert!(desired.secrets.is_none());
        Ok(())
    }

    #[test]
    fn test_cluster_document_requires_name() {
        let result = ClusterDocument::from_yaml_str("- num_workers: 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_cluster_document_keeps_settings() -> Result<()> {
        let document = ClusterDocument::from_yaml_str(
            "- cluster_name: etl\n  num_workers: 2\n  spark_version: 13.3.x-scala2.12\n",
        )?;
        let spec = document.specs().first().ok_or_else(|| Error::invalid_config("empty"))?;
        assert_eq!(spec.cluster_name, "etl");
        assert_eq!(spec.settings.get("num_workers"), Some(&serde_json::json!(2)));
        Ok(())
    }

    #[test]
    fn test_library_document_must_be_sequence() {
        assert!(LibraryDocument::from_yaml_str("pypi: requests\n").is_err());
        assert!(LibraryDocument::from_yaml_str("- pypi: {package: requests}\n").is_ok());
    }
}
