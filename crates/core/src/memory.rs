//! In-memory platform.
//!
//! Implements every capability trait over plain maps and records each
//! mutation call in order, so tests can assert exactly which writes a
//! reconciliation issued. Failures can be injected per target name, and
//! cluster state sequences can be scripted per cluster id.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::api::{
    ClustersApi, GrantStore, GroupsApi, LibrariesApi, PermissionsApi, ScimApi, WorkspaceApi,
};
use crate::error::{Error, Result};
use crate::model::{
    AclItem, ClusterInfo, ClusterSpec, ClusterState, CreateOutcome, Grant, Library, ObjectKind,
    ObjectType, WorkspaceObject,
};

/// A write issued against the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCall {
    CreateGroup { name: String },
    DeleteGroup { name: String },
    AddMember { group: String, user_name: String },
    RemoveMember { group: String, user_name: String },
    AddUser { user_name: String, groups: Vec<String> },
    UpdateUser { user_name: String, display_name: String },
    DeleteUser { user_name: String },
    AddServicePrincipal { application_id: String, groups: Vec<String> },
    UpdateServicePrincipalGroups { application_id: String, groups: Vec<String> },
    RemoveServicePrincipalFromGroups { application_id: String, groups: Vec<String> },
    DeleteServicePrincipal { application_id: String },
    PutAcl { scope: String, principal: String, permission: String },
    DeleteAcl { scope: String, principal: String },
    UpdatePermissions { kind: ObjectKind, object_id: String, grants: Vec<Grant> },
    ReplacePermissions { kind: ObjectKind, object_id: String, grants: Vec<Grant> },
    CreateCluster { cluster_name: String },
    EditCluster { cluster_id: String },
    StartCluster { cluster_id: String },
    PermanentDeleteCluster { cluster_id: String },
    InstallLibraries { cluster_id: String, libraries: Vec<Library> },
    UninstallLibraries { cluster_id: String, libraries: Vec<Library> },
    Mkdirs { path: String },
    DeleteObject { path: String, recursive: bool },
}

impl MutationCall {
    /// Names this call touches; used for failure injection.
    fn targets(&self) -> Vec<&str> {
        match self {
            Self::CreateGroup { name } | Self::DeleteGroup { name } => vec![name],
            Self::AddMember { group, user_name } | Self::RemoveMember { group, user_name } => {
                vec![group, user_name]
            }
            Self::AddUser { user_name, .. }
            | Self::UpdateUser { user_name, .. }
            | Self::DeleteUser { user_name } => vec![user_name],
            Self::AddServicePrincipal { application_id, .. }
            | Self::UpdateServicePrincipalGroups { application_id, .. }
            | Self::RemoveServicePrincipalFromGroups { application_id, .. }
            | Self::DeleteServicePrincipal { application_id } => vec![application_id],
            Self::PutAcl {
                scope, principal, ..
            }
            | Self::DeleteAcl { scope, principal } => vec![scope, principal],
            Self::UpdatePermissions { object_id, .. }
            | Self::ReplacePermissions { object_id, .. } => vec![object_id],
            Self::CreateCluster { cluster_name } => vec![cluster_name],
            Self::EditCluster { cluster_id }
            | Self::StartCluster { cluster_id }
            | Self::PermanentDeleteCluster { cluster_id }
            | Self::InstallLibraries { cluster_id, .. }
            | Self::UninstallLibraries { cluster_id, .. } => vec![cluster_id],
            Self::Mkdirs { path } | Self::DeleteObject { path, .. } => vec![path],
        }
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    groups: BTreeMap<String, BTreeSet<String>>,
    users: BTreeMap<String, Option<String>>,
    service_principals: BTreeMap<String, Option<String>>,
    scopes: BTreeMap<String, BTreeMap<String, String>>,
    permissions: HashMap<(ObjectKind, String), Vec<Grant>>,
    clusters: BTreeMap<String, ClusterInfo>,
    cluster_scripts: HashMap<String, VecDeque<ClusterState>>,
    libraries: HashMap<String, Vec<Library>>,
    workspace: BTreeMap<String, WorkspaceObject>,
    failing_targets: HashSet<String>,
    calls: Vec<MutationCall>,
    cluster_polls: usize,
    next_id: i64,
}

impl PlatformState {
    fn record(&mut self, call: MutationCall) -> Result<()> {
        let failing = call
            .targets()
            .iter()
            .any(|target| self.failing_targets.contains(*target));
        self.calls.push(call);
        if failing {
            return Err(Error::remote_call(
                "POST",
                "memory://injected",
                500,
                json!({"message": "injected failure"}),
            ));
        }
        Ok(())
    }

    fn next_id(&mut self) -> i64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut BTreeSet<String>> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| not_found(&format!("group {name}")))
    }

    fn ensure_groups(&self, groups: &[String]) -> Result<()> {
        groups
            .iter()
            .find(|g| !self.groups.contains_key(*g))
            .map_or(Ok(()), |missing| Err(not_found(&format!("group {missing}"))))
    }

    fn cluster_mut(&mut self, cluster_id: &str) -> Result<&mut ClusterInfo> {
        self.clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(&format!("cluster {cluster_id}")))
    }
}

fn not_found(what: &str) -> Error {
    Error::remote_call(
        "GET",
        "memory://lookup",
        404,
        json!({"error_code": "RESOURCE_DOES_NOT_EXIST", "message": format!("{what} does not exist")}),
    )
}

fn set_cluster_state(info: &mut ClusterInfo, state: ClusterState) {
    info.state = state;
    info.attributes
        .insert("state".to_string(), Value::String(state.to_string()));
}

/// State a cluster drifts to on the next poll when no script is set.
const fn natural_successor(state: ClusterState) -> ClusterState {
    match state {
        ClusterState::Pending
        | ClusterState::Restarting
        | ClusterState::Resizing
        | ClusterState::Running => ClusterState::Running,
        ClusterState::Terminating | ClusterState::Terminated => ClusterState::Terminated,
        ClusterState::Error => ClusterState::Error,
        ClusterState::Unknown => ClusterState::Unknown,
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => path.get(..idx).unwrap_or("/"),
    }
}

/// In-memory implementation of every platform capability.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- seeding -----------------------------------------------------------

    /// Seed a group with direct members.
    pub fn seed_group(&self, name: &str, members: &[&str]) {
        self.lock().groups.insert(
            name.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
    }

    pub fn seed_user(&self, user_name: &str, display_name: Option<&str>) {
        self.lock()
            .users
            .insert(user_name.to_string(), display_name.map(str::to_string));
    }

    pub fn seed_service_principal(&self, application_id: &str) {
        self.lock()
            .service_principals
            .insert(application_id.to_string(), None);
    }

    /// Seed a secret scope with `(principal, permission)` grants.
    pub fn seed_scope(&self, scope: &str, grants: &[(&str, &str)]) {
        self.lock().scopes.insert(
            scope.to_string(),
            grants
                .iter()
                .map(|(p, l)| ((*p).to_string(), (*l).to_string()))
                .collect(),
        );
    }

    /// Seed a cluster and return its id.
    pub fn seed_cluster(&self, spec: &ClusterSpec, state: ClusterState, source: &str) -> String {
        let mut inner = self.lock();
        let cluster_id = format!("cluster-{}", inner.next_id());
        let mut attributes = spec.to_body();
        attributes.insert("cluster_id".to_string(), Value::String(cluster_id.clone()));
        attributes.insert("cluster_source".to_string(), Value::String(source.to_string()));
        attributes.insert("state".to_string(), Value::String(state.to_string()));
        inner.clusters.insert(
            cluster_id.clone(),
            ClusterInfo {
                cluster_id: cluster_id.clone(),
                cluster_name: spec.cluster_name.clone(),
                state,
                cluster_source: Some(source.to_string()),
                attributes,
            },
        );
        cluster_id
    }

    /// States returned by successive polls of `cluster_id`. Once drained the
    /// cluster follows its natural progression.
    pub fn script_cluster_states(&self, cluster_id: &str, states: &[ClusterState]) {
        self.lock()
            .cluster_scripts
            .insert(cluster_id.to_string(), states.iter().copied().collect());
    }

    pub fn seed_libraries(&self, cluster_id: &str, libraries: Vec<Library>) {
        self.lock()
            .libraries
            .insert(cluster_id.to_string(), libraries);
    }

    /// Seed a workspace object and return its object id.
    pub fn seed_object(&self, path: &str, object_type: ObjectType) -> i64 {
        let mut inner = self.lock();
        let object_id = inner.next_id();
        inner.workspace.insert(
            path.to_string(),
            WorkspaceObject {
                path: path.to_string(),
                object_type,
                object_id,
            },
        );
        object_id
    }

    /// Every mutation touching `target` (a group, user, scope, cluster id or
    /// path) fails with a 500 after being recorded.
    pub fn fail_on(&self, target: &str) {
        self.lock().failing_targets.insert(target.to_string());
    }

    // --- inspection --------------------------------------------------------

    /// Mutation calls in issue order.
    pub fn calls(&self) -> Vec<MutationCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&MutationCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|&c| predicate(c)).count()
    }

    /// Number of `get_cluster` polls served.
    pub fn cluster_polls(&self) -> usize {
        self.lock().cluster_polls
    }

    pub fn group_names(&self) -> Vec<String> {
        self.lock().groups.keys().cloned().collect()
    }

    pub fn group_members(&self, group: &str) -> Option<Vec<String>> {
        self.lock()
            .groups
            .get(group)
            .map(|m| m.iter().cloned().collect())
    }

    pub fn user_display_name(&self, user_name: &str) -> Option<Option<String>> {
        self.lock().users.get(user_name).cloned()
    }

    pub fn has_user(&self, user_name: &str) -> bool {
        self.lock().users.contains_key(user_name)
    }

    pub fn has_service_principal(&self, application_id: &str) -> bool {
        self.lock().service_principals.contains_key(application_id)
    }

    /// `(principal, permission)` pairs on a scope, sorted by principal.
    pub fn scope_grants(&self, scope: &str) -> Vec<(String, String)> {
        self.lock()
            .scopes
            .get(scope)
            .map(|g| g.iter().map(|(p, l)| (p.clone(), l.clone())).collect())
            .unwrap_or_default()
    }

    pub fn object_permissions(&self, kind: ObjectKind, object_id: &str) -> Option<Vec<Grant>> {
        self.lock()
            .permissions
            .get(&(kind, object_id.to_string()))
            .cloned()
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<ClusterInfo> {
        self.lock().clusters.get(cluster_id).cloned()
    }

    pub fn cluster_by_name(&self, name: &str) -> Option<ClusterInfo> {
        self.lock()
            .clusters
            .values()
            .find(|c| c.cluster_name == name)
            .cloned()
    }

    pub fn installed_libraries(&self, cluster_id: &str) -> Vec<Library> {
        self.lock()
            .libraries
            .get(cluster_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn workspace_object(&self, path: &str) -> Option<WorkspaceObject> {
        self.lock().workspace.get(path).cloned()
    }

    pub fn workspace_paths(&self) -> Vec<String> {
        self.lock().workspace.keys().cloned().collect()
    }
}

#[async_trait]
impl GroupsApi for InMemoryPlatform {
    async fn list_groups(&self) -> Result<Vec<String>> {
        Ok(self.group_names())
    }

    async fn create_group(&self, name: &str) -> Result<CreateOutcome> {
        let mut inner = self.lock();
        inner.record(MutationCall::CreateGroup {
            name: name.to_string(),
        })?;
        if inner.groups.contains_key(name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        inner.groups.insert(name.to_string(), BTreeSet::new());
        Ok(CreateOutcome::Created)
    }

    async fn delete_group(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::DeleteGroup {
            name: name.to_string(),
        })?;
        inner
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(&format!("group {name}")))
    }

    async fn list_members(&self, group: &str) -> Result<Vec<String>> {
        self.group_members(group)
            .ok_or_else(|| not_found(&format!("group {group}")))
    }

    async fn add_member(&self, group: &str, user_name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::AddMember {
            group: group.to_string(),
            user_name: user_name.to_string(),
        })?;
        if !inner.users.contains_key(user_name) && !inner.service_principals.contains_key(user_name)
        {
            return Err(not_found(&format!("principal {user_name}")));
        }
        inner.group_mut(group)?.insert(user_name.to_string());
        Ok(())
    }

    async fn remove_member(&self, group: &str, user_name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::RemoveMember {
            group: group.to_string(),
            user_name: user_name.to_string(),
        })?;
        inner.group_mut(group)?.remove(user_name);
        Ok(())
    }
}

#[async_trait]
impl ScimApi for InMemoryPlatform {
    async fn add_user(
        &self,
        user_name: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome> {
        let mut inner = self.lock();
        inner.record(MutationCall::AddUser {
            user_name: user_name.to_string(),
            groups: groups.to_vec(),
        })?;
        if inner.users.contains_key(user_name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        inner.ensure_groups(groups)?;
        inner
            .users
            .insert(user_name.to_string(), display_name.map(str::to_string));
        for group in groups {
            inner.group_mut(group)?.insert(user_name.to_string());
        }
        Ok(CreateOutcome::Created)
    }

    async fn update_user(&self, user_name: &str, display_name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::UpdateUser {
            user_name: user_name.to_string(),
            display_name: display_name.to_string(),
        })?;
        let entry = inner
            .users
            .get_mut(user_name)
            .ok_or_else(|| not_found(&format!("user {user_name}")))?;
        *entry = Some(display_name.to_string());
        Ok(())
    }

    async fn delete_user(&self, user_name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::DeleteUser {
            user_name: user_name.to_string(),
        })?;
        inner
            .users
            .remove(user_name)
            .ok_or_else(|| not_found(&format!("user {user_name}")))?;
        for members in inner.groups.values_mut() {
            members.remove(user_name);
        }
        Ok(())
    }

    async fn find_users(&self, fragment: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .users
            .keys()
            .filter(|name| name.contains(fragment))
            .cloned()
            .collect())
    }

    async fn add_service_principal(
        &self,
        application_id: &str,
        display_name: Option<&str>,
        groups: &[String],
    ) -> Result<CreateOutcome> {
        let mut inner = self.lock();
        inner.record(MutationCall::AddServicePrincipal {
            application_id: application_id.to_string(),
            groups: groups.to_vec(),
        })?;
        if inner.service_principals.contains_key(application_id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        inner.ensure_groups(groups)?;
        inner.service_principals.insert(
            application_id.to_string(),
            display_name.map(str::to_string),
        );
        for group in groups {
            inner.group_mut(group)?.insert(application_id.to_string());
        }
        Ok(CreateOutcome::Created)
    }

    async fn update_service_principal_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::UpdateServicePrincipalGroups {
            application_id: application_id.to_string(),
            groups: groups.to_vec(),
        })?;
        if !inner.service_principals.contains_key(application_id) {
            return Err(not_found(&format!("service principal {application_id}")));
        }
        inner.ensure_groups(groups)?;
        for group in groups {
            inner.group_mut(group)?.insert(application_id.to_string());
        }
        Ok(())
    }

    async fn remove_service_principal_from_groups(
        &self,
        application_id: &str,
        groups: &[String],
    ) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::RemoveServicePrincipalFromGroups {
            application_id: application_id.to_string(),
            groups: groups.to_vec(),
        })?;
        for group in groups {
            inner.group_mut(group)?.remove(application_id);
        }
        Ok(())
    }

    async fn delete_service_principal(&self, application_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::DeleteServicePrincipal {
            application_id: application_id.to_string(),
        })?;
        inner
            .service_principals
            .remove(application_id)
            .ok_or_else(|| not_found(&format!("service principal {application_id}")))?;
        for members in inner.groups.values_mut() {
            members.remove(application_id);
        }
        Ok(())
    }

    async fn list_service_principals(&self) -> Result<Vec<String>> {
        Ok(self.lock().service_principals.keys().cloned().collect())
    }
}

#[async_trait]
impl GrantStore for InMemoryPlatform {
    async fn list_scopes(&self) -> Result<Vec<String>> {
        Ok(self.lock().scopes.keys().cloned().collect())
    }

    async fn list_grants(&self, scope: &str) -> Result<Vec<AclItem>> {
        self.lock()
            .scopes
            .get(scope)
            .map(|grants| {
                grants
                    .iter()
                    .map(|(principal, permission)| AclItem {
                        principal: principal.clone(),
                        permission: permission.clone(),
                    })
                    .collect()
            })
            .ok_or_else(|| not_found(&format!("scope {scope}")))
    }

    async fn apply_grant(&self, scope: &str, principal: &str, permission: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::PutAcl {
            scope: scope.to_string(),
            principal: principal.to_string(),
            permission: permission.to_string(),
        })?;
        inner
            .scopes
            .get_mut(scope)
            .ok_or_else(|| not_found(&format!("scope {scope}")))?
            .insert(principal.to_string(), permission.to_string());
        Ok(())
    }

    async fn remove_grant(&self, scope: &str, principal: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::DeleteAcl {
            scope: scope.to_string(),
            principal: principal.to_string(),
        })?;
        inner
            .scopes
            .get_mut(scope)
            .ok_or_else(|| not_found(&format!("scope {scope}")))?
            .remove(principal);
        Ok(())
    }
}

#[async_trait]
impl PermissionsApi for InMemoryPlatform {
    async fn get_permissions(&self, kind: ObjectKind, object_id: &str) -> Result<Value> {
        let grants = self.object_permissions(kind, object_id).unwrap_or_default();
        Ok(json!({
            "object_id": object_id,
            "access_control_list": grants.iter().map(Grant::to_access_control).collect::<Vec<_>>(),
        }))
    }

    async fn get_permission_levels(&self, kind: ObjectKind, _object_id: &str) -> Result<Value> {
        let levels = kind
            .resource_kind()
            .allowed_permissions()
            .iter()
            .map(|level| json!({"permission_level": level}))
            .collect::<Vec<_>>();
        Ok(json!({ "permission_levels": levels }))
    }

    async fn update_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value> {
        {
            let mut inner = self.lock();
            inner.record(MutationCall::UpdatePermissions {
                kind,
                object_id: object_id.to_string(),
                grants: grants.to_vec(),
            })?;
            let current = inner
                .permissions
                .entry((kind, object_id.to_string()))
                .or_default();
            for grant in grants {
                current.retain(|g| g.principal != grant.principal);
                current.push(grant.clone());
            }
        }
        self.get_permissions(kind, object_id).await
    }

    async fn replace_permissions(
        &self,
        kind: ObjectKind,
        object_id: &str,
        grants: &[Grant],
    ) -> Result<Value> {
        {
            let mut inner = self.lock();
            inner.record(MutationCall::ReplacePermissions {
                kind,
                object_id: object_id.to_string(),
                grants: grants.to_vec(),
            })?;
            inner
                .permissions
                .insert((kind, object_id.to_string()), grants.to_vec());
        }
        self.get_permissions(kind, object_id).await
    }
}

#[async_trait]
impl ClustersApi for InMemoryPlatform {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        Ok(self.lock().clusters.values().cloned().collect())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterInfo> {
        let mut inner = self.lock();
        inner.cluster_polls = inner.cluster_polls.saturating_add(1);
        let scripted = inner
            .cluster_scripts
            .get_mut(cluster_id)
            .and_then(VecDeque::pop_front);
        let info = inner.cluster_mut(cluster_id)?;
        let next = scripted.unwrap_or_else(|| natural_successor(info.state));
        set_cluster_state(info, next);
        Ok(info.clone())
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<String> {
        {
            let mut inner = self.lock();
            inner.record(MutationCall::CreateCluster {
                cluster_name: spec.cluster_name.clone(),
            })?;
        }
        Ok(self.seed_cluster(spec, ClusterState::Pending, "API"))
    }

    async fn edit_cluster(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::EditCluster {
            cluster_id: cluster_id.to_string(),
        })?;
        let info = inner.cluster_mut(cluster_id)?;
        for (key, value) in spec.to_body() {
            info.attributes.insert(key, value);
        }
        if info.state == ClusterState::Running {
            set_cluster_state(info, ClusterState::Restarting);
        }
        Ok(())
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::StartCluster {
            cluster_id: cluster_id.to_string(),
        })?;
        let info = inner.cluster_mut(cluster_id)?;
        if info.state == ClusterState::Terminated {
            set_cluster_state(info, ClusterState::Pending);
        }
        Ok(())
    }

    async fn permanent_delete_cluster(&self, cluster_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::PermanentDeleteCluster {
            cluster_id: cluster_id.to_string(),
        })?;
        inner
            .clusters
            .remove(cluster_id)
            .map(|_| ())
            .ok_or_else(|| not_found(&format!("cluster {cluster_id}")))
    }
}

#[async_trait]
impl LibrariesApi for InMemoryPlatform {
    async fn cluster_libraries(&self, cluster_id: &str) -> Result<Vec<Library>> {
        Ok(self.installed_libraries(cluster_id))
    }

    async fn install_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::InstallLibraries {
            cluster_id: cluster_id.to_string(),
            libraries: libraries.to_vec(),
        })?;
        let installed = inner.libraries.entry(cluster_id.to_string()).or_default();
        for library in libraries {
            if !installed.contains(library) {
                installed.push(library.clone());
            }
        }
        Ok(())
    }

    async fn uninstall_libraries(&self, cluster_id: &str, libraries: &[Library]) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::UninstallLibraries {
            cluster_id: cluster_id.to_string(),
            libraries: libraries.to_vec(),
        })?;
        if let Some(installed) = inner.libraries.get_mut(cluster_id) {
            installed.retain(|library| !libraries.contains(library));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceApi for InMemoryPlatform {
    async fn list_objects(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        Ok(self
            .lock()
            .workspace
            .values()
            .filter(|object| object.path != path && parent_of(&object.path) == path)
            .cloned()
            .collect())
    }

    async fn get_status(&self, path: &str) -> Result<Option<WorkspaceObject>> {
        Ok(self.workspace_object(path))
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::Mkdirs {
            path: path.to_string(),
        })?;
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            match inner.workspace.get(&prefix) {
                Some(existing) if !existing.is_dir() => {
                    return Err(Error::remote_call(
                        "POST",
                        "memory://workspace/mkdirs",
                        400,
                        json!({"error_code": "RESOURCE_ALREADY_EXISTS", "message": format!("{prefix} is not a directory")}),
                    ));
                }
                Some(_) => {}
                None => {
                    let object_id = inner.next_id();
                    inner.workspace.insert(
                        prefix.clone(),
                        WorkspaceObject {
                            path: prefix.clone(),
                            object_type: ObjectType::Directory,
                            object_id,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.record(MutationCall::DeleteObject {
            path: path.to_string(),
            recursive,
        })?;
        if !inner.workspace.contains_key(path) {
            return Err(not_found(&format!("path {path}")));
        }
        let nested = format!("{path}/");
        let has_children = inner.workspace.keys().any(|p| p.starts_with(&nested));
        if has_children && !recursive {
            return Err(Error::remote_call(
                "POST",
                "memory://workspace/delete",
                400,
                json!({"error_code": "DIRECTORY_NOT_EMPTY"}),
            ));
        }
        inner
            .workspace
            .retain(|p, _| p != path && !p.starts_with(&nested));
        Ok(())
    }
}
