//! Whole-object ACL passes for clusters and workspace directories.
//!
//! Both resolve a declared name to an object id and then overwrite the
//! object's ACL with exactly the declared grants.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use warden_core::{
    AclBlock, ClusterAclEntry, ClustersApi, DirectoryAclEntry, Error, Grant, ObjectKind,
    PermissionsApi, Result, WorkspaceApi, WorkspaceObject,
};

use crate::permissions::normalize_acl;
use crate::types::{Pass, PassReport, ReconcileAction};

/// Replaces the ACL of every declared cluster.
pub struct ClusterAclReconciler {
    clusters: Arc<dyn ClustersApi>,
    permissions: Arc<dyn PermissionsApi>,
}

impl ClusterAclReconciler {
    pub fn new(clusters: Arc<dyn ClustersApi>, permissions: Arc<dyn PermissionsApi>) -> Self {
        Self {
            clusters,
            permissions,
        }
    }

    pub async fn reconcile(&self, entries: &[ClusterAclEntry]) -> PassReport {
        let mut report = PassReport::new(Pass::ClusterAcl);
        let normalized = match normalize_entries(entries, ObjectKind::Clusters, |e| {
            (e.name.as_str(), e.acl.as_slice())
        }) {
            Ok(normalized) => normalized,
            Err(e) => return report.abort(&e),
        };

        for (name, grants) in normalized {
            let cluster = match self.clusters.find_cluster_by_name(name).await {
                Ok(Some(cluster)) => cluster,
                Ok(None) => {
                    report.skip(name, &Error::resolution_failed("cluster", name));
                    continue;
                }
                Err(e) => {
                    report.skip(name, &e);
                    continue;
                }
            };
            info!(cluster = name, cluster_id = %cluster.cluster_id, grants = grants.len(), "Replacing cluster ACL");
            report.record(
                ReconcileAction::ReplacePermissions {
                    kind: ObjectKind::Clusters,
                    name: name.to_string(),
                    object_id: cluster.cluster_id.clone(),
                },
                self.permissions
                    .replace_permissions(ObjectKind::Clusters, &cluster.cluster_id, &grants)
                    .await,
            );
        }
        report
    }
}

/// Removes unmanaged top-level workspace objects and replaces the ACL of every
/// declared folder, creating it first when missing.
pub struct DirectoryAclReconciler {
    workspace: Arc<dyn WorkspaceApi>,
    permissions: Arc<dyn PermissionsApi>,
    ignored_folders: Vec<String>,
}

impl DirectoryAclReconciler {
    pub fn new(
        workspace: Arc<dyn WorkspaceApi>,
        permissions: Arc<dyn PermissionsApi>,
        ignored_folders: Vec<String>,
    ) -> Self {
        Self {
            workspace,
            permissions,
            ignored_folders,
        }
    }

    pub async fn reconcile(&self, entries: &[DirectoryAclEntry]) -> PassReport {
        let mut report = PassReport::new(Pass::Workspace);
        let normalized = match normalize_entries(entries, ObjectKind::Directories, |e| {
            (e.folder.as_str(), e.acl.as_slice())
        }) {
            Ok(normalized) => normalized,
            Err(e) => return report.abort(&e),
        };

        let top_level = match self.workspace.list_objects("/").await {
            Ok(objects) => objects,
            Err(e) => return report.abort(&e),
        };
        self.remove_unmanaged(&top_level, entries, &mut report).await;

        for (folder, grants) in normalized {
            let Some(directory) = self.ensure_directory(folder, &mut report).await else {
                continue;
            };
            info!(folder, object_id = directory.object_id, grants = grants.len(), "Replacing folder ACL");
            report.record(
                ReconcileAction::ReplacePermissions {
                    kind: ObjectKind::Directories,
                    name: folder.to_string(),
                    object_id: directory.object_id.to_string(),
                },
                self.permissions
                    .replace_permissions(
                        ObjectKind::Directories,
                        &directory.object_id.to_string(),
                        &grants,
                    )
                    .await,
            );
        }
        report
    }

    async fn remove_unmanaged(
        &self,
        top_level: &[WorkspaceObject],
        entries: &[DirectoryAclEntry],
        report: &mut PassReport,
    ) {
        let managed: HashSet<&str> = entries
            .iter()
            .filter_map(|e| e.folder.trim_start_matches('/').split('/').next())
            .collect();

        let unmanaged: Vec<&WorkspaceObject> = top_level
            .iter()
            .filter(|object| {
                let name = object.basename();
                !managed.contains(name) && !self.ignored_folders.iter().any(|i| i == name)
            })
            .collect();
        if unmanaged.is_empty() {
            return;
        }

        warn!(
            paths = ?unmanaged.iter().map(|o| o.path.as_str()).collect::<Vec<_>>(),
            "Deleting unmanaged workspace objects"
        );
        for object in unmanaged {
            report.record(
                ReconcileAction::DeleteWorkspaceObject {
                    path: object.path.clone(),
                },
                self.workspace.delete(&object.path, true).await,
            );
        }
    }

    async fn ensure_directory(
        &self,
        folder: &str,
        report: &mut PassReport,
    ) -> Option<WorkspaceObject> {
        let status = match self.workspace.get_status(folder).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                info!(folder, "Folder missing, creating it");
                report.record(
                    ReconcileAction::CreateDirectory {
                        path: folder.to_string(),
                    },
                    self.workspace.mkdirs(folder).await,
                )?;
                match self.workspace.get_status(folder).await {
                    Ok(Some(status)) => status,
                    Ok(None) => {
                        report.skip(folder, &Error::resolution_failed("folder", folder));
                        return None;
                    }
                    Err(e) => {
                        report.skip(folder, &e);
                        return None;
                    }
                }
            }
            Err(e) => {
                report.skip(folder, &e);
                return None;
            }
        };

        if status.is_dir() {
            Some(status)
        } else {
            report.skip(folder, &Error::not_a_directory(folder));
            None
        }
    }
}

/// Validate every entry up front so a bad level aborts before any call.
fn normalize_entries<'a, T>(
    entries: &'a [T],
    kind: ObjectKind,
    parts: impl Fn(&'a T) -> (&'a str, &'a [AclBlock]),
) -> Result<Vec<(&'a str, Vec<Grant>)>> {
    entries
        .iter()
        .map(|entry| {
            let (name, acl) = parts(entry);
            normalize_acl(acl, kind.resource_kind()).map(|grants| (name, grants))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ClusterSpec, ClusterState, InMemoryPlatform, MutationCall, ObjectType};

    fn folder(path: &str, acl: Vec<AclBlock>) -> DirectoryAclEntry {
        DirectoryAclEntry {
            folder: path.to_string(),
            acl,
        }
    }

    fn workspace(platform: &Arc<InMemoryPlatform>) -> DirectoryAclReconciler {
        DirectoryAclReconciler::new(
            platform.clone(),
            platform.clone(),
            vec!["Shared".to_string(), "Users".to_string()],
        )
    }

    #[tokio::test]
    async fn test_cluster_acl_replaced() -> Result<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        let id = platform.seed_cluster(&ClusterSpec::new("etl"), ClusterState::Running, "UI");

        let entries = vec![ClusterAclEntry {
            name: "etl".to_string(),
            acl: vec![AclBlock::for_groups("can_restart", ["eng"])],
        }];
        let report = ClusterAclReconciler::new(platform.clone(), platform.clone())
            .reconcile(&entries)
            .await;

        assert!(!report.has_failures());
        let grants = platform
            .object_permissions(ObjectKind::Clusters, &id)
            .unwrap_or_default();
        assert_eq!(grants.len(), 1);
        assert_eq!(
            grants.first().map(|g| g.level.as_str()),
            Some("CAN_RESTART")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_skipped() {
        let platform = Arc::new(InMemoryPlatform::new());
        let id = platform.seed_cluster(&ClusterSpec::new("etl"), ClusterState::Running, "UI");

        let entries = vec![
            ClusterAclEntry {
                name: "missing".to_string(),
                acl: vec![AclBlock::for_groups("CAN_MANAGE", ["eng"])],
            },
            ClusterAclEntry {
                name: "etl".to_string(),
                acl: vec![AclBlock::for_groups("CAN_MANAGE", ["eng"])],
            },
        ];
        let report = ClusterAclReconciler::new(platform.clone(), platform.clone())
            .reconcile(&entries)
            .await;

        assert_eq!(report.skipped.len(), 1);
        assert!(platform.object_permissions(ObjectKind::Clusters, &id).is_some());
    }

    #[tokio::test]
    async fn test_missing_folder_is_created() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_object("/Users", ObjectType::Directory);

        let entries = vec![folder(
            "/Projects",
            vec![AclBlock::for_groups("CAN_READ", ["eng"])],
        )];
        let report = workspace(&platform).reconcile(&entries).await;

        assert!(!report.has_failures());
        let created = platform.workspace_object("/Projects");
        assert!(created.as_ref().is_some_and(WorkspaceObject::is_dir));
        let object_id = created.map(|o| o.object_id.to_string()).unwrap_or_default();
        assert!(
            platform
                .object_permissions(ObjectKind::Directories, &object_id)
                .is_some()
        );
        assert!(platform.workspace_object("/Users").is_some());
    }

    #[tokio::test]
    async fn test_unmanaged_top_level_objects_deleted() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_object("/Shared", ObjectType::Directory);
        platform.seed_object("/Users", ObjectType::Directory);
        platform.seed_object("/Projects", ObjectType::Directory);
        platform.seed_object("/Projects/etl", ObjectType::Directory);
        platform.seed_object("/Scratch", ObjectType::Directory);
        platform.seed_object("/Scratch/notes", ObjectType::Notebook);
        platform.seed_object("/loose", ObjectType::Notebook);

        let entries = vec![folder(
            "/Projects/etl",
            vec![AclBlock::for_groups("CAN_EDIT", ["eng"])],
        )];
        let report = workspace(&platform).reconcile(&entries).await;

        assert!(!report.has_failures());
        assert_eq!(
            platform.workspace_paths(),
            vec![
                "/Projects".to_string(),
                "/Projects/etl".to_string(),
                "/Shared".to_string(),
                "/Users".to_string()
            ]
        );
        assert_eq!(
            platform.count_calls(|c| matches!(c, MutationCall::DeleteObject { recursive: true, .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_non_directory_folder_is_skipped() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_object("/Projects", ObjectType::Notebook);

        let entries = vec![folder(
            "/Projects",
            vec![AclBlock::for_groups("CAN_READ", ["eng"])],
        )];
        let report = workspace(&platform).reconcile(&entries).await;

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            platform.count_calls(|c| matches!(c, MutationCall::ReplacePermissions { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_invalid_directory_level_aborts() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_object("/Scratch", ObjectType::Directory);

        let entries = vec![folder(
            "/Projects",
            vec![AclBlock::for_groups("CAN_RESTART", ["eng"])],
        )];
        let report = workspace(&platform).reconcile(&entries).await;

        assert!(report.is_aborted());
        assert!(platform.calls().is_empty());
        assert!(platform.workspace_object("/Scratch").is_some());
    }
}
