//! Group and membership reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use warden_core::{
    CreateOutcome, Group, GroupsApi, Principal, PrincipalKind, ResultExt, ScimApi,
};

use crate::reconciler::ReconcilerConfig;
use crate::types::{Pass, PassReport, ReconcileAction};

/// Converges workspace groups and their direct members.
pub struct GroupReconciler {
    groups: Arc<dyn GroupsApi>,
    scim: Arc<dyn ScimApi>,
    config: ReconcilerConfig,
}

impl GroupReconciler {
    pub fn new(
        groups: Arc<dyn GroupsApi>,
        scim: Arc<dyn ScimApi>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            groups,
            scim,
            config,
        }
    }

    /// Create missing groups and members; report or remove the rest.
    pub async fn reconcile(&self, desired: &[Group]) -> PassReport {
        let mut report = PassReport::new(Pass::Groups);
        if self.config.remove_unmanaged {
            warn!("Removal of unmanaged groups and members is enabled");
        }

        let live = match self.groups.list_groups().await {
            Ok(live) => live,
            Err(e) => return report.abort(&e),
        };
        let live: HashSet<&str> = live.iter().map(String::as_str).collect();
        let declared: HashSet<&str> = desired.iter().map(|g| g.name.as_str()).collect();

        let mut unmanaged: Vec<&str> = live
            .iter()
            .copied()
            .filter(|name| !declared.contains(name) && !self.config.is_reserved_group(name))
            .collect();
        unmanaged.sort_unstable();

        if unmanaged.is_empty() {
            info!(groups = ?unmanaged, "Unmanaged groups");
        } else {
            warn!(groups = ?unmanaged, "Unmanaged groups");
            if self.config.remove_unmanaged {
                for name in unmanaged {
                    report.record(
                        ReconcileAction::DeleteGroup {
                            group: name.to_string(),
                        },
                        self.groups.delete_group(name).await,
                    );
                }
            }
        }

        for group in desired {
            self.reconcile_group(group, live.contains(group.name.as_str()), &mut report)
                .await;
        }

        report
    }

    async fn reconcile_group(&self, group: &Group, exists: bool, report: &mut PassReport) {
        info!(group = %group.name, kind = %group.kind, members = group.members.len(), "Reconciling group");

        if !exists {
            let action = ReconcileAction::CreateGroup {
                group: group.name.clone(),
            };
            match self.groups.create_group(&group.name).await {
                Ok(CreateOutcome::Created) => report.taken(action),
                Ok(CreateOutcome::AlreadyExists) => {
                    info!(group = %group.name, "Group already exists");
                }
                Err(e) => report.failed(action, &e),
            }
        }

        let current = self
            .groups
            .list_members(&group.name)
            .await
            .or_default_logged(Vec::new(), "Failed to list group members");
        let current: HashSet<&str> = current.iter().map(String::as_str).collect();
        let declared: HashSet<&str> = group.members.iter().map(|m| m.id.as_str()).collect();

        let mut unmanaged: Vec<&str> = current
            .iter()
            .copied()
            .filter(|id| !declared.contains(id))
            .collect();
        unmanaged.sort_unstable();

        if unmanaged.is_empty() {
            info!(group = %group.name, members = ?unmanaged, "Unmanaged group members");
        } else {
            warn!(group = %group.name, members = ?unmanaged, "Unmanaged group members");
            if self.config.remove_unmanaged {
                for id in unmanaged {
                    self.remove_member(group, id, report).await;
                }
            }
        }

        for member in group
            .members
            .iter()
            .filter(|m| !current.contains(m.id.as_str()))
        {
            match member.kind {
                PrincipalKind::User => self.upsert_user(&group.name, member, report).await,
                PrincipalKind::ServicePrincipal => {
                    self.upsert_service_principal(&group.name, member, report)
                        .await;
                }
            }
        }
    }

    async fn remove_member(&self, group: &Group, id: &str, report: &mut PassReport) {
        match group.kind {
            PrincipalKind::User => {
                report.record(
                    ReconcileAction::RemoveMember {
                        group: group.name.clone(),
                        user_name: id.to_string(),
                    },
                    self.groups.remove_member(&group.name, id).await,
                );
            }
            PrincipalKind::ServicePrincipal => {
                report.record(
                    ReconcileAction::RemoveServicePrincipal {
                        group: group.name.clone(),
                        application_id: id.to_string(),
                    },
                    self.scim
                        .remove_service_principal_from_groups(id, &[group.name.clone()])
                        .await,
                );
            }
        }
    }

    async fn upsert_user(&self, group: &str, member: &Principal, report: &mut PassReport) {
        let groups = [group.to_string()];
        let action = ReconcileAction::AddUser {
            group: group.to_string(),
            user_name: member.id.clone(),
        };
        match self
            .scim
            .add_user(&member.id, member.display_name.as_deref(), &groups)
            .await
        {
            Ok(CreateOutcome::Created) => report.taken(action),
            Ok(CreateOutcome::AlreadyExists) => {
                debug!(user = %member.id, group, "User exists, attaching to group");
                if let Some(display_name) = &member.display_name {
                    report.record(
                        ReconcileAction::UpdateUser {
                            user_name: member.id.clone(),
                            display_name: display_name.clone(),
                        },
                        self.scim.update_user(&member.id, display_name).await,
                    );
                }
                report.record(
                    ReconcileAction::AddMember {
                        group: group.to_string(),
                        user_name: member.id.clone(),
                    },
                    self.groups.add_member(group, &member.id).await,
                );
            }
            Err(e) => report.failed(action, &e),
        }
    }

    async fn upsert_service_principal(
        &self,
        group: &str,
        member: &Principal,
        report: &mut PassReport,
    ) {
        let groups = [group.to_string()];
        let action = ReconcileAction::AddServicePrincipal {
            group: group.to_string(),
            application_id: member.id.clone(),
        };
        match self
            .scim
            .add_service_principal(&member.id, member.display_name.as_deref(), &groups)
            .await
        {
            Ok(CreateOutcome::Created) => report.taken(action),
            Ok(CreateOutcome::AlreadyExists) => {
                debug!(application_id = %member.id, group, "Service principal exists, attaching to group");
                report.record(
                    ReconcileAction::UpdateServicePrincipalGroups {
                        group: group.to_string(),
                        application_id: member.id.clone(),
                    },
                    self.scim
                        .update_service_principal_groups(&member.id, &groups)
                        .await,
                );
            }
            Err(e) => report.failed(action, &e),
        }
    }
}
