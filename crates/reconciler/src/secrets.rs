//! Per-principal grant reconciliation over a [`GrantStore`].
//!
//! Scopes the declaration does not mention are locked down: every grant on
//! them is revoked. An absent or empty declaration locks down every scope.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use warden_core::{
    AclItem, Grant, GrantStore, PermissionLevel, PrincipalRef, ResourceKind, Result,
    SecretScopeEntry,
};

use crate::permissions::{aggregate_by_permission, normalize_acl, revoked_principals};
use crate::types::{Pass, PassReport, ReconcileAction};

/// Converges the ACL of every scope in a grant store.
pub struct GrantReconciler {
    store: Arc<dyn GrantStore>,
    kind: ResourceKind,
}

impl GrantReconciler {
    pub fn new(store: Arc<dyn GrantStore>, kind: ResourceKind) -> Self {
        Self { store, kind }
    }

    /// Reconciler for secret scope ACLs.
    pub fn secret_scopes(store: Arc<dyn GrantStore>) -> Self {
        Self::new(store, ResourceKind::SecretScope)
    }

    pub async fn reconcile(&self, declared: Option<&[SecretScopeEntry]>) -> PassReport {
        let mut report = PassReport::new(Pass::Secrets);
        let declared = declared.unwrap_or_default();

        let normalized = match declared
            .iter()
            .map(|entry| normalize_acl(&entry.acl, self.kind).map(|g| (entry.scope.as_str(), g)))
            .collect::<Result<Vec<_>>>()
        {
            Ok(normalized) => normalized,
            Err(e) => return report.abort(&e),
        };

        let live = match self.store.list_scopes().await {
            Ok(live) => live,
            Err(e) => return report.abort(&e),
        };

        let names: HashSet<&str> = normalized.iter().map(|(scope, _)| *scope).collect();
        let unmanaged: Vec<&String> = live
            .iter()
            .filter(|scope| !names.contains(scope.as_str()))
            .collect();
        if !unmanaged.is_empty() {
            warn!(scopes = ?unmanaged, kind = %self.kind, "Revoking every grant on unmanaged scopes");
        }
        for scope in unmanaged {
            self.lock_down(scope, &mut report).await;
        }

        for (scope, grants) in &normalized {
            self.reconcile_scope(scope, grants, &mut report).await;
        }

        report
    }

    async fn lock_down(&self, scope: &str, report: &mut PassReport) {
        let items = match self.store.list_grants(scope).await {
            Ok(items) => items,
            Err(e) => return report.skip(scope, &e),
        };
        for item in items {
            report.record(
                ReconcileAction::RemoveGrant {
                    scope: scope.to_string(),
                    principal: item.principal.clone(),
                },
                self.store.remove_grant(scope, &item.principal).await,
            );
        }
    }

    async fn reconcile_scope(&self, scope: &str, grants: &[Grant], report: &mut PassReport) {
        info!(scope, grants = grants.len(), "Reconciling scope ACL");

        let items = match self.store.list_grants(scope).await {
            Ok(items) => items,
            Err(e) => return report.skip(scope, &e),
        };

        let (live, unparsed) = self.parse_live(items);
        let mut revoked = revoked_principals(
            &aggregate_by_permission(&live),
            &aggregate_by_permission(grants),
        );
        revoked.extend(unparsed);

        if !revoked.is_empty() {
            warn!(scope, principals = ?revoked, "Revoking grants not in the declaration");
        }
        for principal in revoked {
            let result = self.store.remove_grant(scope, &principal).await;
            report.record(
                ReconcileAction::RemoveGrant {
                    scope: scope.to_string(),
                    principal,
                },
                result,
            );
        }

        for grant in grants {
            let principal = grant.principal.name();
            report.record(
                ReconcileAction::PutGrant {
                    scope: scope.to_string(),
                    principal: principal.to_string(),
                    permission: grant.level.to_string(),
                },
                self.store
                    .apply_grant(scope, principal, grant.level.as_str())
                    .await,
            );
        }
    }

    /// Live items as grants. Principals whose level is outside the allowed set
    /// are returned separately so they can be revoked.
    fn parse_live(&self, items: Vec<AclItem>) -> (Vec<Grant>, Vec<String>) {
        let mut grants = Vec::new();
        let mut unparsed = Vec::new();
        for item in items {
            match PermissionLevel::parse(&item.permission, self.kind) {
                Ok(level) => grants.push(Grant::new(PrincipalRef::Group(item.principal), level)),
                Err(e) => {
                    warn!(principal = %item.principal, error = %e, "Live grant has an unknown level");
                    unparsed.push(item.principal);
                }
            }
        }
        (grants, unparsed)
    }
}
