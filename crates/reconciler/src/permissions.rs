//! Permission validation and ACL shape conversion.
//!
//! Declarations group principals by permission ([`AclBlock`]); the platform
//! speaks flat `(principal, level)` pairs ([`Grant`]). Levels are checked
//! here, before any remote call is made.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::warn;
use warden_core::{AclBlock, Grant, PermissionLevel, PrincipalRef, ResourceKind, Result};

/// Check a single level against the kind's allowed set.
///
/// # Errors
///
/// Returns `InvalidPermission` when the level is not allowed for `kind`.
pub fn validate(level: &str, kind: ResourceKind) -> Result<PermissionLevel> {
    PermissionLevel::parse(level, kind)
}

/// Flatten declared blocks into grants.
///
/// Each principal name becomes one grant. A block grants to its `group` list
/// when that is non-empty, else to `user`, else to `service_principal`.
/// Blocks that name no principal are dropped with a warning.
///
/// # Errors
///
/// Returns `InvalidPermission` for the first block whose level is not allowed
/// for `kind`; no grants are produced in that case.
pub fn normalize_acl(blocks: &[AclBlock], kind: ResourceKind) -> Result<Vec<Grant>> {
    let levels = blocks
        .iter()
        .map(|block| validate(&block.permission, kind))
        .collect::<Result<Vec<_>>>()?;

    let mut grants = Vec::new();
    for (block, level) in blocks.iter().zip(levels) {
        let principals = principal_refs(block);
        if principals.is_empty() {
            warn!(permission = %level, %kind, "ACL block names no principal, ignoring");
            continue;
        }
        grants.extend(
            principals
                .into_iter()
                .map(|principal| Grant::new(principal, level.clone())),
        );
    }
    Ok(grants.into_iter().unique().collect())
}

/// `group` wins over `user`, which wins over `service_principal`; a list only
/// counts when it names someone.
fn principal_refs(block: &AclBlock) -> Vec<PrincipalRef> {
    let named = |list: &Option<Vec<String>>| {
        list.as_ref()
            .filter(|names| !names.is_empty())
            .cloned()
    };
    if let Some(groups) = named(&block.group) {
        groups.into_iter().map(PrincipalRef::Group).collect()
    } else if let Some(users) = named(&block.user) {
        users.into_iter().map(PrincipalRef::User).collect()
    } else {
        named(&block.service_principal)
            .into_iter()
            .flatten()
            .map(PrincipalRef::ServicePrincipal)
            .collect()
    }
}

/// Group flat grants back into one block per permission level.
///
/// Levels with no grant are omitted and names within a block are sorted.
pub fn aggregate_by_permission(grants: &[Grant]) -> Vec<AclBlock> {
    let mut buckets: BTreeMap<&PermissionLevel, AclBlock> = BTreeMap::new();
    for grant in grants {
        let block = buckets.entry(&grant.level).or_insert_with(|| AclBlock {
            permission: grant.level.to_string(),
            ..AclBlock::default()
        });
        let list = match &grant.principal {
            PrincipalRef::Group(_) => &mut block.group,
            PrincipalRef::User(_) => &mut block.user,
            PrincipalRef::ServicePrincipal(_) => &mut block.service_principal,
        };
        list.get_or_insert_with(Vec::new)
            .push(grant.principal.name().to_string());
    }
    buckets
        .into_values()
        .map(|mut block| {
            for list in [
                &mut block.group,
                &mut block.user,
                &mut block.service_principal,
            ]
            .into_iter()
            .flatten()
            {
                list.sort();
                list.dedup();
            }
            block
        })
        .collect()
}

/// Principals holding a live level that the desired blocks do not grant them.
pub fn revoked_principals(live: &[AclBlock], desired: &[AclBlock]) -> Vec<String> {
    let mut revoked = BTreeSet::new();
    for block in live {
        let granted = desired
            .iter()
            .find(|d| d.permission == block.permission)
            .map(AclBlock::principal_names)
            .unwrap_or_default();
        revoked.extend(
            block
                .principal_names()
                .into_iter()
                .filter(|name| !granted.contains(name))
                .map(str::to_string),
        );
    }
    revoked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Error;

    #[test]
    fn test_group_list_takes_precedence() -> Result<()> {
        let block = AclBlock {
            permission: "can_manage".to_string(),
            group: Some(vec!["eng".to_string()]),
            user: Some(vec!["ada@example.com".to_string()]),
            service_principal: Some(vec!["7f1c".to_string()]),
        };
        let grants = normalize_acl(&[block], ResourceKind::Cluster)?;

        assert_eq!(grants.len(), 1);
        assert_eq!(
            grants.first().map(|g| (&g.principal, g.level.as_str())),
            Some((&PrincipalRef::Group("eng".to_string()), "CAN_MANAGE"))
        );
        Ok(())
    }

    #[test]
    fn test_empty_lists_fall_through() -> Result<()> {
        let to_users = AclBlock {
            permission: "CAN_RESTART".to_string(),
            group: Some(Vec::new()),
            user: Some(vec![
                "ada@example.com".to_string(),
                "lin@example.com".to_string(),
            ]),
            service_principal: Some(vec!["7f1c".to_string()]),
        };
        let to_spn = AclBlock {
            permission: "CAN_ATTACH_TO".to_string(),
            group: None,
            user: Some(Vec::new()),
            service_principal: Some(vec!["7f1c".to_string()]),
        };
        let grants = normalize_acl(&[to_users, to_spn], ResourceKind::Cluster)?;

        assert_eq!(
            grants.iter().map(|g| g.principal.clone()).collect::<Vec<_>>(),
            vec![
                PrincipalRef::User("ada@example.com".to_string()),
                PrincipalRef::User("lin@example.com".to_string()),
                PrincipalRef::ServicePrincipal("7f1c".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_whole_list_on_bad_level() {
        let blocks = vec![
            AclBlock::for_groups("READ", ["eng"]),
            AclBlock::for_groups("CAN_READ", ["ops"]),
        ];
        let result = normalize_acl(&blocks, ResourceKind::SecretScope);
        assert!(matches!(result, Err(Error::InvalidPermission { .. })));
    }

    #[test]
    fn test_normalize_drops_empty_block() -> Result<()> {
        let blocks = vec![
            AclBlock {
                permission: "READ".to_string(),
                ..AclBlock::default()
            },
            AclBlock::for_users("WRITE", Vec::<String>::new()),
            AclBlock::for_groups("MANAGE", ["admins"]),
        ];
        let grants = normalize_acl(&blocks, ResourceKind::SecretScope)?;
        assert_eq!(grants.len(), 1);
        Ok(())
    }

    #[test]
    fn test_aggregate_round_trip() -> Result<()> {
        let declared = vec![
            AclBlock::for_groups("MANAGE", ["admins"]),
            AclBlock::for_groups("READ", ["ops", "eng"]),
        ];
        let grants = normalize_acl(&declared, ResourceKind::SecretScope)?;
        let blocks = aggregate_by_permission(&grants);

        assert_eq!(blocks.len(), 2);
        let read = blocks
            .iter()
            .find(|b| b.permission == "READ")
            .and_then(|b| b.group.clone());
        assert_eq!(read, Some(vec!["eng".to_string(), "ops".to_string()]));
        assert!(blocks.iter().all(|b| b.user.is_none()));
        Ok(())
    }

    #[test]
    fn test_revoked_principals() -> Result<()> {
        let live = aggregate_by_permission(&normalize_acl(
            &[
                AclBlock::for_groups("READ", ["eng", "ops"]),
                AclBlock::for_groups("MANAGE", ["admins"]),
                AclBlock::for_groups("WRITE", ["interns"]),
            ],
            ResourceKind::SecretScope,
        )?);
        let desired = aggregate_by_permission(&normalize_acl(
            &[
                AclBlock::for_groups("READ", ["eng"]),
                AclBlock::for_groups("MANAGE", ["admins"]),
            ],
            ResourceKind::SecretScope,
        )?);

        assert_eq!(
            revoked_principals(&live, &desired),
            vec!["interns".to_string(), "ops".to_string()]
        );
        Ok(())
    }
}
