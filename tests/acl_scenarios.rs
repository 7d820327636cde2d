//! End-to-end ACL runs against the in-memory platform.

use std::sync::Arc;

use warden_core::{DesiredState, InMemoryPlatform, MutationCall, ObjectKind, ObjectType};
use warden_reconciler::{AclEngine, Pass, ReconcilerConfig};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const ACL_YAML: &str = r"
GROUPS:
  - name: eng
    type: user
    members:
      - user_name: ada@example.com
        display_name: Ada
      - user_name: lin@example.com
  - name: bots
    type: spn
    members:
      - application_id: 7f1c-app
SECRETS:
  - scope: prod
    acl:
      - permission: read
        group: [eng]
      - permission: MANAGE
        service_principal: [7f1c-app]
CLUSTERS:
  - name: etl
    acl:
      - permission: can_restart
        group: [eng]
WORKSPACE:
  - folder: Projects
    acl:
      - permission: CAN_EDIT
        group: [eng]
";

fn workspace_with_defaults() -> Arc<InMemoryPlatform> {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.seed_group("admins", &["root@example.com"]);
    platform.seed_object("/Users", ObjectType::Directory);
    platform.seed_object("/Shared", ObjectType::Directory);
    platform
}

fn rewrites_only(call: &MutationCall) -> bool {
    matches!(
        call,
        MutationCall::PutAcl { .. } | MutationCall::ReplacePermissions { .. }
    )
}

#[tokio::test]
async fn second_run_issues_no_structural_mutations() -> TestResult {
    let platform = workspace_with_defaults();
    platform.seed_scope("prod", &[]);
    platform.seed_cluster(
        &warden_core::ClusterSpec::new("etl"),
        warden_core::ClusterState::Running,
        "UI",
    );
    let desired = DesiredState::from_yaml_str(ACL_YAML)?;
    let engine = AclEngine::new(&platform, ReconcilerConfig::default());

    let first = engine.run(&desired).await;
    assert!(!first.has_aborted_passes());
    assert!(!first.has_failures());
    assert_eq!(
        platform.group_members("eng"),
        Some(vec![
            "ada@example.com".to_string(),
            "lin@example.com".to_string()
        ])
    );
    assert!(platform.has_service_principal("7f1c-app"));

    platform.clear_calls();
    let second = engine.run(&desired).await;

    assert!(!second.has_failures());
    let structural: Vec<MutationCall> = platform
        .calls()
        .into_iter()
        .filter(|c| !rewrites_only(c))
        .collect();
    assert!(structural.is_empty(), "unexpected calls: {structural:?}");
    assert_eq!(
        second.pass(Pass::Groups).map(|p| p.actions_taken.len()),
        Some(0)
    );
    Ok(())
}

#[tokio::test]
async fn absent_secrets_section_locks_down_every_scope() -> TestResult {
    let platform = workspace_with_defaults();
    platform.seed_scope("prod", &[("eng", "READ"), ("ops", "MANAGE")]);
    platform.seed_scope("staging", &[("eng", "WRITE")]);

    let desired = DesiredState::from_yaml_str(
        r"
GROUPS: []
WORKSPACE: []
",
    )?;
    let report = AclEngine::new(&platform, ReconcilerConfig::default())
        .run(&desired)
        .await;

    assert!(!report.has_aborted_passes());
    assert_eq!(
        platform.count_calls(|c| matches!(c, MutationCall::DeleteAcl { .. })),
        3
    );
    assert_eq!(
        platform.count_calls(|c| matches!(c, MutationCall::PutAcl { .. })),
        0
    );
    assert!(platform.scope_grants("prod").is_empty());
    assert!(platform.scope_grants("staging").is_empty());
    Ok(())
}

#[tokio::test]
async fn new_member_is_created_directly_in_its_group() -> TestResult {
    let platform = workspace_with_defaults();
    let desired = DesiredState::from_yaml_str(
        r"
GROUPS:
  - name: eng
    type: user
    members:
      - user_name: ada@example.com
WORKSPACE: []
",
    )?;

    AclEngine::new(&platform, ReconcilerConfig::default())
        .run(&desired)
        .await;

    let adds: Vec<Vec<String>> = platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MutationCall::AddUser { groups, .. } => Some(groups),
            _ => None,
        })
        .collect();
    assert_eq!(adds, vec![vec!["eng".to_string()]]);
    assert_eq!(
        platform.count_calls(|c| matches!(
            c,
            MutationCall::UpdateUser { .. } | MutationCall::AddMember { .. }
        )),
        0
    );
    Ok(())
}

#[tokio::test]
async fn unmanaged_principals_survive_without_remove_flag() -> TestResult {
    let platform = workspace_with_defaults();
    platform.seed_user("ada@example.com", None);
    platform.seed_user("old@example.com", None);
    platform.seed_group("eng", &["ada@example.com", "old@example.com"]);
    platform.seed_group("legacy", &[]);
    let desired = DesiredState::from_yaml_str(
        r"
GROUPS:
  - name: eng
    type: user
    members:
      - user_name: ada@example.com
WORKSPACE: []
",
    )?;

    AclEngine::new(&platform, ReconcilerConfig::default())
        .run(&desired)
        .await;
    assert_eq!(
        platform.count_calls(|c| matches!(
            c,
            MutationCall::DeleteGroup { .. } | MutationCall::RemoveMember { .. }
        )),
        0
    );

    AclEngine::new(&platform, ReconcilerConfig::default().remove_unmanaged(true))
        .run(&desired)
        .await;
    assert_eq!(
        platform.group_members("eng"),
        Some(vec!["ada@example.com".to_string()])
    );
    assert!(!platform.group_names().contains(&"legacy".to_string()));
    assert!(platform.group_names().contains(&"admins".to_string()));
    Ok(())
}

#[tokio::test]
async fn bad_level_aborts_only_its_pass() -> TestResult {
    let platform = workspace_with_defaults();
    platform.seed_scope("prod", &[("eng", "READ")]);
    let desired = DesiredState::from_yaml_str(
        r"
GROUPS:
  - name: eng
    type: user
    members: []
SECRETS:
  - scope: prod
    acl:
      - permission: CAN_MANAGE
        group: [eng]
WORKSPACE:
  - folder: /Projects
    acl:
      - permission: CAN_READ
        group: [eng]
",
    )?;

    let report = AclEngine::new(&platform, ReconcilerConfig::default())
        .run(&desired)
        .await;

    assert!(report.has_aborted_passes());
    assert!(report.pass(Pass::Secrets).is_some_and(|p| p.is_aborted()));
    assert!(report.pass(Pass::Workspace).is_some_and(|p| !p.is_aborted()));
    assert_eq!(platform.scope_grants("prod").len(), 1);

    let projects = platform
        .workspace_object("/Projects")
        .map(|o| o.object_id.to_string())
        .unwrap_or_default();
    assert!(
        platform
            .object_permissions(ObjectKind::Directories, &projects)
            .is_some()
    );
    Ok(())
}
