//! CLI command handlers.
//!
//! Each handler loads its documents, connects to the workspace and hands the
//! work to the reconciler crate. Only structural failures turn into a
//! non-zero exit code; per-item failures are logged by the passes.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use warden_client::{ClientConfig, HOST_ENV, TOKEN_ENV, WorkspaceClient};
use warden_reconciler::{
    AclEngine, ClusterController, ClusterControllerConfig, ClusterRunReport, ReconcilerConfig,
    RunReport, UserSelection, delete_users, summarize, summarize_pass,
};

use crate::cli::{Commands, GlobalArgs};
use crate::loader::DocumentLoader;

/// Execute a CLI command.
///
/// # Errors
///
/// Returns an error when a document cannot be loaded or the client cannot be
/// built.
pub async fn execute_command(global: GlobalArgs, command: Commands) -> Result<ExitCode> {
    let loader = DocumentLoader::new(&global.config_dir).with_vars(global.vars.iter().cloned());

    match command {
        Commands::Acl { remove, acl_file } => cmd_acl(&global, &loader, remove, &acl_file).await,
        Commands::Clusters {
            cluster_config_file,
            cluster_library_file,
            max_workers,
        } => {
            cmd_clusters(
                &global,
                &loader,
                &cluster_config_file,
                &cluster_library_file,
                max_workers,
            )
            .await
        }
        Commands::DeleteUsers { users, domain } => cmd_delete_users(&global, users, domain).await,
    }
}

fn connect(global: &GlobalArgs) -> Result<Arc<WorkspaceClient>> {
    let host = global
        .workspace_url
        .as_deref()
        .with_context(|| format!("--workspace-url or {HOST_ENV} is required"))?;
    let token = global
        .token
        .as_deref()
        .with_context(|| format!("--token or {TOKEN_ENV} is required"))?;

    let config = ClientConfig::new(host, token).timeout(Duration::from_secs(global.timeout));
    let client = WorkspaceClient::with_config(config).context("Failed to build workspace client")?;
    info!(host = client.host(), "Connected to workspace");
    Ok(Arc::new(client))
}

async fn cmd_acl(
    global: &GlobalArgs,
    loader: &DocumentLoader,
    remove: bool,
    acl_file: &Path,
) -> Result<ExitCode> {
    let desired = loader
        .acl(acl_file)
        .with_context(|| format!("Failed to load {}", loader.resolve(acl_file).display()))?;
    let client = connect(global)?;

    if remove {
        warn!("Unmanaged groups and members will be removed");
    }
    let engine = AclEngine::new(
        &client,
        ReconcilerConfig::default().remove_unmanaged(remove),
    );
    let report = engine.run(&desired).await;
    Ok(acl_exit_code(&report))
}

fn acl_exit_code(report: &RunReport) -> ExitCode {
    for line in summarize(report) {
        info!("{line}");
    }
    if report.has_aborted_passes() {
        error!(run_id = %report.run_id, "ACL run finished with aborted passes");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn cmd_clusters(
    global: &GlobalArgs,
    loader: &DocumentLoader,
    cluster_file: &Path,
    library_file: &Path,
    max_workers: Option<usize>,
) -> Result<ExitCode> {
    let specs = loader
        .clusters(cluster_file)
        .with_context(|| format!("Failed to load {}", loader.resolve(cluster_file).display()))?;
    let libraries = loader
        .libraries(library_file)
        .with_context(|| format!("Failed to load {}", loader.resolve(library_file).display()))?;
    let client = connect(global)?;

    let config = max_workers.map_or_else(ClusterControllerConfig::default, |n| {
        ClusterControllerConfig::default().max_workers(n)
    });
    let controller = ClusterController::new(client.clone(), client, config);
    let report = controller.run(specs.specs(), libraries.libraries()).await;
    Ok(cluster_exit_code(&report))
}

fn cluster_exit_code(report: &ClusterRunReport) -> ExitCode {
    info!("{}", summarize_pass(&report.pruned));
    for outcome in &report.outcomes {
        let state = outcome
            .final_state
            .map_or_else(|| "unknown".to_string(), |s| s.to_string());
        if outcome.failed() {
            warn!(cluster = %outcome.cluster_name, state = %state, "{}", summarize_pass(&outcome.report));
        } else {
            info!(cluster = %outcome.cluster_name, state = %state, "{}", summarize_pass(&outcome.report));
        }
    }
    if report.pruned.is_aborted() {
        error!(run_id = %report.run_id, "Could not list clusters");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn cmd_delete_users(
    global: &GlobalArgs,
    users: Vec<String>,
    domain: Option<String>,
) -> Result<ExitCode> {
    let selection = match domain {
        Some(domain) => UserSelection::domain(domain).context("Invalid --domain")?,
        None => UserSelection::Names(users),
    };
    let client = connect(global)?;

    let report = delete_users(client.as_ref(), &selection).await;
    info!("{}", summarize_pass(&report));
    Ok(if report.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{AclBlock, DesiredState, DirectoryAclEntry, InMemoryPlatform};

    fn global() -> GlobalArgs {
        GlobalArgs {
            token: None,
            workspace_url: Some("https://adb.example.net".to_string()),
            debug: false,
            config_dir: "configuration".into(),
            vars: Vec::new(),
            timeout: 5,
        }
    }

    #[test]
    fn test_missing_token_is_reported() {
        let err = connect(&global()).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("--token or DATABRICKS_TOKEN is required"));
    }

    #[tokio::test]
    async fn test_aborted_pass_fails_the_run() {
        let platform = Arc::new(InMemoryPlatform::new());
        let desired = DesiredState::new().with_directory(DirectoryAclEntry {
            folder: "/Projects".to_string(),
            acl: vec![AclBlock::for_groups("CAN_FLY", ["eng"])],
        });

        let report = AclEngine::new(&platform, ReconcilerConfig::default())
            .run(&desired)
            .await;

        assert_eq!(acl_exit_code(&report), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_clean_run_succeeds() {
        let platform = Arc::new(InMemoryPlatform::new());
        let report = AclEngine::new(&platform, ReconcilerConfig::default())
            .run(&DesiredState::new())
            .await;

        assert_eq!(acl_exit_code(&report), ExitCode::SUCCESS);
    }
}
