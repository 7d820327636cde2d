//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use warden_client::{HOST_ENV, TOKEN_ENV};

/// Warden - declarative access control for Databricks workspaces
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version)]
#[command(about = "Reconcile Databricks groups, ACLs and clusters against YAML declarations")]
#[command(
    long_about = "Warden reads declarative YAML documents and drives a Databricks workspace towards them: groups and their members, secret scope ACLs, cluster ACLs, workspace folder ACLs, and the cluster fleet with its libraries."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Personal access token
    #[arg(short = 't', long, env = TOKEN_ENV, hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Workspace URL, e.g. https://adb-123.4.azuredatabricks.net
    #[arg(short = 'w', long, env = HOST_ENV, global = true)]
    pub workspace_url: Option<String>,

    /// Enable debug logging
    #[arg(long, default_value_t = false, global = true)]
    pub debug: bool,

    /// Directory holding the YAML documents
    #[arg(long, default_value = "configuration", global = true)]
    pub config_dir: PathBuf,

    /// Template variable substituted for `${NAME}` in the documents
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var, global = true)]
    pub vars: Vec<(String, String)>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile groups, secret scope ACLs, cluster ACLs and workspace folder ACLs
    Acl {
        /// Delete unmanaged groups and remove unmanaged members
        #[arg(long, default_value_t = false)]
        remove: bool,

        /// ACL document, relative to --config-dir
        #[arg(long, default_value = "ACL.yaml")]
        acl_file: PathBuf,
    },

    /// Prune unmanaged clusters, then create, edit, start and equip declared ones
    Clusters {
        /// Cluster document, relative to --config-dir
        #[arg(long, default_value = "clusterconf.yaml")]
        cluster_config_file: PathBuf,

        /// Library document, relative to --config-dir
        #[arg(long, default_value = "clusterlib.yaml")]
        cluster_library_file: PathBuf,

        /// Upper bound on clusters reconciled concurrently
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Delete users by name or by e-mail domain
    DeleteUsers {
        /// User name to delete (repeatable)
        #[arg(long = "user", required_unless_present = "domain", conflicts_with = "domain")]
        users: Vec<String>,

        /// Delete every user whose name contains this domain, e.g. @contractor.io
        #[arg(long)]
        domain: Option<String>,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_acl_with_globals() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "warden",
            "acl",
            "--remove",
            "-t",
            "dapi123",
            "-w",
            "https://adb.example.net",
            "--var",
            "domain=example.com",
        ])?;

        assert_eq!(cli.global.token.as_deref(), Some("dapi123"));
        assert_eq!(
            cli.global.vars,
            vec![("domain".to_string(), "example.com".to_string())]
        );
        assert_eq!(cli.global.config_dir, PathBuf::from("configuration"));
        match cli.command {
            Commands::Acl { remove, acl_file } => {
                assert!(remove);
                assert_eq!(acl_file, PathBuf::from("ACL.yaml"));
            }
            other => return Err(format!("unexpected command {other:?}").into()),
        }
        Ok(())
    }

    #[test]
    fn test_bad_var_is_rejected() {
        assert!(Cli::try_parse_from(["warden", "--var", "novalue", "acl"]).is_err());
        assert!(parse_var("=x").is_err());
        assert_eq!(
            parse_var("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
    }

    #[test]
    fn test_delete_users_needs_a_selection() {
        assert!(Cli::try_parse_from(["warden", "delete-users"]).is_err());
        assert!(
            Cli::try_parse_from([
                "warden",
                "delete-users",
                "--user",
                "a@x.io",
                "--domain",
                "@x.io"
            ])
            .is_err()
        );
        assert!(Cli::try_parse_from(["warden", "delete-users", "--domain", "@x.io"]).is_ok());
    }

    #[test]
    fn test_clusters_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from(["warden", "clusters", "--max-workers", "2"])?;
        match cli.command {
            Commands::Clusters {
                cluster_config_file,
                cluster_library_file,
                max_workers,
            } => {
                assert_eq!(cluster_config_file, PathBuf::from("clusterconf.yaml"));
                assert_eq!(cluster_library_file, PathBuf::from("clusterlib.yaml"));
                assert_eq!(max_workers, Some(2));
            }
            other => return Err(format!("unexpected command {other:?}").into()),
        }
        Ok(())
    }
}
