//! Reads the YAML documents from the configuration directory.
//!
//! Documents may carry `${name}` placeholders, filled from `--var` pairs
//! before parsing. A placeholder without a value is a load error.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use warden_core::{ClusterDocument, DesiredState, Error, LibraryDocument, Result};

const PLACEHOLDER: &str = r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}";

/// Resolves document names against a configuration directory and renders them.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    config_dir: PathBuf,
    vars: HashMap<String, String>,
}

impl DocumentLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            vars: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.vars.extend(vars);
        self
    }

    /// Absolute paths are kept; anything else lives under the config dir.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.config_dir.join(file)
        }
    }

    /// Read and render a document.
    ///
    /// # Errors
    ///
    /// `FileReadFailed` when the file cannot be read, `InvalidConfig` when a
    /// placeholder has no value.
    pub fn read(&self, file: &Path) -> Result<String> {
        let path = self.resolve(file);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::file_read_failed(&path, e.to_string()))?;
        debug!(path = %path.display(), bytes = raw.len(), "Read document");
        render(&raw, &self.vars).map_err(|e| match e {
            Error::InvalidConfig { reason } => {
                Error::invalid_config(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// # Errors
    ///
    /// Read, render or shape errors from the ACL document.
    pub fn acl(&self, file: &Path) -> Result<DesiredState> {
        DesiredState::from_yaml_str(&self.read(file)?)
    }

    /// # Errors
    ///
    /// Read, render or parse errors from the cluster document.
    pub fn clusters(&self, file: &Path) -> Result<ClusterDocument> {
        ClusterDocument::from_yaml_str(&self.read(file)?)
    }

    /// # Errors
    ///
    /// Read, render or parse errors from the library document.
    pub fn libraries(&self, file: &Path) -> Result<LibraryDocument> {
        LibraryDocument::from_yaml_str(&self.read(file)?)
    }
}

/// Substitute every `${name}` in `template`.
///
/// # Errors
///
/// Returns `InvalidConfig` naming every placeholder without a value.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let pattern = Regex::new(PLACEHOLDER).map_err(|e| Error::invalid_config(e.to_string()))?;

    let missing: BTreeSet<&str> = pattern
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str())
        .filter(|name| !vars.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(Error::invalid_config(format!(
            "no value for template variable(s): {}",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    Ok(pattern
        .replace_all(template, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .and_then(|name| vars.get(name.as_str()))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned())
}
