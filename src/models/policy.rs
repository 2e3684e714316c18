use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which groups of deployment changes an apply run performs.
///
/// Read once from a YAML options file at the start of a run:
///
/// ```yaml
/// project_name: mysite        # empty or missing: detect from the file tree
/// set_debug_false: true
/// configure_static_files: true
/// configure_database: true
/// generate_requirements: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default = "default_true")]
    pub set_debug_false: bool,
    #[serde(default = "default_true")]
    pub configure_static_files: bool,
    #[serde(default = "default_true")]
    pub configure_database: bool,
    #[serde(default = "default_true")]
    pub generate_requirements: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            project_name: None,
            set_debug_false: true,
            configure_static_files: true,
            configure_database: true,
            generate_requirements: true,
        }
    }
}

impl Policy {
    /// Load the policy from `path`.
    /// Returns the default policy if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Policy file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map of defaults.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// The configured project name, treating an empty string as unset.
    pub fn project_name(&self) -> Option<&str> {
        self.project_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
