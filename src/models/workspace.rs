use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// File name of the deployment history log, relative to the workspace root.
pub const HISTORY_LOG: &str = "deployment_history.log";

/// Directories never searched for a project module.
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "venv", "env", "site-packages"];

/// The project being prepared: a root directory plus the Django project
/// module inside it.
///
/// Every path the engine touches is derived from here; nothing depends on
/// the process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    /// Project module path relative to `root`, `/`-separated.
    project: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
        }
    }

    /// Use `project` when given, otherwise search `root` for a directory holding
    /// both `wsgi.py` and `settings.py`.
    pub fn resolve(root: impl Into<PathBuf>, project: Option<&str>) -> Result<Self> {
        let root = root.into();
        if let Some(name) = project {
            return Ok(Self::new(root, name));
        }

        let project = detect_project(&root).ok_or_else(|| Error::ProjectNotFound {
            root: root.clone(),
        })?;
        tracing::debug!("Detected project module '{}'", project);
        Ok(Self::new(root, project))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root.join(&self.project)
    }

    pub fn settings(&self) -> PathBuf {
        self.project_dir().join("settings.py")
    }

    pub fn urls(&self) -> PathBuf {
        self.project_dir().join("urls.py")
    }

    pub fn wsgi(&self) -> PathBuf {
        self.project_dir().join("wsgi.py")
    }

    pub fn requirements(&self) -> PathBuf {
        self.root.join("requirements.txt")
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn descriptor(&self) -> PathBuf {
        self.root.join("vercel.json")
    }

    pub fn history_log(&self) -> PathBuf {
        self.root.join(HISTORY_LOG)
    }

    /// Entry point as referenced from the platform descriptor, e.g. `mysite/wsgi.py`.
    pub fn entry_point(&self) -> String {
        format!("{}/wsgi.py", self.project)
    }
}

fn is_searchable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !(name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()))
}

fn detect_project(root: &Path) -> Option<String> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_type().is_dir() && is_searchable(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() > 0)
        .find(|e| e.path().join("wsgi.py").is_file() && e.path().join("settings.py").is_file())
        .and_then(|e| {
            let relative = e.path().strip_prefix(root).ok()?;
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
}
