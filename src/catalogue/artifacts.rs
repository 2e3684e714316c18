//! Effects that create, rewrite or delete whole files at the project root.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::editor::TextDocument;
use crate::error::{Error, Result};
use crate::models::Workspace;
use crate::runner::CommandRunner;

const ENV_PLACEHOLDERS: &str = "\
DATABASE_ENGINE=django.db.backends.postgresql
DATABASE_NAME=your_db_name
DATABASE_USER=your_db_user
DATABASE_PASSWORD=your_db_password
DATABASE_HOST=your_db_host
DATABASE_PORT=your_db_port
";

static SOURCE_DRIVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(\s*)psycopg2==").expect("valid psycopg2 pin regex")
});

/// Platform deployment descriptor (`vercel.json`).
#[derive(Debug, Serialize)]
struct Descriptor {
    builds: Vec<Build>,
    routes: Vec<Route>,
}

#[derive(Debug, Serialize)]
struct Build {
    src: String,
    #[serde(rename = "use")]
    builder: &'static str,
    config: BuildConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildConfig {
    max_lambda_size: &'static str,
    runtime: &'static str,
}

#[derive(Debug, Serialize)]
struct Route {
    src: &'static str,
    dest: String,
}

impl Descriptor {
    fn for_workspace(workspace: &Workspace) -> Self {
        let entry_point = workspace.entry_point();
        Self {
            builds: vec![Build {
                src: entry_point.clone(),
                builder: "@vercel/python",
                config: BuildConfig {
                    max_lambda_size: "15mb",
                    runtime: "python3.9",
                },
            }],
            routes: vec![Route {
                src: "/(.*)",
                dest: entry_point,
            }],
        }
    }
}

/// Create the secrets file with placeholder values. An existing file is left
/// alone. Returns whether the file was created.
pub fn create_env_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, ENV_PLACEHOLDERS).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

/// Delete `path`. Returns false if it was already gone.
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Write the deployment descriptor routing every request to the project's
/// WSGI entry point.
pub fn write_descriptor(workspace: &Workspace) -> Result<()> {
    let descriptor = Descriptor::for_workspace(workspace);

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    descriptor.serialize(&mut ser)?;
    buf.push(b'\n');

    let path = workspace.descriptor();
    fs::write(&path, buf).map_err(|e| Error::io(&path, e))
}

/// Capture the installed package set into `path`.
/// Returns false when the freeze command produced nothing usable.
pub fn freeze_requirements(path: &Path, runner: &dyn CommandRunner) -> Result<bool> {
    let Some(frozen) = runner.capture("pip", &["freeze"]) else {
        return Ok(false);
    };
    fs::write(path, frozen).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

/// Pin the pure-binary PostgreSQL driver instead of the source build.
/// A missing manifest is reported and skipped. Returns the number of pins rewritten.
pub fn use_binary_driver(path: &Path) -> Result<usize> {
    if !path.exists() {
        tracing::warn!("{} does not exist, skipping driver rewrite", path.display());
        return Ok(0);
    }
    let mut doc = TextDocument::open(path)?;
    let rewritten = doc.replace_pattern(&SOURCE_DRIVER, "${1}psycopg2-binary==");
    if rewritten > 0 {
        doc.save()?;
    }
    Ok(rewritten)
}
