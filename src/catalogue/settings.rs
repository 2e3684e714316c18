//! Effects on the project's `settings.py`.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::editor::{self, TextDocument};
use crate::error::Result;

pub(crate) const DEBUG_DISABLED: &str = "DEBUG = False";
pub(crate) const DEBUG_ENABLED: &str = "DEBUG = True";

pub(crate) const ALLOWED_HOSTS_PLATFORM: &str = "ALLOWED_HOSTS = ['.vercel.app']";
pub(crate) const ALLOWED_HOSTS_EMPTY: &str = "ALLOWED_HOSTS = []";

pub(crate) const CSRF_TRUSTED_ORIGINS: &str = "CSRF_TRUSTED_ORIGINS = ['https://*.vercel.app']";

const STATIC_ROOT: &str = "STATIC_ROOT = BASE_DIR / 'staticfiles'";
const STATICFILES_STORAGE: &str =
    "STATICFILES_STORAGE = 'whitenoise.storage.CompressedManifestStaticFilesStorage'";

const SECURITY_MIDDLEWARE: &str = "django.middleware.security.SecurityMiddleware";
pub(crate) const WHITENOISE_MIDDLEWARE: &str = "whitenoise.middleware.WhiteNoiseMiddleware";

/// Settings appended by the static/media step, keyed by the name they assign.
const STATIC_MEDIA_SETTINGS: &[(&str, &str)] = &[
    ("STATIC_URL", "STATIC_URL = '/static/'"),
    ("MEDIA_URL", "MEDIA_URL = '/media/'"),
    ("MEDIA_ROOT", "MEDIA_ROOT = BASE_DIR / 'media'"),
];

const OS_IMPORT: &str = "import os";
const DOTENV_IMPORT: &str = "from dotenv import load_dotenv";
const DOTENV_COMMENT: &str = "# Load environment variables from the .env file";
const DOTENV_CALL: &str = "load_dotenv()";

const ENV_DATABASE_BLOCK: &str = r#"# Database settings from .env
DATABASES = {
    'default': {
        'ENGINE': os.getenv('DATABASE_ENGINE', 'django.db.backends.postgresql'),
        'NAME': os.getenv('DATABASE_NAME'),
        'USER': os.getenv('DATABASE_USER'),
        'PASSWORD': os.getenv('DATABASE_PASSWORD'),
        'HOST': os.getenv('DATABASE_HOST'),
        'PORT': os.getenv('DATABASE_PORT'),
    }
}
"#;

const SQLITE_DATABASE_BLOCK: &str = r#"DATABASES = {
    'default': {
        'ENGINE': 'django.db.backends.sqlite3',
        'NAME': BASE_DIR / 'db.sqlite3',
    }
}
"#;

static DATABASES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"DATABASES\s*=\s*\{").expect("valid DATABASES regex"));
static ENV_DATABASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"# Database settings from \.env\s*DATABASES\s*=\s*\{")
        .expect("valid env DATABASES regex")
});
static OS_USAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bos\.").expect("valid os usage regex"));

/// Whether `line` is a top-level-style assignment to `name` (`NAME = ...`).
pub(crate) fn assigns(line: &str, name: &str) -> bool {
    line.trim_start()
        .strip_prefix(name)
        .map(str::trim_start)
        .is_some_and(|rest| rest.starts_with('=') && !rest.starts_with("=="))
}

fn is_line(line: &str, expected: &str) -> bool {
    line.trim() == expected
}

/// Append `lines` after a blank separator line.
fn append_lines(doc: &mut TextDocument, lines: &[&str]) {
    let mut text = String::new();
    if !doc.text().is_empty() && !doc.text().ends_with('\n') {
        text.push('\n');
    }
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    doc.push_str(&text);
}

/// Set every `DEBUG = ...` line to `replacement`. Returns the number of lines
/// whose value actually changed.
pub fn set_debug(path: &Path, replacement: &str) -> Result<usize> {
    editor::replace_lines(path, |line| assigns(line, "DEBUG"), replacement)
}

pub fn set_allowed_hosts(path: &Path, replacement: &str) -> Result<usize> {
    editor::replace_lines(path, |line| assigns(line, "ALLOWED_HOSTS"), replacement)
}

/// Append the trusted-origins list unless the setting already exists.
pub fn add_csrf_trusted_origins(path: &Path) -> Result<bool> {
    let doc = TextDocument::open(path)?;
    if doc.has_line(|line| assigns(line, "CSRF_TRUSTED_ORIGINS")) {
        return Ok(false);
    }
    editor::append(path, &format!("\n{CSRF_TRUSTED_ORIGINS}\n"))?;
    Ok(true)
}

pub fn remove_csrf_trusted_origins(path: &Path) -> Result<usize> {
    editor::filter_lines(path, |line| assigns(line, "CSRF_TRUSTED_ORIGINS"))
}

/// Add the static-root and storage settings and place the WhiteNoise
/// middleware directly after the security middleware.
///
/// Settings lines already present verbatim are not repeated, and the
/// middleware is only inserted once. Returns whether anything changed.
pub fn configure_static_files(path: &Path) -> Result<bool> {
    let mut doc = TextDocument::open(path)?;
    let mut changed = false;

    let missing: Vec<&str> = [STATIC_ROOT, STATICFILES_STORAGE]
        .into_iter()
        .filter(|setting| !doc.has_line(|line| is_line(line, setting)))
        .collect();
    if !missing.is_empty() {
        append_lines(&mut doc, &missing);
        changed = true;
    }

    if !doc.contains(WHITENOISE_MIDDLEWARE) {
        let security = doc
            .text()
            .lines()
            .find(|line| line.contains(SECURITY_MIDDLEWARE))
            .map(str::to_string);
        let inserted = match security {
            Some(anchor) => {
                let indent = &anchor[..anchor.len() - anchor.trim_start().len()];
                let quote = if anchor.trim_start().starts_with('"') { '"' } else { '\'' };
                let entry = format!("{indent}{quote}{WHITENOISE_MIDDLEWARE}{quote},");
                doc.insert_after(|line| line.contains(SECURITY_MIDDLEWARE), &entry)
            }
            // Only a list opened on the assignment line has room for a new row.
            None => doc.insert_after(
                |line| assigns(line, "MIDDLEWARE") && line.trim_end().ends_with(['[', '(']),
                &format!("    '{WHITENOISE_MIDDLEWARE}',"),
            ),
        };
        if inserted {
            changed = true;
        } else {
            tracing::warn!(
                "No multi-line MIDDLEWARE list in {}, add {} by hand",
                path.display(),
                WHITENOISE_MIDDLEWARE
            );
        }
    }

    if changed {
        doc.save()?;
    }
    Ok(changed)
}

/// Remove the exact settings lines the forward appends, plus the middleware.
pub fn remove_static_file_config(path: &Path) -> Result<usize> {
    editor::filter_lines(path, |line| {
        is_line(line, STATIC_ROOT)
            || is_line(line, STATICFILES_STORAGE)
            || line.contains(WHITENOISE_MIDDLEWARE)
    })
}

pub fn remove_whitenoise_middleware(path: &Path) -> Result<usize> {
    editor::filter_lines(path, |line| line.contains(WHITENOISE_MIDDLEWARE))
}

/// Append whichever of `STATIC_URL`, `MEDIA_URL` and `MEDIA_ROOT` are not
/// assigned yet. Returns whether anything was added.
pub fn configure_static_and_media(path: &Path) -> Result<bool> {
    let mut doc = TextDocument::open(path)?;
    let missing: Vec<&str> = STATIC_MEDIA_SETTINGS
        .iter()
        .filter(|(name, _)| !doc.has_line(|line| assigns(line, name)))
        .map(|(_, setting)| *setting)
        .collect();
    if missing.is_empty() {
        return Ok(false);
    }
    append_lines(&mut doc, &missing);
    doc.save()?;
    Ok(true)
}

/// Remove the media lines exactly as the forward writes them. `STATIC_URL`
/// stays: Django projects ship with it.
pub fn remove_media_settings(path: &Path) -> Result<usize> {
    let media: Vec<&str> = STATIC_MEDIA_SETTINGS
        .iter()
        .filter(|(name, _)| *name != "STATIC_URL")
        .map(|(_, setting)| *setting)
        .collect();
    editor::filter_lines(path, |line| media.iter().any(|setting| is_line(line, setting)))
}

/// Make sure `os` is importable from settings. Returns whether the import was added.
pub fn add_os_import(path: &Path) -> Result<bool> {
    let mut doc = TextDocument::open(path)?;
    if doc.has_line(|line| is_line(line, OS_IMPORT)) {
        return Ok(false);
    }
    doc.prepend_line(OS_IMPORT);
    doc.save()?;
    Ok(true)
}

/// Drop `import os` unless settings still reference `os.`.
pub fn remove_os_import(path: &Path) -> Result<usize> {
    let mut doc = TextDocument::open(path)?;
    let os_used = doc
        .text()
        .lines()
        .any(|line| !is_line(line, OS_IMPORT) && OS_USAGE.is_match(line));
    if os_used {
        tracing::warn!("{} still uses os, keeping the import", path.display());
        return Ok(0);
    }
    let removed = doc.filter_lines(|line| is_line(line, OS_IMPORT));
    doc.save()?;
    Ok(removed)
}

/// Insert whichever of the dotenv import and the `load_dotenv()` call is
/// missing, directly below `import os`. Returns whether anything was added.
pub fn add_dotenv_loading(path: &Path) -> Result<bool> {
    let mut doc = TextDocument::open(path)?;
    let has_import = doc.has_line(|line| line.contains(DOTENV_IMPORT));
    let has_call = doc.has_line(|line| is_line(line, DOTENV_CALL));
    if has_import && has_call {
        return Ok(false);
    }

    if !has_import && !doc.insert_after(|line| is_line(line, OS_IMPORT), DOTENV_IMPORT) {
        doc.prepend_line(DOTENV_IMPORT);
    }
    if !has_call {
        doc.insert_after(
            |line| line.contains(DOTENV_IMPORT),
            &format!("\n{DOTENV_COMMENT}\n{DOTENV_CALL}"),
        );
    }

    doc.save()?;
    Ok(true)
}

pub fn remove_dotenv_loading(path: &Path) -> Result<usize> {
    editor::filter_lines(path, |line| {
        is_line(line, DOTENV_IMPORT) || is_line(line, DOTENV_COMMENT) || is_line(line, DOTENV_CALL)
    })
}

/// Swap the database block for one read from environment variables.
///
/// An environment-driven block left by an earlier run is refreshed in place
/// instead of being stacked.
pub fn configure_database(path: &Path) -> Result<()> {
    let mut doc = TextDocument::open(path)?;
    if doc.has_block(&ENV_DATABASES) {
        doc.replace_block(&ENV_DATABASES, ENV_DATABASE_BLOCK);
    } else {
        doc.replace_block(&DATABASES, ENV_DATABASE_BLOCK);
    }
    doc.save()
}

/// Drop the environment-driven database block. When no other `DATABASES`
/// block remains, the default SQLite block takes its place.
pub fn remove_database_config(path: &Path) -> Result<()> {
    let mut doc = TextDocument::open(path)?;

    let mut without_env = doc.clone();
    without_env.remove_blocks(&ENV_DATABASES);
    if without_env.has_block(&DATABASES) {
        doc = without_env;
    } else {
        doc.replace_block(&ENV_DATABASES, SQLITE_DATABASE_BLOCK);
    }

    doc.save()
}
