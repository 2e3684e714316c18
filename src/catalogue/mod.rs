//! The fixed table of deployment transformations.
//!
//! Every entry pairs a hand-written forward effect with its inverse. Forward
//! effects never fail because a marker is missing, and several check for
//! their own output first so repeated apply runs don't stack duplicates.
//! Inverses are broad removals: they only ever run for entries found in the
//! history log, i.e. against content a forward effect wrote.
//!
//! | id | forward | inverse |
//! |---|---|---|
//! | `debug-flag` | `DEBUG = False` | `DEBUG = True` |
//! | `static-file-config` | static root/storage settings, WhiteNoise middleware, `collectstatic` | remove them |
//! | `static-serving-dependency` | `pip install whitenoise` | uninstall, remove middleware |
//! | `static-media-settings` | add missing `STATIC_URL`/`MEDIA_URL`/`MEDIA_ROOT` | remove `MEDIA_URL`/`MEDIA_ROOT` |
//! | `url-static-media-wiring` | debug-only static/media URL patterns | remove them |
//! | `os-import` | `import os` at the top of settings | remove it while nothing uses `os.` |
//! | `dotenv-loading` | `load_dotenv` import and call below `import os` | remove them |
//! | `database-config` | environment-driven `DATABASES` | restore SQLite `DATABASES` |
//! | `env-file-bootstrap` | `.env` with placeholders | delete `.env` |
//! | `generate-requirements` | `pip freeze > requirements.txt` | delete `requirements.txt` |
//! | `allowed-hosts` | `ALLOWED_HOSTS = ['.vercel.app']` | `ALLOWED_HOSTS = []` |
//! | `csrf-trusted-origins` | `CSRF_TRUSTED_ORIGINS = [...]` | remove it |
//! | `entry-point-alias` | `app = application` in `wsgi.py` | remove it |
//! | `manifest-dependency-rewrite` | `psycopg2==` → `psycopg2-binary==` | none, never logged |
//! | `platform-descriptor` | `vercel.json` | delete `vercel.json` |

mod artifacts;
mod routing;
mod settings;

use std::fmt;

use crate::error::Result;
use crate::models::{HistoryEntry, Workspace};
use crate::runner::CommandRunner;

/// What a forward effect did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The target was changed (or an external command was issued).
    Applied,
    /// Nothing needed doing; no history entry is written.
    Unchanged,
}

impl Effect {
    fn changed_if(changed: bool) -> Self {
        if changed {
            Self::Applied
        } else {
            Self::Unchanged
        }
    }
}

/// Everything an effect may touch: the project files and external commands.
#[derive(Clone, Copy)]
pub struct Target<'a> {
    pub workspace: &'a Workspace,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> Target<'a> {
    pub fn new(workspace: &'a Workspace, runner: &'a dyn CommandRunner) -> Self {
        Self { workspace, runner }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformation {
    DebugFlag,
    StaticFileConfig,
    StaticServingDependency,
    StaticMediaSettings,
    UrlStaticMediaWiring,
    OsImport,
    DotenvLoading,
    DatabaseConfig,
    EnvFileBootstrap,
    GenerateRequirements,
    AllowedHosts,
    CsrfTrustedOrigins,
    EntryPointAlias,
    ManifestDependencyRewrite,
    PlatformDescriptor,
}

/// The whole catalogue, in apply order.
pub const CATALOGUE: &[Transformation] = &[
    Transformation::DebugFlag,
    Transformation::StaticFileConfig,
    Transformation::StaticServingDependency,
    Transformation::StaticMediaSettings,
    Transformation::UrlStaticMediaWiring,
    Transformation::OsImport,
    Transformation::DotenvLoading,
    Transformation::DatabaseConfig,
    Transformation::EnvFileBootstrap,
    Transformation::GenerateRequirements,
    Transformation::AllowedHosts,
    Transformation::CsrfTrustedOrigins,
    Transformation::EntryPointAlias,
    Transformation::ManifestDependencyRewrite,
    Transformation::PlatformDescriptor,
];

impl Transformation {
    pub fn id(&self) -> &'static str {
        match self {
            Self::DebugFlag => "debug-flag",
            Self::StaticFileConfig => "static-file-config",
            Self::StaticServingDependency => "static-serving-dependency",
            Self::StaticMediaSettings => "static-media-settings",
            Self::UrlStaticMediaWiring => "url-static-media-wiring",
            Self::OsImport => "os-import",
            Self::DotenvLoading => "dotenv-loading",
            Self::DatabaseConfig => "database-config",
            Self::EnvFileBootstrap => "env-file-bootstrap",
            Self::GenerateRequirements => "generate-requirements",
            Self::AllowedHosts => "allowed-hosts",
            Self::CsrfTrustedOrigins => "csrf-trusted-origins",
            Self::EntryPointAlias => "entry-point-alias",
            Self::ManifestDependencyRewrite => "manifest-dependency-rewrite",
            Self::PlatformDescriptor => "platform-descriptor",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        CATALOGUE.iter().copied().find(|t| t.id() == id)
    }

    /// Stable key re-identifying this transformation in a history log.
    ///
    /// Matched as a substring of the recorded description, so it must be
    /// unique across the catalogue and survive minor rewording of the
    /// logged message.
    pub fn description(&self) -> &'static str {
        match self {
            Self::DebugFlag => "Set DEBUG to False",
            Self::StaticFileConfig => "Configured static files",
            Self::StaticServingDependency => "Installed Whitenoise",
            Self::StaticMediaSettings => "Configured STATIC_URL, MEDIA_URL, and MEDIA_ROOT",
            Self::UrlStaticMediaWiring => "Configured static and media URL patterns",
            Self::OsImport => "Added 'import os'",
            Self::DotenvLoading => "Added 'from dotenv import load_dotenv'",
            Self::DatabaseConfig => "Added new database configuration",
            Self::EnvFileBootstrap => "Created .env file",
            Self::GenerateRequirements => "Generated requirements.txt",
            Self::AllowedHosts => "Updated ALLOWED_HOSTS",
            Self::CsrfTrustedOrigins => "Added CSRF_TRUSTED_ORIGINS",
            Self::EntryPointAlias => "Updated wsgi.py",
            Self::ManifestDependencyRewrite => "Replaced psycopg2 with psycopg2-binary",
            Self::PlatformDescriptor => "Created vercel.json",
        }
    }

    /// Full message written to the history log.
    pub fn log_message(&self) -> &'static str {
        match self {
            Self::StaticFileConfig => "Configured static files and added Whitenoise middleware",
            Self::StaticMediaSettings => {
                "Configured STATIC_URL, MEDIA_URL, and MEDIA_ROOT settings"
            }
            Self::UrlStaticMediaWiring => "Configured static and media URL patterns in urls.py",
            Self::OsImport => "Added 'import os' to settings.py",
            Self::DotenvLoading => {
                "Added 'from dotenv import load_dotenv' and 'load_dotenv()' to settings.py"
            }
            Self::EnvFileBootstrap => "Created .env file with database placeholders",
            Self::CsrfTrustedOrigins => "Added CSRF_TRUSTED_ORIGINS setting",
            Self::EntryPointAlias => "Updated wsgi.py to include 'app = application'",
            _ => self.description(),
        }
    }

    /// One-way transformations are never logged and never reversed.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, Self::ManifestDependencyRewrite)
    }

    /// Find the transformation that produced `entry`: by its id tag when
    /// present, otherwise by the first reversible catalogue entry whose
    /// description occurs in the recorded text.
    pub fn identify(entry: &HistoryEntry) -> Option<Self> {
        if let Some(found) = entry.tag().and_then(Self::from_id) {
            return found.is_reversible().then_some(found);
        }
        CATALOGUE
            .iter()
            .copied()
            .filter(Self::is_reversible)
            .find(|t| entry.description.contains(t.description()))
    }

    pub fn forward(&self, target: &Target<'_>) -> Result<Effect> {
        let ws = target.workspace;
        let effect = match self {
            Self::DebugFlag => {
                Effect::changed_if(settings::set_debug(&ws.settings(), settings::DEBUG_DISABLED)? > 0)
            }
            Self::StaticFileConfig => {
                let changed = settings::configure_static_files(&ws.settings())?;
                target
                    .runner
                    .run("python", &["manage.py", "collectstatic", "--noinput"]);
                Effect::changed_if(changed)
            }
            Self::StaticServingDependency => {
                target.runner.run("pip", &["install", "whitenoise"]);
                Effect::Applied
            }
            Self::StaticMediaSettings => {
                Effect::changed_if(settings::configure_static_and_media(&ws.settings())?)
            }
            Self::UrlStaticMediaWiring => {
                Effect::changed_if(routing::configure_url_patterns(&ws.urls())?)
            }
            Self::OsImport => Effect::changed_if(settings::add_os_import(&ws.settings())?),
            Self::DotenvLoading => {
                Effect::changed_if(settings::add_dotenv_loading(&ws.settings())?)
            }
            Self::DatabaseConfig => {
                settings::configure_database(&ws.settings())?;
                Effect::Applied
            }
            Self::EnvFileBootstrap => {
                Effect::changed_if(artifacts::create_env_file(&ws.env_file())?)
            }
            Self::GenerateRequirements => Effect::changed_if(artifacts::freeze_requirements(
                &ws.requirements(),
                target.runner,
            )?),
            Self::AllowedHosts => Effect::changed_if(
                settings::set_allowed_hosts(&ws.settings(), settings::ALLOWED_HOSTS_PLATFORM)? > 0,
            ),
            Self::CsrfTrustedOrigins => {
                Effect::changed_if(settings::add_csrf_trusted_origins(&ws.settings())?)
            }
            Self::EntryPointAlias => Effect::changed_if(routing::add_app_alias(&ws.wsgi())?),
            Self::ManifestDependencyRewrite => {
                Effect::changed_if(artifacts::use_binary_driver(&ws.requirements())? > 0)
            }
            Self::PlatformDescriptor => {
                artifacts::write_descriptor(ws)?;
                Effect::Applied
            }
        };
        Ok(effect)
    }

    pub fn inverse(&self, target: &Target<'_>) -> Result<()> {
        let ws = target.workspace;
        match self {
            Self::DebugFlag => {
                settings::set_debug(&ws.settings(), settings::DEBUG_ENABLED)?;
            }
            Self::StaticFileConfig => {
                settings::remove_static_file_config(&ws.settings())?;
            }
            Self::StaticServingDependency => {
                target.runner.run("pip", &["uninstall", "-y", "whitenoise"]);
                settings::remove_whitenoise_middleware(&ws.settings())?;
            }
            Self::StaticMediaSettings => {
                settings::remove_media_settings(&ws.settings())?;
            }
            Self::UrlStaticMediaWiring => routing::remove_url_patterns(&ws.urls())?,
            Self::OsImport => {
                settings::remove_os_import(&ws.settings())?;
            }
            Self::DotenvLoading => {
                settings::remove_dotenv_loading(&ws.settings())?;
            }
            Self::DatabaseConfig => settings::remove_database_config(&ws.settings())?,
            Self::EnvFileBootstrap => {
                artifacts::remove_file(&ws.env_file())?;
            }
            Self::GenerateRequirements => {
                artifacts::remove_file(&ws.requirements())?;
            }
            Self::AllowedHosts => {
                settings::set_allowed_hosts(&ws.settings(), settings::ALLOWED_HOSTS_EMPTY)?;
            }
            Self::CsrfTrustedOrigins => {
                settings::remove_csrf_trusted_origins(&ws.settings())?;
            }
            Self::EntryPointAlias => {
                routing::remove_app_alias(&ws.wsgi())?;
            }
            Self::ManifestDependencyRewrite => {}
            Self::PlatformDescriptor => {
                artifacts::remove_file(&ws.descriptor())?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for t in CATALOGUE {
            assert_eq!(Transformation::from_id(t.id()), Some(*t));
        }
        assert_eq!(Transformation::from_id("nope"), None);
    }

    #[test]
    fn test_log_message_contains_own_description_only() {
        for t in CATALOGUE {
            assert!(t.log_message().contains(t.description()), "{t}");
            for other in CATALOGUE.iter().filter(|o| *o != t) {
                assert!(
                    !t.log_message().contains(other.description()),
                    "{t} log message matches {other}"
                );
            }
        }
    }

    #[test]
    fn test_identify_prefers_tag_over_text() {
        let entry = HistoryEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            description: "Set DEBUG to False [allowed-hosts]".into(),
        };
        assert_eq!(Transformation::identify(&entry), Some(Transformation::AllowedHosts));
    }

    #[test]
    fn test_identify_untagged_by_substring() {
        let entry = HistoryEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            description: "Created .env file with database placeholders".into(),
        };
        assert_eq!(
            Transformation::identify(&entry),
            Some(Transformation::EnvFileBootstrap)
        );

        let legacy = HistoryEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            description: "Added 'from dotenv import load_dotenv' and 'load_dotenv()' to settings.py"
                .into(),
        };
        assert_eq!(
            Transformation::identify(&legacy),
            Some(Transformation::DotenvLoading)
        );
    }

    #[test]
    fn test_identify_skips_unknown_and_one_way_entries() {
        let unknown = HistoryEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            description: "Removed SQLite configuration".into(),
        };
        assert_eq!(Transformation::identify(&unknown), None);

        let one_way = HistoryEntry {
            timestamp: "2024-01-01 00:00:00".into(),
            description: "Replaced psycopg2 with psycopg2-binary [manifest-dependency-rewrite]"
                .into(),
        };
        assert_eq!(Transformation::identify(&one_way), None);
    }
}
