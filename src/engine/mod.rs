//! Apply and reverse runs over a resolved workspace.
//!
//! Apply walks the enabled transformations in catalogue order, runs each
//! forward effect and records every effect that changed something. Reverse
//! replays the history log newest first through the matching inverses and
//! deletes the log once all entries are handled.
//!
//! Neither mode rolls back: an I/O failure stops the run where it happened,
//! leaving earlier changes (and, for reverse, the log) in place.

use std::path::PathBuf;

use crate::catalogue::{Effect, Target, Transformation, CATALOGUE};
use crate::console::Console;
use crate::error::Result;
use crate::history::HistoryLog;
use crate::models::{HistoryEntry, Policy, Workspace};
use crate::runner::CommandRunner;

/// Outcome of an apply run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Transformations that changed something, in the order they ran.
    pub applied: Vec<Transformation>,
    /// Transformations that found nothing to do.
    pub unchanged: Vec<Transformation>,
    /// History entries written, oldest first.
    pub logged: Vec<HistoryEntry>,
}

/// Outcome of a reverse run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReverseReport {
    /// Inverses run, newest log entry first.
    pub reversed: Vec<Transformation>,
    /// Log entries no catalogue transformation claimed.
    pub skipped: Vec<HistoryEntry>,
}

pub struct Engine<'a> {
    workspace: Workspace,
    log: HistoryLog,
    runner: &'a dyn CommandRunner,
    console: Console,
}

impl<'a> Engine<'a> {
    pub fn new(workspace: Workspace, runner: &'a dyn CommandRunner, console: Console) -> Self {
        let log = HistoryLog::new(workspace.history_log());
        Self {
            workspace,
            log,
            runner,
            console,
        }
    }

    /// Resolve the project under `root` from the policy (or by searching the
    /// tree) and build an engine for it.
    pub fn resolve(
        root: impl Into<PathBuf>,
        policy: &Policy,
        runner: &'a dyn CommandRunner,
        console: Console,
    ) -> Result<Self> {
        let workspace = Workspace::resolve(root, policy.project_name())?;
        tracing::info!(
            "Using project '{}' in {}",
            workspace.project(),
            workspace.root().display()
        );
        Ok(Self::new(workspace, runner, console))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &HistoryLog {
        &self.log
    }

    /// The transformations `policy` enables, in the order they run.
    pub fn plan(policy: &Policy) -> Vec<Transformation> {
        CATALOGUE
            .iter()
            .copied()
            .filter(|t| match t {
                Transformation::DebugFlag => policy.set_debug_false,
                Transformation::StaticFileConfig
                | Transformation::StaticServingDependency
                | Transformation::StaticMediaSettings
                | Transformation::UrlStaticMediaWiring => policy.configure_static_files,
                Transformation::OsImport
                | Transformation::DotenvLoading
                | Transformation::DatabaseConfig
                | Transformation::EnvFileBootstrap => policy.configure_database,
                Transformation::GenerateRequirements => policy.generate_requirements,
                Transformation::AllowedHosts
                | Transformation::CsrfTrustedOrigins
                | Transformation::EntryPointAlias
                | Transformation::ManifestDependencyRewrite
                | Transformation::PlatformDescriptor => true,
            })
            .collect()
    }

    pub fn apply(&self, policy: &Policy) -> Result<ApplyReport> {
        self.console
            .announce("Configuring Django project for Vercel deployment...");

        let target = Target::new(&self.workspace, self.runner);
        let mut report = ApplyReport::default();

        for transformation in Self::plan(policy) {
            match transformation.forward(&target)? {
                Effect::Applied => {
                    tracing::info!("Applied {}", transformation);
                    if transformation.is_reversible() {
                        let entry = self
                            .log
                            .append(transformation.log_message(), transformation.id())?;
                        report.logged.push(entry);
                    }
                    report.applied.push(transformation);
                }
                Effect::Unchanged => {
                    tracing::debug!("{} already in place", transformation);
                    report.unchanged.push(transformation);
                }
            }
        }

        self.console
            .announce("Django project configured for Vercel deployment.");
        Ok(report)
    }

    pub fn reverse(&self) -> Result<ReverseReport> {
        let entries = self.log.entries()?;

        self.console
            .announce("Reversing Django project configuration...");

        let target = Target::new(&self.workspace, self.runner);
        let mut report = ReverseReport::default();

        for entry in entries.into_iter().rev() {
            let Some(transformation) = Transformation::identify(&entry) else {
                tracing::debug!("No transformation matches {:?}, skipping", entry.description);
                report.skipped.push(entry);
                continue;
            };

            transformation.inverse(&target)?;
            tracing::info!("Reversed {}", transformation);
            self.console.line(&format!("Reversed: {}", entry.message()));
            report.reversed.push(transformation);
        }

        self.log.clear()?;

        self.console.announce("Django project configuration reversed.");
        Ok(report)
    }
}
