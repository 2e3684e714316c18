//! External commands (package installs, asset collection, dependency freeze).
//!
//! Commands are fire-and-forget: a failure is logged and otherwise ignored,
//! never retried, and never aborts the run.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::Command;

/// Runs external commands from the workspace root.
pub trait CommandRunner {
    /// Run a command for its side effects.
    fn run(&self, program: &str, args: &[&str]);

    /// Run a command and return its standard output, or `None` if it could
    /// not be run or exited unsuccessfully.
    fn capture(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// Spawns real processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    cwd: PathBuf,
}

impl SystemRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) {
        tracing::debug!("Running {} {}", program, args.join(" "));
        match Command::new(program).args(args).current_dir(&self.cwd).status() {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("{} {} exited with {}", program, args.join(" "), status),
            Err(e) => tracing::warn!("Failed to run {}: {}", program, e),
        }
    }

    fn capture(&self, program: &str, args: &[&str]) -> Option<String> {
        tracing::debug!("Capturing {} {}", program, args.join(" "));
        match Command::new(program).args(args).current_dir(&self.cwd).output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                tracing::warn!(
                    "{} {} exited with {}",
                    program,
                    args.join(" "),
                    output.status
                );
                None
            }
            Err(e) => {
                tracing::warn!("Failed to run {}: {}", program, e);
                None
            }
        }
    }
}

/// Records commands instead of running them.
///
/// `capture` returns the canned output set with [`RecordingRunner::with_output`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<String>>,
    output: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            calls: RefCell::default(),
            output: Some(output.into()),
        }
    }

    /// Every command seen so far, as `program arg1 arg2 ...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, program: &str, args: &[&str]) {
        let mut call = program.to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.calls.borrow_mut().push(call);
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) {
        self.record(program, args);
    }

    fn capture(&self, program: &str, args: &[&str]) -> Option<String> {
        self.record(program, args);
        self.output.clone()
    }
}
