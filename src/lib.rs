//! Reversible deployment configuration for generated Django projects.
//!
//! An apply run edits a project's settings, routing and entry-point modules
//! (and writes a few root-level files) so it can be deployed to Vercel,
//! recording each change in `deployment_history.log`. A later reverse run
//! replays that log backwards through hand-written inverse edits.

pub mod catalogue;
pub mod console;
pub mod editor;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;
pub mod runner;

pub use error::{Error, Result};
