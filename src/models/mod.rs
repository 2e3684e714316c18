//! Data types shared by the engine.
//!
//! - [`Policy`]: which groups of changes an apply run performs, loaded from YAML.
//! - [`Workspace`]: the project root and module, and every target path derived from them.
//! - [`HistoryEntry`]: one line of the append-only deployment history log.

mod history;
mod policy;
mod workspace;

pub use history::*;
pub use policy::*;
pub use workspace::*;
