//! Barrel import rewriting for JavaScript/TypeScript projects.
//!
//! Imports that go through barrel files (`index.js` modules that only
//! re-export) are followed to the module that actually declares each binding
//! and rewritten to import from there directly. Modules that declare side
//! effects act as boundaries unless following through them is enabled, in
//! which case they are kept alive as bare imports.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use debarrel_rewrite::{Config, run_rewrite};
//! use std::io::{BufWriter, Write};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = Config {
//!     root: Some(std::path::PathBuf::from("/path/to/project")),
//!     filter: None,
//!     follow_default_imports: false,
//!     follow_through_side_effects: true,
//!     no_side_effect_checking: false,
//!     assume_pure: false,
//!     side_effects_ignore: vec![],
//!     project_root: None,
//!     write: false,
//!     json: false,
//!     tsconfig_paths: Default::default(),
//! };
//!
//! let result = run_rewrite(cfg)?;
//!
//! if !result.changes.is_empty() {
//!     let mut stdout = BufWriter::new(std::io::stdout());
//!     debarrel_rewrite::print_changes_tree(&mut stdout, &result)?;
//!     stdout.flush()?;
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod chain;
mod config;
mod emitter;
mod planner;
mod reporter;
mod runner;
mod session;
mod side_effects;
mod transform;
mod types;

// Re-export public API
pub use cache::{FileCache, FileRecord};
pub use chain::{Resolution, Specifier, StopReason, resolve_chain, resolve_import};
pub use config::{Config, Options, SideEffectChecking};
pub use emitter::{TextEdit, apply_edits};
pub use planner::{PlanEntry, Planner, RewritePlan};
pub use reporter::{print_changes_tree, print_no_changes_message};
pub use runner::run_rewrite;
pub use session::Session;
pub use side_effects::SideEffectClassifier;
pub use transform::{transform_file, transform_source};
pub use types::{FileOutcome, RunResult};
