use serde::Serialize;
use std::path::PathBuf;

use crate::planner::RewritePlan;

/// What rewriting one file produced.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub declarations_rewritten: usize,
    pub specifiers_rewritten: usize,
    pub plan: RewritePlan,
    /// New file contents, `None` when nothing changed.
    #[serde(skip)]
    pub output: Option<String>,
}

impl FileOutcome {
    pub fn unchanged(path: PathBuf) -> Self {
        Self {
            path,
            declarations_rewritten: 0,
            specifiers_rewritten: 0,
            plan: RewritePlan::default(),
            output: None,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub root: PathBuf,
    pub files_scanned: usize,
    pub files_changed: usize,
    /// Files skipped because reading or resolving them failed.
    pub files_failed: usize,
    pub specifiers_rewritten: usize,
    pub modules_loaded: usize,
    /// Whether changes were written back to disk.
    pub written: bool,
    pub changes: Vec<FileOutcome>,
}
