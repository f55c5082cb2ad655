use anyhow::{Result, anyhow};
use dashmap::DashMap;
use debarrel_core::{ExportSpecifier, ImportSpecifier, ModuleSpecifiers};
use log::trace;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

/// Specifiers and side-effect status of one module, computed once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub specifiers: ModuleSpecifiers,
    pub has_side_effects: bool,
}

impl FileRecord {
    pub fn imports(&self) -> &[ImportSpecifier] {
        &self.specifiers.imports
    }

    pub fn exports(&self) -> &[ExportSpecifier] {
        &self.specifiers.exports
    }
}

/// `None` means the file could not be turned into a record (not JS, or
/// unparsable). Failures are kept as text so every waiter can see them.
type Slot = Arc<OnceLock<Result<Option<Arc<FileRecord>>, String>>>;

/// Per-session memo of [`FileRecord`]s keyed by absolute path.
///
/// Entries are written once and never touched again. Concurrent requests for
/// a path that is still loading wait on the same slot instead of loading it a
/// second time.
#[derive(Default)]
pub struct FileCache {
    slots: DashMap<PathBuf, Slot>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Option<Arc<FileRecord>>>
    where
        F: FnOnce() -> Result<Option<FileRecord>>,
    {
        // Clone the slot out so the map shard is unlocked while loading
        let slot = Arc::clone(self.slots.entry(path.to_path_buf()).or_default().value());
        if slot.get().is_some() {
            trace!("Cache hit for record: {}", path.display());
        }
        match slot.get_or_init(|| load().map(|r| r.map(Arc::new)).map_err(|e| format!("{:#}", e))) {
            Ok(record) => Ok(record.clone()),
            Err(message) => Err(anyhow!("{}", message)),
        }
    }

    /// Number of paths requested so far, loaded or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
