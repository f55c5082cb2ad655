use anyhow::Result;
use debarrel_core::{DecoratedPath, ModuleSpecifiers, ResolveCache};
use log::debug;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    cache::{FileCache, FileRecord},
    config::Options,
    side_effects::SideEffectClassifier,
};

/// Shared state for one run: options, resolver memo, record cache and
/// side-effect classifier. Safe to share across rayon workers.
pub struct Session {
    options: Options,
    root: PathBuf,
    tsconfig_paths: HashMap<String, Vec<String>>,
    resolve_cache: ResolveCache,
    records: FileCache,
    side_effects: SideEffectClassifier,
}

impl Session {
    /// Validates `options` and expands the side-effect ignore list.
    ///
    /// Ignore entries are resolved as if requested from a module sitting in
    /// the project root.
    pub fn new(
        root: PathBuf,
        tsconfig_paths: HashMap<String, Vec<String>>,
        options: Options,
    ) -> Result<Self> {
        options.validate()?;
        let resolve_cache = ResolveCache::new();
        let issuer = options.side_effects.project_root.join("package.json");
        let side_effects = SideEffectClassifier::initialize(&options.side_effects, |entry| {
            let resolved =
                debarrel_core::resolve(&root, &tsconfig_paths, &issuer, entry, &resolve_cache)?;
            Ok(resolved.map(|p| p.path))
        })?;
        debug!(
            "Session ready (follow defaults: {}, follow side effects: {}, side-effect checking: {})",
            options.follow_default_imports,
            options.follow_through_side_effects,
            options.side_effects.enabled
        );

        Ok(Self { options, root, tsconfig_paths, resolve_cache, records: FileCache::new(), side_effects })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `request` as written in `from_file`.
    pub fn resolve(&self, from_file: &Path, request: &str) -> Result<Option<DecoratedPath>> {
        debarrel_core::resolve(&self.root, &self.tsconfig_paths, from_file, request, &self.resolve_cache)
    }

    /// Extracts the specifiers of `file` from disk, bypassing the record cache.
    pub fn specifiers_for(&self, file: &Path) -> Result<Option<ModuleSpecifiers>> {
        debarrel_core::specifiers_for(file, |request| self.resolve(file, request))
    }

    /// Same as [`Session::specifiers_for`] for text already in memory.
    pub fn specifiers_for_source(&self, file: &Path, src: &str) -> Result<Option<ModuleSpecifiers>> {
        debarrel_core::specifiers_for_source(file, src, |request| self.resolve(file, request))
    }

    /// The cached record of `path`, loading it on first use.
    pub fn record(&self, path: &Path) -> Result<Option<Arc<FileRecord>>> {
        self.records.get_or_load(path, || {
            let Some(specifiers) = self.specifiers_for(path)? else {
                return Ok(None);
            };
            let has_side_effects = self.side_effects.has_side_effects(path);
            Ok(Some(FileRecord { specifiers, has_side_effects }))
        })
    }

    pub fn has_side_effects(&self, path: &Path) -> bool {
        self.side_effects.has_side_effects(path)
    }

    /// Number of modules looked at so far.
    pub fn records_loaded(&self) -> usize {
        self.records.len()
    }

    /// Number of distinct requests resolved so far.
    pub fn requests_resolved(&self) -> usize {
        self.resolve_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    #[test]
    fn test_record_is_loaded_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        let lib = create_test_file(root, "lib.js", "export const a = 1;");
        let session = Session::new(root.to_path_buf(), HashMap::new(), Options::new(root)).unwrap();

        let first = session.record(&lib).unwrap().unwrap();
        let second = session.record(&lib).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.has_side_effects);
        assert_eq!(first.exports()[0].exported_name, "a");
        assert_eq!(session.records_loaded(), 1);
    }

    #[test]
    fn test_unparsable_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let broken = create_test_file(root, "broken.js", "export const = ;");
        let session = Session::new(root.to_path_buf(), HashMap::new(), Options::new(root)).unwrap();

        assert!(session.record(&broken).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let session = Session::new(root.to_path_buf(), HashMap::new(), Options::new(root)).unwrap();

        assert!(session.record(&root.join("gone.js")).is_err());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let result = Session::new(root.to_path_buf(), HashMap::new(), Options::new("relative"));
        assert!(result.is_err());
    }

    #[test]
    fn test_ignore_entry_resolved_from_project_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        create_test_file(&root, "package.json", r#"{ "sideEffects": true }"#);
        let setup = create_test_file(&root, "src/setup.js", "window.x = 1;");
        let other = create_test_file(&root, "src/other.js", "window.y = 1;");

        let mut options = Options::new(&root);
        options.side_effects.ignore_list = vec!["./src/setup".to_string()];
        let session = Session::new(root.clone(), HashMap::new(), options).unwrap();

        assert!(!session.has_side_effects(&setup));
        assert!(session.has_side_effects(&other));
    }
}
