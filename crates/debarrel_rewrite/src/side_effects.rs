//! Decides whether loading a module has observable side effects.
//!
//! The answer comes from, in order: the global switch, the user's ignore list,
//! the `sideEffects` field of the package that owns the file, and finally the
//! configured default assumption.

use anyhow::{Context, Result};
use dashmap::DashMap;
use glob::{MatchOptions, Pattern};
use log::{debug, trace};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::config::SideEffectChecking;

#[derive(Debug, Clone)]
enum IgnoreRule {
    /// Every file below an ignored package directory.
    Subtree(PathBuf),
    /// One resolved module.
    File(PathBuf),
    /// Glob relative to the project root.
    Glob(Pattern),
}

/// What a package manifest says about its side effects.
#[derive(Debug)]
enum DeclaredSideEffects {
    Flag(bool),
    Patterns(Vec<Pattern>),
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    side_effects: Option<serde_json::Value>,
}

pub struct SideEffectClassifier {
    enabled: bool,
    default_assumption: bool,
    project_root: PathBuf,
    ignore: Vec<IgnoreRule>,
    packages: DashMap<PathBuf, Arc<DeclaredSideEffects>>,
}

impl SideEffectClassifier {
    /// Expands the ignore list once up front.
    ///
    /// Entries that name a directory under `<project_root>/node_modules` ignore
    /// that whole package; entries that `resolve_entry` can resolve ignore that
    /// exact file; anything else is a glob relative to the project root.
    /// Resolution failures and malformed globs are returned as errors.
    pub fn initialize<F>(checking: &SideEffectChecking, mut resolve_entry: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Option<PathBuf>>,
    {
        let project_root = checking.project_root.clone();
        let mut ignore = Vec::new();
        if checking.enabled {
            for entry in &checking.ignore_list {
                let rule = expand_ignore_entry(&project_root, entry, &mut resolve_entry)
                    .with_context(|| format!("Invalid side-effects ignore entry '{}'", entry))?;
                debug!("Side-effects ignore entry '{}' expanded to {:?}", entry, rule);
                ignore.push(rule);
            }
        }

        Ok(Self {
            enabled: checking.enabled,
            default_assumption: checking.default_assumption,
            project_root,
            ignore,
            packages: DashMap::new(),
        })
    }

    /// `true` when loading `file` must be assumed to do something observable.
    pub fn has_side_effects(&self, file: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        if self.is_ignored(file) {
            trace!("Side effects ignored for {}", file.display());
            return false;
        }

        let Some(package_root) = debarrel_core::find_package_root(file) else {
            return self.default_assumption;
        };
        let declared = self.declared_for(&package_root);
        let result = match declared.as_ref() {
            DeclaredSideEffects::Flag(flag) => *flag,
            DeclaredSideEffects::Patterns(patterns) => {
                let rel = relative_slash_path(file, &package_root);
                let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                patterns.iter().any(|p| {
                    if p.as_str().contains('/') {
                        p.matches_with(&rel, path_match_options())
                    } else {
                        p.matches(name)
                    }
                })
            }
            DeclaredSideEffects::Unknown => self.default_assumption,
        };
        trace!("Side effects for {}: {}", file.display(), result);
        result
    }

    fn is_ignored(&self, file: &Path) -> bool {
        self.ignore.iter().any(|rule| match rule {
            IgnoreRule::Subtree(dir) => file.starts_with(dir),
            IgnoreRule::File(path) => file == path,
            IgnoreRule::Glob(pattern) => {
                let rel = relative_slash_path(file, &self.project_root);
                pattern.matches_with(&rel, path_match_options())
            }
        })
    }

    fn declared_for(&self, package_root: &Path) -> Arc<DeclaredSideEffects> {
        if let Some(hit) = self.packages.get(package_root) {
            return Arc::clone(&hit);
        }
        let declared = Arc::new(read_declared_side_effects(package_root));
        self.packages.insert(package_root.to_path_buf(), Arc::clone(&declared));
        declared
    }
}

fn expand_ignore_entry<F>(project_root: &Path, entry: &str, resolve_entry: &mut F) -> Result<IgnoreRule>
where
    F: FnMut(&str) -> Result<Option<PathBuf>>,
{
    if looks_like_package_name(entry) {
        let (package, subpath) = debarrel_core::split_package_request(entry);
        let package_dir = project_root.join("node_modules").join(package);
        if subpath.is_empty() && package_dir.is_dir() {
            let dir = package_dir.canonicalize().unwrap_or(package_dir);
            return Ok(IgnoreRule::Subtree(dir));
        }
    }
    if !has_glob_chars(entry)
        && let Some(file) = resolve_entry(entry)?
    {
        return Ok(IgnoreRule::File(file));
    }
    let pattern = entry.trim_start_matches("./");
    Ok(IgnoreRule::Glob(Pattern::new(pattern)?))
}

fn looks_like_package_name(entry: &str) -> bool {
    !entry.starts_with('.') && !entry.starts_with('/') && !has_glob_chars(entry)
}

fn has_glob_chars(entry: &str) -> bool {
    entry.contains(['*', '?', '[', '{'])
}

/// Reads the `sideEffects` field of `<package_root>/package.json`.
///
/// Anything unexpected (unreadable manifest, odd value types, bad globs)
/// degrades to `Unknown` so classification never fails.
fn read_declared_side_effects(package_root: &Path) -> DeclaredSideEffects {
    let manifest_path = package_root.join("package.json");
    let manifest = fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|txt| serde_json::from_str::<PackageManifest>(&txt).ok())
        .unwrap_or_default();

    let declared = match manifest.side_effects {
        Some(serde_json::Value::Bool(flag)) => DeclaredSideEffects::Flag(flag),
        Some(serde_json::Value::String(pattern)) => patterns_from([pattern.as_str()]),
        Some(serde_json::Value::Array(items)) => {
            patterns_from(items.iter().filter_map(|item| item.as_str()))
        }
        _ => DeclaredSideEffects::Unknown,
    };
    debug!("Package {} declares side effects: {:?}", package_root.display(), declared);
    declared
}

fn patterns_from<'a>(raw: impl IntoIterator<Item = &'a str>) -> DeclaredSideEffects {
    let patterns = raw
        .into_iter()
        .filter_map(|p| Pattern::new(p.trim_start_matches("./")).ok())
        .collect();
    DeclaredSideEffects::Patterns(patterns)
}

/// `*` stays within one directory; `**` is needed to cross into subdirectories.
fn path_match_options() -> MatchOptions {
    MatchOptions { require_literal_separator: true, ..Default::default() }
}

fn relative_slash_path(file: &Path, base: &Path) -> String {
    let rel = file.strip_prefix(base).unwrap_or(file);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn checking(root: &Path, ignore_list: &[&str]) -> SideEffectChecking {
        SideEffectChecking {
            enabled: true,
            default_assumption: true,
            ignore_list: ignore_list.iter().map(|s| s.to_string()).collect(),
            project_root: root.to_path_buf(),
        }
    }

    fn no_resolve(_: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    #[test]
    fn test_disabled_is_always_pure() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = create_test_file(root, "a.js", "");
        let mut cfg = checking(root, &[]);
        cfg.enabled = false;

        let classifier = SideEffectClassifier::initialize(&cfg, no_resolve).unwrap();
        assert!(!classifier.has_side_effects(&file));
    }

    #[test]
    fn test_package_flag_and_default_assumption() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "node_modules/pure/package.json", r#"{ "sideEffects": false }"#);
        let pure = create_test_file(root, "node_modules/pure/index.js", "");
        create_test_file(root, "node_modules/silent/package.json", r#"{ "name": "silent" }"#);
        let silent = create_test_file(root, "node_modules/silent/index.js", "");

        let classifier = SideEffectClassifier::initialize(&checking(root, &[]), no_resolve).unwrap();
        assert!(!classifier.has_side_effects(&pure));
        assert!(classifier.has_side_effects(&silent));

        let mut cfg = checking(root, &[]);
        cfg.default_assumption = false;
        let classifier = SideEffectClassifier::initialize(&cfg, no_resolve).unwrap();
        assert!(!classifier.has_side_effects(&silent));
    }

    #[test]
    fn test_package_side_effect_globs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(
            root,
            "testmodule/package.json",
            r#"{ "sideEffects": ["./sideEffects.js", "./polyfills/*.js"] }"#,
        );
        let index = create_test_file(root, "testmodule/index.js", "");
        let effects = create_test_file(root, "testmodule/sideEffects.js", "");
        let nested = create_test_file(root, "testmodule/nested/sideEffects.js", "");
        let polyfill = create_test_file(root, "testmodule/polyfills/array.js", "");

        let classifier = SideEffectClassifier::initialize(&checking(root, &[]), no_resolve).unwrap();
        assert!(!classifier.has_side_effects(&index));
        assert!(classifier.has_side_effects(&effects));
        // Patterns without a slash match at any depth
        assert!(classifier.has_side_effects(&nested));
        assert!(classifier.has_side_effects(&polyfill));
    }

    #[test]
    fn test_package_glob_star_stays_in_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(
            root,
            "testmodule/package.json",
            r#"{ "sideEffects": ["./src/*.js", "./lib/**/*.js"] }"#,
        );
        let shallow = create_test_file(root, "testmodule/src/x.js", "");
        let deep = create_test_file(root, "testmodule/src/deep/x.js", "");
        let lib_deep = create_test_file(root, "testmodule/lib/deep/x.js", "");

        let classifier = SideEffectClassifier::initialize(&checking(root, &[]), no_resolve).unwrap();
        assert!(classifier.has_side_effects(&shallow));
        assert!(!classifier.has_side_effects(&deep));
        assert!(classifier.has_side_effects(&lib_deep));
    }

    #[test]
    fn test_ignore_package_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        create_test_file(&root, "node_modules/noisy/package.json", r#"{ "sideEffects": true }"#);
        let file = create_test_file(&root, "node_modules/noisy/lib/a.js", "");

        let classifier =
            SideEffectClassifier::initialize(&checking(&root, &["noisy"]), no_resolve).unwrap();
        assert!(!classifier.has_side_effects(&file));
    }

    #[test]
    fn test_ignore_resolved_file_and_glob() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": true }"#);
        let resolved = create_test_file(root, "src/setup.js", "");
        let globbed = create_test_file(root, "src/polyfills/fetch.js", "");
        let other = create_test_file(root, "src/other.js", "");

        let target = resolved.clone();
        let classifier = SideEffectClassifier::initialize(
            &checking(root, &["./src/setup", "src/polyfills/*.js"]),
            move |entry: &str| Ok((entry == "./src/setup").then(|| target.clone())),
        )
        .unwrap();
        assert!(!classifier.has_side_effects(&resolved));
        assert!(!classifier.has_side_effects(&globbed));
        assert!(classifier.has_side_effects(&other));
    }

    #[test]
    fn test_resolution_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let result = SideEffectClassifier::initialize(
            &checking(temp_dir.path(), &["some-lib/entry"]),
            |_: &str| Err(anyhow::anyhow!("resolver exploded")),
        );
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("some-lib/entry"));
        assert!(message.contains("resolver exploded"));
    }

    #[test]
    fn test_malformed_manifest_uses_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "pkg/package.json", "{ not json");
        let file = create_test_file(root, "pkg/a.js", "");

        let classifier = SideEffectClassifier::initialize(&checking(root, &[]), no_resolve).unwrap();
        assert!(classifier.has_side_effects(&file));
    }
}
