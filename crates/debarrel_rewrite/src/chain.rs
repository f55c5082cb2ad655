//! Follows an import through re-export chains to the module that declares it.
//!
//! Every step looks the current binding up among the exports of the module it
//! points at. A re-export (`export { x } from './y'`) or a local export of an
//! imported binding moves the walk on; namespaces, default imports (unless
//! enabled), unresolved requests, unparsable files, side-effecting modules
//! (unless enabled) and locally declared bindings end it.

use anyhow::{Context, Result};
use debarrel_core::{
    BindingKind, DEFAULT_EXPORT, DecoratedPath, ExportSpecifier, ImportSpecifier,
};
use log::{debug, trace, warn};
use serde::Serialize;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{cache::FileRecord, session::Session};

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    NamespaceBoundary,
    DefaultBoundary,
    Unresolvable,
    ParseFailure,
    SideEffectBoundary,
    NoMatchingExport,
    LocalDeclaration,
    Cycle,
}

/// A link in the chain: either an import or a re-export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    Import(ImportSpecifier),
    Export(ExportSpecifier),
}

impl Specifier {
    pub fn kind(&self) -> BindingKind {
        match self {
            Specifier::Import(s) => s.kind,
            Specifier::Export(s) => s.kind,
        }
    }

    pub fn search_name(&self) -> &str {
        match self {
            Specifier::Import(s) => &s.search_name,
            Specifier::Export(s) => &s.search_name,
        }
    }

    pub fn source_path(&self) -> Option<&DecoratedPath> {
        match self {
            Specifier::Import(s) => s.source_path.as_ref(),
            Specifier::Export(s) => s.source_path.as_ref(),
        }
    }

    /// Local binding for imports, exported name for exports.
    pub fn binding_name(&self) -> &str {
        match self {
            Specifier::Import(s) => &s.local_name,
            Specifier::Export(s) => &s.exported_name,
        }
    }

    /// The module request as originally written, if any.
    pub fn request(&self) -> Option<&str> {
        match self {
            Specifier::Import(s) => Some(&s.request),
            Specifier::Export(s) => s.request.as_deref(),
        }
    }
}

/// Outcome of one walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The last link reached; its `source_path` is where the binding lives.
    pub terminal: Specifier,
    pub reason: StopReason,
    /// Hops taken before stopping.
    pub depth: usize,
    /// Side-effecting modules that were walked through, in order.
    pub side_effect_hops: Vec<DecoratedPath>,
}

/// Walks from `start` until a stop condition holds.
///
/// Only collaborator failures (unreadable files, resolver errors) are
/// returned as errors; every other dead end is a [`StopReason`].
pub fn resolve_chain(session: &Session, start: Specifier) -> Result<Resolution> {
    let options = session.options();
    let mut current = start;
    let mut depth = 0;
    let mut side_effect_hops: Vec<DecoratedPath> = Vec::new();
    let mut visited: HashSet<(PathBuf, String)> = HashSet::new();

    let reason = loop {
        if current.kind() == BindingKind::Namespace {
            break StopReason::NamespaceBoundary;
        }
        if current.kind() == BindingKind::Default && !options.follow_default_imports {
            break StopReason::DefaultBoundary;
        }
        let Some(source) = current.source_path().cloned() else {
            break StopReason::Unresolvable;
        };
        let search_name = current.search_name().to_string();

        if !visited.insert((source.path.clone(), search_name.clone())) {
            warn!(
                "Re-export cycle detected at '{}' in {} after {} hops",
                search_name,
                source.path.display(),
                depth
            );
            break StopReason::Cycle;
        }

        let record = session.record(&source.path).with_context(|| {
            format!("Failed to load {} while resolving '{}'", source.path.display(), search_name)
        })?;
        let Some(record) = record else {
            break StopReason::ParseFailure;
        };

        if record.has_side_effects {
            if !options.follow_through_side_effects {
                break StopReason::SideEffectBoundary;
            }
            trace!("Walking through side-effecting module {}", source.path.display());
            side_effect_hops.push(source.clone());
        }

        // First match in source order wins
        let next = match record.exports().iter().find(|e| e.exported_name == search_name) {
            Some(export) if export.is_reexport() => Specifier::Export(export.clone()),
            Some(export) => {
                let import = export
                    .local_name
                    .as_deref()
                    .and_then(|local| record.imports().iter().find(|i| i.local_name == local));
                match import {
                    Some(import) => Specifier::Import(import.clone()),
                    None => break StopReason::LocalDeclaration,
                }
            }
            None => match star_provider(session, &record, &search_name, &mut HashSet::new())? {
                Some(star) => Specifier::Export(ExportSpecifier {
                    local_name: Some(search_name.clone()),
                    exported_name: search_name.clone(),
                    search_name: search_name.clone(),
                    request: star.request.clone(),
                    source_path: star.source_path.clone(),
                    kind: BindingKind::Named,
                }),
                None => break StopReason::NoMatchingExport,
            },
        };

        depth += 1;
        trace!(
            "Hop {}: '{}' in {} -> '{}' via {:?}",
            depth,
            search_name,
            source.path.display(),
            next.search_name(),
            next.request()
        );
        current = next;
    };

    // Importing the terminal module already runs its side effects
    if let Some(target) = current.source_path() {
        side_effect_hops.retain(|hop| hop.path != target.path);
    }
    debug!(
        "Resolved '{}' to {:?} after {} hops ({:?})",
        current.search_name(),
        current.source_path().map(|p| p.path.display().to_string()),
        depth,
        reason
    );
    Ok(Resolution { terminal: current, reason, depth, side_effect_hops })
}

/// Convenience wrapper for import specifiers.
pub fn resolve_import(session: &Session, start: &ImportSpecifier) -> Result<Resolution> {
    resolve_chain(session, Specifier::Import(start.clone()))
}

/// Finds the first `export * from` of `record` whose target provides `name`,
/// directly or through further star re-exports. `default` is never
/// re-exported by a star.
fn star_provider<'r>(
    session: &Session,
    record: &'r FileRecord,
    name: &str,
    seen: &mut HashSet<PathBuf>,
) -> Result<Option<&'r ExportSpecifier>> {
    if name == DEFAULT_EXPORT {
        return Ok(None);
    }
    for star in record.exports().iter().filter(|e| e.is_star()) {
        let Some(source) = &star.source_path else {
            continue;
        };
        if provides(session, &source.path, name, seen)? {
            return Ok(Some(star));
        }
    }
    Ok(None)
}

fn provides(session: &Session, path: &Path, name: &str, seen: &mut HashSet<PathBuf>) -> Result<bool> {
    if !seen.insert(path.to_path_buf()) {
        return Ok(false);
    }
    let Some(record) = session.record(path)? else {
        return Ok(false);
    };
    if record.exports().iter().any(|e| e.exported_name == name) {
        return Ok(true);
    }
    Ok(star_provider(session, &record, name, seen)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use std::{collections::HashMap, fs};
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn session_with(root: &Path, configure: impl FnOnce(&mut Options)) -> Session {
        let mut options = Options::new(root);
        configure(&mut options);
        Session::new(root.to_path_buf(), HashMap::new(), options).unwrap()
    }

    /// Resolves the first import of `entry`.
    fn resolve_first(session: &Session, entry: &Path) -> Resolution {
        let specs = session.specifiers_for(entry).unwrap().unwrap();
        resolve_import(session, &specs.imports[0]).unwrap()
    }

    fn terminal_file(resolution: &Resolution) -> String {
        let path = &resolution.terminal.source_path().unwrap().path;
        path.file_name().unwrap().to_string_lossy().to_string()
    }

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": ["./lib/noisy.js"] }"#);
        create_test_file(
            root,
            "lib/index.js",
            "export { default as first } from './first';\n\
             export { second as renamed } from './middle';\n\
             export * as ns from './first';\n\
             export { loud } from './noisy';\n\
             import imported from './first';\n\
             export { imported };\n\
             const local = 1;\n\
             export { local };",
        );
        create_test_file(root, "lib/first.js", "export default function first() {}");
        create_test_file(root, "lib/middle.js", "export { second } from './second';");
        create_test_file(root, "lib/second.js", "export function second() {}");
        create_test_file(root, "lib/noisy.js", "console.log('hi');\nexport { loud } from './quiet';");
        create_test_file(root, "lib/quiet.js", "export const loud = 1;");
        temp_dir
    }

    #[test]
    fn test_named_chain_through_two_reexports() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { renamed } from '../lib';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::LocalDeclaration);
        assert_eq!(resolution.depth, 2);
        assert_eq!(terminal_file(&resolution), "second.js");
        assert_eq!(resolution.terminal.search_name(), "second");
    }

    #[test]
    fn test_reexported_default_stops_at_default_boundary() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { first } from '../lib';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::DefaultBoundary);
        assert_eq!(resolution.depth, 1);
        assert_eq!(resolution.terminal.kind(), BindingKind::Default);
        assert_eq!(terminal_file(&resolution), "first.js");
    }

    #[test]
    fn test_default_import_is_its_own_terminal() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import first from '../lib/first';");
        let session = session_with(root, |_| {});

        let specs = session.specifiers_for(&entry).unwrap().unwrap();
        let resolution = resolve_import(&session, &specs.imports[0]).unwrap();
        assert_eq!(resolution.reason, StopReason::DefaultBoundary);
        assert_eq!(resolution.depth, 0);
        assert_eq!(resolution.terminal, Specifier::Import(specs.imports[0].clone()));
    }

    #[test]
    fn test_follow_default_imports_through_local_import() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { imported } from '../lib';");

        let session = session_with(root, |_| {});
        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::DefaultBoundary);
        assert_eq!(terminal_file(&resolution), "first.js");

        let session = session_with(root, |o| o.follow_default_imports = true);
        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::LocalDeclaration);
        assert_eq!(terminal_file(&resolution), "first.js");
        assert_eq!(resolution.terminal.kind(), BindingKind::Default);
    }

    #[test]
    fn test_namespace_import_never_moves() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import * as lib from '../lib';");
        let session = session_with(root, |o| o.follow_default_imports = true);

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::NamespaceBoundary);
        assert_eq!(resolution.depth, 0);
        assert_eq!(terminal_file(&resolution), "index.js");
    }

    #[test]
    fn test_namespace_reexport_stops_on_target() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { ns } from '../lib';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::NamespaceBoundary);
        assert_eq!(terminal_file(&resolution), "first.js");
    }

    #[test]
    fn test_local_declaration_in_barrel() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { local } from '../lib';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::LocalDeclaration);
        assert_eq!(resolution.depth, 0);
        assert_eq!(terminal_file(&resolution), "index.js");
    }

    #[test]
    fn test_side_effect_boundary_and_follow_through() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { loud } from '../lib';");

        let session = session_with(root, |_| {});
        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::SideEffectBoundary);
        assert_eq!(terminal_file(&resolution), "noisy.js");
        assert!(resolution.side_effect_hops.is_empty());

        let session = session_with(root, |o| o.follow_through_side_effects = true);
        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::LocalDeclaration);
        assert_eq!(terminal_file(&resolution), "quiet.js");
        assert_eq!(resolution.side_effect_hops.len(), 1);
        assert!(resolution.side_effect_hops[0].path.ends_with("lib/noisy.js"));
    }

    #[test]
    fn test_side_effect_checking_disabled() {
        let temp_dir = fixture();
        let root = temp_dir.path();
        let entry = create_test_file(root, "src/app.js", "import { loud } from '../lib';");
        let session = session_with(root, |o| o.side_effects.enabled = false);

        let resolution = resolve_first(&session, &entry);
        assert_eq!(terminal_file(&resolution), "quiet.js");
        assert!(resolution.side_effect_hops.is_empty());
    }

    #[test]
    fn test_first_matching_export_wins() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        create_test_file(
            root,
            "lib/index.js",
            "export { dup } from './one';\nexport { dup } from './two';",
        );
        create_test_file(root, "lib/one.js", "export const dup = 1;");
        create_test_file(root, "lib/two.js", "export const dup = 2;");
        let entry = create_test_file(root, "src/app.js", "import { dup } from '../lib';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(terminal_file(&resolution), "one.js");
    }

    #[test]
    fn test_star_reexports() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        create_test_file(root, "lib/index.js", "export * from './a';\nexport * from './b';");
        create_test_file(root, "lib/a.js", "export const fromA = 1;");
        create_test_file(root, "lib/b.js", "export * from './c';");
        create_test_file(root, "lib/c.js", "export function fromC() {}");
        let entry = create_test_file(root, "src/app.js", "import { fromC, missing } from '../lib';");
        let session = session_with(root, |_| {});

        let specs = session.specifiers_for(&entry).unwrap().unwrap();
        let resolution = resolve_import(&session, &specs.imports[0]).unwrap();
        assert_eq!(resolution.reason, StopReason::LocalDeclaration);
        assert_eq!(terminal_file(&resolution), "c.js");

        let resolution = resolve_import(&session, &specs.imports[1]).unwrap();
        assert_eq!(resolution.reason, StopReason::NoMatchingExport);
        assert_eq!(terminal_file(&resolution), "index.js");
    }

    #[test]
    fn test_reexport_cycle_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        create_test_file(root, "a.js", "export { x } from './b';");
        create_test_file(root, "b.js", "export { x } from './a';");
        let entry = create_test_file(root, "app.js", "import { x } from './a';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::Cycle);
        assert_eq!(resolution.depth, 2);
    }

    #[test]
    fn test_star_cycle_terminates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        create_test_file(root, "a.js", "export * from './b';");
        create_test_file(root, "b.js", "export * from './a';");
        let entry = create_test_file(root, "app.js", "import { x } from './a';");
        let session = session_with(root, |_| {});

        let resolution = resolve_first(&session, &entry);
        assert_eq!(resolution.reason, StopReason::NoMatchingExport);
    }

    #[test]
    fn test_unresolvable_and_unparsable_targets() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", r#"{ "sideEffects": false }"#);
        create_test_file(root, "styles.css", ".a {}");
        let entry = create_test_file(
            root,
            "app.js",
            "import { a } from 'not-installed';\nimport { b } from './styles.css';",
        );
        let session = session_with(root, |_| {});

        let specs = session.specifiers_for(&entry).unwrap().unwrap();
        let resolution = resolve_import(&session, &specs.imports[0]).unwrap();
        assert_eq!(resolution.reason, StopReason::Unresolvable);
        let resolution = resolve_import(&session, &specs.imports[1]).unwrap();
        assert_eq!(resolution.reason, StopReason::ParseFailure);
    }
}
