use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{debug, trace};
use path_clean::clean;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    constants::{INDEX_FILES, RESOLVE_EXTENSIONS},
    types::DecoratedPath,
};

/// Memo of `(issuer, core request) -> resolved file`.
pub type ResolveCache = DashMap<(PathBuf, String), Option<PathBuf>>;

/// Resolves `request` as written in `from_file` to an absolute file.
///
/// Loader prefixes and query/hash suffixes are split off first and carried
/// over untouched onto the result. Returns `Ok(None)` for requests that do not
/// land on a file (builtins, missing packages, unknown aliases).
pub fn resolve(
    root: &Path,
    tsconfig_paths: &HashMap<String, Vec<String>>,
    from_file: &Path,
    request: &str,
    cache: &ResolveCache,
) -> Result<Option<DecoratedPath>> {
    let (_, core, _) = DecoratedPath::split(request);
    let key = (from_file.to_path_buf(), core.to_string());
    if let Some(v) = cache.get(&key) {
        trace!("Cache hit for resolve: '{}' from {}", request, from_file.display());
        return Ok(v.clone().map(|p| DecoratedPath::from_request(request, p)));
    }
    trace!("Resolving: '{}' from {}", request, from_file.display());

    let resolved = resolve_core(root, tsconfig_paths, from_file, core)
        .with_context(|| format!("Failed to resolve '{}' from {}", request, from_file.display()))?;

    cache.insert(key, resolved.clone());
    if let Some(p) = &resolved {
        debug!("Resolved '{}' from {} to {}", request, from_file.display(), p.display());
    }
    Ok(resolved.map(|p| DecoratedPath::from_request(request, p)))
}

fn resolve_core(
    root: &Path,
    tsconfig_paths: &HashMap<String, Vec<String>>,
    from_file: &Path,
    request: &str,
) -> Result<Option<PathBuf>> {
    if request.starts_with("./") || request.starts_with("../") || request.starts_with('/') {
        trace!("Resolving as relative import: '{}'", request);
        let base = from_file.parent().unwrap_or(root);
        let p = clean(base.join(request).to_string_lossy().to_string());
        return Ok(resolve_file(Path::new(&p)));
    }
    if request.contains(':') {
        // node:fs, data:, https: and friends never point at a project file
        trace!("Skipping non-file request '{}'", request);
        return Ok(None);
    }

    trace!("Checking tsconfig path aliases for '{}'", request);
    for (alias, targets) in tsconfig_paths {
        let Some(remainder) = request.strip_prefix(alias.as_str()) else {
            continue;
        };
        if !remainder.is_empty() && !remainder.starts_with('/') {
            continue;
        }
        let remainder = remainder.trim_start_matches('/');
        trace!("Matched alias '{}' for request '{}'", alias, request);
        for target in targets {
            let candidate = if remainder.is_empty() {
                PathBuf::from(target)
            } else {
                PathBuf::from(target).join(remainder)
            };
            if let Some(resolved) = resolve_file(&candidate) {
                trace!("Resolved alias '{}' to {:?}", alias, resolved);
                return Ok(Some(resolved));
            }
        }
    }

    trace!("Resolving as node_modules package: '{}'", request);
    let start_dir = from_file.parent().unwrap_or(root);
    resolve_node_module_from_dir(start_dir, request, root)
}

/// Probes `p` as a file, then with each known extension, then as a directory
/// holding an index file.
pub fn resolve_file(p: &Path) -> Option<PathBuf> {
    if p.is_file() {
        return Some(p.canonicalize().unwrap_or_else(|_| p.to_path_buf()));
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{}.{}", p.display(), ext));
        if candidate.is_file() {
            return Some(candidate.canonicalize().unwrap_or(candidate));
        }
    }

    for index_file in INDEX_FILES {
        let candidate = p.join(index_file);
        if candidate.is_file() {
            return Some(candidate.canonicalize().unwrap_or(candidate));
        }
    }

    None
}

/// Splits `@scope/pkg/sub/path` into `("@scope/pkg", "sub/path")`.
pub fn split_package_request(request: &str) -> (&str, &str) {
    let name_segments = if request.starts_with('@') { 2 } else { 1 };
    match request.match_indices('/').nth(name_segments - 1) {
        Some((idx, _)) => (&request[..idx], &request[idx + 1..]),
        None => (request, ""),
    }
}

fn resolve_node_module_from_dir(
    start_dir: &Path,
    request: &str,
    workspace_root: &Path,
) -> Result<Option<PathBuf>> {
    trace!("Walking up from {:?} to find node_modules for '{}'", start_dir, request);
    let mut current_dir = start_dir;

    loop {
        if let Some(result) = resolve_node_module(current_dir, request)? {
            return Ok(Some(result));
        }

        if current_dir == workspace_root {
            break;
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent,
            None => break,
        }
    }

    Ok(None)
}

fn resolve_node_module(dir: &Path, request: &str) -> Result<Option<PathBuf>> {
    let (pkg, subpath) = split_package_request(request);
    let nm = dir.join("node_modules").join(pkg);
    if !nm.is_dir() {
        return Ok(None);
    }
    trace!("Checking node_modules at: {:?}", nm);

    let pkg_json = nm.join("package.json");
    let manifest = if pkg_json.is_file() {
        let txt = fs::read_to_string(&pkg_json)
            .with_context(|| format!("Failed to read {}", pkg_json.display()))?;
        Some(
            serde_json::from_str::<serde_json::Value>(&txt)
                .with_context(|| format!("Failed to parse {}", pkg_json.display()))?,
        )
    } else {
        None
    };

    let export_key = if subpath.is_empty() { ".".to_string() } else { format!("./{}", subpath) };
    if let Some(target) = manifest
        .as_ref()
        .and_then(|v| v.get("exports"))
        .and_then(|exports| export_target(exports, &export_key))
        && let Some(resolved) = resolve_file(&nm.join(target.trim_start_matches("./")))
    {
        return Ok(Some(resolved));
    }

    if !subpath.is_empty() {
        return Ok(resolve_file(&nm.join(subpath)));
    }

    if let Some(v) = &manifest {
        for field in ["module", "main"] {
            if let Some(s) = v.get(field).and_then(|x| x.as_str())
                && let Some(resolved) = resolve_file(&nm.join(s))
            {
                return Ok(Some(resolved));
            }
        }
    }

    Ok(INDEX_FILES
        .iter()
        .map(|index_file| nm.join(index_file))
        .find(|p| p.is_file())
        .map(|p| p.canonicalize().unwrap_or(p)))
}

/// Picks the target of `key` out of a package `exports` field, preferring the
/// `import` condition, then `default`, then `require`.
fn export_target<'a>(exports: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    let entry = match exports {
        serde_json::Value::String(s) if key == "." => return Some(s.as_str()),
        serde_json::Value::Object(obj) if obj.keys().any(|k| k.starts_with('.')) => obj.get(key)?,
        // Bare condition map applies to the root entry only
        serde_json::Value::Object(_) if key == "." => exports,
        _ => return None,
    };
    condition_target(entry)
}

fn condition_target(entry: &serde_json::Value) -> Option<&str> {
    match entry {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Object(conditions) => ["import", "default", "require"]
            .iter()
            .find_map(|key| conditions.get(*key).and_then(condition_target)),
        _ => None,
    }
}
