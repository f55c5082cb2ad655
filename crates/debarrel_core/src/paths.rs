use std::path::{Component, Path, PathBuf};

/// Create a relative path from `base` to `target`
pub fn make_relative(target: &Path, base: &Path) -> Option<PathBuf> {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();

    // Paths on different roots (or drive prefixes) have no relative form
    if target_components.first() != base_components.first() {
        return None;
    }

    let common = target_components
        .iter()
        .zip(&base_components)
        .take_while(|(t, b)| t == b)
        .count();

    let mut result = PathBuf::new();
    for _ in &base_components[common..] {
        result.push("..");
    }
    for component in &target_components[common..] {
        match component {
            Component::Normal(p) => result.push(p),
            Component::ParentDir => result.push(".."),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if result.as_os_str().is_empty() { Some(PathBuf::from(".")) } else { Some(result) }
}

/// Module request that reaches `target` from a file living in `from_dir`:
/// forward slashes, always starting with `./` or `../`.
pub fn to_module_request(target: &Path, from_dir: &Path) -> Option<String> {
    let rel = make_relative(target, from_dir)?;
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    let joined = parts.join("/");
    // `..a.js` is a file name, not a parent directory
    if rel.components().next() == Some(Component::ParentDir) {
        Some(joined)
    } else {
        Some(format!("./{}", joined))
    }
}
