use anyhow::{Result, anyhow};
use ignore::WalkBuilder;
use log::{debug, trace};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

/// Walks up from the current directory to the closest folder holding `.git`.
pub fn find_git_root() -> Result<PathBuf> {
    find_git_root_from(&env::current_dir()?)
}

pub fn find_git_root_from(start: &Path) -> Result<PathBuf> {
    debug!("Searching for git root from {:?}", start);
    start
        .ancestors()
        .inspect(|dir| trace!("Checking for .git in: {:?}", dir))
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Could not find .git directory above {}", start.display()))
}

/// Directory of the closest `package.json` at or above `file`.
pub fn find_package_root(file: &Path) -> Option<PathBuf> {
    file.ancestors().skip(1).find(|dir| dir.join("package.json").is_file()).map(Path::to_path_buf)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    base_url: Option<String>,
    #[serde(default)]
    paths: HashMap<String, Vec<String>>,
}

/// Collects `compilerOptions.paths` from every tsconfig.json under `root`.
///
/// Aliases and targets lose their trailing `/*`; targets become absolute,
/// anchored at the tsconfig's `baseUrl`. Unreadable or malformed files are
/// skipped.
pub fn read_tsconfig_paths(root: &Path) -> HashMap<String, Vec<String>> {
    debug!("Reading tsconfig paths from root: {:?}", root);
    let mut paths = HashMap::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(|e| e.file_name() != "node_modules")
        .build();

    for entry in walker.filter_map(|e| e.ok()) {
        let tsconfig_path = entry.path();
        if tsconfig_path.file_name().and_then(|n| n.to_str()) != Some("tsconfig.json") {
            continue;
        }
        trace!("Found tsconfig at: {:?}", tsconfig_path);
        let Ok(content) = fs::read_to_string(tsconfig_path) else {
            continue;
        };
        let Ok(tsconfig) = serde_json::from_str::<TsConfig>(&strip_line_comments(&content)) else {
            debug!("Skipping unparsable tsconfig: {:?}", tsconfig_path);
            continue;
        };

        let options = tsconfig.compiler_options;
        let tsconfig_dir = tsconfig_path.parent().unwrap_or(root);
        let base_path = tsconfig_dir.join(options.base_url.as_deref().unwrap_or("."));

        for (alias, targets) in options.paths {
            let resolved_targets: Vec<String> = targets
                .iter()
                .map(|t| base_path.join(t.trim_end_matches("/*")).to_string_lossy().to_string())
                .collect();
            if resolved_targets.is_empty() {
                continue;
            }
            let alias_key = alias.trim_end_matches("/*").to_string();
            trace!("Found tsconfig path alias: '{}' -> {:?}", alias_key, resolved_targets);
            paths.insert(alias_key, resolved_targets);
        }
    }

    debug!("Loaded {} tsconfig path aliases", paths.len());
    paths
}

/// Drops `//` comments that sit outside string literals.
fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let mut in_string = false;
            let mut escaped = false;
            let bytes = line.as_bytes();
            for (idx, &b) in bytes.iter().enumerate() {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' if in_string => escaped = true,
                    b'"' => in_string = !in_string,
                    b'/' if !in_string && bytes.get(idx + 1) == Some(&b'/') => {
                        return &line[..idx];
                    }
                    _ => {}
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
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

    #[test]
    fn test_find_git_root_from_subdir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        let subdir = root.join("src").join("components");
        fs::create_dir_all(&subdir).unwrap();

        assert_eq!(find_git_root_from(&subdir).unwrap(), root);
    }

    #[test]
    fn test_find_package_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "package.json", "{}");
        create_test_file(root, "node_modules/lib/package.json", "{}");
        let file = create_test_file(root, "node_modules/lib/dist/a.js", "");

        assert_eq!(find_package_root(&file), Some(root.join("node_modules/lib")));
    }

    #[test]
    fn test_read_tsconfig_paths_with_base_url() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let tsconfig_content = r#"
{
  "compilerOptions": {
    "baseUrl": "src",
    "paths": {
      "@components/*": ["components/*"]
    }
  }
}
"#;
        create_test_file(root, "tsconfig.json", tsconfig_content);

        let paths = read_tsconfig_paths(root);
        assert_eq!(paths.len(), 1);
        assert!(paths["@components"][0].contains("src/components"));
    }

    #[test]
    fn test_read_tsconfig_paths_with_comments() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let tsconfig_content = r#"
{
  // This is a comment
  "compilerOptions": {
    "baseUrl": ".", // Another comment
    "paths": {
      "@api": ["https://example.com//api"], // Path comment
      "testmodule": ["testmodule"]
    }
  }
}
"#;
        create_test_file(root, "tsconfig.json", tsconfig_content);

        let paths = read_tsconfig_paths(root);
        assert_eq!(paths.len(), 2);
        assert!(paths["@api"][0].ends_with("https://example.com//api"));
        assert!(paths.contains_key("testmodule"));
    }

    #[test]
    fn test_read_tsconfig_paths_ignores_node_modules() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let dep_tsconfig = r#"{ "compilerOptions": { "paths": { "@dep/*": ["src/*"] } } }"#;
        create_test_file(root, "node_modules/dep/tsconfig.json", dep_tsconfig);

        assert!(read_tsconfig_paths(root).is_empty());
    }

    #[test]
    fn test_read_tsconfig_paths_no_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "tsconfig.json", r#"{ "compilerOptions": { "target": "ES2020" } }"#);

        assert!(read_tsconfig_paths(root).is_empty());
    }
}
