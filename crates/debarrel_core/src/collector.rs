use anyhow::Result;
use ignore::WalkBuilder;
use log::{debug, trace};
use std::path::PathBuf;

use crate::constants::JS_TS_EXTENSIONS;

pub struct CollectorConfig {
    pub root: PathBuf,
    /// Keep only files whose root-relative path contains this string.
    pub filter: Option<String>,
}

/// Lists the JS/TS source files under `root` whose imports may be rewritten.
///
/// Honors `.gitignore`, never descends into `node_modules`, and returns the
/// files sorted so runs are reproducible.
pub fn collect_source_files(cfg: &CollectorConfig) -> Result<Vec<PathBuf>> {
    debug!("Collecting source files under {}", cfg.root.display());
    let root = &cfg.root;
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .filter_entry(|e| e.file_name() != "node_modules")
        .build();

    let mut files: Vec<PathBuf> = Vec::new();
    for res in walker {
        let dent = res?;
        let p = dent.path();
        if !p.is_file() {
            continue;
        }

        // Declaration files carry no runtime imports
        let path_str = p.to_string_lossy();
        if path_str.ends_with(".d.ts") || path_str.ends_with(".d.mts") {
            trace!("Skipping declaration file: {}", path_str);
            continue;
        }

        let Some(ext) = p.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !JS_TS_EXTENSIONS.contains(&ext) {
            continue;
        }

        if let Some(filter) = &cfg.filter {
            let rel_str = p.strip_prefix(root).unwrap_or(p).to_string_lossy();
            if !rel_str.contains(filter.as_str()) {
                continue;
            }
            trace!("Matched source file with filter '{}': {}", filter, rel_str);
        }
        files.push(p.to_path_buf());
    }

    files.sort();
    debug!("Collected {} source files", files.len());
    Ok(files)
}
