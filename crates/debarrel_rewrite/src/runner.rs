use anyhow::{Context, Result, anyhow};
use debarrel_core::{CollectorConfig, collect_source_files};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::{fs, thread};

use crate::{
    config::Config,
    session::Session,
    transform::transform_file,
    types::{FileOutcome, RunResult},
};

pub fn run_rewrite(mut cfg: Config) -> Result<RunResult> {
    info!("Starting barrel import rewrite");
    cfg.initialize()?;
    let root = cfg.root()?.clone();
    let options = cfg.options()?;

    debug!("Collecting source files with filter: {:?}", cfg.filter);
    let files =
        collect_source_files(&CollectorConfig { root: root.clone(), filter: cfg.filter.clone() })?;
    if files.is_empty() {
        warn!("No source files found under {}", root.display());
        return Err(anyhow!("No source files found under {}", root.display()));
    }
    info!("Found {} source files", files.len());

    let session = Session::new(root.clone(), cfg.tsconfig_paths.clone(), options)?;

    info!("Rewriting {} files in parallel", files.len());
    let outcomes: Vec<Option<FileOutcome>> = files
        .par_iter()
        .map(|file| {
            let thread_id = thread::current().id();
            debug!("Thread {:?} processing: {}", thread_id, file.display());
            match transform_file(&session, file) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!("Skipping {}: {:#}", file.display(), e);
                    None
                }
            }
        })
        .collect();

    let files_failed = outcomes.iter().filter(|o| o.is_none()).count();
    let changes: Vec<FileOutcome> =
        outcomes.into_iter().flatten().filter(FileOutcome::is_changed).collect();

    if cfg.write {
        for change in &changes {
            let Some(output) = &change.output else {
                continue;
            };
            trace!("Writing {}", change.path.display());
            fs::write(&change.path, output)
                .with_context(|| format!("Failed to write {}", change.path.display()))?;
        }
        info!("Wrote {} files", changes.len());
    }

    let specifiers_rewritten = changes.iter().map(|c| c.specifiers_rewritten).sum();
    info!(
        "Rewrite complete. {} of {} files changed, {} specifiers rewritten",
        changes.len(),
        files.len(),
        specifiers_rewritten
    );
    debug!(
        "Cache statistics: records={}, resolutions={}",
        session.records_loaded(),
        session.requests_resolved()
    );

    Ok(RunResult {
        root,
        files_scanned: files.len(),
        files_changed: changes.len(),
        files_failed,
        specifiers_rewritten,
        modules_loaded: session.records_loaded(),
        written: cfg.write,
        changes,
    })
}
