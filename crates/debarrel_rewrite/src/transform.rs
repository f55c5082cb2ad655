use anyhow::{Context, Result};
use debarrel_core::DeclarationKind;
use log::{debug, trace};
use std::{fs, path::Path};

use crate::{
    chain::{Specifier, resolve_chain},
    emitter::{TextEdit, apply_edits},
    planner::{Planner, RewritePlan},
    session::Session,
    types::FileOutcome,
};

/// Rewrites the import and re-export declarations of `path`.
///
/// The file is read and parsed directly so the spans match the text being
/// spliced. Nothing is written to disk.
pub fn transform_file(session: &Session, path: &Path) -> Result<FileOutcome> {
    let src =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    transform_source(session, path, &src)
}

/// Same as [`transform_file`] for source text already in memory.
pub fn transform_source(session: &Session, path: &Path, src: &str) -> Result<FileOutcome> {
    let Some(specs) = session.specifiers_for_source(path, src)? else {
        debug!("Leaving unparsable file untouched: {}", path.display());
        return Ok(FileOutcome::unchanged(path.to_path_buf()));
    };

    let mut planner = Planner::new(path);
    let mut plan = RewritePlan::default();
    let mut edits: Vec<TextEdit> = Vec::new();
    let mut specifiers_rewritten = 0;

    for decl in &specs.declarations {
        let Some(request) = &decl.request else {
            continue;
        };
        if decl.has_type_only {
            trace!("Skipping declaration with type-only parts from '{}'", request);
            continue;
        }
        let starts: Vec<Specifier> = match decl.kind {
            DeclarationKind::Import => {
                specs.imports[decl.specifiers.clone()].iter().cloned().map(Specifier::Import).collect()
            }
            DeclarationKind::Export => {
                specs.exports[decl.specifiers.clone()].iter().cloned().map(Specifier::Export).collect()
            }
        };
        // Bare `import 'x'` and `export * from 'x'` have nothing to point elsewhere
        if starts.is_empty() || starts.iter().any(|s| matches!(s, Specifier::Export(e) if e.is_star()))
        {
            continue;
        }

        let mut entries = Vec::with_capacity(starts.len());
        for start in &starts {
            let entry = if planner.claim(decl.kind, start.binding_name()) {
                let resolution = resolve_chain(session, start.clone()).with_context(|| {
                    format!(
                        "Failed to resolve '{}' from '{}' in {}",
                        start.binding_name(),
                        request,
                        path.display()
                    )
                })?;
                planner.plan(start, &resolution)
            } else {
                trace!("'{}' already handled in {}", start.binding_name(), path.display());
                planner.verbatim(start)
            };
            plan.insert(request, entry.clone());
            entries.push(entry);
        }

        if entries.iter().all(|e| e.verbatim) {
            continue;
        }
        let replacement = planner.render(decl.kind, &entries);
        let original = src.get(decl.span.start as usize..decl.span.end as usize).unwrap_or_default();
        if replacement == original {
            continue;
        }
        trace!("Rewriting `{}` as `{}`", original, replacement);
        specifiers_rewritten += entries.iter().filter(|e| !e.verbatim).count();
        edits.push(TextEdit { span: decl.span, replacement });
    }

    let output = if edits.is_empty() {
        None
    } else {
        Some(apply_edits(src, &edits).with_context(|| format!("Failed to rewrite {}", path.display()))?)
    };
    debug!(
        "{}: {} declarations rewritten, {} specifiers",
        path.display(),
        edits.len(),
        specifiers_rewritten
    );

    Ok(FileOutcome {
        path: path.to_path_buf(),
        declarations_rewritten: edits.len(),
        specifiers_rewritten,
        plan,
        output,
    })
}
