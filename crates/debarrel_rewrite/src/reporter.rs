use std::{
    env,
    io::{self, Write},
    path::Path,
};

use colored::Colorize;
use debarrel_core::make_relative;
use log::{debug, trace};

use crate::{
    planner::PlanEntry,
    types::{FileOutcome, RunResult},
};

/// Relativize a path to the current working directory for clickable links
fn relativize_to_cwd(path: &Path) -> String {
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(_) => {
            debug!("Failed to get current directory");
            return path.display().to_string();
        }
    };
    match make_relative(path, &cwd) {
        Some(rel_path) => {
            let result = rel_path.to_string_lossy().to_string();
            trace!("Relativized '{}' to '{}'", path.display(), result);
            result
        }
        None => path.display().to_string(),
    }
}

pub fn print_no_changes_message<W: Write>(writer: &mut W, result: &RunResult) -> io::Result<()> {
    debug!("No barrel imports to rewrite");
    writeln!(
        writer,
        "{} No barrel imports to rewrite in {} files.",
        "✓".green().bold(),
        result.files_scanned
    )?;
    writer.flush()?;
    Ok(())
}

pub fn print_changes_tree<W: Write>(writer: &mut W, result: &RunResult) -> io::Result<()> {
    debug!("Printing changes for {} files", result.changes.len());
    let verb = if result.written { "Rewrote" } else { "Would rewrite" };
    writeln!(
        writer,
        "{} {} barrel imports in {} files\n",
        "⚑".yellow().bold(),
        verb,
        result.files_changed.to_string().yellow()
    )?;

    // Busiest files first
    let mut changes: Vec<&FileOutcome> = result.changes.iter().collect();
    changes.sort_by(|a, b| {
        b.specifiers_rewritten.cmp(&a.specifiers_rewritten).then_with(|| a.path.cmp(&b.path))
    });

    for change in changes {
        writeln!(
            writer,
            "{} ({} specifiers)",
            relativize_to_cwd(&change.path).blue(),
            change.specifiers_rewritten.to_string().cyan().bold()
        )?;

        let rows: Vec<(&str, &PlanEntry)> = change
            .plan
            .entries
            .iter()
            .flat_map(|(request, entries)| entries.iter().map(move |e| (request.as_str(), e)))
            .filter(|(_, e)| !e.verbatim)
            .collect();

        for (idx, (request, entry)) in rows.iter().enumerate() {
            let is_last = idx == rows.len() - 1;
            let prefix = if is_last { "└──" } else { "├──" };
            writeln!(
                writer,
                "{}  {} {} {} {}",
                prefix.dimmed(),
                entry.local_name.bright_white(),
                request.dimmed(),
                "→".dimmed(),
                entry.module_request.green()
            )?;
            for hop in &entry.side_effect_hops {
                let indent = if is_last { "   " } else { "│  " };
                writeln!(writer, "{}  {} {}", indent.dimmed(), "+ side effects".yellow(), hop)?;
            }
        }
        writeln!(writer)?;
    }

    print_summary(writer, result)?;

    writer.flush()?;
    Ok(())
}

fn print_summary<W: Write>(writer: &mut W, result: &RunResult) -> io::Result<()> {
    writeln!(writer, "{}", "─".repeat(60).dimmed())?;
    writeln!(writer, "{}", "Summary".bold())?;
    writeln!(writer, "  Files changed: {}", result.files_changed.to_string().yellow().bold())?;
    writeln!(
        writer,
        "  Specifiers rewritten: {}",
        result.specifiers_rewritten.to_string().yellow().bold()
    )?;
    if result.files_failed > 0 {
        writeln!(writer, "  Files skipped on errors: {}", result.files_failed.to_string().red())?;
    }
    if !result.written {
        writeln!(writer, "  Run with {} to apply the changes.", "--write".bold())?;
    }
    Ok(())
}
