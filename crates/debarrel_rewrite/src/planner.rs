//! Turns chain resolutions into replacement declarations.

use debarrel_core::{BindingKind, DEFAULT_EXPORT, DeclarationKind, to_module_request};
use log::trace;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use crate::chain::{Resolution, Specifier, StopReason};

/// What one binding of a rewritten declaration should become.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// Local binding for imports, exported name for re-exports.
    pub local_name: String,
    pub kind: BindingKind,
    /// Name to pull out of `module_request`.
    pub imported_name: String,
    /// Decorated request to emit.
    pub module_request: String,
    /// Bare imports that keep skipped side effects alive.
    pub side_effect_hops: Vec<String>,
    /// Re-emitted exactly as authored.
    pub verbatim: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

/// Plan entries of one file, keyed by the original module request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewritePlan {
    pub entries: BTreeMap<String, Vec<PlanEntry>>,
}

impl RewritePlan {
    pub fn insert(&mut self, request: &str, entry: PlanEntry) {
        self.entries.entry(request.to_string()).or_default().push(entry);
    }

    /// Entries that point somewhere new.
    pub fn rewritten(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.values().flatten().filter(|e| !e.verbatim)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plans the declarations of one file, in source order.
pub struct Planner {
    file_dir: PathBuf,
    visited: HashSet<(DeclarationKind, String)>,
    emitted_hops: HashSet<String>,
}

impl Planner {
    pub fn new(file: &Path) -> Self {
        Self {
            file_dir: file.parent().map(Path::to_path_buf).unwrap_or_default(),
            visited: HashSet::new(),
            emitted_hops: HashSet::new(),
        }
    }

    /// Marks `name` as handled; `false` when it already was.
    pub fn claim(&mut self, kind: DeclarationKind, name: &str) -> bool {
        self.visited.insert((kind, name.to_string()))
    }

    /// An entry reproducing `start` unchanged.
    pub fn verbatim(&self, start: &Specifier) -> PlanEntry {
        PlanEntry {
            local_name: start.binding_name().to_string(),
            kind: start.kind(),
            imported_name: start.search_name().to_string(),
            module_request: start.request().unwrap_or_default().to_string(),
            side_effect_hops: Vec::new(),
            verbatim: true,
            reason: None,
        }
    }

    pub fn plan(&self, start: &Specifier, resolution: &Resolution) -> PlanEntry {
        let keep = match resolution.reason {
            StopReason::Unresolvable | StopReason::Cycle | StopReason::ParseFailure => true,
            StopReason::DefaultBoundary => resolution.depth == 0,
            _ => false,
        };
        let terminal = &resolution.terminal;
        let target = terminal.source_path().and_then(|source| {
            to_module_request(&source.path, &self.file_dir).map(|core| source.decorate(&core))
        });
        let Some(module_request) = target.filter(|_| !keep) else {
            trace!("Keeping '{}' as authored ({:?})", start.binding_name(), resolution.reason);
            return PlanEntry { reason: Some(resolution.reason), ..self.verbatim(start) };
        };

        let mut side_effect_hops: Vec<String> = Vec::new();
        for hop in &resolution.side_effect_hops {
            if let Some(core) = to_module_request(&hop.path, &self.file_dir) {
                let request = hop.decorate(&core);
                if !side_effect_hops.contains(&request) {
                    side_effect_hops.push(request);
                }
            }
        }

        PlanEntry {
            local_name: start.binding_name().to_string(),
            kind: terminal.kind(),
            imported_name: terminal.search_name().to_string(),
            module_request,
            side_effect_hops,
            verbatim: false,
            reason: Some(resolution.reason),
        }
    }

    /// Renders `entries` as replacement statements, one per line.
    ///
    /// Bare imports for side-effecting hops come first and are emitted at
    /// most once per file. Bindings that share a target module share one
    /// statement; namespace bindings always get their own.
    pub fn render(&mut self, kind: DeclarationKind, entries: &[PlanEntry]) -> String {
        let mut lines: Vec<String> = Vec::new();
        for hop in entries.iter().flat_map(|e| &e.side_effect_hops) {
            if self.emitted_hops.insert(hop.clone()) {
                lines.push(format!("import {};", quote(hop)));
            }
        }

        let mut groups: Vec<(&str, Vec<&PlanEntry>)> = Vec::new();
        for entry in entries {
            match groups.iter_mut().find(|(request, _)| *request == entry.module_request) {
                Some((_, group)) => group.push(entry),
                None => groups.push((entry.module_request.as_str(), vec![entry])),
            }
        }
        for (request, group) in groups {
            match kind {
                DeclarationKind::Import => render_imports(&mut lines, request, &group),
                DeclarationKind::Export => render_exports(&mut lines, request, &group),
            }
        }
        lines.join("\n")
    }
}

fn render_imports(lines: &mut Vec<String>, request: &str, group: &[&PlanEntry]) {
    let mut default_clause: Option<&str> = None;
    let mut named: Vec<String> = Vec::new();
    let mut namespaces: Vec<&str> = Vec::new();

    for entry in group {
        match entry.kind {
            BindingKind::Namespace => namespaces.push(entry.local_name.as_str()),
            BindingKind::Default if default_clause.is_none() => {
                default_clause = Some(entry.local_name.as_str())
            }
            BindingKind::Default => {
                named.push(format!("{} as {}", DEFAULT_EXPORT, entry.local_name))
            }
            BindingKind::Named => named.push(named_binding(&entry.imported_name, &entry.local_name)),
        }
    }

    let mut clauses: Vec<String> = Vec::new();
    if let Some(local) = default_clause {
        clauses.push(local.to_string());
    }
    if !named.is_empty() {
        clauses.push(format!("{{ {} }}", named.join(", ")));
    }
    if !clauses.is_empty() {
        lines.push(format!("import {} from {};", clauses.join(", "), quote(request)));
    }
    for local in namespaces {
        lines.push(format!("import * as {} from {};", local, quote(request)));
    }
}

fn render_exports(lines: &mut Vec<String>, request: &str, group: &[&PlanEntry]) {
    let mut named: Vec<String> = Vec::new();
    let mut namespaces: Vec<&str> = Vec::new();

    for entry in group {
        match entry.kind {
            BindingKind::Namespace => namespaces.push(entry.local_name.as_str()),
            BindingKind::Default => named.push(named_binding(DEFAULT_EXPORT, &entry.local_name)),
            BindingKind::Named => named.push(named_binding(&entry.imported_name, &entry.local_name)),
        }
    }

    if !named.is_empty() {
        lines.push(format!("export {{ {} }} from {};", named.join(", "), quote(request)));
    }
    for exported in namespaces {
        lines.push(format!("export * as {} from {};", module_export_name(exported), quote(request)));
    }
}

fn named_binding(imported: &str, local: &str) -> String {
    if imported == local {
        module_export_name(local)
    } else {
        format!("{} as {}", module_export_name(imported), module_export_name(local))
    }
}

/// Identifier names stay bare; anything else is written as a string literal.
fn module_export_name(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_identifier { name.to_string() } else { quote(name) }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
