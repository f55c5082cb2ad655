use std::{fmt, ops::Range, path::PathBuf};

use oxc_span::Span;
use serde::Serialize;

use crate::constants::STAR_EXPORT;

/// Shape of a binding as seen from the module that provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Default,
    Namespace,
    Named,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Import,
    Export,
}

/// A resolved module location plus the build-tool decorations that travelled
/// with the request (`loader!` chains in front, `?query` / `#hash` behind).
///
/// The decorations are opaque: they are split off once before resolution and
/// glued back on verbatim by [`DecoratedPath::decorate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecoratedPath {
    pub prefix: String,
    pub path: PathBuf,
    pub suffix: String,
}

impl DecoratedPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { prefix: String::new(), path: path.into(), suffix: String::new() }
    }

    /// Splits a raw request into `(prefix, core, suffix)`.
    ///
    /// The prefix runs up to and including the last `!`. The suffix starts at
    /// the first `?` or `#` after the first character of the core, so subpath
    /// imports such as `#internal/x` keep their leading hash.
    pub fn split(request: &str) -> (&str, &str, &str) {
        let (prefix, rest) = match request.rfind('!') {
            Some(idx) => request.split_at(idx + 1),
            None => ("", request),
        };
        let cut = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '?' || *c == '#')
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (core, suffix) = rest.split_at(cut);
        (prefix, core, suffix)
    }

    /// Attaches the decorations of `request` to an already resolved path.
    pub fn from_request(request: &str, path: impl Into<PathBuf>) -> Self {
        let (prefix, _, suffix) = Self::split(request);
        Self { prefix: prefix.to_string(), path: path.into(), suffix: suffix.to_string() }
    }

    /// Re-attaches the decorations around `core`.
    pub fn decorate(&self, core: &str) -> String {
        format!("{}{}{}", self.prefix, core, self.suffix)
    }

    pub fn is_decorated(&self) -> bool {
        !self.prefix.is_empty() || !self.suffix.is_empty()
    }
}

impl fmt::Display for DecoratedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.path.display(), self.suffix)
    }
}

/// One binding introduced by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub local_name: String,
    pub imported_name: String,
    /// Name to look up among the exports of `source_path`.
    pub search_name: String,
    /// The module request exactly as written.
    pub request: String,
    /// `None` when the request could not be resolved.
    pub source_path: Option<DecoratedPath>,
    pub kind: BindingKind,
}

/// One binding made visible by an export declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    /// `None` for `export * as ns from`, `export * from` and default exports of
    /// anything other than a named declaration or a bare identifier.
    pub local_name: Option<String>,
    pub exported_name: String,
    /// The local name for re-exports, the exported name otherwise.
    pub search_name: String,
    /// Present only for `export ... from '...'` forms.
    pub request: Option<String>,
    pub source_path: Option<DecoratedPath>,
    pub kind: BindingKind,
}

impl ExportSpecifier {
    pub fn is_reexport(&self) -> bool {
        self.request.is_some()
    }

    /// `export * from '...'` without a namespace name.
    pub fn is_star(&self) -> bool {
        self.is_reexport() && self.exported_name == STAR_EXPORT
    }
}

/// A top-level import or export statement and the specifiers it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDeclaration {
    pub kind: DeclarationKind,
    pub span: Span,
    /// Module request of `import ... from` / `export ... from`.
    pub request: Option<String>,
    /// Indices into [`ModuleSpecifiers::imports`] or [`ModuleSpecifiers::exports`],
    /// depending on `kind`.
    pub specifiers: Range<usize>,
    /// Set when any part of the statement is type-only; such statements are
    /// never rewritten because the type bindings are not tracked.
    pub has_type_only: bool,
}

/// Everything the extractor learned about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSpecifiers {
    pub imports: Vec<ImportSpecifier>,
    pub exports: Vec<ExportSpecifier>,
    pub declarations: Vec<ModuleDeclaration>,
}
