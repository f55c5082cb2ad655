use anyhow::{Context, Result};
use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::{Parser as OxcParser, ParserReturn};
use oxc_span::SourceType;
use std::{collections::HashMap, fs, path::Path};

use crate::{
    constants::{DEFAULT_EXPORT, JS_TS_EXTENSIONS, STAR_EXPORT},
    types::{
        BindingKind, DeclarationKind, DecoratedPath, ExportSpecifier, ImportSpecifier,
        ModuleDeclaration, ModuleSpecifiers,
    },
};

/// Reads, parses and extracts the import/export specifiers of `file`.
///
/// Returns `Ok(None)` when the file is not a JS/TS module or does not parse;
/// callers treat that as a dead end rather than a failure. Errors are reserved
/// for I/O problems and for failures of `resolve_path`.
pub fn specifiers_for<F>(file: &Path, resolve_path: F) -> Result<Option<ModuleSpecifiers>>
where
    F: FnMut(&str) -> Result<Option<DecoratedPath>>,
{
    let ext = file.extension().and_then(|e| e.to_str());
    if !ext.is_some_and(|e| JS_TS_EXTENSIONS.contains(&e)) {
        trace!("Not a JS/TS module, skipping parse: {}", file.display());
        return Ok(None);
    }
    trace!("Parsing file for specifiers: {}", file.display());
    let src =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    specifiers_for_source(file, &src, resolve_path)
}

/// Same as [`specifiers_for`] for source text that is already in memory.
pub fn specifiers_for_source<F>(
    file: &Path,
    src: &str,
    resolve_path: F,
) -> Result<Option<ModuleSpecifiers>>
where
    F: FnMut(&str) -> Result<Option<DecoratedPath>>,
{
    let allocator = Allocator::default();
    let ParserReturn { program, errors, panicked, .. } =
        OxcParser::new(&allocator, src, source_type_for(file)).parse();
    if panicked || !errors.is_empty() {
        debug!("Failed to parse {} ({} errors)", file.display(), errors.len());
        return Ok(None);
    }

    let specs = extract(&program, resolve_path)
        .with_context(|| format!("Failed to extract specifiers from {}", file.display()))?;
    debug!(
        "Found {} import and {} export specifiers in {}",
        specs.imports.len(),
        specs.exports.len(),
        file.display()
    );
    Ok(Some(specs))
}

/// Walks the top-level statements of `program` and records every import and
/// export binding in source order.
///
/// `resolve_path` is invoked once per distinct module request. Shapes that
/// cannot be followed (destructuring exports, TypeScript-only bindings) are
/// skipped without error.
pub fn extract<F>(program: &Program<'_>, resolve_path: F) -> Result<ModuleSpecifiers>
where
    F: FnMut(&str) -> Result<Option<DecoratedPath>>,
{
    let mut extractor = Extractor { resolve_path, resolved: HashMap::new(), out: Default::default() };
    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => extractor.import_declaration(decl)?,
            Statement::ExportNamedDeclaration(decl) => extractor.export_named(decl)?,
            Statement::ExportDefaultDeclaration(decl) => extractor.export_default(decl),
            Statement::ExportAllDeclaration(decl) => extractor.export_all(decl)?,
            _ => {}
        }
    }
    Ok(extractor.out)
}

struct Extractor<F> {
    resolve_path: F,
    resolved: HashMap<String, Option<DecoratedPath>>,
    out: ModuleSpecifiers,
}

impl<F> Extractor<F>
where
    F: FnMut(&str) -> Result<Option<DecoratedPath>>,
{
    fn resolve(&mut self, request: &str) -> Result<Option<DecoratedPath>> {
        if let Some(hit) = self.resolved.get(request) {
            return Ok(hit.clone());
        }
        let resolved = (self.resolve_path)(request)?;
        if resolved.is_none() {
            trace!("Unresolved module request '{}'", request);
        }
        self.resolved.insert(request.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn import_declaration(&mut self, decl: &ImportDeclaration<'_>) -> Result<()> {
        // import type { Foo } from 'bar'
        if decl.import_kind.is_type() {
            trace!("Skipping type-only import of '{}'", decl.source.value);
            return Ok(());
        }
        let request = decl.source.value.to_string();
        let source_path = self.resolve(&request)?;
        let start = self.out.imports.len();
        let mut has_type_only = false;

        for spec in decl.specifiers.iter().flatten() {
            let (local_name, imported_name, kind) = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        has_type_only = true;
                        continue;
                    }
                    let imported = s.imported.name().to_string();
                    let kind = if imported == DEFAULT_EXPORT {
                        BindingKind::Default
                    } else {
                        BindingKind::Named
                    };
                    (s.local.name.to_string(), imported, kind)
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    (s.local.name.to_string(), DEFAULT_EXPORT.to_string(), BindingKind::Default)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    (s.local.name.to_string(), STAR_EXPORT.to_string(), BindingKind::Namespace)
                }
            };
            self.out.imports.push(ImportSpecifier {
                local_name,
                search_name: imported_name.clone(),
                imported_name,
                request: request.clone(),
                source_path: source_path.clone(),
                kind,
            });
        }

        self.out.declarations.push(ModuleDeclaration {
            kind: DeclarationKind::Import,
            span: decl.span,
            request: Some(request),
            specifiers: start..self.out.imports.len(),
            has_type_only,
        });
        Ok(())
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) -> Result<()> {
        if decl.export_kind.is_type() {
            return Ok(());
        }
        let start = self.out.exports.len();

        // export const a = 1; export function b() {}
        if let Some(declaration) = &decl.declaration {
            for name in declared_names(declaration) {
                self.push_local_export(Some(name.clone()), name);
            }
            self.out.declarations.push(ModuleDeclaration {
                kind: DeclarationKind::Export,
                span: decl.span,
                request: None,
                specifiers: start..self.out.exports.len(),
                has_type_only: false,
            });
            return Ok(());
        }

        let request = decl.source.as_ref().map(|s| s.value.to_string());
        let source_path = match &request {
            Some(request) => self.resolve(request)?,
            None => None,
        };
        let mut has_type_only = false;

        for spec in &decl.specifiers {
            if spec.export_kind.is_type() {
                has_type_only = true;
                continue;
            }
            let local = spec.local.name().to_string();
            let exported = spec.exported.name().to_string();
            if request.is_some() {
                let kind = if local == DEFAULT_EXPORT {
                    BindingKind::Default
                } else {
                    BindingKind::Named
                };
                self.out.exports.push(ExportSpecifier {
                    search_name: local.clone(),
                    local_name: Some(local),
                    exported_name: exported,
                    request: request.clone(),
                    source_path: source_path.clone(),
                    kind,
                });
            } else {
                self.push_local_export(Some(local), exported);
            }
        }

        self.out.declarations.push(ModuleDeclaration {
            kind: DeclarationKind::Export,
            span: decl.span,
            request,
            specifiers: start..self.out.exports.len(),
            has_type_only,
        });
        Ok(())
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        let start = self.out.exports.len();
        let local_name = match &decl.declaration {
            // export default foo;
            ExportDefaultDeclarationKind::Identifier(ident) => Some(ident.name.to_string()),
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                func.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                class.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => return,
            // Arbitrary expressions are terminal.
            _ => None,
        };
        self.push_local_export(local_name, DEFAULT_EXPORT.to_string());
        self.out.declarations.push(ModuleDeclaration {
            kind: DeclarationKind::Export,
            span: decl.span,
            request: None,
            specifiers: start..self.out.exports.len(),
            has_type_only: false,
        });
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) -> Result<()> {
        if decl.export_kind.is_type() {
            return Ok(());
        }
        let request = decl.source.value.to_string();
        let source_path = self.resolve(&request)?;
        let start = self.out.exports.len();
        let exported_name =
            decl.exported.as_ref().map_or_else(|| STAR_EXPORT.to_string(), |e| e.name().to_string());

        self.out.exports.push(ExportSpecifier {
            local_name: None,
            search_name: exported_name.clone(),
            exported_name,
            request: Some(request.clone()),
            source_path,
            kind: BindingKind::Namespace,
        });
        self.out.declarations.push(ModuleDeclaration {
            kind: DeclarationKind::Export,
            span: decl.span,
            request: Some(request),
            specifiers: start..self.out.exports.len(),
            has_type_only: false,
        });
        Ok(())
    }

    fn push_local_export(&mut self, local_name: Option<String>, exported_name: String) {
        let kind =
            if exported_name == DEFAULT_EXPORT { BindingKind::Default } else { BindingKind::Named };
        self.out.exports.push(ExportSpecifier {
            local_name,
            search_name: exported_name.clone(),
            exported_name,
            request: None,
            source_path: None,
            kind,
        });
    }
}

/// Runtime bindings introduced by `export <declaration>`.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(vd) => vd
            .declarations
            .iter()
            .filter_map(|d| d.id.get_identifier_name())
            .map(|name| name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::TSEnumDeclaration(e) => vec![e.id.name.to_string()],
        _ => Vec::new(),
    }
}

fn source_type_for(path: &Path) -> SourceType {
    let ext = path.extension().and_then(|e| e.to_str());

    SourceType::default()
        .with_jsx(matches!(ext, Some("tsx") | Some("jsx")))
        .with_typescript(matches!(ext, Some("ts") | Some("tsx") | Some("mts") | Some("cts")))
        // Imports and exports only parse as module code
        .with_module(!matches!(ext, Some("cjs") | Some("cts")))
}
