//! Core utilities for debarrel.
//!
//! This crate provides the JavaScript/TypeScript plumbing the rewrite engine
//! is built on:
//! - Extracting import/export specifiers from JS/TS modules
//! - Resolving module requests (relative, node_modules, tsconfig paths) while
//!   carrying loader prefixes and query suffixes along
//! - Collecting the source files of a project
//! - Configuration utilities (git root finding, tsconfig reading)

mod collector;
mod config;
mod constants;
mod parser;
mod paths;
mod resolver;
mod types;

// Re-export public API
pub use collector::{CollectorConfig, collect_source_files};
pub use config::{find_git_root, find_git_root_from, find_package_root, read_tsconfig_paths};
pub use constants::{DEFAULT_EXPORT, INDEX_FILES, JS_TS_EXTENSIONS, RESOLVE_EXTENSIONS, STAR_EXPORT};
pub use parser::{extract, specifiers_for, specifiers_for_source};
pub use paths::{make_relative, to_module_request};
pub use resolver::{ResolveCache, resolve, resolve_file, split_package_request};
pub use types::{
    BindingKind, DeclarationKind, DecoratedPath, ExportSpecifier, ImportSpecifier,
    ModuleDeclaration, ModuleSpecifiers,
};
