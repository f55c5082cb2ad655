//! Constants for file extensions and resolution strategies.
//!
//! Parsing, resolution and collection all share these tables so that a file
//! the collector picks up is also one the resolver can land on and the parser
//! is willing to read.

/// File extensions for JavaScript/TypeScript files that carry ES module syntax
pub const JS_TS_EXTENSIONS: &[&str] = &[
    "ts",  // TypeScript
    "tsx", // TypeScript with JSX
    "mts", // TypeScript module
    "cts", // TypeScript CommonJS
    "js",  // JavaScript
    "jsx", // JavaScript with JSX
    "mjs", // JavaScript module
    "cjs", // JavaScript CommonJS
];

/// Extensions to try when resolving module imports (in priority order)
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Index file names to try when resolving directory imports
pub const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.mts",
    "index.cts",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
];

/// Export name used for `export default` and `import x from`.
pub const DEFAULT_EXPORT: &str = "default";

/// Export name recorded for `export * from '...'`.
pub const STAR_EXPORT: &str = "*";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_extensions_matches_js_ts_extensions() {
        assert_eq!(RESOLVE_EXTENSIONS.len(), JS_TS_EXTENSIONS.len());
        for ext in RESOLVE_EXTENSIONS {
            assert!(
                JS_TS_EXTENSIONS.contains(ext),
                "RESOLVE_EXTENSIONS contains '{}' which is not in JS_TS_EXTENSIONS",
                ext
            );
        }
    }

    #[test]
    fn test_index_files_uses_all_extensions() {
        assert_eq!(INDEX_FILES.len(), JS_TS_EXTENSIONS.len());
        for ext in JS_TS_EXTENSIONS {
            let expected = format!("index.{}", ext);
            assert!(INDEX_FILES.contains(&expected.as_str()), "INDEX_FILES missing '{}'", expected);
        }
    }
}
