use anyhow::{Result, anyhow, bail};
use clap::Parser;
use log::{debug, info};
use std::{collections::HashMap, path::PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "rewrite")]
#[command(about = "Point barrel imports at the modules that declare the imported bindings")]
pub struct Config {
    /// Root directory of the project (defaults to git root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Only rewrite files whose root-relative path contains this string
    #[arg(long)]
    pub filter: Option<String>,

    /// Keep following default imports instead of stopping at them
    #[arg(long)]
    pub follow_default_imports: bool,

    /// Keep following through modules with side effects (they are kept as bare imports)
    #[arg(long)]
    pub follow_through_side_effects: bool,

    /// Treat every module as free of side effects
    #[arg(long)]
    pub no_side_effect_checking: bool,

    /// Assume modules of packages without a `sideEffects` field are pure
    #[arg(long)]
    pub assume_pure: bool,

    /// Package name, module request or glob whose side effects are ignored (repeatable)
    #[arg(long = "side-effects-ignore", value_name = "ENTRY")]
    pub side_effects_ignore: Vec<String>,

    /// Absolute directory that side-effect ignore entries are relative to (defaults to root)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Write rewritten files in place instead of only reporting
    #[arg(long)]
    pub write: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[clap(skip)]
    pub tsconfig_paths: HashMap<String, Vec<String>>,
}

/// How the side-effect classifier decides whether a module may be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectChecking {
    pub enabled: bool,
    /// Answer for modules whose package says nothing; `true` means impure.
    pub default_assumption: bool,
    pub ignore_list: Vec<String>,
    pub project_root: PathBuf,
}

/// Engine policies, independent of how they were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub follow_default_imports: bool,
    pub follow_through_side_effects: bool,
    pub side_effects: SideEffectChecking,
}

impl Options {
    /// Defaults: stop at default imports, stop at side-effecting modules,
    /// unknown packages are impure.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            follow_default_imports: false,
            follow_through_side_effects: false,
            side_effects: SideEffectChecking {
                enabled: true,
                default_assumption: true,
                ignore_list: Vec::new(),
                project_root: project_root.into(),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let project_root = &self.side_effects.project_root;
        if !project_root.is_absolute() {
            bail!(
                "Invalid option `projectRoot` (--project-root): expected an absolute path, got '{}'",
                project_root.display()
            );
        }
        if let Some(entry) = self.side_effects.ignore_list.iter().find(|e| e.trim().is_empty()) {
            bail!("Invalid option `ignoreList` (--side-effects-ignore): empty entry '{}'", entry);
        }
        Ok(())
    }
}

impl Config {
    /// Initialize the config by resolving the root directory and loading tsconfig paths
    pub fn initialize(&mut self) -> Result<()> {
        let root = if let Some(r) = self.root.take() {
            debug!("Using provided root directory: {:?}", r);
            r.canonicalize().map_err(|e| anyhow!("Invalid option `root` ({}): {}", r.display(), e))?
        } else {
            debug!("No root provided, searching for git root");
            debarrel_core::find_git_root()?
        };
        if !root.is_dir() {
            bail!("Invalid option `root`: {} is not a directory", root.display());
        }
        info!("Using root directory: {}", root.display());

        debug!("Reading tsconfig paths");
        self.tsconfig_paths = debarrel_core::read_tsconfig_paths(&root);
        debug!("Found {} tsconfig path aliases", self.tsconfig_paths.len());

        self.root = Some(root);
        Ok(())
    }

    /// Get the root directory, returning an error if not initialized
    pub fn root(&self) -> Result<&PathBuf> {
        self.root
            .as_ref()
            .ok_or_else(|| anyhow!("Config not initialized - call initialize() first"))
    }

    /// Validated engine options for an initialized config.
    pub fn options(&self) -> Result<Options> {
        let project_root = match &self.project_root {
            Some(p) => p.clone(),
            None => self.root()?.clone(),
        };
        let mut options = Options {
            follow_default_imports: self.follow_default_imports,
            follow_through_side_effects: self.follow_through_side_effects,
            side_effects: SideEffectChecking {
                enabled: !self.no_side_effect_checking,
                default_assumption: !self.assume_pure,
                ignore_list: self.side_effects_ignore.clone(),
                project_root,
            },
        };
        options.validate()?;
        // Resolved files are canonical, so ignore globs must be matched against a canonical base
        let canonical = options.side_effects.project_root.canonicalize().map_err(|e| {
            anyhow!(
                "Invalid option `projectRoot` (--project-root) ({}): {}",
                options.side_effects.project_root.display(),
                e
            )
        })?;
        options.side_effects.project_root = canonical;
        Ok(options)
    }
}
