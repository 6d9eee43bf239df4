use std::fs;
use std::path::{Path, PathBuf};

use ersatz_core::diag::Diagnostic;
use ersatz_core::module::{unvendor, ModuleSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::diagnostics::SourceMap;
use crate::parse_source;
use crate::resolver::{resolve_module, ParsedFile};

/// Where and how modules are searched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Directory module paths are resolved against.
    pub root: PathBuf,
    /// Extension of declaration files, without the dot.
    pub extension: String,
    /// Also search `<root>/vendor/<path>`.
    pub vendor: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extension: "api".to_string(),
            vendor: true,
        }
    }
}

impl LoadOptions {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("module not found: `{path}` (searched: {searched:?})")]
    NotFound { path: String, searched: Vec<PathBuf> },

    #[error("module `{path}` has no .{extension} files in {}", dir.display())]
    Empty {
        path: String,
        dir: PathBuf,
        extension: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("failed to parse module `{module}`:\n{report}")]
    Syntax {
        module: String,
        report: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("failed to resolve module `{module}`:\n{report}")]
    Resolve {
        module: String,
        report: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("circular import detected: {}", cycle.join(" → "))]
    ImportCycle { cycle: Vec<String> },
}

impl LoadError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            LoadError::Syntax { diagnostics, .. } | LoadError::Resolve { diagnostics, .. } => {
                diagnostics
            }
            _ => &[],
        }
    }
}

/// Loads the requested modules and, transitively, every module they import.
pub fn load_modules<I, S>(options: &LoadOptions, specifiers: I) -> Result<ModuleSet, LoadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut loader = ModuleLoader::new(options.clone());
    for spec in specifiers {
        loader.load_root(spec.as_ref())?;
    }
    Ok(loader.finish())
}

/// Module loader with caching and cycle detection
pub struct ModuleLoader {
    options: LoadOptions,
    modules: ModuleSet,
    /// Modules currently being loaded, outermost first.
    loading: Vec<String>,
}

impl ModuleLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            modules: ModuleSet::new(),
            loading: Vec::new(),
        }
    }

    /// Loads `spec` and records it as a root of the resulting set.
    pub fn load_root(&mut self, spec: &str) -> Result<String, LoadError> {
        let path = self.load(spec)?;
        self.modules.mark_root(&path);
        Ok(path)
    }

    pub fn finish(self) -> ModuleSet {
        self.modules
    }

    /// Loads one module and its imports; returns its canonical path.
    fn load(&mut self, spec: &str) -> Result<String, LoadError> {
        let spec = spec.trim().trim_end_matches('/');
        let canonical = unvendor(spec).to_string();

        if self.modules.contains(&canonical) {
            return Ok(canonical);
        }

        if let Some(pos) = self.loading.iter().position(|p| *p == canonical) {
            let mut cycle = self.loading[pos..].to_vec();
            cycle.push(canonical);
            return Err(LoadError::ImportCycle { cycle });
        }

        let dir = self.locate(spec, &canonical)?;
        self.loading.push(canonical.clone());
        let result = self.load_dir(&canonical, &dir);
        self.loading.pop();
        let module = result?;
        tracing::debug!(module = %canonical, dir = %dir.display(), "loaded module");
        self.modules.insert(module);
        Ok(canonical)
    }

    fn locate(&self, spec: &str, canonical: &str) -> Result<PathBuf, LoadError> {
        let mut searched = Vec::new();
        if !spec.is_empty() {
            searched.push(self.options.root.join(spec));
            if self.options.vendor {
                searched.push(self.options.root.join("vendor").join(canonical));
            }
        }
        match searched.iter().find(|dir| dir.is_dir()) {
            Some(dir) => Ok(dir.clone()),
            None => Err(LoadError::NotFound {
                path: canonical.to_string(),
                searched,
            }),
        }
    }

    fn load_dir(&mut self, path: &str, dir: &Path) -> Result<ersatz_core::module::Module, LoadError> {
        let mut sources = SourceMap::new();
        let mut files = Vec::new();
        let mut diagnostics = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry?;
            let file_path = entry.path();

            // Skip non-declaration files
            if !entry.file_type().is_file()
                || file_path.extension().and_then(|s| s.to_str())
                    != Some(self.options.extension.as_str())
            {
                continue;
            }

            let source = fs::read_to_string(file_path).map_err(|source| LoadError::Io {
                path: file_path.to_path_buf(),
                source,
            })?;
            let file_id = file_id(path, file_path);
            tracing::debug!(file = %file_path.display(), "parsing");

            let out = parse_source(&source);
            diagnostics.extend(
                out.diagnostics
                    .into_iter()
                    .map(|diag| diag.with_module_id(file_id.clone())),
            );
            sources.add(file_id.clone(), file_path, &source);
            if let Some(file) = out.file {
                files.push(ParsedFile { id: file_id, file });
            }
        }

        if !diagnostics.is_empty() {
            return Err(LoadError::Syntax {
                module: path.to_string(),
                report: sources.report(&diagnostics),
                diagnostics,
            });
        }
        if files.is_empty() {
            return Err(LoadError::Empty {
                path: path.to_string(),
                dir: dir.to_path_buf(),
                extension: self.options.extension.clone(),
            });
        }

        // Dependencies first, so the resolver can see their scopes
        let mut deps: Vec<String> = Vec::new();
        for parsed in &files {
            for import in &parsed.file.imports {
                if !deps.contains(&import.path) {
                    deps.push(import.path.clone());
                }
            }
        }
        for dep in &deps {
            self.load(dep)?;
        }

        let out = resolve_module(path, &files, &self.modules);
        if !out.diagnostics.is_empty() {
            return Err(LoadError::Resolve {
                module: path.to_string(),
                report: sources.report(&out.diagnostics),
                diagnostics: out.diagnostics,
            });
        }
        Ok(out.module)
    }
}

fn file_id(module_path: &str, file_path: &Path) -> String {
    let file_name = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", module_path, file_name)
}
