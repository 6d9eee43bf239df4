use std::collections::HashMap;

use ersatz_core::module::{short_name, unvendor};
use serde::{Deserialize, Serialize};

/// One external module the generated fake may refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub alias: String,
    /// Canonical (unvendored) module path.
    pub path: String,
    /// Set once rendered text actually qualifies a name with `alias`.
    pub referenced: bool,
}

/// Imports collected during one generation run, keyed by canonical path.
///
/// Entries are append-only and keep registration order. A path gets its
/// alias the first time it is registered; later registrations of the same
/// path change nothing. When the hinted alias is already held by another
/// path the smallest free numeric suffix is appended (`log`, `log1`, ...).
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    entries: Vec<Import>,
    by_path: HashMap<String, usize>,
    /// Module the fake is generated into; never imported.
    local: Option<String>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses to import `path`, the module being generated into.
    pub fn for_destination(path: &str) -> Self {
        let path = unvendor(path.trim());
        Self {
            local: (!path.is_empty()).then(|| path.to_string()),
            ..Self::default()
        }
    }

    /// Registers `path` under `alias_hint` (or its last path segment when the
    /// hint is blank). Returns the entry for `path`, or `None` when `path` is
    /// empty or names the destination module.
    pub fn register(&mut self, alias_hint: &str, path: &str) -> Option<&Import> {
        let path = unvendor(path.trim());
        if path.is_empty() || self.is_local(path) {
            return None;
        }
        if let Some(&idx) = self.by_path.get(path) {
            return self.entries.get(idx);
        }

        let hint = match alias_hint.trim() {
            "" => short_name(path),
            hint => hint,
        };
        let alias = self.free_alias(hint);
        tracing::debug!(alias = %alias, path, "adding import");

        let idx = self.entries.len();
        self.by_path.insert(path.to_string(), idx);
        self.entries.push(Import {
            alias,
            path: path.to_string(),
            referenced: false,
        });
        self.entries.get(idx)
    }

    pub fn resolve(&self, path: &str) -> Option<&Import> {
        let idx = *self.by_path.get(unvendor(path.trim()))?;
        self.entries.get(idx)
    }

    /// Every registered import, in registration order.
    pub fn all(&self) -> &[Import] {
        &self.entries
    }

    /// Returns `false` when `path` was never registered.
    pub fn mark_referenced(&mut self, path: &str) -> bool {
        match self.by_path.get(unvendor(path.trim())) {
            Some(&idx) => {
                self.entries[idx].referenced = true;
                true
            }
            None => false,
        }
    }

    pub fn referenced(&self) -> impl Iterator<Item = &Import> {
        self.entries.iter().filter(|import| import.referenced)
    }

    pub fn is_local(&self, path: &str) -> bool {
        self.local.as_deref() == Some(unvendor(path.trim()))
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn alias_taken(&self, alias: &str) -> bool {
        self.entries.iter().any(|import| import.alias == alias)
    }

    fn free_alias(&self, hint: &str) -> String {
        if !self.alias_taken(hint) {
            return hint.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}{}", hint, n);
            if !self.alias_taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
