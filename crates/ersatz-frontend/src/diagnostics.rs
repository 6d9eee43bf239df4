use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ersatz_core::diag::Diagnostic;

/// Line tables for the files of one load, keyed by the file ids that
/// diagnostics carry in `module_id`.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: HashMap<String, FileLines>,
}

#[derive(Debug)]
struct FileLines {
    path: PathBuf,
    /// Byte offset at which each line starts; always begins with 0.
    starts: Vec<u32>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file_id: impl Into<String>, path: &Path, source: &str) {
        let starts = std::iter::once(0)
            .chain(
                source
                    .match_indices('\n')
                    .filter_map(|(idx, _)| u32::try_from(idx + 1).ok()),
            )
            .collect();
        self.files.insert(
            file_id.into(),
            FileLines {
                path: path.to_path_buf(),
                starts,
            },
        );
    }

    /// 1-based line of `offset` in `file_id`.
    pub fn line(&self, file_id: &str, offset: u32) -> Option<usize> {
        let file = self.files.get(file_id)?;
        Some(file.starts.partition_point(|&start| start <= offset))
    }

    /// `path:line: severity: message`, degrading to the file id or
    /// `<unknown>` when the location is not known.
    pub fn describe(&self, diag: &Diagnostic) -> String {
        let Some(file_id) = diag.module_id.as_deref() else {
            return format!("<unknown>: {}: {}", diag.severity, diag.message);
        };
        let Some(file) = self.files.get(file_id) else {
            return format!("{}: {}: {}", file_id, diag.severity, diag.message);
        };
        match diag.span.and_then(|span| self.line(file_id, span.start)) {
            Some(line) => format!(
                "{}:{}: {}: {}",
                file.path.display(),
                line,
                diag.severity,
                diag.message
            ),
            None => format!("{}: {}: {}", file.path.display(), diag.severity, diag.message),
        }
    }

    /// One described line per diagnostic.
    pub fn report(&self, diagnostics: &[Diagnostic]) -> String {
        diagnostics
            .iter()
            .map(|diag| self.describe(diag))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
