use ersatz_core::{ast::SourceFile, diag::Diagnostic};

mod diagnostics;
mod lexer;
mod module_loader;
mod parser;
mod resolver;

pub use diagnostics::SourceMap;
pub use lexer::{lex, LexOutput};
pub use module_loader::{load_modules, LoadError, LoadOptions, ModuleLoader};
pub use parser::{parse, ParseOutput};
pub use resolver::{resolve_module, ParsedFile, ResolveOutput};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontendOutput {
    pub file: Option<SourceFile>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lexes and parses one declaration file. `file` is only set when both
/// stages ran clean.
pub fn parse_source(source: &str) -> FrontendOutput {
    let LexOutput {
        tokens,
        diagnostics,
    } = lex(source);
    let mut diagnostics = diagnostics;

    let mut file = None;

    if diagnostics.is_empty() {
        let ParseOutput {
            file: parsed,
            diagnostics: parse_diags,
        } = parse(&tokens, source);
        diagnostics.extend(parse_diags);
        if diagnostics.is_empty() {
            file = Some(parsed);
        }
    }

    FrontendOutput { file, diagnostics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ersatz_core::diag::Severity;

    #[test]
    fn parse_source_accepts_valid_input() {
        let output = parse_source("package store\n\ntype Key string\n");
        assert!(output.diagnostics.is_empty());
        let file = output.file.unwrap();
        assert_eq!(file.package.0, "store");
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn parse_source_stops_after_lex_failure() {
        let output = parse_source("package store\nimport \"unterminated");
        assert!(output.file.is_none());
        assert_eq!(output.diagnostics.len(), 1);
        assert!(matches!(output.diagnostics[0].severity, Severity::Error));
    }

    #[test]
    fn parse_source_reports_parse_errors() {
        let output = parse_source("type Key string\n");
        assert!(output.file.is_none());
        assert!(!output.diagnostics.is_empty());
    }
}
