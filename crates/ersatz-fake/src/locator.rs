use ersatz_core::{
    diag::{Diagnostic, DiagnosticSink},
    module::{Module, ModuleSet, Object, TypeDecl},
    types::Type,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imports::ImportRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationKind {
    Interface,
    Function,
    /// A type name whose underlying type is neither of the above.
    Other,
}

/// A located type declaration together with the module that declares it.
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    pub decl: &'a TypeDecl,
    pub module: &'a Module,
    pub kind: DeclarationKind,
}

impl<'a> Declaration<'a> {
    pub fn name(&self) -> &'a str {
        &self.decl.name
    }

    pub fn is_interface(&self) -> bool {
        self.kind == DeclarationKind::Interface
    }

    pub fn is_function(&self) -> bool {
        self.kind == DeclarationKind::Function
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("cannot find declaration named {name}")]
    NotFound { name: String },
}

/// Finds the first root module whose scope declares a type named `name`.
///
/// Roots are scanned in order and modules without a scope are skipped. On
/// success the declaring module is registered in `imports`; on failure
/// `imports` is left as it was.
pub fn locate_declaration<'a>(
    modules: &'a ModuleSet,
    name: &str,
    imports: &mut ImportRegistry,
    sink: &mut dyn DiagnosticSink,
) -> Result<Declaration<'a>, LocateError> {
    let found = modules.roots().find_map(|module| {
        match module.scope.as_ref()?.lookup(name)? {
            Object::TypeName(decl) => Some((module, decl)),
            Object::Func(_) => None,
        }
    });
    let Some((module, decl)) = found else {
        return Err(LocateError::NotFound {
            name: name.to_string(),
        });
    };

    let kind = match modules.underlying(&decl.ty) {
        Some(Type::Interface(_)) => DeclarationKind::Interface,
        Some(Type::Signature(_)) => DeclarationKind::Function,
        _ => DeclarationKind::Other,
    };

    imports.register(&module.name, &module.path);
    match kind {
        DeclarationKind::Interface => sink.report(
            Diagnostic::note(format!("found interface with name: [{}]", decl.name))
                .with_module_id(module.path.clone()),
        ),
        DeclarationKind::Function => sink.report(
            Diagnostic::note(format!("found function with name: [{}]", decl.name))
                .with_module_id(module.path.clone()),
        ),
        DeclarationKind::Other => {}
    }

    Ok(Declaration { decl, module, kind })
}
