use std::collections::HashMap;

use ersatz_core::{
    ast::{Decl, FieldExpr, InterfaceElem, ParamExpr, SignatureExpr, SourceFile, TypeExpr},
    diag::Diagnostic,
    module::{unvendor, FuncDecl, Module, ModuleSet, Object, Scope, TypeDecl},
    span::Span,
    types::{
        BasicKind, Field, InterfaceType, Method, ModuleRef, Signature, StructType, Type, Var,
    },
};

/// A parsed source file together with the id diagnostics are keyed by.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub id: String,
    pub file: SourceFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutput {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the symbol table for one module. Every module listed in the files'
/// imports must already be present in `deps`.
pub fn resolve_module(path: &str, files: &[ParsedFile], deps: &ModuleSet) -> ResolveOutput {
    let mut diagnostics = Vec::new();
    let name = files
        .first()
        .map(|f| f.file.package.0.clone())
        .unwrap_or_default();
    let module_ref = ModuleRef::new(path, name.clone());

    for parsed in files.iter().skip(1) {
        if parsed.file.package.0 != name {
            diagnostics.push(
                Diagnostic::error(
                    format!(
                        "package `{}` conflicts with package `{}` declared by other files of `{}`",
                        parsed.file.package.0, name, path
                    ),
                    None,
                )
                .with_module_id(parsed.id.clone()),
            );
        }
    }

    // Collect declarations first so type names can refer to each other in any order
    let mut declared: HashMap<&str, &Decl> = HashMap::new();
    for parsed in files {
        for decl in &parsed.file.decls {
            let decl_name = decl.name().0.as_str();
            if declared.insert(decl_name, decl).is_some() {
                diagnostics.push(
                    Diagnostic::error(
                        format!("`{}` redeclared in this module", decl_name),
                        Some(decl.span()),
                    )
                    .with_module_id(parsed.id.clone()),
                );
            }
        }
    }

    let mut scope = Scope::new();
    let mut imports: Vec<String> = Vec::new();
    for parsed in files {
        let mut resolver = Resolver {
            module: &module_ref,
            declared: &declared,
            deps,
            imports: HashMap::new(),
            file_id: &parsed.id,
            diagnostics: &mut diagnostics,
        };
        resolver.bind_imports(&parsed.file);
        for import in &parsed.file.imports {
            let import_path = unvendor(&import.path).to_string();
            if !imports.contains(&import_path) {
                imports.push(import_path);
            }
        }

        for decl in &parsed.file.decls {
            let object = match decl {
                Decl::Type(spec) => resolver.resolve_type(&spec.ty).map(|ty| {
                    Object::TypeName(TypeDecl {
                        name: spec.name.0.clone(),
                        ty,
                    })
                }),
                Decl::Func(func) => resolver.resolve_signature(&func.sig).map(|sig| {
                    Object::Func(FuncDecl {
                        name: func.name.0.clone(),
                        sig,
                    })
                }),
            };
            if let Some(object) = object {
                if scope.lookup(object.name()).is_none() {
                    scope.insert(object);
                }
            }
        }
    }

    tracing::debug!(module = path, symbols = scope.len(), "resolved module");

    let mut module = Module::new(path, name, scope);
    module.imports = imports;
    ResolveOutput {
        module,
        diagnostics,
    }
}

struct Resolver<'a> {
    module: &'a ModuleRef,
    declared: &'a HashMap<&'a str, &'a Decl>,
    deps: &'a ModuleSet,
    /// Import alias -> module, for the file being resolved.
    imports: HashMap<String, ModuleRef>,
    file_id: &'a str,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn error(&mut self, message: String, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, Some(span)).with_module_id(self.file_id));
    }

    fn bind_imports(&mut self, file: &SourceFile) {
        let deps = self.deps;
        for import in &file.imports {
            let path = unvendor(&import.path);
            let Some(dep) = deps.get(path) else {
                self.error(format!("import `{}` was not loaded", path), import.span);
                continue;
            };
            let alias = match &import.alias {
                Some(alias) => alias.0.clone(),
                None => dep.name.clone(),
            };
            if alias == "_" {
                continue;
            }
            if self.imports.contains_key(&alias) {
                self.error(
                    format!("`{}` redeclared in this file", alias),
                    import.span,
                );
                continue;
            }
            self.imports.insert(alias, dep.module_ref());
        }
    }

    fn resolve_type(&mut self, expr: &TypeExpr) -> Option<Type> {
        match expr {
            TypeExpr::Name {
                qualifier: None,
                name,
                span,
            } => self.resolve_local_name(&name.0, *span),
            TypeExpr::Name {
                qualifier: Some(qualifier),
                name,
                span,
            } => self.resolve_qualified_name(&qualifier.0, &name.0, *span),
            TypeExpr::Pointer { elem, .. } => self.resolve_type(elem).map(Type::pointer),
            TypeExpr::Slice { elem, .. } => self.resolve_type(elem).map(Type::slice),
            TypeExpr::Array { len, elem, .. } => {
                self.resolve_type(elem).map(|elem| Type::array(*len, elem))
            }
            TypeExpr::Map { key, elem, .. } => {
                let key = self.resolve_type(key);
                let elem = self.resolve_type(elem);
                Some(Type::map(key?, elem?))
            }
            TypeExpr::Chan { dir, elem, .. } => {
                self.resolve_type(elem).map(|elem| Type::chan(*dir, elem))
            }
            TypeExpr::Func { sig, .. } => self.resolve_signature(sig).map(Type::Signature),
            TypeExpr::Interface { elems, .. } => {
                let mut iface = InterfaceType::default();
                let mut ok = true;
                for elem in elems {
                    match elem {
                        InterfaceElem::Method { name, sig, .. } => {
                            match self.resolve_signature(sig) {
                                Some(sig) => iface.methods.push(Method {
                                    name: name.0.clone(),
                                    sig,
                                }),
                                None => ok = false,
                            }
                        }
                        InterfaceElem::Embedded(embedded) => match self.resolve_type(embedded) {
                            Some(ty) => iface.embedded.push(ty),
                            None => ok = false,
                        },
                    }
                }
                ok.then_some(Type::Interface(iface))
            }
            TypeExpr::Struct { fields, .. } => {
                let resolved: Vec<Option<Field>> =
                    fields.iter().map(|f| self.resolve_field(f)).collect();
                let fields: Option<Vec<Field>> = resolved.into_iter().collect();
                fields.map(|fields| Type::Struct(StructType { fields }))
            }
        }
    }

    fn resolve_field(&mut self, field: &FieldExpr) -> Option<Field> {
        let ty = self.resolve_type(&field.ty)?;
        Some(Field {
            name: field.name.as_ref().map(|n| n.0.clone()),
            ty,
        })
    }

    fn resolve_local_name(&mut self, name: &str, span: Span) -> Option<Type> {
        let declared = self.declared;
        match declared.get(name) {
            Some(Decl::Type(_)) => return Some(Type::named(Some(self.module.clone()), name)),
            Some(Decl::Func(_)) => {
                self.error(format!("`{}` is not a type", name), span);
                return None;
            }
            None => {}
        }
        if let Some(kind) = BasicKind::from_name(name) {
            return Some(Type::Basic(kind));
        }
        match name {
            "error" => Some(Type::named(None, "error")),
            "any" => Some(Type::Interface(InterfaceType::default())),
            _ => {
                self.error(format!("undefined: {}", name), span);
                None
            }
        }
    }

    fn resolve_qualified_name(&mut self, qualifier: &str, name: &str, span: Span) -> Option<Type> {
        let Some(module) = self.imports.get(qualifier).cloned() else {
            self.error(format!("undefined: {}", qualifier), span);
            return None;
        };
        let deps = self.deps;
        let object = deps
            .get(&module.path)
            .and_then(|dep| dep.scope.as_ref())
            .and_then(|scope| scope.lookup(name));
        match object {
            Some(Object::TypeName(_)) => Some(Type::named(Some(module), name)),
            Some(Object::Func(_)) => {
                self.error(format!("`{}.{}` is not a type", qualifier, name), span);
                None
            }
            None => {
                self.error(format!("undefined: {}.{}", qualifier, name), span);
                None
            }
        }
    }

    fn resolve_signature(&mut self, sig: &SignatureExpr) -> Option<Signature> {
        let params = self.resolve_params(&sig.params);
        let results = self.resolve_params(&sig.results);
        let variadic = sig.params.last().is_some_and(|p| p.variadic);
        Some(Signature {
            params: params?,
            results: results?,
            variadic,
        })
    }

    fn resolve_params(&mut self, params: &[ParamExpr]) -> Option<Vec<Var>> {
        let mut vars = Vec::with_capacity(params.len());
        let mut ok = true;
        for param in params {
            match self.resolve_type(&param.ty) {
                Some(ty) => {
                    let ty = if param.variadic { Type::slice(ty) } else { ty };
                    vars.push(Var::new(param.name.as_ref().map(|n| n.0.as_str()), ty));
                }
                None => ok = false,
            }
        }
        ok.then_some(vars)
    }
}
