use std::collections::HashSet;

use ersatz_core::{
    diag::{Diagnostic, DiagnosticSink},
    module::ModuleSet,
    types::{self as ty, BasicKind, InterfaceType, Signature, Type, TypeName},
};
use ersatz_frontend::{load_modules, LoadError, LoadOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    imports::{Import, ImportRegistry},
    locator::{locate_declaration, DeclarationKind, LocateError},
    render::TypeRenderer,
    walker::TypeWalker,
};

/// Settings for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeOptions {
    /// Module path the fake is written into. Types declared there are
    /// rendered unqualified and the module is never imported.
    pub destination: String,
    /// Name of the generated fake; `Fake<Target>` when empty.
    pub fake_name: String,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error("`{name}` is neither an interface nor a function type")]
    NotFakeable { name: String },
}

/// A rendered parameter or result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    /// Source text of the type; `...T` for a variadic parameter.
    pub type_text: String,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

/// Everything a template needs to emit a fake for one declaration.
#[derive(Debug, Clone)]
pub struct Fake {
    target_name: String,
    target_path: String,
    target_alias: String,
    kind: DeclarationKind,
    fake_name: String,
    methods: Vec<Method>,
    imports: ImportRegistry,
}

impl Fake {
    /// Locates `target_name` among the root modules of `modules` and
    /// resolves every type in its method set.
    #[tracing::instrument(level = "debug", skip(modules, options, sink), fields(destination = %options.destination))]
    pub fn new(
        modules: &ModuleSet,
        target_name: &str,
        options: &FakeOptions,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Self, GenerateError> {
        let mut imports = ImportRegistry::for_destination(&options.destination);
        let target = locate_declaration(modules, target_name.trim(), &mut imports, sink)?;

        let signatures = match (target.kind, modules.underlying(&target.decl.ty)) {
            (DeclarationKind::Interface, Some(Type::Interface(iface))) => {
                let mut methods = Vec::new();
                let mut seen = HashSet::new();
                collect_methods(modules, iface, &mut methods, &mut seen, sink);
                methods.sort_by(|a, b| a.name.cmp(&b.name));
                methods.dedup_by(|a, b| a.name == b.name);
                methods
            }
            (DeclarationKind::Function, Some(Type::Signature(sig))) => vec![ty::Method {
                name: target.decl.name.clone(),
                sig: sig.clone(),
            }],
            _ => {
                return Err(GenerateError::NotFakeable {
                    name: target.decl.name.clone(),
                })
            }
        };

        {
            let mut walker = TypeWalker::new(&mut imports, sink);
            for method in &signatures {
                for var in method.sig.params.iter().chain(&method.sig.results) {
                    walker.walk(Some(&var.ty));
                }
            }
        }

        let mut renderer = TypeRenderer::new(&imports, sink);
        let methods: Vec<Method> = signatures
            .iter()
            .map(|method| Method {
                name: method.name.clone(),
                params: render_params(&mut renderer, &method.sig.params, method.sig.variadic),
                results: render_params(&mut renderer, &method.sig.results, false),
            })
            .collect();
        let qualified = renderer.into_qualified_paths();
        for path in &qualified {
            imports.mark_referenced(path);
        }

        // The target's own module is imported even when no signature names it.
        let target_path = target.module.path.clone();
        if !imports.is_local(&target_path) {
            imports.mark_referenced(&target_path);
        }
        let target_alias = imports
            .resolve(&target_path)
            .map(|import| import.alias.clone())
            .unwrap_or_else(|| target.module.name.clone());
        let fake_name = match options.fake_name.trim() {
            "" => format!("Fake{}", target.decl.name),
            name => name.to_string(),
        };
        tracing::debug!(
            target = %target.decl.name,
            methods = methods.len(),
            imports = imports.len(),
            "resolved fake"
        );

        Ok(Self {
            target_name: target.decl.name.clone(),
            target_path,
            target_alias,
            kind: target.kind,
            fake_name,
            methods,
            imports,
        })
    }

    /// Loads `specifiers` and builds the fake in one step.
    pub fn load<I, S>(
        load_options: &LoadOptions,
        specifiers: I,
        target_name: &str,
        options: &FakeOptions,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Self, GenerateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let modules = load_modules(load_options, specifiers)?;
        Self::new(&modules, target_name, options, sink)
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn target_alias(&self) -> &str {
        &self.target_alias
    }

    /// The target as it is spelled from the destination module.
    pub fn target_type_text(&self) -> String {
        if self.imports.is_local(&self.target_path) {
            self.target_name.clone()
        } else {
            format!("{}.{}", self.target_alias, self.target_name)
        }
    }

    pub fn fake_name(&self) -> &str {
        &self.fake_name
    }

    pub fn is_interface(&self) -> bool {
        self.kind == DeclarationKind::Interface
    }

    pub fn is_function(&self) -> bool {
        self.kind == DeclarationKind::Function
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn imports(&self) -> &ImportRegistry {
        &self.imports
    }

    pub fn referenced_imports(&self) -> impl Iterator<Item = &Import> {
        self.imports.referenced()
    }
}

/// Appends the methods of `iface`, expanding embedded interfaces.
fn collect_methods(
    modules: &ModuleSet,
    iface: &InterfaceType,
    out: &mut Vec<ty::Method>,
    seen: &mut HashSet<TypeName>,
    sink: &mut dyn DiagnosticSink,
) {
    out.extend(iface.methods.iter().cloned());
    for embedded in &iface.embedded {
        if let Some(name) = embedded.as_named() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if name.module.is_none() && name.name == "error" {
                out.push(error_method());
                continue;
            }
        }
        match modules.underlying(embedded) {
            Some(Type::Interface(inner)) => collect_methods(modules, inner, out, seen, sink),
            _ => sink.report(Diagnostic::warning(
                format!("cannot expand embedded type {}", embedded),
                None,
            )),
        }
    }
}

fn error_method() -> ty::Method {
    ty::Method {
        name: "Error".to_string(),
        sig: Signature {
            params: Vec::new(),
            results: vec![ty::Var::new(None, Type::Basic(BasicKind::String))],
            variadic: false,
        },
    }
}

fn render_params(renderer: &mut TypeRenderer<'_, '_>, vars: &[ty::Var], variadic: bool) -> Vec<Param> {
    let last = vars.len().saturating_sub(1);
    vars.iter()
        .enumerate()
        .map(|(idx, var)| {
            let variadic = variadic && idx == last;
            let type_text = match (&var.ty, variadic) {
                (Type::Slice(elem), true) => format!("...{}", renderer.render(elem)),
                (other, _) => renderer.render(other),
            };
            Param {
                name: var.name.clone(),
                type_text,
                variadic,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ersatz_core::module::{Module, Object, Scope, TypeDecl};
    use ersatz_core::types::{ChanDir, ModuleRef, Var};

    fn store() -> ModuleRef {
        ModuleRef::new("example.com/store", "store")
    }

    fn time() -> ModuleRef {
        ModuleRef::new("time", "time")
    }

    fn sig(params: Vec<Var>, results: Vec<Var>, variadic: bool) -> Signature {
        Signature {
            params,
            results,
            variadic,
        }
    }

    fn method(name: &str, sig: Signature) -> ty::Method {
        ty::Method {
            name: name.into(),
            sig,
        }
    }

    fn fixture() -> ModuleSet {
        let mut time_scope = Scope::new();
        time_scope.insert(Object::TypeName(TypeDecl {
            name: "Time".into(),
            ty: Type::Basic(BasicKind::Int64),
        }));

        let mut scope = Scope::new();
        scope.insert(Object::TypeName(TypeDecl {
            name: "Clock".into(),
            ty: Type::Interface(InterfaceType {
                methods: vec![method(
                    "Now",
                    sig(vec![], vec![Var::new(None, Type::named(Some(time()), "Time"))], false),
                )],
                embedded: vec![],
            }),
        }));
        scope.insert(Object::TypeName(TypeDecl {
            name: "Store".into(),
            ty: Type::Interface(InterfaceType {
                methods: vec![
                    method(
                        "Watch",
                        sig(
                            vec![Var::new(Some("keys"), Type::slice(Type::Basic(BasicKind::String)))],
                            vec![Var::new(
                                None,
                                Type::chan(ChanDir::Recv, Type::named(Some(store()), "Event")),
                            )],
                            true,
                        ),
                    ),
                    method(
                        "Get",
                        sig(
                            vec![Var::new(Some("key"), Type::Basic(BasicKind::String))],
                            vec![
                                Var::new(None, Type::pointer(Type::named(Some(store()), "Item"))),
                                Var::new(None, Type::named(None, "error")),
                            ],
                            false,
                        ),
                    ),
                ],
                embedded: vec![
                    Type::named(Some(store()), "Clock"),
                    Type::named(None, "error"),
                ],
            }),
        }));
        scope.insert(Object::TypeName(TypeDecl {
            name: "Handler".into(),
            ty: Type::Signature(sig(
                vec![Var::new(Some("at"), Type::named(Some(time()), "Time"))],
                vec![],
                false,
            )),
        }));
        scope.insert(Object::TypeName(TypeDecl {
            name: "Event".into(),
            ty: Type::Basic(BasicKind::Int),
        }));

        let mut set = ModuleSet::new();
        set.insert(Module::new("time", "time", time_scope));
        set.insert_root(Module::new("example.com/store", "store", scope));
        set
    }

    #[test]
    fn interface_method_set_is_expanded_and_sorted() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let fake = Fake::new(&modules, "Store", &FakeOptions::default(), &mut sink).unwrap();

        assert!(fake.is_interface());
        assert_eq!(fake.target_name(), "Store");
        assert_eq!(fake.target_alias(), "store");
        assert_eq!(fake.target_type_text(), "store.Store");
        assert_eq!(fake.fake_name(), "FakeStore");

        let names: Vec<&str> = fake.methods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Error", "Get", "Now", "Watch"]);

        let watch = &fake.methods()[3];
        assert_eq!(watch.params[0].type_text, "...string");
        assert!(watch.params[0].variadic);
        assert_eq!(watch.results[0].type_text, "<-chan store.Event");

        let get = &fake.methods()[1];
        let results: Vec<&str> = get.results.iter().map(|p| p.type_text.as_str()).collect();
        assert_eq!(results, vec!["*store.Item", "error"]);

        let aliases: Vec<&str> = fake.imports().all().iter().map(|i| i.alias.as_str()).collect();
        assert_eq!(aliases, vec!["store", "time"]);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn generating_into_the_target_module_keeps_names_bare() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let options = FakeOptions {
            destination: "example.com/store".into(),
            fake_name: "StoreStub".into(),
        };
        let fake = Fake::new(&modules, "Store", &options, &mut sink).unwrap();

        assert_eq!(fake.target_type_text(), "Store");
        assert_eq!(fake.fake_name(), "StoreStub");
        let get = fake.methods().iter().find(|m| m.name == "Get").unwrap();
        assert_eq!(get.results[0].type_text, "*Item");

        let paths: Vec<&str> = fake.imports().all().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["time"]);
    }

    #[test]
    fn function_types_yield_one_method() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let fake = Fake::new(&modules, "Handler", &FakeOptions::default(), &mut sink).unwrap();

        assert!(fake.is_function());
        assert_eq!(fake.methods().len(), 1);
        assert_eq!(fake.methods()[0].name, "Handler");
        assert_eq!(fake.methods()[0].params[0].type_text, "time.Time");
        assert_eq!(sink[0].message, "found function with name: [Handler]");
    }

    #[test]
    fn target_and_rendered_imports_are_referenced() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let fake = Fake::new(&modules, "Handler", &FakeOptions::default(), &mut sink).unwrap();

        let referenced: Vec<&str> = fake.referenced_imports().map(|i| i.path.as_str()).collect();
        assert_eq!(referenced, vec!["example.com/store", "time"]);
        assert_eq!(fake.imports().len(), 2);

        let options = FakeOptions {
            destination: "example.com/store".into(),
            ..FakeOptions::default()
        };
        let local = Fake::new(&modules, "Handler", &options, &mut sink).unwrap();
        let referenced: Vec<&str> = local.referenced_imports().map(|i| i.path.as_str()).collect();
        assert_eq!(referenced, vec!["time"]);
    }

    fn iface(methods: &[&str], embedded: Vec<Type>) -> Type {
        Type::Interface(InterfaceType {
            methods: methods
                .iter()
                .map(|name| method(name, sig(vec![], vec![], false)))
                .collect(),
            embedded,
        })
    }

    fn module_with(decls: Vec<(&str, Type)>) -> ModuleSet {
        let mut scope = Scope::new();
        for (name, ty) in decls {
            scope.insert(Object::TypeName(TypeDecl {
                name: name.into(),
                ty,
            }));
        }
        ModuleSet::from_roots([Module::new("example.com/store", "store", scope)])
    }

    fn collected(modules: &ModuleSet, name: &str, sink: &mut Vec<Diagnostic>) -> Vec<String> {
        let ty = Type::named(Some(store()), name);
        let Some(Type::Interface(root)) = modules.underlying(&ty) else {
            panic!("{name} should be an interface");
        };
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        collect_methods(modules, root, &mut out, &mut seen, sink);
        out.into_iter().map(|m| m.name).collect()
    }

    #[test]
    fn embedded_struct_is_reported_and_skipped() {
        let modules = module_with(vec![
            ("Item", Type::Struct(Default::default())),
            ("Getter", iface(&["Get"], vec![Type::named(Some(store()), "Item")])),
        ]);
        let mut sink: Vec<Diagnostic> = Vec::new();
        let names = collected(&modules, "Getter", &mut sink);

        assert_eq!(names, vec!["Get"]);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].severity, ersatz_core::diag::Severity::Warning);
        assert_eq!(
            sink[0].message,
            "cannot expand embedded type example.com/store.Item"
        );
    }

    #[test]
    fn shared_embedded_interface_is_expanded_once() {
        let d = Type::named(Some(store()), "D");
        let modules = module_with(vec![
            ("D", iface(&["M"], vec![])),
            ("B", iface(&["MB"], vec![d.clone()])),
            ("C", iface(&["MC"], vec![d])),
            (
                "A",
                iface(
                    &[],
                    vec![Type::named(Some(store()), "B"), Type::named(Some(store()), "C")],
                ),
            ),
        ]);
        let mut sink: Vec<Diagnostic> = Vec::new();
        let names = collected(&modules, "A", &mut sink);

        assert_eq!(names, vec!["MB", "M", "MC"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn mutually_embedded_interfaces_terminate() {
        let modules = module_with(vec![
            ("A", iface(&["MA"], vec![Type::named(Some(store()), "B")])),
            ("B", iface(&["MB"], vec![Type::named(Some(store()), "A")])),
        ]);
        let mut sink: Vec<Diagnostic> = Vec::new();
        let names = collected(&modules, "A", &mut sink);

        assert_eq!(names, vec!["MA", "MB", "MA"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn rejects_other_type_names() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let err = Fake::new(&modules, "Event", &FakeOptions::default(), &mut sink).unwrap_err();
        assert!(matches!(err, GenerateError::NotFakeable { ref name } if name == "Event"));
        assert_eq!(
            err.to_string(),
            "`Event` is neither an interface nor a function type"
        );
    }

    #[test]
    fn missing_target_is_a_locate_error() {
        let modules = fixture();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let err = Fake::new(&modules, "Nope", &FakeOptions::default(), &mut sink).unwrap_err();
        assert!(matches!(err, GenerateError::Locate(LocateError::NotFound { .. })));
        assert_eq!(err.to_string(), "cannot find declaration named Nope");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options = options_from_pairs(&[("destination", "example.com/fakes")]);
        assert_eq!(options.destination, "example.com/fakes");
        assert!(options.fake_name.is_empty());
    }

    fn options_from_pairs(entries: &[(&str, &str)]) -> FakeOptions {
        use serde::de::value::{Error, MapDeserializer};
        let de = MapDeserializer::<_, Error>::new(entries.iter().copied());
        FakeOptions::deserialize(de).unwrap()
    }
}
