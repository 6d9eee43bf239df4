use ersatz_core::{
    diag::{Diagnostic, DiagnosticSink},
    types::{ChanDir, Type, TypeName},
};

use crate::imports::ImportRegistry;

/// Turns types into source text, qualifying named types with the alias
/// their module was registered under.
///
/// Rendering reads the registry but never changes it, so every walk must be
/// finished before the first `render`.
pub struct TypeRenderer<'r, 's> {
    imports: &'r ImportRegistry,
    sink: &'s mut dyn DiagnosticSink,
    qualified: Vec<String>,
}

impl<'r, 's> TypeRenderer<'r, 's> {
    pub fn new(imports: &'r ImportRegistry, sink: &'s mut dyn DiagnosticSink) -> Self {
        Self {
            imports,
            sink,
            qualified: Vec::new(),
        }
    }

    pub fn render(&mut self, ty: &Type) -> String {
        let mut out = String::new();
        self.write(ty, &mut out);
        out
    }

    /// Module paths whose alias appeared in rendered text so far.
    pub fn qualified_paths(&self) -> &[String] {
        &self.qualified
    }

    pub fn into_qualified_paths(self) -> Vec<String> {
        self.qualified
    }

    fn write(&mut self, ty: &Type, out: &mut String) {
        match ty {
            Type::Slice(elem) => {
                out.push_str("[]");
                self.write(elem, out);
            }
            Type::Array { len, elem } => {
                out.push_str(&format!("[{}]", len));
                self.write(elem, out);
            }
            Type::Pointer(elem) => {
                out.push('*');
                self.write(elem, out);
            }
            Type::Map { key, elem } => {
                out.push_str("map[");
                self.write(key, out);
                out.push(']');
                self.write(elem, out);
            }
            Type::Chan { dir, elem } => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.write(elem, out);
            }
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Interface(iface) => out.push_str(&iface.to_string()),
            Type::Named(named) => match &named.obj {
                None => self.sink.report(Diagnostic::warning(
                    format!("named type has no declaration: {}", ty),
                    None,
                )),
                Some(obj) => self.write_named(obj, out),
            },
            Type::Signature(_) | Type::Struct(_) => self.sink.report(Diagnostic::warning(
                format!("missing case for type {}", ty.variant_name()),
                None,
            )),
        }
    }

    fn write_named(&mut self, obj: &TypeName, out: &mut String) {
        let Some(module) = &obj.module else {
            out.push_str(&obj.name);
            return;
        };
        if self.imports.is_local(&module.path) {
            out.push_str(&obj.name);
            return;
        }
        match self.imports.resolve(&module.path) {
            Some(import) => {
                out.push_str(&import.alias);
                out.push('.');
                out.push_str(&obj.name);
                if !self.qualified.contains(&import.path) {
                    self.qualified.push(import.path.clone());
                }
            }
            None => out.push_str(&obj.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::TypeWalker;
    use ersatz_core::types::{
        BasicKind, InterfaceType, Method, ModuleRef, NamedType, Signature, StructType, Var,
    };
    use insta::assert_snapshot;
    use proptest::prelude::*;

    fn pkg() -> ModuleRef {
        ModuleRef::new("example.com/pkg", "pkg")
    }

    fn walk_then_render(registry: &mut ImportRegistry, ty: &Type) -> (String, Vec<Diagnostic>) {
        let mut sink: Vec<Diagnostic> = Vec::new();
        TypeWalker::new(registry, &mut sink).walk(Some(ty));
        let text = TypeRenderer::new(registry, &mut sink).render(ty);
        (text, sink)
    }

    #[test]
    fn compound_type_is_qualified_once() {
        let mut registry = ImportRegistry::new();
        let ty = Type::map(
            Type::pointer(Type::named(Some(pkg()), "Foo")),
            Type::slice(Type::chan(ChanDir::Recv, Type::named(Some(pkg()), "Bar"))),
        );
        let (text, diags) = walk_then_render(&mut registry, &ty);
        assert_snapshot!(text, @"map[*pkg.Foo][]<-chan pkg.Bar");
        assert!(diags.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn channel_directions_and_arrays() {
        let registry = ImportRegistry::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let mut renderer = TypeRenderer::new(&registry, &mut sink);
        let int = || Type::Basic(BasicKind::Int);
        assert_eq!(renderer.render(&Type::chan(ChanDir::Both, int())), "chan int");
        assert_eq!(renderer.render(&Type::chan(ChanDir::Send, int())), "chan<- int");
        assert_eq!(renderer.render(&Type::chan(ChanDir::Recv, int())), "<-chan int");
        assert_eq!(renderer.render(&Type::array(16, Type::Basic(BasicKind::Byte))), "[16]byte");
    }

    #[test]
    fn uses_registered_alias() {
        let mut registry = ImportRegistry::new();
        registry.register("log", "example.com/log");
        let other = ModuleRef::new("other.org/log", "log");
        let ty = Type::pointer(Type::named(Some(other), "Logger"));
        let (text, _) = walk_then_render(&mut registry, &ty);
        assert_eq!(text, "*log1.Logger");
    }

    #[test]
    fn destination_names_stay_bare() {
        let mut registry = ImportRegistry::for_destination("example.com/pkg");
        let ty = Type::slice(Type::named(Some(pkg()), "Foo"));
        let (text, _) = walk_then_render(&mut registry, &ty);
        assert_eq!(text, "[]Foo");
        assert!(registry.is_empty());
    }

    #[test]
    fn unregistered_and_universe_names_stay_bare() {
        let registry = ImportRegistry::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let mut renderer = TypeRenderer::new(&registry, &mut sink);
        assert_eq!(renderer.render(&Type::named(Some(pkg()), "Foo")), "Foo");
        assert_eq!(renderer.render(&Type::named(None, "error")), "error");
        assert!(renderer.qualified_paths().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn interfaces_render_as_written() {
        let registry = ImportRegistry::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let iface = Type::Interface(InterfaceType {
            methods: vec![Method {
                name: "String".into(),
                sig: Signature {
                    params: vec![],
                    results: vec![Var::new(None, Type::Basic(BasicKind::String))],
                    variadic: false,
                },
            }],
            embedded: vec![],
        });
        let text = TypeRenderer::new(&registry, &mut sink).render(&Type::slice(iface));
        assert_snapshot!(text, @"[]interface{String() string}");
    }

    #[test]
    fn unsupported_variants_render_empty_with_one_warning() {
        let registry = ImportRegistry::new();
        for ty in [
            Type::Signature(Signature::default()),
            Type::Struct(StructType::default()),
        ] {
            let mut sink: Vec<Diagnostic> = Vec::new();
            let text = TypeRenderer::new(&registry, &mut sink).render(&ty);
            assert_eq!(text, "");
            assert_eq!(sink.len(), 1);
            assert!(sink[0].message.starts_with("missing case for type"));
        }
    }

    #[test]
    fn unowned_named_type_reports() {
        let registry = ImportRegistry::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let text = TypeRenderer::new(&registry, &mut sink)
            .render(&Type::Named(NamedType { obj: None }));
        assert_eq!(text, "");
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].message, "named type has no declaration: <invalid>");
    }

    #[test]
    fn records_each_qualified_path_once() {
        let mut registry = ImportRegistry::new();
        registry.register("pkg", "example.com/pkg");
        registry.register("time", "time");
        let mut sink: Vec<Diagnostic> = Vec::new();
        let mut renderer = TypeRenderer::new(&registry, &mut sink);
        renderer.render(&Type::named(Some(pkg()), "Foo"));
        renderer.render(&Type::pointer(Type::named(Some(pkg()), "Bar")));
        assert_eq!(renderer.into_qualified_paths(), vec!["example.com/pkg".to_string()]);
    }

    fn structural_type() -> impl Strategy<Value = Type> {
        let leaf = proptest::sample::select(BasicKind::ALL.to_vec()).prop_map(Type::Basic);
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(Type::pointer),
                inner.clone().prop_map(Type::slice),
                (0u64..64, inner.clone()).prop_map(|(len, elem)| Type::array(len, elem)),
                (inner.clone(), inner.clone()).prop_map(|(k, v)| Type::map(k, v)),
                (
                    prop_oneof![Just(ChanDir::Both), Just(ChanDir::Send), Just(ChanDir::Recv)],
                    inner
                )
                    .prop_map(|(dir, elem)| Type::chan(dir, elem)),
            ]
        })
    }

    proptest! {
        #[test]
        fn basic_render_is_bare_and_idempotent(kind in proptest::sample::select(BasicKind::ALL.to_vec())) {
            let mut registry = ImportRegistry::new();
            let ty = Type::Basic(kind);
            let (first, diags) = walk_then_render(&mut registry, &ty);
            let (second, _) = walk_then_render(&mut registry, &ty);
            prop_assert_eq!(&first, kind.name());
            prop_assert_eq!(first, second);
            prop_assert!(diags.is_empty());
            prop_assert!(registry.is_empty());
        }

        #[test]
        fn unnamed_types_render_like_display(ty in structural_type()) {
            let mut registry = ImportRegistry::new();
            let (text, diags) = walk_then_render(&mut registry, &ty);
            prop_assert_eq!(text, ty.to_string());
            prop_assert!(diags.is_empty());
            prop_assert!(registry.is_empty());
        }
    }
}
