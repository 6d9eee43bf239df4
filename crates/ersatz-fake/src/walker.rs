use ersatz_core::{
    diag::{Diagnostic, DiagnosticSink},
    types::{Type, TypeName},
};

use crate::imports::ImportRegistry;

/// Registers the module of every named type reachable from a type.
///
/// The walk is shallow: a named type's own module is registered but its
/// underlying definition is not visited.
pub struct TypeWalker<'r, 's> {
    imports: &'r mut ImportRegistry,
    sink: &'s mut dyn DiagnosticSink,
}

impl<'r, 's> TypeWalker<'r, 's> {
    pub fn new(imports: &'r mut ImportRegistry, sink: &'s mut dyn DiagnosticSink) -> Self {
        Self { imports, sink }
    }

    pub fn walk(&mut self, ty: Option<&Type>) {
        if let Some(ty) = ty {
            self.visit(ty);
        }
    }

    fn visit(&mut self, ty: &Type) {
        match ty {
            Type::Basic(_) | Type::Interface(_) => {}
            Type::Pointer(elem) | Type::Slice(elem) => self.visit(elem),
            Type::Array { elem, .. } | Type::Chan { elem, .. } => self.visit(elem),
            Type::Map { key, elem } => {
                self.visit(key);
                self.visit(elem);
            }
            Type::Named(named) => {
                if let Some(TypeName {
                    module: Some(module),
                    ..
                }) = &named.obj
                {
                    if !module.path.is_empty() {
                        self.imports.register(&module.name, &module.path);
                    }
                }
            }
            Type::Signature(_) | Type::Struct(_) => self.sink.report(Diagnostic::warning(
                format!("missing case for type {}", ty.variant_name()),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ersatz_core::types::{
        BasicKind, ChanDir, InterfaceType, ModuleRef, NamedType, Signature, StructType,
    };

    fn walk(registry: &mut ImportRegistry, ty: &Type) -> Vec<Diagnostic> {
        let mut sink: Vec<Diagnostic> = Vec::new();
        TypeWalker::new(registry, &mut sink).walk(Some(ty));
        sink
    }

    fn pkg() -> ModuleRef {
        ModuleRef::new("example.com/pkg", "pkg")
    }

    #[test]
    fn basic_and_interface_register_nothing() {
        let mut registry = ImportRegistry::new();
        for kind in BasicKind::ALL {
            assert!(walk(&mut registry, &Type::Basic(kind)).is_empty());
        }
        walk(&mut registry, &Type::Interface(InterfaceType::default()));
        assert!(registry.is_empty());
    }

    #[test]
    fn none_is_a_no_op() {
        let mut registry = ImportRegistry::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        TypeWalker::new(&mut registry, &mut sink).walk(None);
        assert!(registry.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn compound_types_register_each_module_once() {
        let mut registry = ImportRegistry::new();
        let ty = Type::map(
            Type::pointer(Type::named(Some(pkg()), "Foo")),
            Type::slice(Type::chan(ChanDir::Recv, Type::named(Some(pkg()), "Bar"))),
        );
        assert!(walk(&mut registry, &ty).is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all()[0].alias, "pkg");
        assert_eq!(registry.all()[0].path, "example.com/pkg");
    }

    #[test]
    fn arrays_and_map_keys_are_visited() {
        let mut registry = ImportRegistry::new();
        let ty = Type::map(
            Type::named(Some(ModuleRef::new("time", "time")), "Duration"),
            Type::array(4, Type::named(Some(pkg()), "Foo")),
        );
        walk(&mut registry, &ty);
        let paths: Vec<&str> = registry.all().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["time", "example.com/pkg"]);
    }

    #[test]
    fn universe_and_unowned_names_are_skipped() {
        let mut registry = ImportRegistry::new();
        walk(&mut registry, &Type::named(None, "error"));
        walk(&mut registry, &Type::Named(NamedType { obj: None }));
        walk(&mut registry, &Type::named(Some(ModuleRef::new("", "main")), "T"));
        assert!(registry.is_empty());
    }

    #[test]
    fn destination_module_stays_unregistered() {
        let mut registry = ImportRegistry::for_destination("example.com/pkg");
        walk(&mut registry, &Type::named(Some(pkg()), "Foo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn signatures_and_structs_warn() {
        let mut registry = ImportRegistry::new();
        let diags = walk(&mut registry, &Type::pointer(Type::Signature(Signature::default())));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "missing case for type signature");

        let diags = walk(&mut registry, &Type::Struct(StructType::default()));
        assert_eq!(diags[0].message, "missing case for type struct");
        assert!(registry.is_empty());
    }
}
