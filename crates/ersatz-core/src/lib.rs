pub mod span {
    use serde::{Deserialize, Serialize};

    pub type BytePos = u32;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Span {
        pub start: BytePos,
        pub end: BytePos,
    }

    impl Span {
        pub fn new(start: BytePos, end: BytePos) -> Self {
            assert!(start <= end, "span start must be <= end");
            Self { start, end }
        }

        pub fn len(&self) -> BytePos {
            self.end - self.start
        }

        pub fn is_empty(&self) -> bool {
            self.start == self.end
        }

        pub fn join(self, other: Span) -> Span {
            Span::new(self.start.min(other.start), self.end.max(other.end))
        }
    }
}

pub mod diag {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::span::Span;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Severity {
        Error,
        Warning,
        Note,
    }

    impl fmt::Display for Severity {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Diagnostic {
        pub message: String,
        pub severity: Severity,
        pub span: Option<Span>,
        /// Source file the span points into, relative to the search root.
        pub module_id: Option<String>,
    }

    impl Diagnostic {
        pub fn new(message: impl Into<String>, severity: Severity, span: Option<Span>) -> Self {
            Self {
                message: message.into(),
                severity,
                span,
                module_id: None,
            }
        }

        pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
            Self::new(message, Severity::Error, span)
        }

        pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
            Self::new(message, Severity::Warning, span)
        }

        pub fn note(message: impl Into<String>) -> Self {
            Self::new(message, Severity::Note, None)
        }

        pub fn with_module_id(mut self, module_id: impl Into<String>) -> Self {
            self.module_id = Some(module_id.into());
            self
        }
    }

    /// Receiver for the diagnostics the generation core emits while it runs.
    ///
    /// Components take the sink as an explicit argument so callers decide
    /// where reports go: tests collect them into a `Vec`, tools forward them
    /// to `tracing` through [`TracingSink`].
    pub trait DiagnosticSink {
        fn report(&mut self, diagnostic: Diagnostic);
    }

    impl DiagnosticSink for Vec<Diagnostic> {
        fn report(&mut self, diagnostic: Diagnostic) {
            self.push(diagnostic);
        }
    }

    impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
        fn report(&mut self, diagnostic: Diagnostic) {
            (**self).report(diagnostic);
        }
    }

    /// Forwards every diagnostic to the `tracing` macro of matching level.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TracingSink;

    impl DiagnosticSink for TracingSink {
        fn report(&mut self, diagnostic: Diagnostic) {
            let module = diagnostic.module_id.as_deref().unwrap_or("<core>");
            match diagnostic.severity {
                Severity::Error => tracing::error!(module, "{}", diagnostic.message),
                Severity::Warning => tracing::warn!(module, "{}", diagnostic.message),
                Severity::Note => tracing::info!(module, "{}", diagnostic.message),
            }
        }
    }
}

pub mod token {
    use serde::{Deserialize, Serialize};

    use crate::span::Span;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Token {
        pub kind: TokenKind,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TokenKind {
        // Keywords
        Package,
        Import,
        Type,
        Func,
        Interface,
        Struct,
        Map,
        Chan,
        // Identifiers and literals
        Ident,
        Int,
        Str,
        // Punctuation / operators
        LParen,
        RParen,
        LBrace,
        RBrace,
        LBracket,
        RBracket,
        Comma,
        Semicolon,
        Dot,
        Ellipsis,
        Star,
        Arrow,
        Eof,
    }

    impl Token {
        pub fn new(kind: TokenKind, span: Span) -> Self {
            Self { kind, span }
        }
    }
}

pub mod ast {
    use serde::{Deserialize, Serialize};

    use crate::span::Span;
    use crate::types::ChanDir;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Ident(pub String);

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TypeExpr {
        /// `Name` or `alias.Name`.
        Name {
            qualifier: Option<Ident>,
            name: Ident,
            span: Span,
        },
        Pointer {
            elem: Box<TypeExpr>,
            span: Span,
        },
        Slice {
            elem: Box<TypeExpr>,
            span: Span,
        },
        Array {
            len: u64,
            elem: Box<TypeExpr>,
            span: Span,
        },
        Map {
            key: Box<TypeExpr>,
            elem: Box<TypeExpr>,
            span: Span,
        },
        Chan {
            dir: ChanDir,
            elem: Box<TypeExpr>,
            span: Span,
        },
        Func {
            sig: SignatureExpr,
            span: Span,
        },
        Interface {
            elems: Vec<InterfaceElem>,
            span: Span,
        },
        Struct {
            fields: Vec<FieldExpr>,
            span: Span,
        },
    }

    impl TypeExpr {
        pub fn span(&self) -> Span {
            match self {
                TypeExpr::Name { span, .. }
                | TypeExpr::Pointer { span, .. }
                | TypeExpr::Slice { span, .. }
                | TypeExpr::Array { span, .. }
                | TypeExpr::Map { span, .. }
                | TypeExpr::Chan { span, .. }
                | TypeExpr::Func { span, .. }
                | TypeExpr::Interface { span, .. }
                | TypeExpr::Struct { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ParamExpr {
        pub name: Option<Ident>,
        pub ty: TypeExpr,
        pub variadic: bool,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SignatureExpr {
        pub params: Vec<ParamExpr>,
        pub results: Vec<ParamExpr>,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum InterfaceElem {
        Method {
            name: Ident,
            sig: SignatureExpr,
            span: Span,
        },
        Embedded(TypeExpr),
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FieldExpr {
        /// `None` for an embedded field.
        pub name: Option<Ident>,
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ImportSpec {
        pub alias: Option<Ident>,
        pub path: String,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TypeSpec {
        pub name: Ident,
        pub ty: TypeExpr,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FuncDecl {
        pub name: Ident,
        pub sig: SignatureExpr,
        pub span: Span,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Decl {
        Type(TypeSpec),
        Func(FuncDecl),
    }

    impl Decl {
        pub fn name(&self) -> &Ident {
            match self {
                Decl::Type(spec) => &spec.name,
                Decl::Func(func) => &func.name,
            }
        }

        pub fn span(&self) -> Span {
            match self {
                Decl::Type(spec) => spec.span,
                Decl::Func(func) => func.span,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SourceFile {
        pub package: Ident,
        pub imports: Vec<ImportSpec>,
        pub decls: Vec<Decl>,
    }
}

pub mod types {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum BasicKind {
        Bool,
        String,
        Int,
        Int8,
        Int16,
        Int32,
        Int64,
        Uint,
        Uint8,
        Uint16,
        Uint32,
        Uint64,
        Uintptr,
        Float32,
        Float64,
        Complex64,
        Complex128,
        Byte,
        Rune,
    }

    impl BasicKind {
        pub const ALL: [BasicKind; 19] = [
            BasicKind::Bool,
            BasicKind::String,
            BasicKind::Int,
            BasicKind::Int8,
            BasicKind::Int16,
            BasicKind::Int32,
            BasicKind::Int64,
            BasicKind::Uint,
            BasicKind::Uint8,
            BasicKind::Uint16,
            BasicKind::Uint32,
            BasicKind::Uint64,
            BasicKind::Uintptr,
            BasicKind::Float32,
            BasicKind::Float64,
            BasicKind::Complex64,
            BasicKind::Complex128,
            BasicKind::Byte,
            BasicKind::Rune,
        ];

        pub fn from_name(name: &str) -> Option<Self> {
            BasicKind::ALL.into_iter().find(|kind| kind.name() == name)
        }

        pub fn name(self) -> &'static str {
            match self {
                BasicKind::Bool => "bool",
                BasicKind::String => "string",
                BasicKind::Int => "int",
                BasicKind::Int8 => "int8",
                BasicKind::Int16 => "int16",
                BasicKind::Int32 => "int32",
                BasicKind::Int64 => "int64",
                BasicKind::Uint => "uint",
                BasicKind::Uint8 => "uint8",
                BasicKind::Uint16 => "uint16",
                BasicKind::Uint32 => "uint32",
                BasicKind::Uint64 => "uint64",
                BasicKind::Uintptr => "uintptr",
                BasicKind::Float32 => "float32",
                BasicKind::Float64 => "float64",
                BasicKind::Complex64 => "complex64",
                BasicKind::Complex128 => "complex128",
                BasicKind::Byte => "byte",
                BasicKind::Rune => "rune",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum ChanDir {
        /// `chan T`
        Both,
        /// `chan<- T`
        Send,
        /// `<-chan T`
        Recv,
    }

    /// Identity of a loaded module as seen from a type that lives in it.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModuleRef {
        pub path: String,
        pub name: String,
    }

    impl ModuleRef {
        pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
            Self {
                path: path.into(),
                name: name.into(),
            }
        }
    }

    /// A declared type name; `module` is `None` for universe types like `error`.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TypeName {
        pub name: String,
        pub module: Option<ModuleRef>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NamedType {
        pub obj: Option<TypeName>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Var {
        pub name: Option<String>,
        pub ty: Type,
    }

    impl Var {
        pub fn new(name: Option<&str>, ty: Type) -> Self {
            Self {
                name: name.map(str::to_string),
                ty,
            }
        }
    }

    /// When `variadic` is set the last param holds a `Slice` of the element type.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct Signature {
        pub params: Vec<Var>,
        pub results: Vec<Var>,
        pub variadic: bool,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Method {
        pub name: String,
        pub sig: Signature,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct InterfaceType {
        pub methods: Vec<Method>,
        pub embedded: Vec<Type>,
    }

    impl InterfaceType {
        pub fn is_empty(&self) -> bool {
            self.methods.is_empty() && self.embedded.is_empty()
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Field {
        pub name: Option<String>,
        pub ty: Type,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct StructType {
        pub fields: Vec<Field>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum Type {
        Basic(BasicKind),
        Pointer(Box<Type>),
        Slice(Box<Type>),
        Array { len: u64, elem: Box<Type> },
        Map { key: Box<Type>, elem: Box<Type> },
        Chan { dir: ChanDir, elem: Box<Type> },
        Named(NamedType),
        Interface(InterfaceType),
        Signature(Signature),
        Struct(StructType),
    }

    impl Type {
        pub fn named(module: Option<ModuleRef>, name: impl Into<String>) -> Self {
            Type::Named(NamedType {
                obj: Some(TypeName {
                    name: name.into(),
                    module,
                }),
            })
        }

        pub fn pointer(elem: Type) -> Self {
            Type::Pointer(Box::new(elem))
        }

        pub fn slice(elem: Type) -> Self {
            Type::Slice(Box::new(elem))
        }

        pub fn array(len: u64, elem: Type) -> Self {
            Type::Array {
                len,
                elem: Box::new(elem),
            }
        }

        pub fn map(key: Type, elem: Type) -> Self {
            Type::Map {
                key: Box::new(key),
                elem: Box::new(elem),
            }
        }

        pub fn chan(dir: ChanDir, elem: Type) -> Self {
            Type::Chan {
                dir,
                elem: Box::new(elem),
            }
        }

        /// Short label for the variant, used in diagnostics.
        pub fn variant_name(&self) -> &'static str {
            match self {
                Type::Basic(_) => "basic",
                Type::Pointer(_) => "pointer",
                Type::Slice(_) => "slice",
                Type::Array { .. } => "array",
                Type::Map { .. } => "map",
                Type::Chan { .. } => "chan",
                Type::Named(_) => "named",
                Type::Interface(_) => "interface",
                Type::Signature(_) => "signature",
                Type::Struct(_) => "struct",
            }
        }

        pub fn as_named(&self) -> Option<&TypeName> {
            match self {
                Type::Named(named) => named.obj.as_ref(),
                _ => None,
            }
        }
    }

    // Display qualifies named types by full module path. It is the raw form
    // used for interface pass-through and for diagnostics, never for imports.
    impl fmt::Display for Type {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Type::Basic(kind) => f.write_str(kind.name()),
                Type::Pointer(elem) => write!(f, "*{}", elem),
                Type::Slice(elem) => write!(f, "[]{}", elem),
                Type::Array { len, elem } => write!(f, "[{}]{}", len, elem),
                Type::Map { key, elem } => write!(f, "map[{}]{}", key, elem),
                Type::Chan { dir, elem } => match dir {
                    ChanDir::Both => write!(f, "chan {}", elem),
                    ChanDir::Send => write!(f, "chan<- {}", elem),
                    ChanDir::Recv => write!(f, "<-chan {}", elem),
                },
                Type::Named(named) => match &named.obj {
                    Some(TypeName {
                        name,
                        module: Some(module),
                    }) => write!(f, "{}.{}", module.path, name),
                    Some(TypeName { name, module: None }) => f.write_str(name),
                    None => f.write_str("<invalid>"),
                },
                Type::Interface(iface) => write!(f, "{}", iface),
                Type::Signature(sig) => write!(f, "func{}", sig),
                Type::Struct(st) => {
                    f.write_str("struct{")?;
                    for (idx, field) in st.fields.iter().enumerate() {
                        if idx > 0 {
                            f.write_str("; ")?;
                        }
                        match &field.name {
                            Some(name) => write!(f, "{} {}", name, field.ty)?,
                            None => write!(f, "{}", field.ty)?,
                        }
                    }
                    f.write_str("}")
                }
            }
        }
    }

    impl fmt::Display for InterfaceType {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("interface{")?;
            let mut first = true;
            for embedded in &self.embedded {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{}", embedded)?;
            }
            for method in &self.methods {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{}{}", method.name, method.sig)?;
            }
            f.write_str("}")
        }
    }

    impl fmt::Display for Signature {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("(")?;
            let last = self.params.len().saturating_sub(1);
            for (idx, param) in self.params.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                if let Some(name) = &param.name {
                    write!(f, "{} ", name)?;
                }
                match (&param.ty, self.variadic && idx == last) {
                    (Type::Slice(elem), true) => write!(f, "...{}", elem)?,
                    (ty, _) => write!(f, "{}", ty)?,
                }
            }
            f.write_str(")")?;
            match self.results.as_slice() {
                [] => Ok(()),
                [single] if single.name.is_none() => write!(f, " {}", single.ty),
                results => {
                    f.write_str(" (")?;
                    for (idx, result) in results.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        if let Some(name) = &result.name {
                            write!(f, "{} ", name)?;
                        }
                        write!(f, "{}", result.ty)?;
                    }
                    f.write_str(")")
                }
            }
        }
    }
}

pub mod module {
    use std::collections::{HashMap, HashSet};

    use serde::{Deserialize, Serialize};

    use crate::types::{ModuleRef, Signature, Type, TypeName};

    /// Strips everything up to and including the last `vendor/` segment.
    pub fn unvendor(path: &str) -> &str {
        if let Some(rest) = path.strip_prefix("vendor/") {
            return unvendor(rest);
        }
        match path.rfind("/vendor/") {
            Some(idx) => &path[idx + "/vendor/".len()..],
            None => path,
        }
    }

    /// Default alias for a module: the last segment of its path.
    pub fn short_name(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TypeDecl {
        pub name: String,
        /// Right-hand side of the declaration, resolved. May itself be a
        /// `Named` type; see [`ModuleSet::underlying`].
        pub ty: Type,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FuncDecl {
        pub name: String,
        pub sig: Signature,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Object {
        TypeName(TypeDecl),
        Func(FuncDecl),
    }

    impl Object {
        pub fn name(&self) -> &str {
            match self {
                Object::TypeName(decl) => &decl.name,
                Object::Func(func) => &func.name,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Scope {
        objects: HashMap<String, Object>,
    }

    impl Scope {
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns the previous object when the name was already declared.
        pub fn insert(&mut self, object: Object) -> Option<Object> {
            self.objects.insert(object.name().to_string(), object)
        }

        pub fn lookup(&self, name: &str) -> Option<&Object> {
            self.objects.get(name)
        }

        pub fn lookup_type(&self, name: &str) -> Option<&TypeDecl> {
            match self.objects.get(name) {
                Some(Object::TypeName(decl)) => Some(decl),
                _ => None,
            }
        }

        pub fn len(&self) -> usize {
            self.objects.len()
        }

        pub fn is_empty(&self) -> bool {
            self.objects.is_empty()
        }

        pub fn names(&self) -> impl Iterator<Item = &str> {
            self.objects.keys().map(String::as_str)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Module {
        pub path: String,
        pub name: String,
        /// `None` when the module was loaded without type information.
        pub scope: Option<Scope>,
        /// Canonical paths of the modules this one imports.
        pub imports: Vec<String>,
    }

    impl Module {
        pub fn new(path: impl Into<String>, name: impl Into<String>, scope: Scope) -> Self {
            Self {
                path: path.into(),
                name: name.into(),
                scope: Some(scope),
                imports: Vec::new(),
            }
        }

        pub fn module_ref(&self) -> ModuleRef {
            ModuleRef::new(self.path.clone(), self.name.clone())
        }
    }

    /// Every module loaded for one run. `roots` are the modules the caller
    /// asked for, in request order; the rest are their dependencies.
    #[derive(Debug, Clone, Default)]
    pub struct ModuleSet {
        modules: Vec<Module>,
        roots: Vec<usize>,
        by_path: HashMap<String, usize>,
    }

    impl ModuleSet {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn from_roots(modules: impl IntoIterator<Item = Module>) -> Self {
            let mut set = Self::new();
            for module in modules {
                set.insert_root(module);
            }
            set
        }

        pub fn insert_root(&mut self, module: Module) -> usize {
            let idx = self.insert(module);
            if !self.roots.contains(&idx) {
                self.roots.push(idx);
            }
            idx
        }

        /// Adds a module without making it a root. A path that is already
        /// present keeps its first module.
        pub fn insert(&mut self, module: Module) -> usize {
            if let Some(&idx) = self.by_path.get(&module.path) {
                return idx;
            }
            let idx = self.modules.len();
            self.by_path.insert(module.path.clone(), idx);
            self.modules.push(module);
            idx
        }

        pub fn mark_root(&mut self, path: &str) -> bool {
            match self.by_path.get(path) {
                Some(&idx) => {
                    if !self.roots.contains(&idx) {
                        self.roots.push(idx);
                    }
                    true
                }
                None => false,
            }
        }

        pub fn roots(&self) -> impl Iterator<Item = &Module> {
            self.roots.iter().map(move |&idx| &self.modules[idx])
        }

        pub fn iter(&self) -> impl Iterator<Item = &Module> {
            self.modules.iter()
        }

        pub fn get(&self, path: &str) -> Option<&Module> {
            self.by_path.get(path).map(|&idx| &self.modules[idx])
        }

        pub fn contains(&self, path: &str) -> bool {
            self.by_path.contains_key(path)
        }

        pub fn len(&self) -> usize {
            self.modules.len()
        }

        pub fn is_empty(&self) -> bool {
            self.modules.is_empty()
        }

        pub fn lookup_type(&self, name: &TypeName) -> Option<&TypeDecl> {
            let module = self.get(&name.module.as_ref()?.path)?;
            module.scope.as_ref()?.lookup_type(&name.name)
        }

        /// Follows `Named` links until a structural type is reached. Returns
        /// `None` for universe types, unknown names and definition cycles.
        pub fn underlying<'a>(&'a self, ty: &'a Type) -> Option<&'a Type> {
            let mut current = ty;
            let mut seen = HashSet::new();
            while let Type::Named(named) = current {
                let obj = named.obj.as_ref()?;
                if !seen.insert(obj) {
                    return None;
                }
                current = &self.lookup_type(obj)?.ty;
            }
            Some(current)
        }
    }
}
