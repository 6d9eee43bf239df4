use ersatz_core::{
    ast::{
        Decl, FieldExpr, FuncDecl, Ident, ImportSpec, InterfaceElem, ParamExpr, SignatureExpr,
        SourceFile, TypeExpr, TypeSpec,
    },
    diag::Diagnostic,
    span::Span,
    token::{Token, TokenKind},
    types::ChanDir,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub file: SourceFile,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse(tokens: &[Token], source: &str) -> ParseOutput {
    let mut parser = Parser {
        tokens,
        source,
        pos: 0,
        diagnostics: Vec::new(),
    };

    let package = match parser.parse_package_clause() {
        Some(name) => name,
        None => {
            parser.synchronize();
            Ident(String::new())
        }
    };

    // Imports must come before declarations
    let mut imports = Vec::new();
    loop {
        parser.skip_semicolons();
        if !parser.at(TokenKind::Import) {
            break;
        }
        if parser.parse_import_decl(&mut imports).is_none() {
            parser.synchronize();
        }
    }

    let mut decls = Vec::new();
    loop {
        parser.skip_semicolons();
        if parser.at(TokenKind::Eof) {
            break;
        }
        let parsed = if parser.at(TokenKind::Type) {
            parser.parse_type_decl(&mut decls)
        } else if parser.at(TokenKind::Func) {
            parser.parse_func_decl().map(|func| decls.push(Decl::Func(func)))
        } else if parser.at(TokenKind::Import) {
            let span = parser.peek().map(|t| t.span);
            parser.diagnostics.push(Diagnostic::error(
                "imports must appear before other declarations",
                span,
            ));
            None
        } else {
            let span = parser.peek().map(|t| t.span);
            parser
                .diagnostics
                .push(Diagnostic::error("expected `type` or `func`", span));
            None
        };
        if parsed.is_none() {
            parser.synchronize();
        }
    }

    ParseOutput {
        file: SourceFile {
            package,
            imports,
            decls,
        },
        diagnostics: parser.diagnostics,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    source: &'a str,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

/// One comma-separated entry of a parameter list before names are grouped.
struct ParamEntry {
    name: Option<Ident>,
    ty: TypeExpr,
    variadic: bool,
    span: Span,
}

impl<'a> Parser<'a> {
    fn at(&self, kind: TokenKind) -> bool {
        match self.peek() {
            Some(t) => t.kind == kind,
            None => kind == TokenKind::Eof,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, msg: &str) -> Option<&'a Token> {
        if self.at(kind) {
            return self.advance();
        }
        let span = self.peek().map(|t| t.span);
        self.diagnostics.push(Diagnostic::error(msg, span));
        None
    }

    fn slice(&self, tok: &Token) -> String {
        self.source
            .get(tok.span.start as usize..tok.span.end as usize)
            .unwrap_or("")
            .to_string()
    }

    fn ident(&mut self, msg: &str) -> Option<(Ident, Span)> {
        let tok = self.consume(TokenKind::Ident, msg)?;
        Some((Ident(self.slice(tok)), tok.span))
    }

    fn last_end(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn skip_semicolons(&mut self) {
        while self.eat(TokenKind::Semicolon) {}
    }

    /// A declaration or list element ends with `;` or right before the
    /// closing delimiter of its group.
    fn expect_terminator(&mut self, what: &str) -> Option<()> {
        if self.eat(TokenKind::Semicolon)
            || self.at(TokenKind::RParen)
            || self.at(TokenKind::RBrace)
            || self.at(TokenKind::Eof)
        {
            return Some(());
        }
        let span = self.peek().map(|t| t.span);
        self.diagnostics
            .push(Diagnostic::error(format!("expected `;` after {}", what), span));
        None
    }

    fn synchronize(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn parse_package_clause(&mut self) -> Option<Ident> {
        self.skip_semicolons();
        self.consume(
            TokenKind::Package,
            "expected `package` clause at the start of the file",
        )?;
        let (name, _) = self.ident("expected package name")?;
        self.expect_terminator("package clause")?;
        Some(name)
    }

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> Option<()> {
        self.consume(TokenKind::Import, "expected `import`")?;
        if self.eat(TokenKind::LParen) {
            loop {
                self.skip_semicolons();
                if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                    break;
                }
                imports.push(self.parse_import_spec()?);
                self.expect_terminator("import path")?;
            }
            self.consume(TokenKind::RParen, "expected `)` to close import group")?;
        } else {
            imports.push(self.parse_import_spec()?);
        }
        self.expect_terminator("import declaration")
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let start = self.peek().map(|t| t.span.start).unwrap_or(0);
        let alias = if self.at(TokenKind::Ident) {
            Some(self.ident("expected import alias")?.0)
        } else if self.at(TokenKind::Dot) {
            let span = self.peek().map(|t| t.span);
            self.diagnostics
                .push(Diagnostic::error("dot imports are not supported", span));
            return None;
        } else {
            None
        };
        let path_tok = self.consume(TokenKind::Str, "expected import path string")?;
        let path = parse_string_literal(&self.slice(path_tok));
        if path.is_empty() {
            self.diagnostics
                .push(Diagnostic::error("import path is empty", Some(path_tok.span)));
            return None;
        }
        Some(ImportSpec {
            alias,
            path,
            span: Span::new(start, path_tok.span.end),
        })
    }

    fn parse_type_decl(&mut self, decls: &mut Vec<Decl>) -> Option<()> {
        self.consume(TokenKind::Type, "expected `type`")?;
        if self.eat(TokenKind::LParen) {
            loop {
                self.skip_semicolons();
                if self.at(TokenKind::RParen) || self.at(TokenKind::Eof) {
                    break;
                }
                decls.push(Decl::Type(self.parse_type_spec()?));
                self.expect_terminator("type declaration")?;
            }
            self.consume(TokenKind::RParen, "expected `)` to close type group")?;
        } else {
            decls.push(Decl::Type(self.parse_type_spec()?));
        }
        self.expect_terminator("type declaration")
    }

    fn parse_type_spec(&mut self) -> Option<TypeSpec> {
        let (name, name_span) = self.ident("expected type name")?;
        let ty = self.parse_type()?;
        Some(TypeSpec {
            name,
            span: name_span.join(ty.span()),
            ty,
        })
    }

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let func_tok = self.consume(TokenKind::Func, "expected `func`")?;
        let (name, _) = self.ident("expected function name")?;
        if self.at(TokenKind::LBrace) {
            let span = self.peek().map(|t| t.span);
            self.diagnostics.push(Diagnostic::error(
                "function declarations are signatures only; bodies are not allowed",
                span,
            ));
            return None;
        }
        let sig = self.parse_signature()?;
        if self.at(TokenKind::LBrace) {
            let span = self.peek().map(|t| t.span);
            self.diagnostics.push(Diagnostic::error(
                "function declarations are signatures only; bodies are not allowed",
                span,
            ));
            return None;
        }
        let span = Span::new(func_tok.span.start, sig.span.end);
        self.expect_terminator("function declaration")?;
        Some(FuncDecl { name, sig, span })
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(
                TokenKind::Ident
                    | TokenKind::Star
                    | TokenKind::LBracket
                    | TokenKind::Map
                    | TokenKind::Chan
                    | TokenKind::Arrow
                    | TokenKind::Func
                    | TokenKind::Interface
                    | TokenKind::Struct
            )
        )
    }

    fn parse_type(&mut self) -> Option<TypeExpr> {
        let Some(tok) = self.peek() else {
            self.diagnostics
                .push(Diagnostic::error("expected type", None));
            return None;
        };
        let start = tok.span.start;
        match tok.kind {
            TokenKind::Ident => self.parse_type_name(),
            TokenKind::Star => {
                self.advance();
                let elem = self.parse_type()?;
                Some(TypeExpr::Pointer {
                    span: Span::new(start, elem.span().end),
                    elem: Box::new(elem),
                })
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(TokenKind::RBracket) {
                    let elem = self.parse_type()?;
                    return Some(TypeExpr::Slice {
                        span: Span::new(start, elem.span().end),
                        elem: Box::new(elem),
                    });
                }
                let len_tok = self.consume(TokenKind::Int, "expected array length")?;
                let text = self.slice(len_tok).replace('_', "");
                let Ok(len) = text.parse::<u64>() else {
                    self.diagnostics.push(Diagnostic::error(
                        format!("invalid array length `{}`", text),
                        Some(len_tok.span),
                    ));
                    return None;
                };
                self.consume(TokenKind::RBracket, "expected `]` after array length")?;
                let elem = self.parse_type()?;
                Some(TypeExpr::Array {
                    len,
                    span: Span::new(start, elem.span().end),
                    elem: Box::new(elem),
                })
            }
            TokenKind::Map => {
                self.advance();
                self.consume(TokenKind::LBracket, "expected `[` after `map`")?;
                let key = self.parse_type()?;
                self.consume(TokenKind::RBracket, "expected `]` after map key type")?;
                let elem = self.parse_type()?;
                Some(TypeExpr::Map {
                    span: Span::new(start, elem.span().end),
                    key: Box::new(key),
                    elem: Box::new(elem),
                })
            }
            TokenKind::Chan => {
                self.advance();
                let dir = if self.eat(TokenKind::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type()?;
                Some(TypeExpr::Chan {
                    dir,
                    span: Span::new(start, elem.span().end),
                    elem: Box::new(elem),
                })
            }
            TokenKind::Arrow => {
                self.advance();
                self.consume(TokenKind::Chan, "expected `chan` after `<-`")?;
                let elem = self.parse_type()?;
                Some(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    span: Span::new(start, elem.span().end),
                    elem: Box::new(elem),
                })
            }
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_signature()?;
                Some(TypeExpr::Func {
                    span: Span::new(start, sig.span.end),
                    sig,
                })
            }
            TokenKind::Interface => self.parse_interface_type(),
            TokenKind::Struct => self.parse_struct_type(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.consume(TokenKind::RParen, "expected `)` after type")?;
                Some(inner)
            }
            _ => {
                self.diagnostics
                    .push(Diagnostic::error("expected type", Some(tok.span)));
                None
            }
        }
    }

    fn parse_type_name(&mut self) -> Option<TypeExpr> {
        let (first, first_span) = self.ident("expected type name")?;
        if self.eat(TokenKind::Dot) {
            let (name, name_span) = self.ident("expected type name after `.`")?;
            return Some(TypeExpr::Name {
                qualifier: Some(first),
                name,
                span: first_span.join(name_span),
            });
        }
        Some(TypeExpr::Name {
            qualifier: None,
            name: first,
            span: first_span,
        })
    }

    fn parse_signature(&mut self) -> Option<SignatureExpr> {
        let start = self.peek().map(|t| t.span.start).unwrap_or(0);
        let params = self.parse_parameters()?;
        let results = if self.at(TokenKind::LParen) {
            self.parse_parameters()?
        } else if self.starts_type() {
            let ty = self.parse_type()?;
            vec![ParamExpr {
                name: None,
                span: ty.span(),
                ty,
                variadic: false,
            }]
        } else {
            Vec::new()
        };
        if let Some(result) = results.iter().find(|r| r.variadic) {
            self.diagnostics.push(Diagnostic::error(
                "results cannot be variadic",
                Some(result.span),
            ));
            return None;
        }
        Some(SignatureExpr {
            params,
            results,
            span: Span::new(start, self.last_end()),
        })
    }

    fn parse_parameters(&mut self) -> Option<Vec<ParamExpr>> {
        self.consume(TokenKind::LParen, "expected `(`")?;
        let mut entries = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
            entries.push(self.parse_param_entry()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        self.group_params(entries)
    }

    fn parse_param_entry(&mut self) -> Option<ParamEntry> {
        let start = self.peek().map(|t| t.span.start).unwrap_or(0);
        let named = self.at(TokenKind::Ident)
            && !matches!(
                self.peek_kind_at(1),
                Some(TokenKind::Comma | TokenKind::RParen | TokenKind::Dot)
            );
        let name = if named {
            Some(self.ident("expected parameter name")?.0)
        } else {
            None
        };
        let variadic = self.eat(TokenKind::Ellipsis);
        let ty = self.parse_type()?;
        Some(ParamEntry {
            name,
            span: Span::new(start, ty.span().end),
            ty,
            variadic,
        })
    }

    /// Applies `(a, b int)` grouping: bare names take the type of the next
    /// named entry. Lists are either fully named or fully unnamed.
    fn group_params(&mut self, entries: Vec<ParamEntry>) -> Option<Vec<ParamExpr>> {
        let count = entries.len();
        if let Some(entry) = entries
            .iter()
            .take(count.saturating_sub(1))
            .find(|entry| entry.variadic)
        {
            self.diagnostics.push(Diagnostic::error(
                "can only use `...` with the final parameter",
                Some(entry.span),
            ));
            return None;
        }

        if entries.iter().all(|entry| entry.name.is_none()) {
            return Some(
                entries
                    .into_iter()
                    .map(|entry| ParamExpr {
                        name: None,
                        ty: entry.ty,
                        variadic: entry.variadic,
                        span: entry.span,
                    })
                    .collect(),
            );
        }

        let mut params = Vec::with_capacity(count);
        let mut pending: Vec<(Ident, Span)> = Vec::new();
        for entry in entries {
            match entry.name {
                Some(name) => {
                    if entry.variadic && !pending.is_empty() {
                        self.diagnostics.push(Diagnostic::error(
                            "can only use `...` with the final parameter",
                            Some(entry.span),
                        ));
                        return None;
                    }
                    for (pending_name, span) in pending.drain(..) {
                        params.push(ParamExpr {
                            name: Some(pending_name),
                            ty: entry.ty.clone(),
                            variadic: false,
                            span,
                        });
                    }
                    params.push(ParamExpr {
                        name: Some(name),
                        ty: entry.ty,
                        variadic: entry.variadic,
                        span: entry.span,
                    });
                }
                None => match entry.ty {
                    TypeExpr::Name {
                        qualifier: None,
                        name,
                        span,
                    } if !entry.variadic => pending.push((name, span)),
                    other => {
                        self.diagnostics.push(Diagnostic::error(
                            "mixed named and unnamed parameters",
                            Some(other.span()),
                        ));
                        return None;
                    }
                },
            }
        }
        if let Some((_, span)) = pending.first() {
            self.diagnostics.push(Diagnostic::error(
                "mixed named and unnamed parameters",
                Some(*span),
            ));
            return None;
        }
        Some(params)
    }

    fn parse_interface_type(&mut self) -> Option<TypeExpr> {
        let iface_tok = self.consume(TokenKind::Interface, "expected `interface`")?;
        self.consume(TokenKind::LBrace, "expected `{` after `interface`")?;
        let mut elems = Vec::new();
        loop {
            self.skip_semicolons();
            if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
                break;
            }
            let is_method =
                self.at(TokenKind::Ident) && self.peek_kind_at(1) == Some(&TokenKind::LParen);
            if is_method {
                let (name, name_span) = self.ident("expected method name")?;
                let sig = self.parse_signature()?;
                elems.push(InterfaceElem::Method {
                    span: name_span.join(sig.span),
                    name,
                    sig,
                });
            } else if self.at(TokenKind::Ident) {
                elems.push(InterfaceElem::Embedded(self.parse_type_name()?));
            } else {
                let span = self.peek().map(|t| t.span);
                self.diagnostics.push(Diagnostic::error(
                    "interfaces may only contain methods and embedded interfaces",
                    span,
                ));
                return None;
            }
            self.expect_terminator("interface element")?;
        }
        let end = self.consume(TokenKind::RBrace, "expected `}` to end interface body")?;
        Some(TypeExpr::Interface {
            elems,
            span: Span::new(iface_tok.span.start, end.span.end),
        })
    }

    fn parse_struct_type(&mut self) -> Option<TypeExpr> {
        let struct_tok = self.consume(TokenKind::Struct, "expected `struct`")?;
        self.consume(TokenKind::LBrace, "expected `{` after `struct`")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semicolons();
            if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
                break;
            }
            let embedded = self.at(TokenKind::Star)
                || (self.at(TokenKind::Ident)
                    && matches!(
                        self.peek_kind_at(1),
                        Some(
                            TokenKind::Semicolon
                                | TokenKind::RBrace
                                | TokenKind::Dot
                                | TokenKind::Str
                        )
                    ));
            if embedded {
                let ty = self.parse_type()?;
                fields.push(FieldExpr {
                    name: None,
                    span: ty.span(),
                    ty,
                });
            } else {
                let mut names = vec![self.ident("expected field name")?];
                while self.eat(TokenKind::Comma) {
                    names.push(self.ident("expected field name after `,`")?);
                }
                let ty = self.parse_type()?;
                for (name, span) in names {
                    fields.push(FieldExpr {
                        name: Some(name),
                        span: span.join(ty.span()),
                        ty: ty.clone(),
                    });
                }
            }
            // Field tags carry no type information.
            self.eat(TokenKind::Str);
            self.expect_terminator("struct field")?;
        }
        let end = self.consume(TokenKind::RBrace, "expected `}` to end struct body")?;
        Some(TypeExpr::Struct {
            fields,
            span: Span::new(struct_tok.span.start, end.span.end),
        })
    }
}

fn parse_string_literal(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('`').and_then(|r| r.strip_suffix('`')) {
        return inner.to_string();
    }
    let trimmed = raw.trim_matches('"');
    let mut result = String::new();
    let mut chars = trimmed.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                match next {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    other => result.push(other),
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
