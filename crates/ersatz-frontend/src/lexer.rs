use ersatz_core::{
    diag::Diagnostic,
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn lex(source: &str) -> LexOutput {
    let mut toks = Vec::new();
    let mut diags = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\n' {
            terminate_line(&mut toks, i);
            i += 1;
            continue;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i as u32;
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let end = consume_ident(bytes, i);
                let kind = keyword_or_ident(&source[i..end]);
                toks.push(Token::new(kind, Span::new(start, end as u32)));
                i = end;
            }
            b'0'..=b'9' => {
                let end = consume_number(bytes, i);
                toks.push(Token::new(TokenKind::Int, Span::new(start, end as u32)));
                i = end;
            }
            b'"' | b'`' => match consume_string(bytes, i) {
                Ok(end) => {
                    toks.push(Token::new(TokenKind::Str, Span::new(start, end as u32)));
                    i = end;
                }
                Err(pos) => {
                    diags.push(Diagnostic::error(
                        "unterminated string literal",
                        Some(Span::new(start, pos as u32)),
                    ));
                    break;
                }
            },
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                i = consume_line_comment(bytes, i + 2);
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                match consume_block_comment(bytes, i) {
                    Ok(end) => {
                        // A comment spanning lines ends the line like a newline does.
                        if bytes[i..end].contains(&b'\n') {
                            terminate_line(&mut toks, i);
                        }
                        i = end;
                    }
                    Err(pos) => {
                        diags.push(Diagnostic::error(
                            "unterminated block comment",
                            Some(Span::new(start, pos as u32)),
                        ));
                        break;
                    }
                }
            }
            _ => match consume_operator(bytes, i) {
                Some((kind, end)) => {
                    toks.push(Token::new(kind, Span::new(start, end as u32)));
                    i = end;
                }
                None => {
                    diags.push(Diagnostic::error(
                        format!("unknown token `{}`", char::from(b)),
                        Some(Span::new(start, (i + 1) as u32)),
                    ));
                    i += 1;
                }
            },
        }
    }

    terminate_line(&mut toks, bytes.len());
    toks.push(Token::new(
        TokenKind::Eof,
        Span::new(bytes.len() as u32, bytes.len() as u32),
    ));

    LexOutput {
        tokens: toks,
        diagnostics: diags,
    }
}

/// Inserts a `;` when the line ends with a token that can close a declaration.
fn terminate_line(toks: &mut Vec<Token>, at: usize) {
    let ends_decl = matches!(
        toks.last().map(|t| &t.kind),
        Some(
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Str
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    );
    if ends_decl {
        let pos = at as u32;
        toks.push(Token::new(TokenKind::Semicolon, Span::new(pos, pos)));
    }
}

fn consume_ident(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphanumeric() || b == b'_' {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn keyword_or_ident(text: &str) -> TokenKind {
    use TokenKind::*;
    match text {
        "package" => Package,
        "import" => Import,
        "type" => Type,
        "func" => Func,
        "interface" => Interface,
        "struct" => Struct,
        "map" => Map,
        "chan" => Chan,
        _ => Ident,
    }
}

fn consume_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

fn consume_string(bytes: &[u8], start: usize) -> Result<usize, usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => {
                i += 2;
            }
            b'\n' if quote == b'"' => return Err(i),
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(bytes.len())
}

fn consume_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            break;
        }
        i += 1;
    }
    i
}

fn consume_block_comment(bytes: &[u8], start: usize) -> Result<usize, usize> {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return Ok(i + 2);
        }
        i += 1;
    }
    Err(bytes.len())
}

fn consume_operator(bytes: &[u8], start: usize) -> Option<(TokenKind, usize)> {
    use TokenKind::*;
    let rest = &bytes[start..];

    if rest.starts_with(b"...") {
        return Some((Ellipsis, start + 3));
    }
    if rest.starts_with(b"<-") {
        return Some((Arrow, start + 2));
    }

    let kind = match rest[0] {
        b'(' => LParen,
        b')' => RParen,
        b'{' => LBrace,
        b'}' => RBrace,
        b'[' => LBracket,
        b']' => RBracket,
        b',' => Comma,
        b';' => Semicolon,
        b'.' => Dot,
        b'*' => Star,
        _ => return None,
    };

    Some((kind, start + 1))
}
