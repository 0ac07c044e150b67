use crate::FilterError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Minus,
    /// `#`, the element under test inside a closure.
    Hash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    /// Byte offset into the source.
    pub offset: usize,
}

fn syntax(offset: usize, message: impl Into<String>) -> FilterError {
    FilterError::Syntax { offset, message: message.into() }
}

/// Operators and delimiters, with their width in bytes.
fn punct(c: u8, next: Option<u8>) -> Option<(Tok, usize)> {
    let pair = match (c, next) {
        (b'=', Some(b'=')) => Some(Tok::EqEq),
        (b'!', Some(b'=')) => Some(Tok::NotEq),
        (b'<', Some(b'=')) => Some(Tok::Le),
        (b'>', Some(b'=')) => Some(Tok::Ge),
        (b'&', Some(b'&')) => Some(Tok::AndAnd),
        (b'|', Some(b'|')) => Some(Tok::OrOr),
        _ => None,
    };
    if let Some(tok) = pair {
        return Some((tok, 2));
    }
    let tok = match c {
        b'.' => Tok::Dot,
        b',' => Tok::Comma,
        b'(' => Tok::LParen,
        b')' => Tok::RParen,
        b'[' => Tok::LBracket,
        b']' => Tok::RBracket,
        b'{' => Tok::LBrace,
        b'}' => Tok::RBrace,
        b'-' => Tok::Minus,
        b'!' => Tok::Bang,
        b'<' => Tok::Lt,
        b'>' => Tok::Gt,
        b'#' => Tok::Hash,
        _ => return None,
    };
    Some((tok, 1))
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if let Some((tok, width)) = punct(c, bytes.get(i + 1).copied()) {
            out.push(Token { tok, offset: start });
            i += width;
            continue;
        }
        let tok = match c {
            b'"' => {
                let (s, end) = string(src, i)?;
                i = end;
                Tok::Str(s)
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = bytes.get(i) == Some(&b'.')
                    && bytes.get(i + 1).map_or(false, |b| b.is_ascii_digit());
                if is_float {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    let v = src[start..i]
                        .parse::<f64>()
                        .map_err(|e| syntax(start, format!("bad number: {e}")))?;
                    Tok::Float(v)
                } else {
                    let v = src[start..i]
                        .parse::<i64>()
                        .map_err(|e| syntax(start, format!("bad number: {e}")))?;
                    Tok::Int(v)
                }
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                Tok::Ident(src[start..i].to_string())
            }
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(syntax(start, format!("unexpected character '{ch}'")));
            }
        };
        out.push(Token { tok, offset: start });
    }
    Ok(out)
}

/// Read a double-quoted string starting at `start`; returns the value and the offset past the closing quote.
fn string(src: &str, start: usize) -> Result<(String, usize), FilterError> {
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((j, other)) => {
                    return Err(syntax(start + 1 + j, format!("unknown escape '\\{other}'")));
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(syntax(start, "unterminated string"))
}
