//! Recursive-descent parser. Precedence, loosest first:
//! `||`, `&&`, comparisons and string/membership operators, prefix `!`/`-`, primaries.

use crate::ast::{BinaryOp, Expr, Literal, Logic, UnaryOp};
use crate::lexer::{tokenize, Tok, Token};
use crate::FilterError;

/// Deepest nesting of parentheses, prefix operators, calls and closures.
pub const MAX_DEPTH: usize = 96;

pub fn parse(src: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0, end: src.len(), depth: 0 };
    if p.tokens.is_empty() {
        return Err(p.error(0, "empty expression"));
    }
    let expr = p.or()?;
    if let Some(t) = p.peek() {
        return Err(p.error(t.offset, format!("unexpected {}", describe(&t.tok))));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

/// A single term stands for itself; longer runs become one flat node.
fn chain(logic: Logic, mut terms: Vec<Expr>, offset: usize) -> Expr {
    if terms.len() == 1 {
        if let Some(only) = terms.pop() {
            return only;
        }
    }
    Expr::Logic(logic, terms, offset)
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(s) => format!("'{s}'"),
        Tok::Str(s) => format!("string \"{s}\""),
        Tok::Int(v) => format!("number {v}"),
        Tok::Float(v) => format!("number {v}"),
        other => format!("{other:?}").to_lowercase(),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_tok(&self) -> Option<&Tok> {
        self.peek().map(|t| &t.tok)
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.peek_tok(), Some(Tok::Ident(s)) if s == word)
    }

    fn word_at(&self, idx: usize, word: &str) -> bool {
        matches!(self.tokens.get(idx).map(|t| &t.tok), Some(Tok::Ident(s)) if s == word)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> FilterError {
        FilterError::Syntax { offset, message: message.into() }
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<usize, FilterError> {
        match self.advance() {
            Some(t) if t.tok == want => Ok(t.offset),
            Some(t) => Err(self.error(t.offset, format!("expected {what}, found {}", describe(&t.tok)))),
            None => Err(self.error(self.end, format!("expected {what}, found end of input"))),
        }
    }

    fn or(&mut self) -> Result<Expr, FilterError> {
        let offset = self.offset();
        let mut terms = vec![self.and()?];
        while matches!(self.peek_tok(), Some(Tok::OrOr)) || self.peek_word("or") {
            self.advance();
            terms.push(self.and()?);
        }
        Ok(chain(Logic::Or, terms, offset))
    }

    fn and(&mut self) -> Result<Expr, FilterError> {
        let offset = self.offset();
        let mut terms = vec![self.comparison()?];
        while matches!(self.peek_tok(), Some(Tok::AndAnd)) || self.peek_word("and") {
            self.advance();
            terms.push(self.comparison()?);
        }
        Ok(chain(Logic::And, terms, offset))
    }

    fn comparison_op(&self) -> Option<(BinaryOp, usize)> {
        let op = match self.peek_tok()? {
            Tok::EqEq => BinaryOp::Eq,
            Tok::NotEq => BinaryOp::Ne,
            Tok::Lt => BinaryOp::Lt,
            Tok::Le => BinaryOp::Le,
            Tok::Gt => BinaryOp::Gt,
            Tok::Ge => BinaryOp::Ge,
            Tok::Ident(w) => match w.as_str() {
                "in" => BinaryOp::In,
                "not" if self.word_at(self.pos + 1, "in") => return Some((BinaryOp::NotIn, 2)),
                "contains" => BinaryOp::Contains,
                "startsWith" => BinaryOp::StartsWith,
                "endsWith" => BinaryOp::EndsWith,
                "matches" => BinaryOp::Matches,
                _ => return None,
            },
            _ => return None,
        };
        Some((op, 1))
    }

    /// At most one comparison per operand; `a == b == c` needs parentheses.
    fn comparison(&mut self) -> Result<Expr, FilterError> {
        let lhs = self.unary()?;
        let Some((op, width)) = self.comparison_op() else {
            return Ok(lhs);
        };
        let offset = self.offset();
        self.pos += width;
        let rhs = self.unary()?;
        if self.comparison_op().is_some() {
            let at = self.offset();
            return Err(self.error(at, "comparisons cannot be chained; add parentheses"));
        }
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs), offset))
    }

    /// Every level of nesting (prefix operators, parentheses, arrays, calls,
    /// closures) passes through here, so this is where depth is bounded.
    fn unary(&mut self) -> Result<Expr, FilterError> {
        let offset = self.offset();
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(offset, "expression nested too deeply"));
        }
        let expr = self.prefixed(offset);
        self.depth -= 1;
        expr
    }

    fn prefixed(&mut self, offset: usize) -> Result<Expr, FilterError> {
        if matches!(self.peek_tok(), Some(Tok::Bang)) || self.peek_word("not") {
            self.advance();
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner), offset));
        }
        if matches!(self.peek_tok(), Some(Tok::Minus)) {
            self.advance();
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner), offset));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FilterError> {
        let Some(token) = self.advance() else {
            return Err(self.error(self.end, "unexpected end of input"));
        };
        let offset = token.offset;
        match token.tok {
            Tok::Str(s) => Ok(Expr::Lit(Literal::Str(s), offset)),
            Tok::Int(v) => Ok(Expr::Lit(Literal::Int(v), offset)),
            Tok::Float(v) => Ok(Expr::Lit(Literal::Float(v), offset)),
            Tok::LParen => {
                let inner = self.or()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                let items = self.list(Tok::RBracket, "']'")?;
                Ok(Expr::Array(items, offset))
            }
            Tok::LBrace => {
                let body = self.or()?;
                self.expect(Tok::RBrace, "'}'")?;
                Ok(Expr::Closure(Box::new(body), offset))
            }
            Tok::Dot => {
                let segments = self.segments()?;
                Ok(Expr::Path { relative: true, segments, offset })
            }
            Tok::Hash => {
                let mut segments = Vec::new();
                if matches!(self.peek_tok(), Some(Tok::Dot)) {
                    self.advance();
                    segments = self.segments()?;
                }
                Ok(Expr::Path { relative: true, segments, offset })
            }
            Tok::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Lit(Literal::Bool(true), offset)),
                "false" => Ok(Expr::Lit(Literal::Bool(false), offset)),
                _ if matches!(self.peek_tok(), Some(Tok::LParen)) => {
                    self.advance();
                    let args = self.list(Tok::RParen, "')'")?;
                    Ok(Expr::Call { name: word, args, offset })
                }
                _ => {
                    let mut segments = vec![word];
                    if matches!(self.peek_tok(), Some(Tok::Dot)) {
                        self.advance();
                        segments.extend(self.segments()?);
                    }
                    Ok(Expr::Path { relative: false, segments, offset })
                }
            },
            other => Err(self.error(offset, format!("unexpected {}", describe(&other)))),
        }
    }

    /// `Ident (. Ident)*`, the leading dot already consumed.
    fn segments(&mut self) -> Result<Vec<String>, FilterError> {
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(Token { tok: Tok::Ident(name), .. }) => out.push(name),
                Some(t) => return Err(self.error(t.offset, format!("expected field name, found {}", describe(&t.tok)))),
                None => return Err(self.error(self.end, "expected field name, found end of input")),
            }
            if !matches!(self.peek_tok(), Some(Tok::Dot)) {
                return Ok(out);
            }
            self.advance();
        }
    }

    /// Comma-separated expressions up to `close`, the opener already consumed.
    fn list(&mut self, close: Tok, what: &str) -> Result<Vec<Expr>, FilterError> {
        let mut items = Vec::new();
        if self.peek_tok() == Some(&close) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.or()?);
            if matches!(self.peek_tok(), Some(Tok::Comma)) {
                self.advance();
                continue;
            }
            self.expect(close, what)?;
            return Ok(items);
        }
    }
}
