//! Type checking. Turns a syntax tree into an [`Op`] tree whose field
//! references are resolved against the shape tables, so evaluation never has
//! to look at names it cannot answer.

use crate::access::{Elem, Kind, Shape};
use crate::ast::{BinaryOp, Expr, Literal, Logic, UnaryOp};
use crate::FilterError;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
    None,
    One,
    Count,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Static(Regex),
    Dynamic(Box<Op>),
}

#[derive(Debug, Clone)]
pub enum Op {
    Lit(Literal),
    Array(Vec<Literal>),
    /// `path` is read starting from the scope `depth` levels from the bottom.
    Field { depth: usize, path: Vec<&'static str> },
    Not(Box<Op>),
    Neg(Box<Op>),
    And(Vec<Op>),
    Or(Vec<Op>),
    Compare(Cmp, Box<Op>, Box<Op>),
    In { needle: Box<Op>, haystack: Box<Op>, negate: bool },
    /// Substring tests on strings; `Contains` on a string list tests membership.
    Text(TextOp, Box<Op>, Box<Op>),
    Matches(Box<Op>, Pattern),
    Quantify { quantifier: Quantifier, list: Box<Op>, body: Box<Op> },
    Len(Box<Op>),
}

fn type_error(offset: usize, message: impl std::fmt::Display) -> FilterError {
    FilterError::Type(format!("{message} (at offset {offset})"))
}

fn literal_kind(lit: &Literal) -> Kind {
    match lit {
        Literal::Bool(_) => Kind::Bool,
        Literal::Int(_) => Kind::Int,
        Literal::Float(_) => Kind::Float,
        Literal::Str(_) => Kind::Str,
    }
}

fn elem_of(kind: Kind) -> Option<Elem> {
    match kind {
        Kind::Bool => Some(Elem::Bool),
        Kind::Int | Kind::Float => Some(Elem::Num),
        Kind::Str => Some(Elem::Str),
        _ => None,
    }
}

/// Type-check `expr` with the host as the only scope. The result must be boolean.
pub fn compile(expr: &Expr) -> Result<Op, FilterError> {
    let mut c = Compiler { scopes: vec![Shape::Host] };
    let (op, kind) = c.expr(expr)?;
    if kind != Kind::Bool {
        return Err(type_error(expr.offset(), format!("filter must be boolean, found {}", kind.describe())));
    }
    Ok(op)
}

struct Compiler {
    scopes: Vec<Shape>,
}

impl Compiler {
    fn expr(&mut self, expr: &Expr) -> Result<(Op, Kind), FilterError> {
        match expr {
            Expr::Lit(lit, _) => Ok((Op::Lit(lit.clone()), literal_kind(lit))),
            Expr::Array(items, offset) => self.array(items, *offset),
            Expr::Path { relative, segments, offset } => self.path(*relative, segments, *offset),
            Expr::Unary(op, inner, offset) => self.unary(*op, inner, *offset),
            Expr::Binary(op, lhs, rhs, offset) => self.binary(*op, lhs, rhs, *offset),
            Expr::Logic(logic, terms, _) => self.logic(*logic, terms),
            Expr::Call { name, args, offset } => self.call(name, args, *offset),
            Expr::Closure(_, offset) => Err(type_error(*offset, "a closure is only allowed as a quantifier argument")),
        }
    }

    fn array(&mut self, items: &[Expr], offset: usize) -> Result<(Op, Kind), FilterError> {
        let mut values = Vec::with_capacity(items.len());
        let mut elem = Elem::Any;
        for item in items {
            let lit = constant(item)?;
            let this = elem_of(literal_kind(&lit)).unwrap_or(Elem::Any);
            if elem != Elem::Any && elem != this {
                return Err(type_error(item.offset(), "array elements must share one type"));
            }
            elem = this;
            values.push(lit);
        }
        Ok((Op::Array(values), Kind::Array(elem)))
    }

    fn path(&mut self, relative: bool, segments: &[String], offset: usize) -> Result<(Op, Kind), FilterError> {
        let innermost = self.scopes.len() - 1;
        let Some((first, rest)) = segments.split_first() else {
            if relative {
                return Ok((Op::Field { depth: innermost, path: Vec::new() }, Kind::Object(self.scopes[innermost])));
            }
            return Err(type_error(offset, "empty field path"));
        };
        let candidates: Vec<usize> = if relative { vec![innermost] } else { (0..=innermost).rev().collect() };
        let found = candidates
            .into_iter()
            .find_map(|depth| self.scopes[depth].field(first).map(|f| (depth, f)));
        let Some((depth, (name, mut kind))) = found else {
            return Err(type_error(
                offset,
                format!("unknown field '{first}' on {}", self.scopes[innermost].name()),
            ));
        };
        let mut path = vec![name];
        for segment in rest {
            let Kind::Object(shape) = kind else {
                return Err(type_error(
                    offset,
                    format!("cannot read '{segment}' from {}", kind.describe()),
                ));
            };
            let Some((name, next)) = shape.field(segment) else {
                return Err(type_error(offset, format!("unknown field '{segment}' on {}", shape.name())));
            };
            path.push(name);
            kind = next;
        }
        Ok((Op::Field { depth, path }, kind))
    }

    fn unary(&mut self, op: UnaryOp, inner: &Expr, offset: usize) -> Result<(Op, Kind), FilterError> {
        let (value, kind) = self.expr(inner)?;
        match op {
            UnaryOp::Not if kind == Kind::Bool => Ok((Op::Not(Box::new(value)), Kind::Bool)),
            UnaryOp::Neg if kind.is_numeric() => match value {
                Op::Lit(Literal::Int(v)) => Ok((Op::Lit(Literal::Int(-v)), kind)),
                Op::Lit(Literal::Float(v)) => Ok((Op::Lit(Literal::Float(-v)), kind)),
                other => Ok((Op::Neg(Box::new(other)), kind)),
            },
            UnaryOp::Not => Err(type_error(offset, format!("'!' needs a bool, found {}", kind.describe()))),
            UnaryOp::Neg => Err(type_error(offset, format!("'-' needs a number, found {}", kind.describe()))),
        }
    }

    fn logic(&mut self, logic: Logic, terms: &[Expr]) -> Result<(Op, Kind), FilterError> {
        let mut ops = Vec::with_capacity(terms.len());
        for term in terms {
            let (op, kind) = self.expr(term)?;
            if kind != Kind::Bool {
                return Err(type_error(
                    term.offset(),
                    format!("'{}' needs bool operands, found {}", logic.symbol(), kind.describe()),
                ));
            }
            ops.push(op);
        }
        let op = match logic {
            Logic::And => Op::And(ops),
            Logic::Or => Op::Or(ops),
        };
        Ok((op, Kind::Bool))
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, offset: usize) -> Result<(Op, Kind), FilterError> {
        let (l, lk) = self.expr(lhs)?;
        let (r, rk) = self.expr(rhs)?;
        let mismatch = || {
            type_error(
                offset,
                format!("'{}' does not apply to {} and {}", op.symbol(), lk.describe(), rk.describe()),
            )
        };
        let (l, r) = (Box::new(l), Box::new(r));
        let out = match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                let comparable = (lk.is_numeric() && rk.is_numeric())
                    || (lk == rk && matches!(lk, Kind::Bool | Kind::Str));
                if !comparable {
                    return Err(mismatch());
                }
                let cmp = if op == BinaryOp::Eq { Cmp::Eq } else { Cmp::Ne };
                Op::Compare(cmp, l, r)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordered = (lk.is_numeric() && rk.is_numeric()) || (lk == Kind::Str && rk == Kind::Str);
                if !ordered {
                    return Err(mismatch());
                }
                let cmp = match op {
                    BinaryOp::Lt => Cmp::Lt,
                    BinaryOp::Le => Cmp::Le,
                    BinaryOp::Gt => Cmp::Gt,
                    _ => Cmp::Ge,
                };
                Op::Compare(cmp, l, r)
            }
            BinaryOp::In | BinaryOp::NotIn => {
                let fits = match (elem_of(lk), rk) {
                    (Some(_), Kind::Array(Elem::Any)) => true,
                    (Some(e), Kind::Array(h)) => e == h,
                    (Some(Elem::Str), Kind::Strings) => true,
                    _ => false,
                };
                if !fits {
                    return Err(mismatch());
                }
                Op::In { needle: l, haystack: r, negate: op == BinaryOp::NotIn }
            }
            BinaryOp::Contains => {
                if rk != Kind::Str || !matches!(lk, Kind::Str | Kind::Strings) {
                    return Err(mismatch());
                }
                Op::Text(TextOp::Contains, l, r)
            }
            BinaryOp::StartsWith | BinaryOp::EndsWith => {
                if lk != Kind::Str || rk != Kind::Str {
                    return Err(mismatch());
                }
                let t = if op == BinaryOp::StartsWith { TextOp::StartsWith } else { TextOp::EndsWith };
                Op::Text(t, l, r)
            }
            BinaryOp::Matches => {
                if lk != Kind::Str || rk != Kind::Str {
                    return Err(mismatch());
                }
                let pattern = match *r {
                    Op::Lit(Literal::Str(ref src)) => Regex::new(src)
                        .map(Pattern::Static)
                        .map_err(|e| type_error(rhs.offset(), format!("invalid pattern: {e}")))?,
                    other => Pattern::Dynamic(Box::new(other)),
                };
                Op::Matches(l, pattern)
            }
        };
        let kind = Kind::Bool;
        Ok((out, kind))
    }

    fn call(&mut self, name: &str, args: &[Expr], offset: usize) -> Result<(Op, Kind), FilterError> {
        let quantifier = match name {
            "any" => Quantifier::Any,
            "all" => Quantifier::All,
            "none" => Quantifier::None,
            "one" => Quantifier::One,
            "count" => Quantifier::Count,
            "len" => return self.len(args, offset),
            other => return Err(type_error(offset, format!("unknown function '{other}'"))),
        };
        let [list, closure] = args else {
            return Err(type_error(offset, format!("{name} takes a list and a {{predicate}}")));
        };
        let (list_op, list_kind) = self.expr(list)?;
        let Kind::List(shape) = list_kind else {
            return Err(type_error(
                list.offset(),
                format!("{name} needs a list, found {}", list_kind.describe()),
            ));
        };
        let Expr::Closure(body, body_offset) = closure else {
            return Err(type_error(closure.offset(), format!("{name} needs a {{predicate}} as its second argument")));
        };
        self.scopes.push(shape);
        let body = self.expr(body);
        self.scopes.pop();
        let (body, body_kind) = body?;
        if body_kind != Kind::Bool {
            return Err(type_error(
                *body_offset,
                format!("{name} predicate must be boolean, found {}", body_kind.describe()),
            ));
        }
        let kind = if quantifier == Quantifier::Count { Kind::Int } else { Kind::Bool };
        Ok((Op::Quantify { quantifier, list: Box::new(list_op), body: Box::new(body) }, kind))
    }

    fn len(&mut self, args: &[Expr], offset: usize) -> Result<(Op, Kind), FilterError> {
        let [arg] = args else {
            return Err(type_error(offset, "len takes one argument"));
        };
        let (op, kind) = self.expr(arg)?;
        match kind {
            Kind::Str | Kind::Strings | Kind::Array(_) | Kind::List(_) => Ok((Op::Len(Box::new(op)), Kind::Int)),
            other => Err(type_error(arg.offset(), format!("len does not apply to {}", other.describe()))),
        }
    }
}

/// Array elements must be literals, optionally negated.
fn constant(expr: &Expr) -> Result<Literal, FilterError> {
    match expr {
        Expr::Lit(lit, _) => Ok(lit.clone()),
        Expr::Unary(UnaryOp::Neg, inner, offset) => match constant(inner)? {
            Literal::Int(v) => Ok(Literal::Int(-v)),
            Literal::Float(v) => Ok(Literal::Float(-v)),
            _ => Err(type_error(*offset, "'-' needs a number")),
        },
        other => Err(type_error(other.offset(), "array elements must be literals")),
    }
}
