//! Untyped syntax tree produced by the parser.

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "startsWith",
            BinaryOp::EndsWith => "endsWith",
            BinaryOp::Matches => "matches",
        }
    }
}

/// Boolean connectives. Chains of one connective are kept flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn symbol(self) -> &'static str {
        match self {
            Logic::And => "&&",
            Logic::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal, usize),
    Array(Vec<Expr>, usize),
    /// `relative` is set for a leading dot or `#`: `.Status.State`, `#.PortID`.
    /// A bare `#` is a relative path with no segments.
    Path { relative: bool, segments: Vec<String>, offset: usize },
    Unary(UnaryOp, Box<Expr>, usize),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, usize),
    /// Two or more operands joined by the same connective.
    Logic(Logic, Vec<Expr>, usize),
    Call { name: String, args: Vec<Expr>, offset: usize },
    Closure(Box<Expr>, usize),
}

impl Expr {
    pub fn offset(&self) -> usize {
        match self {
            Expr::Lit(_, o)
            | Expr::Array(_, o)
            | Expr::Unary(_, _, o)
            | Expr::Binary(_, _, _, o)
            | Expr::Logic(_, _, o)
            | Expr::Closure(_, o) => *o,
            Expr::Path { offset, .. } | Expr::Call { offset, .. } => *offset,
        }
    }
}
