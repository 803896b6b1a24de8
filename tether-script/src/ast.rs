//! Syntax tree.

use crate::error::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub start: Position,
    pub end: Position,
    /// Levels in this subtree; a literal or variable is 1.
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Space-joined values followed by a line break.
    Print(Vec<Expr>),
    /// A value with no line break.
    Write(Expr),
    /// Block on a line from the human, store it in `name`.
    Input { name: String, prompt: Option<Expr> },
    Assign { name: String, value: Expr },
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    For {
        var: String,
        from: Expr,
        to: Expr,
        descending: bool,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}
