//! Abstract Syntax Tree for the stylescript JavaScript subset.
//!
//! The AST represents the structure of parsed source code. Statements and
//! expressions carry the span of their first token for diagnostics.

use crate::span::Span;

/// A parsed function literal or declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionNode {
    /// Function name, if one was given.
    pub name: Option<String>,
    /// Parameter names in declaration order.
    pub params: Vec<String>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// Span of the `function` keyword through the closing brace.
    pub span: Span,
}

/// A parsed program (a sequence of top-level statements).
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    /// Top-level statements.
    pub body: Vec<Stmt>,
}

/// Declaration keyword of a variable statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

/// A single `name = init` entry of a variable statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    /// Bound name.
    pub name: String,
    /// Initializer expression.
    pub init: Option<Expr>,
    /// Span of the name.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `var a = 1, b;`
    Var(DeclKind, Vec<Declarator>, Span),
    /// `function name() { ... }`
    Function(Box<FunctionNode>),
    /// Expression statement.
    Expr(Expr, Span),
    /// `return expr;`
    Return(Option<Expr>, Span),
    /// `if (test) consequent else alternate`
    If {
        /// Condition.
        test: Expr,
        /// Taken when the condition is truthy.
        consequent: Box<Stmt>,
        /// Taken otherwise.
        alternate: Option<Box<Stmt>>,
        /// Span of the `if` keyword.
        span: Span,
    },
    /// `while (test) body`
    While {
        /// Loop condition.
        test: Expr,
        /// Loop body.
        body: Box<Stmt>,
        /// Span of the `while` keyword.
        span: Span,
    },
    /// `do body while (test)`
    DoWhile {
        /// Loop body.
        body: Box<Stmt>,
        /// Loop condition.
        test: Expr,
        /// Span of the `do` keyword.
        span: Span,
    },
    /// `for (init; test; update) body`
    For {
        /// Initializer (declaration or expression statement).
        init: Option<Box<Stmt>>,
        /// Loop condition; absent means always true.
        test: Option<Expr>,
        /// Update expression.
        update: Option<Expr>,
        /// Loop body.
        body: Box<Stmt>,
        /// Span of the `for` keyword.
        span: Span,
    },
    /// `break;`
    Break(Span),
    /// `continue;`
    Continue(Span),
    /// `throw expr;`
    Throw(Expr, Span),
    /// `{ ... }`
    Block(Vec<Stmt>, Span),
    /// `;`
    Empty(Span),
}

/// Prefix operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
    /// `typeof x`
    Typeof,
    /// `void x`
    Void,
}

/// Binary (non short-circuit) operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
    /// `in`
    In,
}

/// Short-circuit operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64, Span),
    /// String literal.
    String(String, Span),
    /// `true` or `false`
    Bool(bool, Span),
    /// `null`
    Null(Span),
    /// `this`
    This(Span),
    /// Variable reference.
    Ident(String, Span),
    /// `[a, b, c]`
    Array(Vec<Expr>, Span),
    /// `{ key: value }`
    Object(Vec<(String, Expr)>, Span),
    /// `function (...) { ... }`
    Function(Box<FunctionNode>),
    /// Prefix operator application.
    Unary(UnaryOp, Box<Expr>, Span),
    /// `++x`, `x--` and friends.
    Update {
        /// True for `++`, false for `--`.
        increment: bool,
        /// True if the operator precedes the operand.
        prefix: bool,
        /// Assignment target.
        target: Box<Expr>,
        /// Span of the whole expression.
        span: Span,
    },
    /// Binary operator application.
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Span),
    /// `a && b`, `a || b`
    Logical(LogicalOp, Box<Expr>, Box<Expr>, Span),
    /// `test ? consequent : alternate`
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>, Span),
    /// `target = value` or compound `target op= value`.
    Assign {
        /// Operator for compound assignment.
        op: Option<BinaryOp>,
        /// Identifier, member or index expression.
        target: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
        /// Span of the whole expression.
        span: Span,
    },
    /// `object.property`
    Member(Box<Expr>, String, Span),
    /// `object[index]`
    Index(Box<Expr>, Box<Expr>, Span),
    /// `callee(args)`
    Call(Box<Expr>, Vec<Expr>, Span),
    /// `a, b`
    Sequence(Vec<Expr>, Span),
}

impl Expr {
    /// Returns the source span of this expression.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Number(_, s)
            | Self::String(_, s)
            | Self::Bool(_, s)
            | Self::Null(s)
            | Self::This(s)
            | Self::Ident(_, s)
            | Self::Array(_, s)
            | Self::Object(_, s)
            | Self::Unary(_, _, s)
            | Self::Update { span: s, .. }
            | Self::Binary(_, _, _, s)
            | Self::Logical(_, _, _, s)
            | Self::Conditional(_, _, _, s)
            | Self::Assign { span: s, .. }
            | Self::Member(_, _, s)
            | Self::Index(_, _, s)
            | Self::Call(_, _, s)
            | Self::Sequence(_, s) => *s,
            Self::Function(f) => f.span,
        }
    }

    /// Returns true if this expression may appear on the left of `=`.
    #[must_use]
    pub const fn is_assignable(&self) -> bool {
        matches!(self, Self::Ident(..) | Self::Member(..) | Self::Index(..))
    }
}

impl Stmt {
    /// Returns the source span of this statement.
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Var(_, _, s)
            | Self::Expr(_, s)
            | Self::Return(_, s)
            | Self::If { span: s, .. }
            | Self::While { span: s, .. }
            | Self::DoWhile { span: s, .. }
            | Self::For { span: s, .. }
            | Self::Break(s)
            | Self::Continue(s)
            | Self::Throw(_, s)
            | Self::Block(_, s)
            | Self::Empty(s) => *s,
            Self::Function(f) => f.span,
        }
    }
}
