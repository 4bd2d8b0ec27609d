use crate::parser::parents::ParentTable;
use crate::span::Span;
use std::rc::Rc;

/// Identifies a statement, block or program within one parse. Ids are unique per `Parser`.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Program {
    pub id: NodeId,
    pub body: Vec<Stmt>,
    pub parents: ParentTable,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Use(UseDecl),
    Expose(Box<Stmt>),
    Task(FunctionDecl),
    Let {
        name: Ident,
        value: Expr,
        is_const: bool,
    },
    Fn(FunctionDecl),
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<ElseBranch>,
    },
    For {
        key: Ident,
        value: Option<Ident>,
        iterable: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Expression(Expr),
    Comment(String),
    EmptyLine,
}

impl StmtKind {
    pub fn is_trivia(&self) -> bool {
        matches!(self, StmtKind::Comment(_) | StmtKind::EmptyLine)
    }

    /// Name bound by a declaration, used by `expose`.
    pub fn declared_name(&self) -> Option<&Ident> {
        match self {
            StmtKind::Let { name, .. } => Some(name),
            StmtKind::Fn(decl) | StmtKind::Task(decl) => Some(&decl.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Stmt>),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Rc<Block>,
}

#[derive(Debug, Clone)]
pub struct UseDecl {
    pub source: String,
    pub namespace: Option<Ident>,
    pub picks: Vec<UseSpecifier>,
}

/// `pick (name as alias)`: `name` is looked up in the module, `alias` is what the importer writes.
#[derive(Debug, Clone)]
pub struct UseSpecifier {
    pub name: Ident,
    pub alias: Option<Ident>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    // Primary Expressions
    Literal(Literal),
    Identifier(String),
    Template {
        raw: String,
        parts: Vec<TemplatePart>,
    },
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Lambda(Rc<Lambda>),

    // Operator Expressions
    Negate(Box<Expr>),
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        operator: CompareOp,
        right: Box<Expr>,
    },
    Equal {
        left: Box<Expr>,
        negated: bool,
        right: Box<Expr>,
    },
    Assign {
        target: Box<Expr>, // identifier or member
        value: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: MemberKey,
    },

    // Control Flow Expressions
    Switch(Box<Switch>),
    Run(Rc<Run>),
    Wait(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Num(f64),
    Str(String),
    Bool(bool),
    Nil,
    NaN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub enum MemberKey {
    Named(Ident),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: String,
    pub value: Expr,
    pub shorthand: bool, // {key} is sugar for {key: key}
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Ident>,
    pub body: Rc<Block>,
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub test: Expr,
    pub cases: Vec<Case>,
}

/// A `case` arm, or the `default` arm when `test` is `None`.
#[derive(Debug, Clone)]
pub struct Case {
    pub test: Option<Expr>,
    pub body: Block,
    pub span: Span,
}

/// `run callee(args) to (x): ... end`
#[derive(Debug, Clone)]
pub struct Run {
    pub call: Expr,
    pub continuations: Vec<To>,
}

#[derive(Debug, Clone)]
pub struct To {
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}
