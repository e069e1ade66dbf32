use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Type {
    #[default]
    Void,
    Int,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int => write!(f, "int"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program(pub Vec<Declaration>);

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Var(VarDecl),
    Fun(FunDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Var(v) => &v.name,
            Declaration::Fun(f) => &f.name,
        }
    }
}

/// A variable or a parameter: both are a type and a name.
#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunDecl {
    pub name: String,
    pub return_ty: Type,
    pub params: Vec<VarDecl>,
    pub body: CompoundStmt,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompoundStmt {
    pub locals: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// A lone `;`.
    Empty,
    Expr(Expr),
    Compound(CompoundStmt),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        line: usize,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinOpKind {
    pub fn is_relational(&self) -> bool {
        !matches!(
            self,
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::LessThan => "<",
            BinOpKind::LessEqual => "<=",
            BinOpKind::GreaterThan => ">",
            BinOpKind::GreaterEqual => ">=",
            BinOpKind::Equal => "==",
            BinOpKind::NotEqual => "!=",
        }
    }
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Filled in by the analyzer; `Void` until then.
    pub ty: Type,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Self {
            kind,
            ty: Type::Void,
            line,
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(&self.kind, ExprKind::Binary(op, _, _) if op.is_relational())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Assign(Box<Expr>, Box<Expr>),
    Binary(BinOpKind, Box<Expr>, Box<Expr>),
    Const(i32),
    Id(String),
    Call(String, Vec<Expr>),
    /// Stands in for an operand that failed to parse. Only present in trees
    /// whose parse reported a diagnostic.
    Error,
}
