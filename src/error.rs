use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parser::{BinOpKind, Type};

/// A recoverable problem found in the source. Reporting one never stops the
/// stage that found it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("Lexical error at line {line}: unrecognized character '{lexeme}'")]
    Lexical { line: usize, lexeme: String },

    #[error("Syntax error at line {line}: {kind}")]
    Syntax { line: usize, kind: SyntaxError },

    #[error("Semantic error at line {line}: {kind}")]
    Semantic { line: usize, kind: SemanticError },
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        match self {
            Diagnostic::Lexical { line, .. }
            | Diagnostic::Syntax { line, .. }
            | Diagnostic::Semantic { line, .. } => *line,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Diagnostic::Syntax { .. })
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self, Diagnostic::Semantic { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected token -> {0}")]
    UnexpectedToken(String),

    #[error("identifier expected, found {0}")]
    ExpectedIdent(String),

    #[error("'int' expected for parameter, found {0}")]
    ExpectedParamType(String),

    #[error("assignment to non-variable")]
    AssignToNonVariable,

    #[error("integer literal {0} out of range")]
    NumberOutOfRange(String),

    #[error("nesting too deep")]
    NestingTooDeep,

    #[error("declaration expected, found {0}")]
    ExpectedDeclaration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("redeclaration of '{0}' in the same scope")]
    Redeclaration(String),

    #[error("variable '{0}' declared void")]
    VoidVariable(String),

    #[error("undeclared variable '{0}'")]
    UndeclaredVariable(String),

    #[error("'{0}' is a function, not a variable")]
    NotAVariable(String),

    #[error("undeclared function '{0}'")]
    UndeclaredFunction(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("'{name}' expects {expected} argument(s), found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {position} of '{name}' must be int")]
    ArgumentNotInt { name: String, position: usize },

    #[error("assignment to non-variable")]
    AssignToNonVariable,

    #[error("type mismatch in assignment: {target} = {value}")]
    AssignMismatch { target: Type, value: Type },

    #[error("operands of '{0}' must be int")]
    OperandNotInt(BinOpKind),

    #[error("condition must be int")]
    ConditionNotInt,

    #[error("return type mismatch: expected {expected}, found {found}")]
    ReturnMismatch { expected: Type, found: Type },
}

/// Conditions that end the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("File {} not found", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unable to open {} for writing: {source}", .path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
