use crate::lexer::LexErrorKind;
use crate::parser::SyntaxErrorKind;
use crate::semantic::SemanticErrorKind;
use std::fmt;
use thiserror::Error;

/// 1-based source position. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Pos { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {pos}")]
pub struct LexicalError {
    pub kind: LexErrorKind,
    pub pos: Pos,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {pos}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub pos: Pos,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {pos}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub pos: Pos,
}

/// The phase a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexical => write!(f, "lexical"),
            Phase::Syntax => write!(f, "syntax"),
            Phase::Semantic => write!(f, "semantic"),
        }
    }
}

/// Flat, phase-independent view of one error, ready for a driver to print.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub kind: &'static str,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error [{}] at line {}, column {}: {}",
            self.phase, self.kind, self.line, self.column, self.message
        )
    }
}

impl From<&LexicalError> for Diagnostic {
    fn from(e: &LexicalError) -> Self {
        Diagnostic {
            phase: Phase::Lexical,
            kind: e.kind.code(),
            message: e.kind.to_string(),
            line: e.pos.line,
            column: e.pos.column,
        }
    }
}

impl From<&SyntaxError> for Diagnostic {
    fn from(e: &SyntaxError) -> Self {
        Diagnostic {
            phase: Phase::Syntax,
            kind: e.kind.code(),
            message: e.kind.to_string(),
            line: e.pos.line,
            column: e.pos.column,
        }
    }
}

impl From<&SemanticError> for Diagnostic {
    fn from(e: &SemanticError) -> Self {
        Diagnostic {
            phase: Phase::Semantic,
            kind: e.kind.code(),
            message: e.kind.to_string(),
            line: e.pos.line,
            column: e.pos.column,
        }
    }
}

/// A failed compilation: every error reported by the first phase that failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("lexical analysis failed with {} error(s)", .0.len())]
    Lexical(Vec<LexicalError>),
    #[error("parsing failed with {} error(s)", .0.len())]
    Syntax(Vec<SyntaxError>),
    #[error("semantic analysis failed with {} error(s)", .0.len())]
    Semantic(Vec<SemanticError>),
}

impl CompileError {
    pub fn phase(&self) -> Phase {
        match self {
            CompileError::Lexical(_) => Phase::Lexical,
            CompileError::Syntax(_) => Phase::Syntax,
            CompileError::Semantic(_) => Phase::Semantic,
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::Lexical(errors) => errors.iter().map(Diagnostic::from).collect(),
            CompileError::Syntax(errors) => errors.iter().map(Diagnostic::from).collect(),
            CompileError::Semantic(errors) => errors.iter().map(Diagnostic::from).collect(),
        }
    }
}
