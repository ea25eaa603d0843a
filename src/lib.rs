//! MeowScript compiler front end.
//!
//! Source text flows through four phases, each a plain function:
//! `lexer::tokenize` → `parser::parse` → `semantic::analyze` →
//! `codegen::generate`. Every phase collects all of its errors before
//! giving up, and the first failing phase stops the pipeline.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod symbols;
pub mod tac;

pub use ast::{Program, Type};
pub use error::{CompileError, Diagnostic, Phase, Pos};
pub use lexer::{Token, TokenKind};
pub use tac::{render, Instr};

use tracing::debug;

/// Everything produced by a successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    /// Type-annotated tree.
    pub program: Program,
    pub code: Vec<Instr>,
}

impl Compilation {
    pub fn listing(&self) -> String {
        render(&self.code)
    }
}

/// Runs all four phases over `source`.
pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    let tokens = lexer::tokenize(source).map_err(CompileError::Lexical)?;
    debug!(tokens = tokens.len(), "lexing finished");

    let program = parser::parse(tokens.clone()).map_err(CompileError::Syntax)?;
    debug!(statements = program.body.len(), "parsing finished");

    let program = semantic::analyze(program).map_err(CompileError::Semantic)?;
    let code = codegen::generate(&program);

    Ok(Compilation {
        tokens,
        program,
        code,
    })
}
