use crate::ast::*;
use crate::error::{Pos, SemanticError};
use crate::symbols::{Symbol, SymbolTable};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticErrorKind {
    #[error("undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),
    #[error("'{name}' is already declared in this scope (line {previous_line})")]
    Redeclaration { name: String, previous_line: usize },
    #[error("cannot apply '{op}' to {left} and {right}")]
    OperandTypes { op: BinOp, left: Type, right: Type },
    #[error("cannot apply unary '{op}' to {operand}")]
    UnaryOperandType { op: UnaryOp, operand: Type },
    #[error("cannot assign {found} to '{name}' of type {expected}")]
    AssignmentType {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("'{0}' is not a function")]
    NotAFunction(String),
    #[error("function '{0}' cannot be used as a value")]
    FunctionAsValue(String),
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("'Bring' outside of a function")]
    ReturnOutsideFunction,
    #[error("cannot assign to function '{0}'")]
    AssignToFunction(String),
    #[error("function '{name}' brings {found} but earlier brought {expected}")]
    InconsistentReturn {
        name: String,
        expected: Type,
        found: Type,
    },
}

impl SemanticErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            SemanticErrorKind::UndeclaredIdentifier(_) => "undeclared-identifier",
            SemanticErrorKind::Redeclaration { .. } => "redeclaration",
            SemanticErrorKind::OperandTypes { .. } => "operand-types",
            SemanticErrorKind::UnaryOperandType { .. } => "unary-operand-type",
            SemanticErrorKind::AssignmentType { .. } => "assignment-type",
            SemanticErrorKind::UndefinedFunction(_) => "undefined-function",
            SemanticErrorKind::NotAFunction(_) => "not-a-function",
            SemanticErrorKind::FunctionAsValue(_) => "function-as-value",
            SemanticErrorKind::ArgumentCount { .. } => "argument-count",
            SemanticErrorKind::ReturnOutsideFunction => "return-outside-function",
            SemanticErrorKind::AssignToFunction(_) => "assign-to-function",
            SemanticErrorKind::InconsistentReturn { .. } => "inconsistent-return",
        }
    }
}

/// Checks the program and writes every expression's type. The tree shape is
/// left untouched; all errors found are returned together.
pub fn analyze(mut program: Program) -> Result<Program, Vec<SemanticError>> {
    let mut analyzer = Analyzer::new();
    analyzer.check_program(&mut program);
    debug!(errors = analyzer.errors.len(), "semantic analysis finished");
    if analyzer.errors.is_empty() {
        Ok(program)
    } else {
        Err(analyzer.errors)
    }
}

/// Whether a value of type `value` may be stored in a variable of type
/// `declared`. Unknown on either side is accepted.
fn assignable(declared: Type, value: Type) -> bool {
    declared == value
        || declared == Type::Unknown
        || value == Type::Unknown
        || (declared == Type::Float && value == Type::Integer)
}

fn same_family(a: Type, b: Type) -> bool {
    a == b || a == Type::Unknown || b == Type::Unknown || (a.is_numeric() && b.is_numeric())
}

struct Analyzer {
    symbols: SymbolTable,
    errors: Vec<SemanticError>,
    /// Name and declaration depth of the function whose body is being checked.
    current_function: Option<(String, usize)>,
    /// Variables declared so far under each source name, across all scopes.
    declared: HashMap<String, usize>,
}

impl Analyzer {
    fn new() -> Self {
        Analyzer {
            symbols: SymbolTable::new(),
            errors: Vec::new(),
            current_function: None,
            declared: HashMap::new(),
        }
    }

    fn error(&mut self, kind: SemanticErrorKind, pos: Pos) {
        self.errors.push(SemanticError { kind, pos });
    }

    fn check_program(&mut self, program: &mut Program) {
        for stmt in &mut program.body {
            self.check_stmt(stmt);
        }
        debug_assert_eq!(self.symbols.depth(), 0, "local scope left open");
        self.symbols.exit_scope();
    }

    fn check_block(&mut self, body: &mut [Stmt]) {
        self.symbols.enter_scope();
        for stmt in body {
            self.check_stmt(stmt);
        }
        self.symbols.exit_scope();
    }

    /// Declares into the current scope, reporting a same-scope clash.
    fn declare(&mut self, symbol: Symbol) -> bool {
        let name = symbol.name.clone();
        let pos = symbol.pos;
        let previous_line = match self.symbols.declare(symbol) {
            Ok(()) => return true,
            Err(existing) => existing.pos.line,
        };
        self.error(
            SemanticErrorKind::Redeclaration {
                name,
                previous_line,
            },
            pos,
        );
        false
    }

    /// Declares a variable and returns its storage name. The first variable
    /// with a given name keeps it; later ones, in any scope, get `name.N` so
    /// generated code never writes one variable through another's name.
    fn declare_variable(&mut self, name: &str, ty: Type, pos: Pos) -> Option<String> {
        let ordinal = self.declared.get(name).copied().unwrap_or(0);
        let mut symbol = Symbol::variable(name, ty, pos);
        if ordinal > 0 {
            symbol.storage = format!("{}.{}", name, ordinal);
        }
        let storage = symbol.storage.clone();
        if !self.declare(symbol) {
            return None;
        }
        self.declared.insert(name.to_string(), ordinal + 1);
        Some(storage)
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        let Stmt { kind, pos, storage } = stmt;
        let pos = *pos;
        match kind {
            StmtKind::VarDecl(name, value) => {
                // The initializer sees the enclosing binding of a shadowed name.
                let ty = self.check_expr(value);
                *storage = self.declare_variable(name, ty, pos);
            }

            StmtKind::Assign(name, value) => {
                let symbol = self.symbols.lookup(name);
                let target = symbol.map(|s| (s.is_function(), s.ty));
                *storage = symbol.filter(|s| !s.is_function()).map(|s| s.storage.clone());
                match target {
                    None => self.error(SemanticErrorKind::UndeclaredIdentifier(name.clone()), pos),
                    Some((true, _)) => {
                        self.error(SemanticErrorKind::AssignToFunction(name.clone()), pos)
                    }
                    Some((false, _)) => {}
                }

                let found = self.check_expr(value);
                if let Some((false, declared)) = target {
                    if declared == Type::Unknown {
                        // First typed assignment fixes the variable's type.
                        if let Some(symbol) = self.symbols.lookup_mut(name) {
                            symbol.ty = found;
                        }
                    } else if !assignable(declared, found) {
                        self.error(
                            SemanticErrorKind::AssignmentType {
                                name: name.clone(),
                                expected: declared,
                                found,
                            },
                            pos,
                        );
                    }
                }
            }

            StmtKind::FunctionDef(func) => {
                let params = func.params.iter().map(|p| p.name.clone()).collect();
                if !self.declare(Symbol::function(&func.name, params, pos)) {
                    return;
                }

                let depth = self.symbols.depth();
                let outer = self.current_function.replace((func.name.clone(), depth));
                self.symbols.enter_scope();
                for param in &func.params {
                    self.declare_variable(&param.name, Type::Unknown, param.pos);
                }
                for stmt in &mut func.body {
                    self.check_stmt(stmt);
                }
                self.symbols.exit_scope();
                self.current_function = outer;
            }

            StmtKind::Call(call) => {
                self.check_call(call, pos);
            }

            StmtKind::If(cond, then_body, else_body) => {
                self.check_expr(cond);
                self.check_block(then_body);
                if let Some(else_body) = else_body {
                    self.check_block(else_body);
                }
            }

            StmtKind::While(cond, body) => {
                self.check_expr(cond);
                self.check_block(body);
            }

            StmtKind::Return(value) => {
                let found = self.check_expr(value);
                let Some((name, depth)) = self.current_function.clone() else {
                    self.error(SemanticErrorKind::ReturnOutsideFunction, pos);
                    return;
                };
                if found == Type::Unknown {
                    return;
                }
                let expected = match self.symbols.get_at_mut(depth, &name) {
                    Some(func) if func.ty == Type::Unknown => {
                        func.ty = found;
                        return;
                    }
                    Some(func) => func.ty,
                    None => return,
                };
                if !same_family(expected, found) {
                    self.error(
                        SemanticErrorKind::InconsistentReturn {
                            name,
                            expected,
                            found,
                        },
                        pos,
                    );
                }
            }

            StmtKind::Print(value) => {
                self.check_expr(value);
            }
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> Type {
        let pos = expr.pos;
        let mut storage = None;
        let ty = match &mut expr.kind {
            ExprKind::IntLit(_) => Type::Integer,
            ExprKind::FloatLit(_) => Type::Float,
            ExprKind::StringLit(_) => Type::String,

            ExprKind::Var(name) => match self.symbols.lookup(name) {
                None => {
                    self.error(SemanticErrorKind::UndeclaredIdentifier(name.clone()), pos);
                    Type::Unknown
                }
                Some(symbol) if symbol.is_function() => {
                    self.error(SemanticErrorKind::FunctionAsValue(name.clone()), pos);
                    Type::Unknown
                }
                Some(symbol) => {
                    storage = Some(symbol.storage.clone());
                    symbol.ty
                }
            },

            ExprKind::BinOp(left, op, right) => {
                let op = *op;
                let left = self.check_expr(left);
                let right = self.check_expr(right);
                self.binary_type(op, left, right, pos)
            }

            ExprKind::UnaryOp(op, operand) => {
                let op = *op;
                let operand = self.check_expr(operand);
                match op {
                    UnaryOp::Not => Type::Integer,
                    UnaryOp::Neg if operand.is_numeric() || operand == Type::Unknown => operand,
                    UnaryOp::Neg => {
                        self.error(SemanticErrorKind::UnaryOperandType { op, operand }, pos);
                        Type::Unknown
                    }
                }
            }

            ExprKind::Call(call) => self.check_call(call, pos),
        };
        expr.ty = ty;
        expr.storage = storage;
        ty
    }

    fn binary_type(&mut self, op: BinOp, left: Type, right: Type, pos: Pos) -> Type {
        if op.is_arithmetic() {
            if op == BinOp::Add && (left == Type::String || right == Type::String) {
                return Type::String;
            }
            if left == Type::Unknown || right == Type::Unknown {
                return Type::Unknown;
            }
            if left.is_numeric() && right.is_numeric() {
                return if op == BinOp::Div || left == Type::Float || right == Type::Float {
                    Type::Float
                } else {
                    Type::Integer
                };
            }
            self.error(SemanticErrorKind::OperandTypes { op, left, right }, pos);
            return Type::Unknown;
        }

        if op.is_comparison() && !same_family(left, right) {
            self.error(SemanticErrorKind::OperandTypes { op, left, right }, pos);
        }
        // Comparisons and logical operators yield 0/1.
        Type::Integer
    }

    fn check_call(&mut self, call: &mut Call, pos: Pos) -> Type {
        let callee = self
            .symbols
            .lookup(&call.name)
            .map(|s| (s.is_function(), s.arity(), s.ty));

        match callee {
            None => self.error(SemanticErrorKind::UndefinedFunction(call.name.clone()), pos),
            Some((false, _, _)) => self.error(SemanticErrorKind::NotAFunction(call.name.clone()), pos),
            Some((true, expected, _)) if expected != call.args.len() => self.error(
                SemanticErrorKind::ArgumentCount {
                    name: call.name.clone(),
                    expected,
                    found: call.args.len(),
                },
                pos,
            ),
            Some(_) => {}
        }

        for arg in &mut call.args {
            self.check_expr(arg);
        }

        match callee {
            Some((true, _, ty)) => ty,
            _ => Type::Unknown,
        }
    }
}
