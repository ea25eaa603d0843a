use crate::error::Pos;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Integer,
    Float,
    String,
    /// Not yet known (untyped parameters) or not determinable after an error.
    Unknown,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "Integer"),
            Type::Float => write!(f, "Float"),
            Type::String => write!(f, "String"),
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
    /// Written by semantic analysis.
    pub ty: Type,
    /// Storage name of the variable a `Var` resolves to, written by
    /// semantic analysis. `None` means the source spelling.
    pub storage: Option<String>,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Expr {
            kind,
            pos,
            ty: Type::Unknown,
            storage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // Literals
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),

    // Variable access
    Var(String),

    BinOp(Box<Expr>, BinOp, Box<Expr>),
    UnaryOp(UnaryOp, Box<Expr>),

    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
    /// Storage name of a `VarDecl`/`Assign` target, as for `Expr::storage`.
    pub storage: Option<String>,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Stmt {
            kind,
            pos,
            storage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    // Box name paws value
    VarDecl(String, Expr),

    // name paws value
    Assign(String, Expr),

    FunctionDef(Function),

    // Call whose result is discarded
    Call(Call),

    // Control flow
    If(Expr, Vec<Stmt>, Option<Vec<Stmt>>),
    While(Expr, Vec<Stmt>),
    Return(Expr),

    Print(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

// Indented tree dump used by the driver's --ast output.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program")?;
        for stmt in &self.body {
            write_stmt(f, stmt, 1)?;
        }
        Ok(())
    }
}

/// Prints ` as x.1` when a variable is stored under another name.
struct StorageNote<'a>(&'a str, &'a Option<String>);

impl fmt::Display for StorageNote<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.1 {
            Some(storage) if storage != self.0 => write!(f, " as {}", storage),
            _ => Ok(()),
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, label: &str, body: &[Stmt], depth: usize) -> fmt::Result {
    writeln!(f, "{}{}", "  ".repeat(depth), label)?;
    for stmt in body {
        write_stmt(f, stmt, depth + 1)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match &stmt.kind {
        StmtKind::VarDecl(name, value) => {
            writeln!(f, "{}VarDecl {}{}", pad, name, StorageNote(name, &stmt.storage))?;
            write_expr(f, value, depth + 1)
        }
        StmtKind::Assign(name, value) => {
            writeln!(f, "{}Assign {}{}", pad, name, StorageNote(name, &stmt.storage))?;
            write_expr(f, value, depth + 1)
        }
        StmtKind::FunctionDef(func) => {
            let params: Vec<&str> = func.params.iter().map(|p| p.name.as_str()).collect();
            writeln!(f, "{}FunctionDef {}({})", pad, func.name, params.join(", "))?;
            for stmt in &func.body {
                write_stmt(f, stmt, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::Call(call) => {
            writeln!(f, "{}CallStmt {}", pad, call.name)?;
            for arg in &call.args {
                write_expr(f, arg, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::If(cond, then_body, else_body) => {
            writeln!(f, "{}If", pad)?;
            write_expr(f, cond, depth + 1)?;
            write_block(f, "Then", then_body, depth + 1)?;
            if let Some(else_body) = else_body {
                write_block(f, "Else", else_body, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::While(cond, body) => {
            writeln!(f, "{}While", pad)?;
            write_expr(f, cond, depth + 1)?;
            write_block(f, "Body", body, depth + 1)
        }
        StmtKind::Return(value) => {
            writeln!(f, "{}Return", pad)?;
            write_expr(f, value, depth + 1)
        }
        StmtKind::Print(value) => {
            writeln!(f, "{}Print", pad)?;
            write_expr(f, value, depth + 1)
        }
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match &expr.kind {
        ExprKind::IntLit(n) => writeln!(f, "{}Integer {} : {}", pad, n, expr.ty),
        ExprKind::FloatLit(n) => writeln!(f, "{}Float {:?} : {}", pad, n, expr.ty),
        ExprKind::StringLit(s) => writeln!(f, "{}String {:?} : {}", pad, s, expr.ty),
        ExprKind::Var(name) => writeln!(
            f,
            "{}Identifier {}{} : {}",
            pad,
            name,
            StorageNote(name, &expr.storage),
            expr.ty
        ),
        ExprKind::BinOp(left, op, right) => {
            writeln!(f, "{}BinaryOp {} : {}", pad, op, expr.ty)?;
            write_expr(f, left, depth + 1)?;
            write_expr(f, right, depth + 1)
        }
        ExprKind::UnaryOp(op, operand) => {
            writeln!(f, "{}UnaryOp {} : {}", pad, op, expr.ty)?;
            write_expr(f, operand, depth + 1)
        }
        ExprKind::Call(call) => {
            writeln!(f, "{}Call {} : {}", pad, call.name, expr.ty)?;
            for arg in &call.args {
                write_expr(f, arg, depth + 1)?;
            }
            Ok(())
        }
    }
}
