use crate::ast::{BinOp, Type, UnaryOp};
use std::fmt;

/// Compiler-generated temporary, printed as `t<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temp(pub usize);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Jump target, printed as `L<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
    Str(String),
    Var(String),
    Temp(Temp),
}

impl From<Temp> for Operand {
    fn from(temp: Temp) -> Self {
        Operand::Temp(temp)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(n) => write!(f, "{}", n),
            // Debug keeps the fractional part: 3.0 stays "3.0".
            Operand::Float(n) => write!(f, "{:?}", n),
            Operand::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Temp(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// `dest = src`
    Copy { dest: String, src: Operand },
    /// `dest = left op right`; `ty` is the analyzed result type.
    Binary {
        dest: Temp,
        op: BinOp,
        left: Operand,
        right: Operand,
        ty: Type,
    },
    /// `dest = op operand`
    Unary {
        dest: Temp,
        op: UnaryOp,
        operand: Operand,
        ty: Type,
    },
    Label(Label),
    IfFalse { cond: Operand, target: Label },
    Goto(Label),
    /// `dest = call func, argc`; the arguments were pushed by the preceding
    /// `param` instructions.
    Call { dest: Temp, func: String, argc: usize },
    Param(Operand),
    Return(Operand),
    Print(Operand),
    FuncBegin(String),
    FuncEnd(String),
}

impl Instr {
    /// Labels and function markers are printed flush left.
    pub fn is_marker(&self) -> bool {
        matches!(self, Instr::Label(_) | Instr::FuncBegin(_) | Instr::FuncEnd(_))
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Copy { dest, src } => write!(f, "{} = {}", dest, src),
            Instr::Binary {
                dest,
                op,
                left,
                right,
                ..
            } => write!(f, "{} = {} {} {}", dest, left, op, right),
            Instr::Unary {
                dest, op, operand, ..
            } => write!(f, "{} = {}{}", dest, op, operand),
            Instr::Label(label) => write!(f, "{}:", label),
            Instr::IfFalse { cond, target } => write!(f, "if_false {} goto {}", cond, target),
            Instr::Goto(label) => write!(f, "goto {}", label),
            Instr::Call { dest, func, argc } => write!(f, "{} = call {}, {}", dest, func, argc),
            Instr::Param(value) => write!(f, "param {}", value),
            Instr::Return(value) => write!(f, "return {}", value),
            Instr::Print(value) => write!(f, "print {}", value),
            Instr::FuncBegin(name) => write!(f, "begin_func {}", name),
            Instr::FuncEnd(name) => write!(f, "end_func {}", name),
        }
    }
}

/// Renders a listing, one instruction per line.
pub fn render(code: &[Instr]) -> String {
    let mut out = String::new();
    for instr in code {
        if !instr.is_marker() {
            out.push_str("    ");
        }
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}
