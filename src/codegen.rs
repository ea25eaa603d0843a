use crate::ast::*;
use crate::tac::{Instr, Label, Operand, Temp};
use tracing::{debug, trace};

/// Lowers an analyzed program to three-address code.
pub fn generate(program: &Program) -> Vec<Instr> {
    let mut gen = CodeGenerator::new();
    gen.gen_program(program);
    debug!(
        instructions = gen.code.len(),
        temps = gen.next_temp,
        labels = gen.next_label,
        "code generation finished"
    );
    gen.into_code()
}

/// The name a variable is written and read under: the storage chosen by
/// analysis, or the source spelling when none was recorded.
fn storage_name(name: &str, storage: &Option<String>) -> String {
    storage.clone().unwrap_or_else(|| name.to_string())
}

/// Owns the output buffer and the temp/label counters for one pass.
/// Counters never reset, so names are unique across the whole listing.
#[derive(Debug, Default)]
struct CodeGenerator {
    code: Vec<Instr>,
    next_temp: usize,
    next_label: usize,
}

impl CodeGenerator {
    fn new() -> Self {
        Self::default()
    }

    fn into_code(self) -> Vec<Instr> {
        self.code
    }

    fn new_temp(&mut self) -> Temp {
        let temp = Temp(self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, instr: Instr) {
        trace!(%instr, "emit");
        self.code.push(instr);
    }

    fn gen_program(&mut self, program: &Program) {
        self.gen_block(&program.body);
    }

    fn gen_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.gen_stmt(stmt);
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl(name, value) | StmtKind::Assign(name, value) => {
                let src = self.gen_expr(value);
                self.emit(Instr::Copy {
                    dest: storage_name(name, &stmt.storage),
                    src,
                });
            }

            StmtKind::FunctionDef(func) => {
                self.emit(Instr::FuncBegin(func.name.clone()));
                self.gen_block(&func.body);
                self.emit(Instr::FuncEnd(func.name.clone()));
            }

            StmtKind::Call(call) => {
                self.gen_call(call);
            }

            StmtKind::If(cond, then_body, None) => {
                let cond = self.gen_expr(cond);
                let end = self.new_label();
                self.emit(Instr::IfFalse { cond, target: end });
                self.gen_block(then_body);
                self.emit(Instr::Label(end));
            }

            StmtKind::If(cond, then_body, Some(else_body)) => {
                let cond = self.gen_expr(cond);
                let else_label = self.new_label();
                let end = self.new_label();
                self.emit(Instr::IfFalse {
                    cond,
                    target: else_label,
                });
                self.gen_block(then_body);
                self.emit(Instr::Goto(end));
                self.emit(Instr::Label(else_label));
                self.gen_block(else_body);
                self.emit(Instr::Label(end));
            }

            StmtKind::While(cond, body) => {
                let start = self.new_label();
                let end = self.new_label();
                self.emit(Instr::Label(start));
                let cond = self.gen_expr(cond);
                self.emit(Instr::IfFalse { cond, target: end });
                self.gen_block(body);
                self.emit(Instr::Goto(start));
                self.emit(Instr::Label(end));
            }

            StmtKind::Return(value) => {
                let value = self.gen_expr(value);
                self.emit(Instr::Return(value));
            }

            StmtKind::Print(value) => {
                let value = self.gen_expr(value);
                self.emit(Instr::Print(value));
            }
        }
    }

    /// Emits whatever `expr` needs and returns the operand holding its value.
    fn gen_expr(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::IntLit(n) => Operand::Int(*n),
            ExprKind::FloatLit(n) => Operand::Float(*n),
            ExprKind::StringLit(s) => Operand::Str(s.clone()),
            ExprKind::Var(name) => Operand::Var(storage_name(name, &expr.storage)),

            ExprKind::BinOp(left, op, right) => {
                let left = self.gen_expr(left);
                let right = self.gen_expr(right);
                let dest = self.new_temp();
                self.emit(Instr::Binary {
                    dest,
                    op: *op,
                    left,
                    right,
                    ty: expr.ty,
                });
                dest.into()
            }

            ExprKind::UnaryOp(op, operand) => {
                let operand = self.gen_expr(operand);
                let dest = self.new_temp();
                self.emit(Instr::Unary {
                    dest,
                    op: *op,
                    operand,
                    ty: expr.ty,
                });
                dest.into()
            }

            ExprKind::Call(call) => self.gen_call(call).into(),
        }
    }

    fn gen_call(&mut self, call: &Call) -> Temp {
        for arg in &call.args {
            let value = self.gen_expr(arg);
            self.emit(Instr::Param(value));
        }
        let dest = self.new_temp();
        self.emit(Instr::Call {
            dest,
            func: call.name.clone(),
            argc: call.args.len(),
        });
        dest
    }
}
