//! RV32 assembly emission.
//!
//! A single recursive walk over each function body, allocating registers
//! on the fly. Expression temporaries live for exactly one statement;
//! when a class runs dry, a victim register is spilled to a fresh frame
//! slot and never reloaded (the emitter raises instead of reading a
//! stale register). The frame size is only known after the body has been
//! emitted, so the body goes into a side buffer and the prologue is
//! written in front of it with the observed total.
//!
//! Calling convention: all arguments are passed on the stack, `args[i]`
//! at `i*4(sp)` at the call instruction, return value in `a0`. Callees
//! copy their parameters from `sp + frame + i*4` into local slots. This
//! diverges from the standard RV32 ABI register convention on purpose —
//! both sides of every call are emitted by this generator.

pub mod frame;
pub mod regfile;

use std::collections::BTreeMap;

use crate::ast::{BinOp, Expr, FuncDef, LiveSet, Program, Stmt, StmtKind, UnOp};
use crate::diagnostic::Diagnostic;

use self::frame::FunctionContext;
use self::regfile::{RegClass, RegisterFile};

pub struct Emitter {
    output: Vec<String>,
    /// Per-prefix label counters: `and_false_0` and `and_end_0` pair up.
    labels: BTreeMap<&'static str, u32>,
    regs: RegisterFile,
    /// The previous spill victim is avoided when picking the next one.
    last_spilled: Option<&'static str>,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            output: Vec::new(),
            labels: BTreeMap::new(),
            regs: RegisterFile::new(),
            last_spilled: None,
        }
    }

    pub fn emit_program(&mut self, program: &Program) -> Result<String, Diagnostic> {
        self.push(".text");
        self.push(".globl main");
        for func in &program.functions {
            self.emit_func(func)?;
        }
        Ok(self.output.join("\n") + "\n")
    }

    fn emit_func(&mut self, func: &FuncDef) -> Result<(), Diagnostic> {
        self.regs.reset();
        self.last_spilled = None;

        let mut ctx = FunctionContext::new(&func.name);
        ctx.push_scope();
        self.push(format!("{}:", func.name));

        let param_offsets: Vec<i32> = func
            .params
            .iter()
            .map(|param| {
                let offset = ctx.allocate_slot();
                ctx.add_var(param, offset);
                offset
            })
            .collect();

        // Emit the body into a side buffer; declarations and spills grow
        // ctx.stack_size as they are encountered, and the prologue needs
        // the final figure.
        let head = std::mem::take(&mut self.output);
        let result = self.emit_stmt(&func.body, &mut ctx, 0);
        let body = std::mem::replace(&mut self.output, head);
        result?;

        let frame_size = ctx.stack_size + 4;
        self.push(format!("addi sp, sp, -{}", frame_size));
        self.push(format!("sw ra, {}(sp)", frame_size - 4));

        // Copy every parameter from the caller's argument area into its
        // local slot, so later uses cannot tell parameters from locals.
        for (i, offset) in param_offsets.iter().enumerate() {
            self.push(format!("lw t0, {}(sp)", frame_size + (i as i32) * 4));
            self.push(format!("sw t0, {}(sp)", offset));
        }

        self.output.extend(body);

        self.push(format!("{}_return:", func.name));
        self.push(format!("lw ra, {}(sp)", frame_size - 4));
        self.push(format!("addi sp, sp, {}", frame_size));
        self.push("ret");
        Ok(())
    }

    fn emit_stmt(
        &mut self,
        stmt: &Stmt,
        ctx: &mut FunctionContext,
        extra: i32,
    ) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                ctx.push_scope();
                for s in stmts {
                    self.emit_stmt(s, ctx, extra)?;
                }
                ctx.pop_scope();
            }
            StmtKind::Empty => {}
            StmtKind::Expr(expr) => {
                let temp = self.alloc_with_spill(RegClass::Temp, Some(&stmt.live_in), ctx, extra)?;
                self.emit_expr_into(expr, ctx, temp, extra)?;
                self.regs.release(temp);
            }
            StmtKind::Decl { name, init } => {
                let offset = ctx.allocate_slot();
                ctx.add_var(name, offset);
                if let Some(init) = init {
                    let temp =
                        self.alloc_with_spill(RegClass::Temp, Some(&stmt.live_in), ctx, extra)?;
                    self.emit_expr_into(init, ctx, temp, extra)?;
                    self.push(format!("sw {}, {}(sp)", temp, offset + extra));
                    self.regs.release(temp);
                }
            }
            StmtKind::Assign { name, value } => {
                let temp = self.alloc_with_spill(RegClass::Temp, Some(&stmt.live_in), ctx, extra)?;
                self.emit_expr_into(value, ctx, temp, extra)?;
                let offset = ctx.find_var(name).ok_or_else(|| {
                    Diagnostic::gen(format!("Variable {} not found in context", name))
                })?;
                self.push(format!("sw {}, {}(sp)", temp, offset + extra));
                self.regs.release(temp);
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let else_label = self.fresh_label("if_else_");
                let cond_reg =
                    self.alloc_with_spill(RegClass::Temp, Some(&stmt.live_in), ctx, extra)?;
                self.emit_expr_into(cond, ctx, cond_reg, extra)?;
                self.push(format!("beqz {}, {}", cond_reg, else_label));
                self.regs.release(cond_reg);
                self.emit_stmt(then_body, ctx, extra)?;

                if let Some(else_body) = else_body {
                    let end_label = self.fresh_label("if_end_");
                    self.push(format!("j {}", end_label));
                    self.push(format!("{}:", else_label));
                    self.emit_stmt(else_body, ctx, extra)?;
                    self.push(format!("{}:", end_label));
                } else {
                    self.push(format!("{}:", else_label));
                }
            }
            StmtKind::While { cond, body } => {
                let start_label = self.fresh_label("while_start_");
                let end_label = self.fresh_label("while_end_");
                ctx.enter_loop(start_label.clone(), end_label.clone());

                self.push(format!("{}:", start_label));
                let cond_reg =
                    self.alloc_with_spill(RegClass::Temp, Some(&stmt.live_in), ctx, extra)?;
                self.emit_expr_into(cond, ctx, cond_reg, extra)?;
                self.push(format!("beqz {}, {}", cond_reg, end_label));
                self.regs.release(cond_reg);
                self.emit_stmt(body, ctx, extra)?;
                self.push(format!("j {}", start_label));
                self.push(format!("{}:", end_label));

                ctx.exit_loop();
            }
            StmtKind::Break => {
                let label = ctx
                    .current_loop_end()
                    .ok_or_else(|| Diagnostic::gen("Break statement outside of loop"))?;
                self.push(format!("j {}", label));
            }
            StmtKind::Continue => {
                let label = ctx
                    .current_loop_start()
                    .ok_or_else(|| Diagnostic::gen("Continue statement outside of loop"))?;
                self.push(format!("j {}", label));
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.emit_expr_into(value, ctx, "a0", extra)?;
                }
                self.push(format!("j {}_return", ctx.name));
            }
        }
        Ok(())
    }

    /// Emit code leaving `expr`'s value in `dest`, then verify the
    /// destination register survived: spilled values are never reloaded,
    /// so a register evicted while its value was still pending would
    /// silently read back garbage. Raising here turns that miscompile
    /// into a clean error.
    fn emit_expr_into(
        &mut self,
        expr: &Expr,
        ctx: &mut FunctionContext,
        dest: &str,
        extra: i32,
    ) -> Result<(), Diagnostic> {
        let mark = self.regs.spill_mark();
        self.emit_expr(expr, ctx, dest, extra)?;
        if self.regs.spilled_since(dest, mark) {
            return Err(Diagnostic::gen(format!(
                "Register {} was spilled while its value was still needed",
                dest
            )));
        }
        Ok(())
    }

    /// Emit code leaving `expr`'s value in `dest`. `extra` is the number
    /// of bytes `sp` currently sits below the frame base (caller-save and
    /// argument areas during call lowering); every frame-relative access
    /// adds it.
    fn emit_expr(
        &mut self,
        expr: &Expr,
        ctx: &mut FunctionContext,
        dest: &str,
        extra: i32,
    ) -> Result<(), Diagnostic> {
        match expr {
            Expr::IntLit(value) => {
                self.push(format!("li {},{}", dest, value));
            }
            Expr::Var(name) => {
                let offset = ctx.find_var(name).ok_or_else(|| {
                    Diagnostic::gen(format!("Variable {} not found in context", name))
                })?;
                self.push(format!("lw {}, {}(sp)", dest, offset + extra));
            }
            Expr::BinOp { op, lhs, rhs } if op.is_short_circuit() => {
                self.emit_short_circuit(*op, lhs, rhs, ctx, dest, extra)?;
            }
            Expr::BinOp { op, lhs, rhs } => {
                let lhs_reg = self.alloc_with_spill(RegClass::Temp, None, ctx, extra)?;
                self.emit_expr_into(lhs, ctx, lhs_reg, extra)?;
                let mark = self.regs.spill_mark();
                let rhs_reg = self.alloc_with_spill(RegClass::Temp, None, ctx, extra)?;
                self.emit_expr_into(rhs, ctx, rhs_reg, extra)?;
                if self.regs.spilled_since(lhs_reg, mark) {
                    return Err(Diagnostic::gen(format!(
                        "Register {} was spilled while its value was still needed",
                        lhs_reg
                    )));
                }
                self.emit_binop(*op, dest, lhs_reg, rhs_reg);
                if !self.regs.is_spilled(lhs_reg) {
                    self.regs.release(lhs_reg);
                }
                if !self.regs.is_spilled(rhs_reg) {
                    self.regs.release(rhs_reg);
                }
            }
            Expr::UnOp { op, operand } => {
                let temp = self.alloc_with_spill(RegClass::Temp, None, ctx, extra)?;
                self.emit_expr_into(operand, ctx, temp, extra)?;
                match op {
                    UnOp::Neg => self.push(format!("neg {}, {}", dest, temp)),
                    UnOp::Not => self.push(format!("seqz {}, {}", dest, temp)),
                }
                if !self.regs.is_spilled(temp) {
                    self.regs.release(temp);
                }
            }
            Expr::Call { name, args } => {
                self.emit_call(name, args, ctx, dest, extra)?;
            }
        }
        Ok(())
    }

    fn emit_binop(&mut self, op: BinOp, d: &str, l: &str, r: &str) {
        match op {
            BinOp::Add => self.push(format!("add {}, {}, {}", d, l, r)),
            BinOp::Sub => self.push(format!("sub {}, {}, {}", d, l, r)),
            BinOp::Mul => self.push(format!("mul {}, {}, {}", d, l, r)),
            BinOp::Div => self.push(format!("div {}, {}, {}", d, l, r)),
            BinOp::Mod => self.push(format!("rem {}, {}, {}", d, l, r)),
            BinOp::Lt => self.push(format!("slt {}, {}, {}", d, l, r)),
            BinOp::Gt => self.push(format!("slt {}, {}, {}", d, r, l)),
            BinOp::Le => {
                self.push(format!("slt {}, {}, {}", d, r, l));
                self.push(format!("xori {}, {}, 1", d, d));
            }
            BinOp::Ge => {
                self.push(format!("slt {}, {}, {}", d, l, r));
                self.push(format!("xori {}, {}, 1", d, d));
            }
            BinOp::Eq => {
                self.push(format!("sub {}, {}, {}", d, l, r));
                self.push(format!("seqz {}, {}", d, d));
            }
            BinOp::Ne => {
                self.push(format!("sub {}, {}, {}", d, l, r));
                self.push(format!("snez {}, {}", d, d));
            }
            BinOp::And | BinOp::Or => unreachable!("short-circuit ops expand to branches"),
        }
    }

    /// `&&`/`||` with a branch over the right operand. The left value
    /// lives in a callee-saved register so the right operand's own calls
    /// cannot clobber it.
    fn emit_short_circuit(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        ctx: &mut FunctionContext,
        dest: &str,
        extra: i32,
    ) -> Result<(), Diagnostic> {
        let lhs_reg = self.alloc_with_spill(RegClass::Save, None, ctx, extra)?;
        self.emit_expr_into(lhs, ctx, lhs_reg, extra)?;

        let (skip_label, end_label, branch, skip_value) = match op {
            BinOp::And => (
                self.fresh_label("and_false_"),
                self.fresh_label("and_end_"),
                "beqz",
                0,
            ),
            BinOp::Or => (
                self.fresh_label("or_true_"),
                self.fresh_label("or_end_"),
                "bnez",
                1,
            ),
            _ => unreachable!("not a short-circuit op"),
        };

        self.push(format!("{} {}, {}", branch, lhs_reg, skip_label));
        let mark = self.regs.spill_mark();
        let rhs_reg = self.alloc_with_spill(RegClass::Save, None, ctx, extra)?;
        self.emit_expr_into(rhs, ctx, rhs_reg, extra)?;
        if self.regs.spilled_since(lhs_reg, mark) {
            return Err(Diagnostic::gen(format!(
                "Register {} was spilled while its value was still needed",
                lhs_reg
            )));
        }
        self.push(format!("mv {}, {}", lhs_reg, rhs_reg));
        self.regs.release(rhs_reg);
        self.push(format!("j {}", end_label));
        self.push(format!("{}:", skip_label));
        self.push(format!("li {}, {}", lhs_reg, skip_value));
        self.push(format!("{}:", end_label));

        self.push(format!("mv {}, {}", dest, lhs_reg));
        self.regs.release(lhs_reg);
        Ok(())
    }

    /// Lower a direct call: save in-use caller-saved registers below the
    /// frame, reserve a memory argument area, evaluate arguments left to
    /// right into it, call, then unwind both regions.
    fn emit_call(
        &mut self,
        name: &str,
        args: &[Expr],
        ctx: &mut FunctionContext,
        dest: &str,
        extra: i32,
    ) -> Result<(), Diagnostic> {
        let saved: Vec<&'static str> = self
            .regs
            .used_registers()
            .into_iter()
            .filter(|r| self.regs.class_of(r) != Some(RegClass::Save))
            .collect();

        let save_bytes = (saved.len() * 4) as i32;
        if save_bytes > 0 {
            self.push(format!("addi sp, sp, -{}", save_bytes));
            for (i, reg) in saved.iter().enumerate() {
                self.push(format!("sw {}, {}(sp)", reg, i * 4));
            }
        }

        let arg_bytes = (args.len() * 4) as i32;
        if arg_bytes > 0 {
            self.push(format!("addi sp, sp, -{}", arg_bytes));
        }

        // One argument at a time through a scratch register; keeping
        // earlier arguments in a0..a7 would let later argument
        // evaluation clobber them.
        for (i, arg) in args.iter().enumerate() {
            let temp =
                self.alloc_with_spill(RegClass::Temp, None, ctx, extra + arg_bytes + save_bytes)?;
            self.emit_expr_into(arg, ctx, temp, extra + arg_bytes + save_bytes)?;
            self.push(format!("sw {}, {}(sp)", temp, i * 4));
            if !self.regs.is_spilled(temp) {
                self.regs.release(temp);
            }
        }

        self.push(format!("call {}", name));

        if arg_bytes > 0 {
            self.push(format!("addi sp, sp, {}", arg_bytes));
        }
        if save_bytes > 0 {
            for (i, reg) in saved.iter().enumerate().rev() {
                self.push(format!("lw {}, {}(sp)", reg, i * 4));
            }
            self.push(format!("addi sp, sp, {}", save_bytes));
        }

        if dest != "a0" {
            self.push(format!("mv {}, a0", dest));
        }
        Ok(())
    }

    /// `alloc`, spilling a victim to a fresh frame slot when the class is
    /// exhausted. Victim preference: not live into the current statement
    /// and not the previous victim; then merely not the previous victim;
    /// then anything of the class.
    fn alloc_with_spill(
        &mut self,
        class: RegClass,
        live: Option<&LiveSet>,
        ctx: &mut FunctionContext,
        extra: i32,
    ) -> Result<&'static str, Diagnostic> {
        if let Some(reg) = self.regs.alloc(class) {
            return Ok(reg);
        }

        let used = self.regs.used_registers_of(class);
        let last = self.last_spilled;
        let is_live = |name: &str| live.is_some_and(|set| set.contains(name));
        let victim = used
            .iter()
            .copied()
            .find(|&r| !is_live(r) && Some(r) != last)
            .or_else(|| used.iter().copied().find(|&r| Some(r) != last))
            .or_else(|| used.first().copied());
        let Some(victim) = victim else {
            return Err(Diagnostic::gen("No available register for spilling"));
        };

        let offset = ctx.allocate_slot();
        self.push(format!("sw {}, {}(sp)", victim, offset + extra));
        self.regs.spill(victim, offset);
        self.regs.release(victim);
        self.last_spilled = Some(victim);

        self.regs
            .alloc(class)
            .ok_or_else(|| Diagnostic::gen("No available register for spilling"))
    }

    fn fresh_label(&mut self, prefix: &'static str) -> String {
        let counter = self.labels.entry(prefix).or_insert(0);
        let label = format!("{}{}", prefix, counter);
        *counter += 1;
        label
    }

    fn push(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
