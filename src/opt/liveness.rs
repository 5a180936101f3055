//! Backward live-variable analysis.
//!
//! Each statement is annotated with the set of variables whose values
//! some later path still reads. A `Block` threads the set right to left
//! through its children; `Decl`/`Assign` kill the written name after
//! adding the names their initializer reads. `While` is iterated until
//! the loop's `live_in` stabilizes, so values carried around the back
//! edge stay live through the body.

use crate::ast::{FuncDef, LiveSet, Program, Stmt, StmtKind};

pub fn annotate_program(program: &mut Program) {
    for func in &mut program.functions {
        annotate_func(func);
    }
}

/// Nothing is live at function exit.
pub fn annotate_func(func: &mut FuncDef) {
    analyze_stmt(&mut func.body, LiveSet::new());
}

fn analyze_stmt(stmt: &mut Stmt, live_out: LiveSet) {
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            let mut live = live_out.clone();
            for s in stmts.iter_mut().rev() {
                analyze_stmt(s, live);
                live = s.live_in.clone();
            }
            stmt.live_in = live;
        }
        StmtKind::Expr(expr) => {
            let mut live = live_out.clone();
            expr.collect_vars(&mut live);
            stmt.live_in = live;
        }
        StmtKind::Decl { name, init } => {
            let mut live = live_out.clone();
            if let Some(init) = init {
                init.collect_vars(&mut live);
            }
            live.remove(name);
            stmt.live_in = live;
        }
        StmtKind::Assign { name, value } => {
            let mut live = live_out.clone();
            value.collect_vars(&mut live);
            live.remove(name);
            stmt.live_in = live;
        }
        StmtKind::If {
            cond,
            then_body,
            else_body,
        } => {
            analyze_stmt(then_body, live_out.clone());
            let mut live = cond.used_vars();
            live.extend(then_body.live_in.iter().cloned());
            if let Some(else_body) = else_body {
                analyze_stmt(else_body, live_out.clone());
                live.extend(else_body.live_in.iter().cloned());
            }
            stmt.live_in = live;
        }
        StmtKind::While { cond, body } => {
            let cond_vars = cond.used_vars();
            let mut live_in: LiveSet = cond_vars.union(&live_out).cloned().collect();
            loop {
                // The body's successors are the condition re-check and,
                // through it, both the body again and the loop exit.
                analyze_stmt(body, live_in.clone());
                let mut next: LiveSet = cond_vars.union(&live_out).cloned().collect();
                next.extend(body.live_in.iter().cloned());
                if next == live_in {
                    break;
                }
                live_in = next;
            }
            stmt.live_in = live_in;
        }
        StmtKind::Return(value) => {
            let mut live = live_out.clone();
            if let Some(value) = value {
                value.collect_vars(&mut live);
            }
            stmt.live_in = live;
        }
        StmtKind::Empty | StmtKind::Break | StmtKind::Continue => {
            stmt.live_in = live_out.clone();
        }
    }
    stmt.live_out = live_out;
}
