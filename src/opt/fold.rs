//! Bottom-up constant folding.
//!
//! All arithmetic is two's-complement 32-bit: `Add`/`Sub`/`Mul` wrap,
//! `Div` truncates toward zero, `Mod` takes the dividend's sign.
//! Comparisons fold to `1`/`0`. `&&`/`||` fold eagerly here — skipping
//! the right operand is a run-time concern, and with both operands
//! already literal there is nothing left to skip. Division or modulo by
//! a literal zero is rejected outright.

use crate::ast::{BinOp, Expr, FuncDef, Program, Stmt, StmtKind, UnOp};
use crate::diagnostic::Diagnostic;

pub fn fold_program(program: Program) -> Result<Program, Diagnostic> {
    let functions = program
        .functions
        .into_iter()
        .map(fold_func)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { functions })
}

fn fold_func(func: FuncDef) -> Result<FuncDef, Diagnostic> {
    let FuncDef {
        name,
        rtype,
        params,
        body,
    } = func;
    Ok(FuncDef {
        name,
        rtype,
        params,
        body: fold_stmt(body)?,
    })
}

fn fold_stmt(stmt: Stmt) -> Result<Stmt, Diagnostic> {
    let kind = match stmt.kind {
        StmtKind::Block(stmts) => StmtKind::Block(
            stmts
                .into_iter()
                .map(fold_stmt)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        StmtKind::Empty => StmtKind::Empty,
        StmtKind::Expr(expr) => StmtKind::Expr(fold_expr(expr)?),
        StmtKind::Decl { name, init } => StmtKind::Decl {
            name,
            init: init.map(fold_expr).transpose()?,
        },
        StmtKind::Assign { name, value } => StmtKind::Assign {
            name,
            value: fold_expr(value)?,
        },
        StmtKind::If {
            cond,
            then_body,
            else_body,
        } => StmtKind::If {
            cond: fold_expr(cond)?,
            then_body: Box::new(fold_stmt(*then_body)?),
            else_body: match else_body {
                Some(body) => Some(Box::new(fold_stmt(*body)?)),
                None => None,
            },
        },
        StmtKind::While { cond, body } => StmtKind::While {
            cond: fold_expr(cond)?,
            body: Box::new(fold_stmt(*body)?),
        },
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::Return(value) => StmtKind::Return(value.map(fold_expr).transpose()?),
    };
    Ok(Stmt {
        kind,
        live_in: stmt.live_in,
        live_out: stmt.live_out,
    })
}

pub fn fold_expr(expr: Expr) -> Result<Expr, Diagnostic> {
    match expr {
        Expr::IntLit(_) | Expr::Var(_) => Ok(expr),
        Expr::BinOp { op, lhs, rhs } => {
            let lhs = fold_expr(*lhs)?;
            let rhs = fold_expr(*rhs)?;
            if let (Expr::IntLit(a), Expr::IntLit(b)) = (&lhs, &rhs) {
                return Ok(Expr::IntLit(eval_binop(op, *a, *b)?));
            }
            Ok(Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
        }
        Expr::UnOp { op, operand } => {
            let operand = fold_expr(*operand)?;
            if let Expr::IntLit(v) = operand {
                return Ok(Expr::IntLit(match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => (v == 0) as i32,
                }));
            }
            Ok(Expr::UnOp {
                op,
                operand: Box::new(operand),
            })
        }
        Expr::Call { name, args } => Ok(Expr::Call {
            name,
            args: args
                .into_iter()
                .map(fold_expr)
                .collect::<Result<Vec<_>, _>>()?,
        }),
    }
}

fn eval_binop(op: BinOp, a: i32, b: i32) -> Result<i32, Diagnostic> {
    Ok(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(Diagnostic::fold("Division by zero in constant expression"));
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(Diagnostic::fold("Modulo by zero in constant expression"));
            }
            a.wrapping_rem(b)
        }
        BinOp::Lt => (a < b) as i32,
        BinOp::Gt => (a > b) as i32,
        BinOp::Le => (a <= b) as i32,
        BinOp::Ge => (a >= b) as i32,
        BinOp::Eq => (a == b) as i32,
        BinOp::Ne => (a != b) as i32,
        BinOp::And => (a != 0 && b != 0) as i32,
        BinOp::Or => (a != 0 || b != 0) as i32,
    })
}
