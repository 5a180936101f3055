//! Re-emit a program in the textual AST format the parser consumes.
//!
//! The output round-trips: feeding it back through `syntax::parser`
//! reconstructs a structurally equal tree. Statements are indented two
//! spaces per nesting level; expressions sit one level below the
//! statement or keyword line that introduces them.

use std::fmt;

use super::{Expr, FuncDef, Program, Stmt, StmtKind};

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}

impl fmt::Display for FuncDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function {}(returns {})", self.name, self.rtype.as_str())?;
        if self.params.is_empty() {
            writeln!(f, "Parameters[ ]")?;
        } else {
            writeln!(f, "Parameters[{}]", self.params.join("; "))?;
        }
        writeln!(f, "Body")?;
        write_stmt(f, &self.body, 1)
    }
}

fn pad(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        write!(f, "  ")?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            pad(f, depth)?;
            writeln!(f, "Block")?;
            for s in stmts {
                write_stmt(f, s, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::Empty => {
            pad(f, depth)?;
            writeln!(f, "EmptyStmt")
        }
        StmtKind::Expr(expr) => {
            pad(f, depth)?;
            writeln!(f, "ExprStmt")?;
            write_expr(f, expr, depth + 1)
        }
        StmtKind::Decl { name, init } => {
            pad(f, depth)?;
            writeln!(f, "Decl({})", name)?;
            match init {
                Some(expr) => write_expr(f, expr, depth + 1),
                None => Ok(()),
            }
        }
        StmtKind::Assign { name, value } => {
            pad(f, depth)?;
            writeln!(f, "Assign({})", name)?;
            write_expr(f, value, depth + 1)
        }
        StmtKind::If {
            cond,
            then_body,
            else_body,
        } => {
            pad(f, depth)?;
            writeln!(f, "If")?;
            pad(f, depth)?;
            writeln!(f, "Condition")?;
            write_expr(f, cond, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "Then")?;
            write_stmt(f, then_body, depth + 1)?;
            if let Some(else_body) = else_body {
                pad(f, depth)?;
                writeln!(f, "Else")?;
                write_stmt(f, else_body, depth + 1)?;
            }
            Ok(())
        }
        StmtKind::While { cond, body } => {
            pad(f, depth)?;
            writeln!(f, "While")?;
            pad(f, depth)?;
            writeln!(f, "Condition")?;
            write_expr(f, cond, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "Body")?;
            write_stmt(f, body, depth + 1)
        }
        StmtKind::Break => {
            pad(f, depth)?;
            writeln!(f, "Break")
        }
        StmtKind::Continue => {
            pad(f, depth)?;
            writeln!(f, "Continue")
        }
        StmtKind::Return(value) => {
            pad(f, depth)?;
            writeln!(f, "Return")?;
            match value {
                Some(expr) => write_expr(f, expr, depth + 1),
                None => Ok(()),
            }
        }
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, depth: usize) -> fmt::Result {
    match expr {
        Expr::IntLit(value) => {
            pad(f, depth)?;
            writeln!(f, "IntLit({})", value)
        }
        Expr::Var(name) => {
            pad(f, depth)?;
            writeln!(f, "Var({})", name)
        }
        Expr::Call { name, args } => {
            pad(f, depth)?;
            writeln!(f, "Call({})", name)?;
            for (i, arg) in args.iter().enumerate() {
                pad(f, depth + 1)?;
                writeln!(f, "Arg[{}]", i)?;
                write_expr(f, arg, depth + 2)?;
            }
            Ok(())
        }
        Expr::BinOp { op, lhs, rhs } => {
            pad(f, depth)?;
            writeln!(f, "Binop")?;
            pad(f, depth)?;
            writeln!(f, "Operator: {}", op.as_str())?;
            pad(f, depth)?;
            writeln!(f, "Left")?;
            write_expr(f, lhs, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "Right")?;
            write_expr(f, rhs, depth + 1)
        }
        Expr::UnOp { op, operand } => {
            pad(f, depth)?;
            writeln!(f, "Unop({})", op.as_str())?;
            write_expr(f, operand, depth + 1)
        }
    }
}
