use std::collections::HashMap;

use crate::ast::{BinOp, Expr, Program, Stmt, StmtKind, UnOp};
use crate::parser::Parser;

use super::fold::{fold_expr, fold_program};
use super::liveness::annotate_program;

fn parse(source: &str) -> Program {
    Parser::new(source).parse_program().unwrap()
}

fn lit(value: i32) -> Expr {
    Expr::IntLit(value)
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::BinOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn fold(expr: Expr) -> Expr {
    fold_expr(expr).unwrap()
}

// Constant folding

#[test]
fn folds_nested_arithmetic() {
    // 1 + 2 * 3
    let expr = bin(BinOp::Add, lit(1), bin(BinOp::Mul, lit(2), lit(3)));
    assert_eq!(fold(expr), lit(7));
}

#[test]
fn addition_wraps_two_complement() {
    assert_eq!(fold(bin(BinOp::Add, lit(i32::MAX), lit(1))), lit(i32::MIN));
    assert_eq!(fold(bin(BinOp::Mul, lit(1 << 30), lit(4))), lit(0));
}

#[test]
fn division_truncates_toward_zero() {
    assert_eq!(fold(bin(BinOp::Div, lit(-7), lit(2))), lit(-3));
    assert_eq!(fold(bin(BinOp::Div, lit(7), lit(-2))), lit(-3));
}

#[test]
fn remainder_takes_dividend_sign() {
    assert_eq!(fold(bin(BinOp::Mod, lit(-7), lit(2))), lit(-1));
    assert_eq!(fold(bin(BinOp::Mod, lit(7), lit(-2))), lit(1));
}

#[test]
fn min_over_minus_one_wraps() {
    assert_eq!(fold(bin(BinOp::Div, lit(i32::MIN), lit(-1))), lit(i32::MIN));
    assert_eq!(fold(bin(BinOp::Mod, lit(i32::MIN), lit(-1))), lit(0));
}

#[test]
fn division_by_literal_zero_is_rejected() {
    let err = fold_expr(bin(BinOp::Div, lit(5), lit(0))).unwrap_err();
    assert_eq!(err.to_string(), "Error: Division by zero in constant expression");
    let err = fold_expr(bin(BinOp::Mod, lit(5), lit(0))).unwrap_err();
    assert_eq!(err.to_string(), "Error: Modulo by zero in constant expression");
}

#[test]
fn comparisons_fold_to_zero_or_one() {
    assert_eq!(fold(bin(BinOp::Lt, lit(3), lit(5))), lit(1));
    assert_eq!(fold(bin(BinOp::Ge, lit(3), lit(5))), lit(0));
    assert_eq!(fold(bin(BinOp::Eq, lit(4), lit(4))), lit(1));
    assert_eq!(fold(bin(BinOp::Ne, lit(4), lit(4))), lit(0));
}

#[test]
fn logical_operators_fold_eagerly() {
    assert_eq!(fold(bin(BinOp::And, lit(2), lit(3))), lit(1));
    assert_eq!(fold(bin(BinOp::And, lit(2), lit(0))), lit(0));
    assert_eq!(fold(bin(BinOp::Or, lit(0), lit(0))), lit(0));
    assert_eq!(fold(bin(BinOp::Or, lit(0), lit(9))), lit(1));
}

#[test]
fn unary_operators_fold() {
    let neg = Expr::UnOp {
        op: UnOp::Neg,
        operand: Box::new(lit(5)),
    };
    assert_eq!(fold(neg), lit(-5));
    let not = Expr::UnOp {
        op: UnOp::Not,
        operand: Box::new(lit(0)),
    };
    assert_eq!(fold(not), lit(1));
}

#[test]
fn variables_block_folding() {
    let expr = bin(BinOp::Add, Expr::Var("x".to_string()), lit(1));
    let folded = fold(expr.clone());
    assert_eq!(folded, expr);
}

#[test]
fn call_arguments_fold_but_call_stays() {
    let expr = Expr::Call {
        name: "g".to_string(),
        args: vec![bin(BinOp::Add, lit(1), lit(2))],
    };
    assert_eq!(
        fold(expr),
        Expr::Call {
            name: "g".to_string(),
            args: vec![lit(3)],
        }
    );
}

#[test]
fn folding_is_idempotent() {
    let program = parse(
        "Function f(returns int)\n\
         Parameters[a]\n\
         Body\n\
         \x20 Block\n\
         \x20   Decl(x)\n\
         \x20     Binop\n\
         \x20     Operator: *\n\
         \x20     Left\n\
         \x20       IntLit(6)\n\
         \x20     Right\n\
         \x20       IntLit(7)\n\
         \x20   While\n\
         \x20   Condition\n\
         \x20     Binop\n\
         \x20     Operator: <\n\
         \x20     Left\n\
         \x20       Var(a)\n\
         \x20     Right\n\
         \x20       IntLit(10)\n\
         \x20   Body\n\
         \x20     Block\n\
         \x20       Assign(a)\n\
         \x20         Binop\n\
         \x20         Operator: +\n\
         \x20         Left\n\
         \x20           Var(a)\n\
         \x20         Right\n\
         \x20           IntLit(1)\n\
         \x20   Return\n\
         \x20     Var(x)\n",
    );
    let once = fold_program(program).unwrap();
    let twice = fold_program(once.clone()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn statements_fold_their_subtrees() {
    let program = parse(
        "Function f(returns int)\n\
         Parameters[ ]\n\
         Body\n\
         \x20 Block\n\
         \x20   If\n\
         \x20   Condition\n\
         \x20     Binop\n\
         \x20     Operator: ==\n\
         \x20     Left\n\
         \x20       IntLit(1)\n\
         \x20     Right\n\
         \x20       IntLit(1)\n\
         \x20   Then\n\
         \x20     Block\n\
         \x20       Return\n\
         \x20         Binop\n\
         \x20         Operator: +\n\
         \x20         Left\n\
         \x20           IntLit(20)\n\
         \x20         Right\n\
         \x20           IntLit(22)\n",
    );
    let folded = fold_program(program).unwrap();
    let StmtKind::Block(stmts) = &folded.functions[0].body.kind else {
        panic!("expected block body");
    };
    let StmtKind::If {
        cond, then_body, ..
    } = &stmts[0].kind
    else {
        panic!("expected an if");
    };
    assert_eq!(*cond, lit(1));
    let StmtKind::Block(inner) = &then_body.kind else {
        panic!("expected block branch");
    };
    assert_eq!(inner[0].kind, StmtKind::Return(Some(lit(42))));
}

// Liveness

fn body_stmts(program: &Program, idx: usize) -> &Vec<Stmt> {
    let StmtKind::Block(stmts) = &program.functions[idx].body.kind else {
        panic!("expected block body");
    };
    stmts
}

fn live(names: &[&str]) -> crate::ast::LiveSet {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn assign_kills_target_and_adds_uses() {
    let mut program = parse(
        "Function f(returns int)\n\
         Parameters[a; b]\n\
         Body\n\
         \x20 Block\n\
         \x20   Decl(x)\n\
         \x20     Binop\n\
         \x20     Operator: +\n\
         \x20     Left\n\
         \x20       Var(a)\n\
         \x20     Right\n\
         \x20       Var(b)\n\
         \x20   Return\n\
         \x20     Var(x)\n",
    );
    annotate_program(&mut program);
    let stmts = body_stmts(&program, 0);
    assert_eq!(stmts[0].live_in, live(&["a", "b"]));
    assert_eq!(stmts[0].live_out, live(&["x"]));
    assert_eq!(stmts[1].live_in, live(&["x"]));
    assert!(stmts[1].live_out.is_empty());
}

#[test]
fn block_live_in_is_first_statement_live_in() {
    let mut program = parse(
        "Function f(returns int)\n\
         Parameters[a]\n\
         Body\n\
         \x20 Block\n\
         \x20   Return\n\
         \x20     Var(a)\n",
    );
    annotate_program(&mut program);
    assert_eq!(program.functions[0].body.live_in, live(&["a"]));
}

#[test]
fn if_unions_condition_and_branches() {
    let mut program = parse(
        "Function f(returns int)\n\
         Parameters[a; b; c]\n\
         Body\n\
         \x20 Block\n\
         \x20   If\n\
         \x20   Condition\n\
         \x20     Var(c)\n\
         \x20   Then\n\
         \x20     Block\n\
         \x20       Return\n\
         \x20         Var(a)\n\
         \x20   Else\n\
         \x20     Block\n\
         \x20       Return\n\
         \x20         Var(b)\n",
    );
    annotate_program(&mut program);
    let stmts = body_stmts(&program, 0);
    assert_eq!(stmts[0].live_in, live(&["a", "b", "c"]));
}

#[test]
fn while_iterates_to_fixed_point() {
    // `x` is read only after the loop and by later iterations of the
    // body; it must stay live at the loop head.
    let mut program = parse(
        "Function f(returns int)\n\
         Parameters[n; x]\n\
         Body\n\
         \x20 Block\n\
         \x20   While\n\
         \x20   Condition\n\
         \x20     Binop\n\
         \x20     Operator: >\n\
         \x20     Left\n\
         \x20       Var(n)\n\
         \x20     Right\n\
         \x20       IntLit(0)\n\
         \x20   Body\n\
         \x20     Block\n\
         \x20       Assign(n)\n\
         \x20         Binop\n\
         \x20         Operator: -\n\
         \x20         Left\n\
         \x20           Var(n)\n\
         \x20         Right\n\
         \x20           IntLit(1)\n\
         \x20       Assign(x)\n\
         \x20         Binop\n\
         \x20         Operator: +\n\
         \x20         Left\n\
         \x20           Var(x)\n\
         \x20         Right\n\
         \x20           IntLit(1)\n\
         \x20   Return\n\
         \x20     Var(x)\n",
    );
    annotate_program(&mut program);
    let stmts = body_stmts(&program, 0);
    assert!(stmts[0].live_in.contains("n"));
    assert!(stmts[0].live_in.contains("x"));
    assert_eq!(stmts[0].live_out, live(&["x"]));
}

#[test]
fn break_and_continue_pass_liveness_through() {
    let mut program = parse(
        "Function f(returns void)\n\
         Parameters[a]\n\
         Body\n\
         \x20 Block\n\
         \x20   While\n\
         \x20   Condition\n\
         \x20     Var(a)\n\
         \x20   Body\n\
         \x20     Block\n\
         \x20       Break\n",
    );
    annotate_program(&mut program);
    let stmts = body_stmts(&program, 0);
    let StmtKind::While { body, .. } = &stmts[0].kind else {
        panic!("expected a while");
    };
    let StmtKind::Block(inner) = &body.kind else {
        panic!("expected block loop body");
    };
    assert_eq!(inner[0].live_in, inner[0].live_out);
}

// Fold soundness against a reference interpreter.

/// Minimal big-step interpreter with the emitted code's semantics:
/// two's-complement wrapping arithmetic, RV32M division edge cases
/// (x/0 == -1, x%0 == x), `&&` yielding the right operand when the left
/// is non-zero, `||` yielding 1 when the left is non-zero.
struct Interp<'a> {
    program: &'a Program,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(i32),
}

type Env = Vec<HashMap<String, i32>>;

impl<'a> Interp<'a> {
    fn call(&self, name: &str, args: &[i32]) -> i32 {
        let func = self
            .program
            .functions
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no function {name}"));
        let mut scope = HashMap::new();
        for (param, value) in func.params.iter().zip(args) {
            scope.insert(param.clone(), *value);
        }
        let mut env = vec![scope];
        match self.exec(&func.body, &mut env) {
            Flow::Return(value) => value,
            _ => 0,
        }
    }

    fn exec(&self, stmt: &Stmt, env: &mut Env) -> Flow {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                env.push(HashMap::new());
                for s in stmts {
                    match self.exec(s, env) {
                        Flow::Normal => {}
                        flow => {
                            env.pop();
                            return flow;
                        }
                    }
                }
                env.pop();
                Flow::Normal
            }
            StmtKind::Empty => Flow::Normal,
            StmtKind::Expr(expr) => {
                self.eval(expr, env);
                Flow::Normal
            }
            StmtKind::Decl { name, init } => {
                let value = init.as_ref().map(|e| self.eval(e, env)).unwrap_or(0);
                env.last_mut().unwrap().insert(name.clone(), value);
                Flow::Normal
            }
            StmtKind::Assign { name, value } => {
                let value = self.eval(value, env);
                for scope in env.iter_mut().rev() {
                    if let Some(slot) = scope.get_mut(name) {
                        *slot = value;
                        return Flow::Normal;
                    }
                }
                panic!("assignment to undeclared {name}");
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval(cond, env) != 0 {
                    self.exec(then_body, env)
                } else if let Some(else_body) = else_body {
                    self.exec(else_body, env)
                } else {
                    Flow::Normal
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond, env) != 0 {
                    match self.exec(body, env) {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return flow,
                    }
                }
                Flow::Normal
            }
            StmtKind::Break => Flow::Break,
            StmtKind::Continue => Flow::Continue,
            StmtKind::Return(value) => {
                Flow::Return(value.as_ref().map(|e| self.eval(e, env)).unwrap_or(0))
            }
        }
    }

    fn eval(&self, expr: &Expr, env: &mut Env) -> i32 {
        match expr {
            Expr::IntLit(value) => *value,
            Expr::Var(name) => {
                for scope in env.iter().rev() {
                    if let Some(value) = scope.get(name) {
                        return *value;
                    }
                }
                panic!("read of undeclared {name}");
            }
            Expr::BinOp { op, lhs, rhs } => {
                if *op == BinOp::And {
                    let l = self.eval(lhs, env);
                    return if l == 0 { 0 } else { self.eval(rhs, env) };
                }
                if *op == BinOp::Or {
                    let l = self.eval(lhs, env);
                    return if l != 0 { 1 } else { self.eval(rhs, env) };
                }
                let a = self.eval(lhs, env);
                let b = self.eval(rhs, env);
                match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::Div => {
                        if b == 0 {
                            -1
                        } else {
                            a.wrapping_div(b)
                        }
                    }
                    BinOp::Mod => {
                        if b == 0 {
                            a
                        } else {
                            a.wrapping_rem(b)
                        }
                    }
                    BinOp::Lt => (a < b) as i32,
                    BinOp::Gt => (a > b) as i32,
                    BinOp::Le => (a <= b) as i32,
                    BinOp::Ge => (a >= b) as i32,
                    BinOp::Eq => (a == b) as i32,
                    BinOp::Ne => (a != b) as i32,
                    BinOp::And | BinOp::Or => unreachable!("handled above"),
                }
            }
            Expr::UnOp { op, operand } => {
                let v = self.eval(operand, env);
                match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => (v == 0) as i32,
                }
            }
            Expr::Call { name, args } => {
                let values: Vec<i32> = args.iter().map(|a| self.eval(a, env)).collect();
                self.call(name, &values)
            }
        }
    }
}

#[test]
fn folded_program_evaluates_identically() {
    let source = "Function scale(returns int)\n\
                  Parameters[v]\n\
                  Body\n\
                  \x20 Block\n\
                  \x20   Return\n\
                  \x20     Binop\n\
                  \x20     Operator: *\n\
                  \x20     Left\n\
                  \x20       Var(v)\n\
                  \x20     Right\n\
                  \x20       Binop\n\
                  \x20       Operator: /\n\
                  \x20       Left\n\
                  \x20         IntLit(10)\n\
                  \x20       Right\n\
                  \x20         IntLit(3)\n\
                  Function calc(returns int)\n\
                  Parameters[n]\n\
                  Body\n\
                  \x20 Block\n\
                  \x20   Decl(acc)\n\
                  \x20     Binop\n\
                  \x20     Operator: -\n\
                  \x20     Left\n\
                  \x20       Binop\n\
                  \x20       Operator: *\n\
                  \x20       Left\n\
                  \x20         IntLit(2)\n\
                  \x20       Right\n\
                  \x20         IntLit(3)\n\
                  \x20     Right\n\
                  \x20       IntLit(6)\n\
                  \x20   Decl(i)\n\
                  \x20     IntLit(0)\n\
                  \x20   While\n\
                  \x20   Condition\n\
                  \x20     Binop\n\
                  \x20     Operator: <\n\
                  \x20     Left\n\
                  \x20       Var(i)\n\
                  \x20     Right\n\
                  \x20       Var(n)\n\
                  \x20   Body\n\
                  \x20     Block\n\
                  \x20       Assign(acc)\n\
                  \x20         Binop\n\
                  \x20         Operator: +\n\
                  \x20         Left\n\
                  \x20           Var(acc)\n\
                  \x20         Right\n\
                  \x20           Call(scale)\n\
                  \x20             Arg[0]\n\
                  \x20               Var(i)\n\
                  \x20       Assign(i)\n\
                  \x20         Binop\n\
                  \x20         Operator: +\n\
                  \x20         Left\n\
                  \x20           Var(i)\n\
                  \x20         Right\n\
                  \x20           Binop\n\
                  \x20           Operator: %\n\
                  \x20           Left\n\
                  \x20             IntLit(7)\n\
                  \x20           Right\n\
                  \x20             IntLit(2)\n\
                  \x20   Return\n\
                  \x20     Var(acc)\n";
    let unfolded = parse(source);
    let folded = fold_program(unfolded.clone()).unwrap();
    for n in [0, 1, 5, 12] {
        let a = Interp { program: &unfolded }.call("calc", &[n]);
        let b = Interp { program: &folded }.call("calc", &[n]);
        assert_eq!(a, b, "diverged at n = {n}");
    }
}
