use crate::ast::{BinOp, Expr, UnOp};
use crate::diagnostic::Diagnostic;

use super::Parser;

impl<'a> Parser<'a> {
    pub(super) fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.skip_whitespace();
        match self.read_keyword()? {
            "IntLit" => self.parse_int_lit(),
            "Var" => self.parse_var(),
            "Call" => self.parse_call(),
            "Binop" => self.parse_binop(),
            "Unop" => self.parse_unop(),
            other => Err(self
                .error(format!("Unknown expression type: {}", other))
                .with_help("expressions are IntLit, Var, Call, Binop, or Unop")),
        }
    }

    fn parse_int_lit(&mut self) -> Result<Expr, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let value = self.read_integer()?;
        self.skip_whitespace();
        self.expect_symbol(")")?;
        Ok(Expr::IntLit(value))
    }

    fn parse_var(&mut self) -> Result<Expr, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let name = self.read_identifier()?.to_string();
        self.skip_whitespace();
        self.expect_symbol(")")?;
        Ok(Expr::Var(name))
    }

    /// `Call(name)` followed by `Arg[0]`, `Arg[1]`, ... lines, each
    /// introducing one argument expression. The loop stops at the first
    /// line that is not the next expected argument header.
    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let name = self.read_identifier()?.to_string();
        self.skip_whitespace();
        self.expect_symbol(")")?;
        self.skip_to_next_line();

        let mut args = Vec::new();
        let mut arg_index = 0usize;
        while !self.at_eof() {
            if self.is_at_end_of_line() {
                self.skip_to_next_line();
                continue;
            }
            let expected = format!("Arg[{}]", arg_index);
            if self.match_keyword(&expected) {
                self.skip_to_next_line();
                args.push(self.parse_expression()?);
                arg_index += 1;
            } else {
                break;
            }
        }
        Ok(Expr::Call { name, args })
    }

    fn parse_binop(&mut self) -> Result<Expr, Diagnostic> {
        self.skip_to_next_line();
        self.expect_keyword("Operator")?;
        self.skip_whitespace();
        self.match_symbol(":");
        let sym = self.read_symbol()?;
        let op = match BinOp::from_symbol(sym) {
            Some(op) => op,
            None => {
                return Err(self.error(format!("Unknown binary operator symbol: {}", sym)));
            }
        };
        self.skip_to_next_line();

        self.expect_keyword("Left")?;
        self.skip_to_next_line();
        let lhs = Box::new(self.parse_expression()?);

        // Calls consume their trailing lines and may already sit on the
        // `Right` header; simple operands end mid-line one line above it.
        if self.match_keyword("Right") {
            self.skip_to_next_line();
        } else {
            self.skip_to_next_line();
            self.expect_keyword("Right")?;
            self.skip_to_next_line();
        }
        let rhs = Box::new(self.parse_expression()?);

        Ok(Expr::BinOp { op, lhs, rhs })
    }

    fn parse_unop(&mut self) -> Result<Expr, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let sym = self.read_symbol()?;
        self.skip_whitespace();
        self.expect_symbol(")")?;
        let op = match UnOp::from_symbol(sym) {
            Some(op) => op,
            None => {
                return Err(self.error(format!("Unknown unary operator symbol: {}", sym)));
            }
        };
        self.skip_to_next_line();

        let operand = Box::new(self.parse_expression()?);
        Ok(Expr::UnOp { op, operand })
    }
}
