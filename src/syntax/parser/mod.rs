//! Recursive-descent parser for the textual AST format.
//!
//! The format is line-structured: every construct starts a new line, and
//! `Block` extent is decided purely by indentation (spaces count 1, tabs
//! count 4). The parser keeps a byte cursor inside the current line and a
//! one-line look-ahead window; it never backtracks further than that.

mod expr;

use crate::ast::{FuncDef, Program, RetType, Stmt, StmtKind};
use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub struct Parser<'a> {
    /// (byte offset of line start, line text without the newline)
    lines: Vec<(usize, &'a str)>,
    line_idx: usize,
    col: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0;
        for line in source.split('\n') {
            lines.push((offset, line.trim_end_matches('\r')));
            offset += line.len() + 1;
        }
        Self {
            lines,
            line_idx: 0,
            col: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut functions = Vec::new();
        while !self.at_eof() {
            if self.current_line().starts_with('/') {
                self.skip_to_next_line();
                continue;
            }
            if self.is_at_end_of_line() {
                self.skip_to_next_line();
                continue;
            }
            if self.match_keyword("Function") {
                functions.push(self.parse_function()?);
                continue;
            }
            self.skip_to_next_line();
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<FuncDef, Diagnostic> {
        self.skip_whitespace();
        let name = self.read_identifier()?.to_string();
        self.expect_symbol("(")?;
        self.expect_keyword("returns")?;
        let rtype = match self.read_keyword()? {
            "int" => RetType::Int,
            "void" => RetType::Void,
            other => {
                return Err(self.error(format!("Unknown return type: {}", other)));
            }
        };
        self.expect_symbol(")")?;
        self.skip_to_next_line();

        self.expect_keyword("Parameters")?;
        let params = self.parse_parameters()?;

        self.expect_keyword("Body")?;
        self.skip_to_next_line();
        let body = self.parse_statement()?;

        Ok(FuncDef {
            name,
            rtype,
            params,
            body,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<String>, Diagnostic> {
        let mut params = Vec::new();
        self.skip_whitespace();
        if !self.match_symbol("[") {
            return Err(self.error("Expected '[' to start parameter list"));
        }
        self.skip_whitespace();
        if self.match_symbol("]") {
            self.skip_to_next_line();
            return Ok(params);
        }
        while !self.is_at_end_of_line() {
            params.push(self.read_identifier()?.to_string());
            self.skip_whitespace();
            if self.match_symbol(";") {
                self.skip_whitespace();
                continue;
            } else if self.match_symbol("]") {
                break;
            } else {
                return Err(self.error("Expected ';' or ']' in parameter list"));
            }
        }
        self.skip_to_next_line();
        Ok(params)
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.skip_whitespace();
        match self.read_keyword()? {
            "Block" => self.parse_block(),
            "Decl" => self.parse_decl(),
            "Assign" => self.parse_assign(),
            "If" => self.parse_if(),
            "While" => self.parse_while(),
            "Return" => self.parse_return(),
            "Break" => Ok(Stmt::new(StmtKind::Break)),
            "Continue" => Ok(Stmt::new(StmtKind::Continue)),
            "ExprStmt" => self.parse_expr_stmt(),
            "EmptyStmt" => Ok(Stmt::new(StmtKind::Empty)),
            other => Err(self
                .error(format!("Unknown statement type: {}", other))
                .with_help(
                    "statements are Block, Decl, Assign, If, While, Return, Break, \
                     Continue, ExprStmt, or EmptyStmt",
                )),
        }
    }

    /// A `Block` owns every following line indented strictly deeper than
    /// the `Block` keyword's own line.
    fn parse_block(&mut self) -> Result<Stmt, Diagnostic> {
        let block_indent = self.indent_level();
        self.skip_to_next_line();

        let mut stmts = Vec::new();
        while !self.at_eof() {
            if self.current_line().starts_with('/') {
                self.skip_to_next_line();
                continue;
            }
            if self.is_at_end_of_line() {
                self.skip_to_next_line();
                continue;
            }
            if self.indent_level() <= block_indent {
                break;
            }

            let line_before = self.line_idx;
            stmts.push(self.parse_statement()?);
            // Single-keyword statements (Break, EmptyStmt, ...) leave the
            // cursor mid-line; move on so the loop makes progress.
            if self.line_idx == line_before {
                self.skip_to_next_line();
            }
        }
        Ok(Stmt::new(StmtKind::Block(stmts)))
    }

    fn parse_decl(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let name = self.read_identifier()?.to_string();
        self.skip_whitespace();
        self.expect_symbol(")")?;
        self.skip_to_next_line();

        let init = self.parse_expression()?;
        Ok(Stmt::new(StmtKind::Decl {
            name,
            init: Some(init),
        }))
    }

    fn parse_assign(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect_symbol("(")?;
        self.skip_whitespace();
        let name = self.read_identifier()?.to_string();
        self.skip_whitespace();
        self.expect_symbol(")")?;
        self.skip_to_next_line();

        let value = self.parse_expression()?;
        Ok(Stmt::new(StmtKind::Assign { name, value }))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        self.skip_to_next_line();
        if self.match_keyword("Condition") {
            self.skip_to_next_line();
        } else {
            return Err(self.error("Expected 'Condition' keyword in If statement"));
        }
        let cond = self.parse_expression()?;

        // The condition may have ended mid-line (literals, variables) or
        // already be standing on the `Then` line (calls); accept both.
        if self.match_keyword("Then") {
            self.skip_to_next_line();
        } else {
            self.skip_to_next_line();
            self.expect_keyword("Then")?;
            self.skip_to_next_line();
        }
        let then_body = Box::new(self.parse_statement()?);

        let else_body = if self.match_keyword("Else") {
            self.skip_to_next_line();
            Some(Box::new(self.parse_statement()?))
        } else if self.is_at_end_of_line() && self.next_line_starts_with("Else") {
            self.skip_to_next_line();
            self.match_keyword("Else");
            self.skip_to_next_line();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::new(StmtKind::If {
            cond,
            then_body,
            else_body,
        }))
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        self.skip_to_next_line();
        if self.match_keyword("Condition") {
            self.skip_to_next_line();
        } else {
            return Err(self.error("Expected 'Condition' keyword in While statement"));
        }
        let cond = self.parse_expression()?;

        if self.match_keyword("Body") {
            self.skip_to_next_line();
        } else {
            self.skip_to_next_line();
            if self.match_keyword("Body") {
                self.skip_to_next_line();
            } else {
                return Err(self.error("Expected 'Body' keyword in While statement"));
            }
        }
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::new(StmtKind::While { cond, body }))
    }

    /// `Return` takes its value from the following lines only when they
    /// are indented deeper than the `Return` keyword itself; a sibling
    /// statement or a dedent means a bare return.
    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let return_indent = self.indent_level();
        self.skip_to_next_line();

        let value = if !self.at_eof()
            && !self.is_at_end_of_line()
            && self.indent_level() > return_indent
        {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::Return(value)))
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        self.skip_to_next_line();
        let expr = self.parse_expression()?;
        Ok(Stmt::new(StmtKind::Expr(expr)))
    }

    // Cursor machinery.

    fn current_line(&self) -> &'a str {
        self.lines.get(self.line_idx).map(|l| l.1).unwrap_or("")
    }

    fn at_eof(&self) -> bool {
        self.line_idx >= self.lines.len()
    }

    fn skip_to_next_line(&mut self) {
        self.line_idx += 1;
        self.col = 0;
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.current_line().as_bytes();
        while self.col < bytes.len() && bytes[self.col].is_ascii_whitespace() {
            self.col += 1;
        }
    }

    fn is_at_end_of_line(&mut self) -> bool {
        self.skip_whitespace();
        self.col >= self.current_line().len()
    }

    /// Leading-whitespace column of the current line: spaces count 1,
    /// tabs count 4.
    fn indent_level(&self) -> i32 {
        let mut indent = 0;
        for b in self.current_line().bytes() {
            match b {
                b' ' => indent += 1,
                b'\t' => indent += 4,
                _ => break,
            }
        }
        indent
    }

    /// One-line look-ahead: does the next line open with `keyword`?
    fn next_line_starts_with(&self, keyword: &str) -> bool {
        match self.lines.get(self.line_idx + 1) {
            Some((_, text)) => text.trim_start().starts_with(keyword),
            None => false,
        }
    }

    fn match_literal(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        let line = self.current_line();
        if line[self.col..].starts_with(token) {
            self.col += token.len();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        self.match_literal(keyword)
    }

    fn match_symbol(&mut self, symbol: &str) -> bool {
        self.match_literal(symbol)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), Diagnostic> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("Expected keyword '{}'", keyword)))
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), Diagnostic> {
        if self.match_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("Expected symbol '{}'", symbol)))
        }
    }

    fn read_keyword(&mut self) -> Result<&'a str, Diagnostic> {
        self.skip_whitespace();
        let line = self.current_line();
        let bytes = line.as_bytes();
        let start = self.col;
        while self.col < bytes.len() && bytes[self.col].is_ascii_alphanumeric() {
            self.col += 1;
        }
        if start == self.col {
            return Err(self.error("Expected keyword"));
        }
        Ok(&line[start..self.col])
    }

    fn read_identifier(&mut self) -> Result<&'a str, Diagnostic> {
        self.skip_whitespace();
        let line = self.current_line();
        let bytes = line.as_bytes();
        let start = self.col;
        while self.col < bytes.len()
            && (bytes[self.col].is_ascii_alphanumeric() || bytes[self.col] == b'_')
        {
            self.col += 1;
        }
        if start == self.col {
            return Err(self.error("Expected identifier"));
        }
        Ok(&line[start..self.col])
    }

    fn read_integer(&mut self) -> Result<i32, Diagnostic> {
        self.skip_whitespace();
        let line = self.current_line();
        let bytes = line.as_bytes();
        let start = self.col;
        if self.col < bytes.len() && (bytes[self.col] == b'+' || bytes[self.col] == b'-') {
            self.col += 1;
        }
        let digit_start = self.col;
        while self.col < bytes.len() && bytes[self.col].is_ascii_digit() {
            self.col += 1;
        }
        if digit_start == self.col {
            return Err(self.error("Expected integer literal"));
        }
        let text = &line[start..self.col];
        text.parse::<i32>()
            .map_err(|_| self.error(format!("Integer literal out of range: {}", text)))
    }

    /// Read a one- or two-character operator symbol.
    fn read_symbol(&mut self) -> Result<&'a str, Diagnostic> {
        self.skip_whitespace();
        let line = self.current_line();
        let bytes = line.as_bytes();
        if self.col >= bytes.len() {
            return Err(self.error("Expected symbol but reached end of line"));
        }
        let c1 = bytes[self.col];
        let c2 = bytes.get(self.col + 1).copied().unwrap_or(0);
        let len = match c1 {
            b'(' | b')' | b'[' | b']' | b',' | b';' => 1,
            b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'!' => {
                if c2 == b'=' {
                    2
                } else {
                    1
                }
            }
            b'&' => {
                if c2 == b'&' {
                    2
                } else {
                    1
                }
            }
            b'|' => {
                if c2 == b'|' {
                    2
                } else {
                    1
                }
            }
            _ => {
                return Err(self.error(format!("Unknown symbol: {}", c1 as char)));
            }
        };
        let sym = &line[self.col..self.col + len];
        self.col += len;
        Ok(sym)
    }

    fn span_here(&self) -> Span {
        if self.lines.is_empty() {
            return Span::dummy();
        }
        let idx = self.line_idx.min(self.lines.len() - 1);
        let (offset, text) = self.lines[idx];
        let start = (offset + self.col.min(text.len())) as u32;
        let end = (offset + text.len()) as u32;
        Span::new(idx as u32 + 1, start, end.max(start))
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::parse(message, self.span_here())
    }
}
