//! AST-level optimization: constant folding followed by backward
//! live-variable analysis. Folding consumes the tree and produces a
//! fresh one; liveness annotates statements in place. The generator
//! reads the `live_in` sets when it has to pick a spill victim.

pub mod fold;
pub mod liveness;
#[cfg(test)]
mod tests;

use crate::ast::Program;
use crate::diagnostic::Diagnostic;

pub fn optimize(program: Program) -> Result<Program, Diagnostic> {
    let mut program = fold::fold_program(program)?;
    liveness::annotate_program(&mut program);
    Ok(program)
}
