pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod opt;
pub mod span;
pub mod syntax;

// Re-exports — keeps `minic::parser::Parser` etc. short for the CLI and tests
pub use syntax::parser;

use codegen::Emitter;
use diagnostic::Diagnostic;
use parser::Parser;

/// Options controlling compilation.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Run constant folding before emission. Liveness analysis always
    /// runs; the generator depends on its annotations.
    pub fold: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { fold: true }
    }
}

/// Parse a textual AST stream into a program, without optimizing it.
pub fn parse_source(source: &str) -> Result<ast::Program, Diagnostic> {
    Parser::new(source).parse_program()
}

/// Compile a textual AST stream to RV32 assembly.
pub fn compile(source: &str) -> Result<String, Diagnostic> {
    compile_with_options(source, &CompileOptions::default())
}

/// Compile with explicit options: parse → fold → liveness → emit.
pub fn compile_with_options(
    source: &str,
    options: &CompileOptions,
) -> Result<String, Diagnostic> {
    let program = parse_source(source)?;
    let program = if options.fold {
        opt::optimize(program)?
    } else {
        let mut program = program;
        opt::liveness::annotate_program(&mut program);
        program
    };
    Emitter::new().emit_program(&program)
}
