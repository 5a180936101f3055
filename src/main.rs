use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use minic::CompileOptions;

/// Back end of a small C-subset compiler: reads the front end's textual
/// AST and emits RV32 assembly. With no arguments it is a plain filter,
/// stdin to stdout.
#[derive(Parser)]
#[command(name = "minic", version, about = "Textual AST in, RV32 assembly out")]
struct Cli {
    /// Input file with the textual AST (stdin when absent)
    input: Option<PathBuf>,
    /// Output assembly file (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Skip constant folding
    #[arg(long)]
    no_fold: bool,
    /// Print the (folded) program back in the textual AST format and exit
    #[arg(long)]
    dump_ast: bool,
}

fn main() {
    let cli = Cli::parse();

    let (source, filename) = match &cli.input {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(source) => (source, path.display().to_string()),
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => {
            let mut source = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut source) {
                eprintln!("error: cannot read stdin: {}", e);
                process::exit(1);
            }
            (source, "<stdin>".to_string())
        }
    };

    let options = CompileOptions { fold: !cli.no_fold };

    if cli.dump_ast {
        let program = match minic::parse_source(&source).and_then(|program| {
            if options.fold {
                minic::opt::fold::fold_program(program)
            } else {
                Ok(program)
            }
        }) {
            Ok(program) => program,
            Err(diag) => fail(diag, &filename, &source),
        };
        write_output(cli.output.as_deref(), &program.to_string());
        return;
    }

    let asm = match minic::compile_with_options(&source, &options) {
        Ok(asm) => asm,
        Err(diag) => fail(diag, &filename, &source),
    };
    write_output(cli.output.as_deref(), &asm);
}

fn write_output(path: Option<&std::path::Path>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
        None => print!("{}", text),
    }
}

/// One-line contract first, then the rendered report when the error has
/// a source location.
fn fail(diag: minic::diagnostic::Diagnostic, filename: &str, source: &str) -> ! {
    eprintln!("{}", diag);
    diag.render(filename, source);
    process::exit(1);
}
