//! COOL Compiler CLI
//!
//! Command-line interface for compiling `.cl` COOL programs to RISC-V
//! assembly.

use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use std::process;

use coolc::CompilerConfig;

#[derive(ClapParser)]
#[command(name = "coolc")]
#[command(about = "COOL compiler - compile .cl programs to RISC-V 32-bit assembly", long_about = None)]
struct Cli {
    /// Input .cl source file
    input: PathBuf,

    /// Output assembly path (defaults to the input file's stem with `.s`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the parse tree instead of compiling
    #[arg(long)]
    emit_ast: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.emit_ast {
        let source = match fs::read_to_string(&cli.input) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: Failed to read source file: {}", e);
                process::exit(1);
            }
        };
        match coolc::parse_to_debug_ast(&source) {
            Ok(dump) => println!("{}", dump),
            Err(e) => {
                println!("{}", e);
                process::exit(1);
            }
        }
        return;
    }

    let mut config = CompilerConfig::new();
    if let Some(output) = cli.output.clone() {
        config = config.with_output(output);
    }

    match coolc::compile_file(&cli.input, &config) {
        Ok(_) => {
            let output_path = cli.output.unwrap_or_else(|| cli.input.with_extension("s"));
            println!("Compiled {} -> {}", cli.input.display(), output_path.display());
        }
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    }
}
