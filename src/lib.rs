//! COOL Compiler Library
//!
//! Compiles a single COOL (Classroom Object-Oriented Language) source file
//! to RISC-V 32-bit assembly text, ready to be assembled and linked against
//! a runtime providing `Object.copy`, `IO.out_string`, `_case_abort_on_void`,
//! `_case_abort_no_match` and friends.
//!
//! The pipeline is: lex + parse (fatal on failure) → hierarchy validation
//! (fatal on a cycle) → feature collection → type checking → class-table
//! finalisation → code generation. Diagnostics from hierarchy validation,
//! feature collection and type checking all accumulate in one
//! [`Diagnostics`] and are reported together; no assembly is emitted unless
//! every one of those stages came back clean.

pub mod ast;
pub mod builtins;
pub mod class_table;
pub mod codegen;
pub mod config;
pub mod constant_pool;
pub mod diagnostics;
pub mod features;
pub mod hierarchy;
pub mod lexer;
pub mod parser;
pub mod typecheck;

pub use config::CompilerConfig;
pub use diagnostics::Diagnostics;
pub use parser::Parser;

use std::fs;
use std::path::Path;

/// The message printed verbatim when a lex or parse error halts compilation
/// before semantic analysis even starts.
pub const LEX_PARSE_HALT_MESSAGE: &str = "Compilation halted due to lex and parse errors";

/// Compiles a source file to an assembly file at `config.output_path`
/// (falling back to `source_path` with a `.s` extension if unset).
pub fn compile_file(source_path: &Path, config: &CompilerConfig) -> Result<(), String> {
    let source = fs::read_to_string(source_path).map_err(|e| format!("Failed to read source file: {}", e))?;
    let file_name = source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.display().to_string());

    let assembly = compile_source(&source, &file_name)?;

    let output_path = config
        .output_path
        .clone()
        .unwrap_or_else(|| source_path.with_extension("s"));
    fs::write(&output_path, assembly).map_err(|e| format!("Failed to write output file: {}", e))?;
    Ok(())
}

/// Runs the full pipeline over in-memory source, returning the generated
/// assembly text or a rendered diagnostic report (one line per diagnostic,
/// `LEX_PARSE_HALT_MESSAGE` standing alone for a lex/parse failure).
pub fn compile_source(source: &str, file_name: &str) -> Result<String, String> {
    let mut parser = Parser::new(source).map_err(|_| LEX_PARSE_HALT_MESSAGE.to_string())?;
    let program = parser.parse_program().map_err(|_| LEX_PARSE_HALT_MESSAGE.to_string())?;

    let mut diags = Diagnostics::new();
    let (graph, fatal) = hierarchy::build_class_graph(&program, &mut diags);
    if fatal {
        return Err(diags.render(file_name).join("\n"));
    }

    let classes = features::collect_features(&graph, &mut diags);
    let typed = typecheck::typecheck_program(&classes, &mut diags);

    if !diags.is_empty() {
        return Err(diags.render(file_name).join("\n"));
    }

    let table = class_table::build_class_table(&classes);
    Ok(codegen::generate(&table, &typed, file_name))
}

/// Parses source and returns a debug pretty-print of the parse tree, for
/// the `--emit-ast` CLI flag. Never runs semantic analysis.
pub fn parse_to_debug_ast(source: &str) -> Result<String, String> {
    let mut parser = Parser::new(source).map_err(|_| LEX_PARSE_HALT_MESSAGE.to_string())?;
    let program = parser.parse_program().map_err(|_| LEX_PARSE_HALT_MESSAGE.to_string())?;
    Ok(format!("{:#?}", program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_trivial_program_to_assembly_containing_main() {
        let asm = compile_source("class Main { main() : Int { 42 }; };", "test.cl").unwrap();
        assert!(asm.contains("Main.main:"));
        assert!(asm.contains("class_objTab:"));
    }

    #[test]
    fn parse_error_halts_with_verbatim_message() {
        let err = compile_source("class Main { main() : Int { }; };", "test.cl").unwrap_err();
        assert_eq!(err, LEX_PARSE_HALT_MESSAGE);
    }

    #[test]
    fn semantic_error_is_reported_with_file_and_line_prefix() {
        let err = compile_source("class Main { main() : Int { x }; };", "test.cl").unwrap_err();
        assert!(err.contains("\"test.cl\", line"));
    }

    #[test]
    fn emit_ast_debug_dump_does_not_run_semantic_analysis() {
        let dump = parse_to_debug_ast("class Main { main() : Int { x }; };").unwrap();
        assert!(dump.contains("Main"));
    }
}
