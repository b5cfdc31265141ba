//! COIL Compiler Library
//!
//! Compiles a C-like source language into COIL objects: a typed,
//! register-based virtual instruction set inside a little-endian,
//! multi-section container (see the `coil-object` crate).
//!
//! The pipeline is strictly single-threaded and runs in source order:
//! text → tokens → typed AST → virtual ISA bytes. All parse-time data
//! structures live in one arena released at compile exit; the first
//! error aborts the compile.
//!
//! ```rust,ignore
//! let options = coilc::CompileOptions::default();
//! let bytes = coilc::compile_source("add.c", "int add(int a, int b) { return a + b; }", &options)?;
//! ```

pub mod arena;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod symtab;
pub mod types;

pub use arena::Arena;
pub use codegen::CodeGen;
pub use error::{CompileError, LexErrorKind, SemanticErrorKind, SourcePos};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use symtab::{Symbol, SymbolTable};
pub use types::{common, Type, TypeKind};

use std::fs;
use std::path::Path;

use tracing::{debug, info};

/// Compile-time knobs, mirroring the CLI surface.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Requested optimization level. Reserved: recorded in the object,
    /// no passes run yet.
    pub opt_level: u8,
    /// Emit debug sections. Reserved; currently a no-op.
    pub debug_info: bool,
    /// Print the token stream before parsing.
    pub dump_tokens: bool,
    /// Print the parsed AST before code generation.
    pub dump_ast: bool,
    /// Target word size in bytes (pointer width).
    pub word_size: u8,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            opt_level: 0,
            debug_info: false,
            dump_tokens: false,
            dump_ast: false,
            word_size: 8,
        }
    }
}

/// Compile source text to object bytes.
pub fn compile_source(
    file_name: &str,
    source: &str,
    options: &CompileOptions,
) -> Result<Vec<u8>, CompileError> {
    if options.dump_tokens {
        dump_tokens(file_name, source)?;
    }

    let arena = Arena::new();
    let mut symtab = SymbolTable::new(&arena);

    let parser = Parser::new(&arena, &mut symtab, file_name, source);
    let program = parser.parse()?;
    debug!(
        declarations = program.decls.len(),
        arena_bytes = arena.allocated_bytes(),
        "parsed"
    );

    if options.dump_ast {
        print!("{}", program.dump());
    }

    let codegen = CodeGen::new(&mut symtab, file_name, options);
    let bytes = codegen.generate(&program)?;
    info!(file = file_name, bytes = bytes.len(), "compiled");
    Ok(bytes)
}

/// Compile a source file to an object file on disk.
pub fn compile_file(
    input: &Path,
    output: &Path,
    options: &CompileOptions,
) -> Result<(), CompileError> {
    let source = fs::read_to_string(input).map_err(|e| CompileError::Io {
        file: input.display().to_string(),
        source: e,
    })?;
    let bytes = compile_source(&input.display().to_string(), &source, options)?;
    fs::write(output, &bytes).map_err(|e| CompileError::Io {
        file: output.display().to_string(),
        source: e,
    })?;
    Ok(())
}

fn dump_tokens(file_name: &str, source: &str) -> Result<(), CompileError> {
    let mut lexer = Lexer::new(file_name, source);
    loop {
        let token = lexer.next()?;
        println!("{}", token);
        if token.kind == TokenKind::Eof {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coil_object::writer::MAGIC;

    #[test]
    fn test_minimal_program_compiles() {
        let bytes = compile_source(
            "min.c",
            "int main() { return 0; }",
            &CompileOptions::default(),
        )
        .expect("compile");
        assert_eq!(&bytes[0..4], &MAGIC);
    }

    #[test]
    fn test_empty_source_compiles() {
        let bytes = compile_source("empty.c", "", &CompileOptions::default()).expect("compile");
        assert_eq!(&bytes[0..4], &MAGIC);
        // No main: entrypoint stays zero.
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_first_error_is_surfaced() {
        // Both the bad assignment and the missing semicolon are errors;
        // only the first one comes back.
        let err = compile_source(
            "bad.c",
            "int f() { 1 = 2; return 0 }",
            &CompileOptions::default(),
        )
        .expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains("invalid assignment target"), "{}", message);
    }

    #[test]
    fn test_error_carries_file_name() {
        let err = compile_source("src/box.c", "int f( { }", &CompileOptions::default())
            .expect_err("must fail");
        assert!(err.to_string().starts_with("src/box.c:"), "{}", err);
    }
}
