//! COIL Compiler CLI
//!
//! Command-line interface for compiling C-like sources to COIL
//! objects. Exit codes: 0 on success, 1 on any compilation failure,
//! 2 on usage errors (clap's default).

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "coilc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "COIL compiler - compile C-like sources to COIL objects", long_about = None)]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Output object path
    #[arg(short, long, default_value = "output.cof")]
    output: PathBuf,

    /// Optimization level (reserved; no passes run yet)
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,

    /// Verbose progress output
    #[arg(short, long)]
    verbose: bool,

    /// Emit debug sections (reserved)
    #[arg(short = 'g')]
    debug_info: bool,

    /// Print the parsed AST before code generation
    #[arg(long)]
    ast: bool,

    /// Print the token stream
    #[arg(long)]
    tokens: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("coilc={}", default_level))),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = coilc::CompileOptions {
        opt_level: cli.opt_level,
        debug_info: cli.debug_info,
        dump_tokens: cli.tokens,
        dump_ast: cli.ast,
        ..coilc::CompileOptions::default()
    };

    match coilc::compile_file(&cli.input, &cli.output, &options) {
        Ok(()) => {
            if cli.verbose {
                println!("Compiled {} -> {}", cli.input.display(), cli.output.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
