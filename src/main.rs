//! helioc, the Helios compiler driver

use clap::{Parser as ClapParser, Subcommand};
use helios::ir::Lowerer;
use helios::{lexer, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "helioc", version = helios::VERSION, about = "Helios compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to textual IR
    Build {
        /// Input source file
        input: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse and lower without producing output
    Check {
        /// Input source file
        input: PathBuf,
    },
    /// Print the token stream
    Tokenize {
        /// Input source file
        input: PathBuf,
    },
    /// Print the parsed syntax tree
    Parse {
        /// Input source file
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { input, output } => build(&input, output.as_deref()),
        Commands::Check { input } => check(&input),
        Commands::Tokenize { input } => tokenize(&input),
        Commands::Parse { input } => parse(&input),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("helioc: {message}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(input: &Path) -> Result<String, String> {
    fs::read_to_string(input).map_err(|e| format!("{}: {e}", input.display()))
}

fn unit_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

fn lower(input: &Path) -> Result<helios::ir::Module, String> {
    let source = read_source(input)?;
    let name = unit_name(input);
    let file = Parser::new(name.clone(), &source)
        .parse_file()
        .map_err(|e| e.to_string())?;
    let mut lowerer = Lowerer::new(name);
    lowerer.lower_file(&file).map_err(|e| e.to_string())?;
    Ok(lowerer.finish())
}

fn build(input: &Path, output: Option<&Path>) -> Result<(), String> {
    let module = lower(input)?;
    let rendered = module.to_string();
    match output {
        Some(path) => {
            fs::write(path, rendered).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn check(input: &Path) -> Result<(), String> {
    lower(input)?;
    Ok(())
}

fn tokenize(input: &Path) -> Result<(), String> {
    let source = read_source(input)?;
    for token in lexer::lex(&source) {
        println!("{:<12} {:?} @ {}", token.kind.to_string(), token.text, token.span);
    }
    Ok(())
}

fn parse(input: &Path) -> Result<(), String> {
    let source = read_source(input)?;
    let file = Parser::new(unit_name(input), &source)
        .parse_file()
        .map_err(|e| e.to_string())?;
    println!("{file:#?}");
    Ok(())
}
