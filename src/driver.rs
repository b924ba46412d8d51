use std::{
    fs, io,
    path::PathBuf,
    process::{Command, ExitStatus},
};

use clap::Parser;
use thiserror::Error;

use pbc_asm::emit::EmitAsm;
use pbc_parser::{ast, lexer};

use crate::CompileError;

#[derive(Error, Debug)]
pub enum DriverExecutionError {
    #[error("could not read {path:?}: {source}")]
    ReadInput { path: PathBuf, source: io::Error },
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("the assembler exited with {0}")]
    AssemblerFailed(ExitStatus),
    /// The assembler did not create a file.
    #[error("the assembler did not create {0:?}")]
    AssemblerNoFile(PathBuf),
    #[error("{0}")]
    Compile(#[from] CompileError),
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Stage {
    #[default]
    Compile,
    Lex,
    Parse,
    Codegen,
    Assembly,
}

/// Compiles a putbyte program into a static x86-64 Linux executable.
#[derive(Parser, Debug)]
#[command(name = "pbc", version, long_about = None)]
pub struct Args {
    /// The source file
    pub input: PathBuf,

    /// Print the tokens and stop
    #[arg(long, group = "stage")]
    pub lex: bool,

    /// Print the syntax tree and stop
    #[arg(long, group = "stage")]
    pub parse: bool,

    /// Print the generated instructions and stop
    #[arg(long, group = "stage")]
    pub codegen: bool,

    /// Write the assembly file and stop
    #[arg(short = 'S', group = "stage")]
    pub assembly: bool,

    /// Path of the executable, defaults to the input without its extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn stage(&self) -> Stage {
        if self.lex {
            Stage::Lex
        } else if self.parse {
            Stage::Parse
        } else if self.codegen {
            Stage::Codegen
        } else if self.assembly {
            Stage::Assembly
        } else {
            Stage::Compile
        }
    }
}

#[derive(Debug, Default)]
pub struct Options {
    stage: Stage,
    input_file: PathBuf,
    assembly_file: PathBuf,
    output_file: PathBuf,
}

impl Options {
    pub fn from_args(args: Args) -> Self {
        let stage = args.stage();
        let assembly_file = args.input.with_extension("s");
        let output_file = args
            .output
            .unwrap_or_else(|| args.input.with_extension(""));

        Self {
            stage,
            input_file: args.input,
            assembly_file,
            output_file,
        }
    }

    pub fn read_input(&self) -> Result<String, DriverExecutionError> {
        fs::read_to_string(&self.input_file).map_err(|source| DriverExecutionError::ReadInput {
            path: self.input_file.clone(),
            source,
        })
    }

    pub fn run_lexer(&self, source: &str) -> Result<Vec<lexer::Token>, DriverExecutionError> {
        let tokens = lexer::tokenize(source).map_err(CompileError::from)?;

        if let Stage::Lex = self.stage {
            for tok in &tokens {
                println!("{}\t{}", tok.loc, tok.kind);
            }
        }

        Ok(tokens)
    }

    pub fn run_parser(
        &self,
        tokens: Vec<lexer::Token>,
    ) -> Result<ast::Program, DriverExecutionError> {
        let program = pbc_parser::parse(tokens).map_err(CompileError::from)?;

        if let Stage::Parse = self.stage {
            println!("{:#?}", program);
        }

        Ok(program)
    }

    /// Runs the code gen without creating the file.
    pub fn run_code_gen(
        &self,
        program: ast::Program,
    ) -> Result<pbc_asm::Program, DriverExecutionError> {
        let program = pbc_asmgen::code_generation(program).map_err(CompileError::from)?;

        if let Stage::Codegen = self.stage {
            println!("{:#?}", program);
        }

        Ok(program)
    }

    pub fn run_assembly_emission(
        &self,
        program: &pbc_asm::Program,
    ) -> Result<(), DriverExecutionError> {
        fs::write(&self.assembly_file, program.emit(0))?;

        Ok(())
    }

    /// There is no libc, `_start` is the entry point.
    pub fn run_assembler(&self) -> Result<(), DriverExecutionError> {
        let exit_code = Command::new("gcc")
            .arg("-nostdlib")
            .arg("-static")
            .arg(self.assembly_file.as_os_str())
            .arg("-o")
            .arg(self.output_file.as_os_str())
            .status()?;

        if !exit_code.success() {
            return Err(DriverExecutionError::AssemblerFailed(exit_code));
        }

        if !self.output_file.exists() {
            return Err(DriverExecutionError::AssemblerNoFile(
                self.output_file.clone(),
            ));
        }

        Ok(())
    }
}

pub fn run() -> Result<(), DriverExecutionError> {
    run_with(Args::parse())
}

pub fn run_with(args: Args) -> Result<(), DriverExecutionError> {
    let opts = Options::from_args(args);

    let source = opts.read_input()?;

    let tokens = opts.run_lexer(&source)?;

    if let Stage::Lex = opts.stage {
        return Ok(());
    }

    let program = opts.run_parser(tokens)?;

    if let Stage::Parse = opts.stage {
        return Ok(());
    }

    let program = opts.run_code_gen(program)?;

    if let Stage::Codegen = opts.stage {
        return Ok(());
    }

    opts.run_assembly_emission(&program)?;

    if let Stage::Compile = opts.stage {
        opts.run_assembler()?;

        if let Err(err) = fs::remove_file(&opts.assembly_file) {
            eprintln!(
                "WARN: Could not remove the file {:?} due to {}, finishing...",
                &opts.assembly_file, err
            )
        }
    }

    Ok(())
}
