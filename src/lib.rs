pub mod driver;

pub use pbc_asm as asm;
pub use pbc_asmgen as asmgen;
pub use pbc_parser as parser;

use thiserror::Error;

use pbc_asm::emit::EmitAsm;
use pbc_asmgen::CodegenError;
use pbc_parser::{
    lexer::{self, LexerError},
    ParserError,
};

/// The first error of a compilation, tagged with the stage it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("lexer error: {0}")]
    Lexer(#[from] LexerError),
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
}

/// Turns source text into a complete assembly listing.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = pbc_parser::parse(tokens)?;
    let program = pbc_asmgen::code_generation(program)?;

    Ok(program.emit(0))
}
