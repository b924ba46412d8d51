pub mod ast_to_assembly;
pub mod runtime;
pub mod variable_table;

use thiserror::Error;

use pbc_parser::ast::Identifier;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("trying to assign to a non-existing variable \"{0}\"")]
    AssignNonExistingVariable(Identifier),
    #[error("trying to print a non-existing variable \"{0}\"")]
    PrintNonExistingVariable(Identifier),
    #[error("trying to read a non-existing variable \"{0}\"")]
    ReadNonExistingVariable(Identifier),
}

/// The `putbyte` helper followed by the `_start` entry point holding the program.
pub fn code_generation(
    program: pbc_parser::ast::Program,
) -> Result<pbc_asm::Program, CodegenError> {
    let entry = pbc_asm::FunctionDefinition {
        name: runtime::ENTRY.to_owned(),
        global: true,
        instructions: ast_to_assembly::cg_program(program)?,
    };

    Ok(pbc_asm::Program(vec![runtime::putbyte_function(), entry]))
}
