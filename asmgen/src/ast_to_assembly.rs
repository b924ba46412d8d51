use pbc_asm::{Instruction, Operand, Register, RegisterSize};
use pbc_parser::ast::{Expression, Program, Statement};

use crate::{
    runtime,
    variable_table::{VariableTable, SLOT_SIZE},
    CodegenError,
};

/// The System V ABI wants %rsp 16 byte aligned at every call instruction.
pub const STACK_ALIGNMENT: u32 = 16;

const SCRATCH: Operand = Operand::Register(Register::R10);
const ACCUMULATOR: Operand = Operand::Register(Register::AX);
const ARGUMENT: Operand = Operand::Register(Register::DI);

/// Generates the body of the entry point, from frame setup to the exit syscall.
pub fn cg_program(program: Program) -> Result<Vec<Instruction>, CodegenError> {
    let mut generator = Generator::new();

    generator.instructions.append(&mut runtime::entry_prologue());

    for statement in &program.statements {
        generator.cg_statement(statement)?;
    }

    generator.instructions.append(&mut runtime::exit_epilogue());

    Ok(generator.instructions)
}

#[derive(Debug)]
struct Generator {
    variables: VariableTable,
    instructions: Vec<Instruction>,
}

impl Generator {
    fn new() -> Self {
        Self {
            variables: VariableTable::new(),
            instructions: vec![],
        }
    }

    fn mov(&mut self, src: Operand, dst: Operand) {
        self.instructions.push(Instruction::Mov {
            size: RegisterSize::Four,
            src,
            dst,
        });
    }

    /// %rsp follows the slots, so it always sits at `%rbp - storage_bytes`.
    fn slot_for(&mut self, name: &str) -> i64 {
        let allocation = self.variables.resolve(name);
        if allocation.fresh {
            self.instructions.push(Instruction::AllocateStack(SLOT_SIZE));
        }
        allocation.offset
    }

    fn add(&mut self, src: Operand) {
        self.instructions.push(Instruction::Add {
            src,
            dst: ACCUMULATOR,
        });
    }

    fn temporary(&mut self) -> i64 {
        let allocation = self.variables.allocate_temporary();
        if allocation.fresh {
            self.instructions.push(Instruction::AllocateStack(SLOT_SIZE));
        }
        allocation.offset
    }

    fn cg_statement(&mut self, statement: &Statement) -> Result<(), CodegenError> {
        match statement {
            Statement::Expression(Expression::Assignment { name, value }) => {
                self.cg_assignment(name, value)?;
            }
            Statement::Expression(Expression::Declaration(decl)) => {
                self.cg_assignment(&decl.name, &decl.value)?;
            }
            // The value is thrown away, but the references in it still have to exist.
            Statement::Expression(expr) => self.cg_into_accumulator(expr)?,
            Statement::PutByte(arg) => self.cg_put_byte(arg)?,
        }

        Ok(())
    }

    /// Literals and variables can be used as operands directly. `None` for everything that
    /// has to be evaluated first.
    fn operand(&self, expr: &Expression) -> Result<Option<Operand>, CodegenError> {
        if let Ok(imm) = Operand::try_from(expr) {
            return Ok(Some(imm));
        }

        match expr {
            Expression::Var(name) => self
                .variables
                .lookup(name)
                .map(|offset| Some(Operand::Stack(offset)))
                .ok_or_else(|| CodegenError::ReadNonExistingVariable(name.clone())),
            _ => Ok(None),
        }
    }

    /// Returns the offset of the assigned variable. The value is checked before the target
    /// gets its slot, so `x = x;` does not declare `x`.
    fn cg_assignment(&mut self, name: &str, value: &Expression) -> Result<i64, CodegenError> {
        if let Ok(imm) = Operand::try_from(value) {
            let dst = self.slot_for(name);
            self.mov(imm, Operand::Stack(dst));
            return Ok(dst);
        }

        match value {
            Expression::Var(src) => {
                let src = self
                    .variables
                    .lookup(src)
                    .ok_or_else(|| CodegenError::AssignNonExistingVariable(src.clone()))?;
                let dst = self.slot_for(name);

                self.mov(Operand::Stack(src), SCRATCH);
                self.mov(SCRATCH, Operand::Stack(dst));
                Ok(dst)
            }
            value => {
                self.cg_into_accumulator(value)?;
                let dst = self.slot_for(name);

                self.mov(ACCUMULATOR, Operand::Stack(dst));
                Ok(dst)
            }
        }
    }

    /// Evaluates left to right into %eax.
    fn cg_into_accumulator(&mut self, expr: &Expression) -> Result<(), CodegenError> {
        match expr {
            Expression::Sum(operands) => match operands.split_first() {
                Some((first, rest)) => {
                    self.cg_into_accumulator(first)?;
                    for operand in rest {
                        self.cg_add_to_accumulator(operand)?;
                    }
                }
                None => self.mov(Operand::Imm(0), ACCUMULATOR),
            },
            Expression::Assignment { name, value } => {
                let offset = self.cg_assignment(name, value)?;
                self.mov(Operand::Stack(offset), ACCUMULATOR);
            }
            Expression::Declaration(decl) => {
                let offset = self.cg_assignment(&decl.name, &decl.value)?;
                self.mov(Operand::Stack(offset), ACCUMULATOR);
            }
            Expression::Var(_) | Expression::IntLiteral(_) | Expression::CharLiteral(_) => {
                match self.operand(expr)? {
                    Some(operand) => self.mov(operand, ACCUMULATOR),
                    None => unreachable!("literals and variables always have an operand"),
                }
            }
        }

        Ok(())
    }

    /// Adds `expr` to the running sum in %eax. A grouped sum keeps adding into the same
    /// accumulator.
    fn cg_add_to_accumulator(&mut self, expr: &Expression) -> Result<(), CodegenError> {
        match expr {
            Expression::Sum(operands) => {
                for operand in operands {
                    self.cg_add_to_accumulator(operand)?;
                }
            }
            Expression::Assignment { name, value } => self.cg_add_assignment(name, value)?,
            Expression::Declaration(decl) => self.cg_add_assignment(&decl.name, &decl.value)?,
            Expression::Var(_) | Expression::IntLiteral(_) | Expression::CharLiteral(_) => {
                match self.operand(expr)? {
                    Some(operand) => self.add(operand),
                    None => unreachable!("literals and variables always have an operand"),
                }
            }
        }

        Ok(())
    }

    /// Storing a literal or a variable leaves %eax alone. Any other value is computed in
    /// %eax, so the running sum waits in a temporary until it is done.
    fn cg_add_assignment(&mut self, name: &str, value: &Expression) -> Result<(), CodegenError> {
        if matches!(
            value,
            Expression::Var(_) | Expression::IntLiteral(_) | Expression::CharLiteral(_)
        ) {
            let dst = self.cg_assignment(name, value)?;
            self.add(Operand::Stack(dst));
            return Ok(());
        }

        let partial = self.temporary();
        self.mov(ACCUMULATOR, Operand::Stack(partial));
        self.cg_assignment(name, value)?;
        self.add(Operand::Stack(partial));
        self.variables.release_temporary(partial);

        Ok(())
    }

    fn cg_put_byte(&mut self, arg: &Expression) -> Result<(), CodegenError> {
        let arg = match arg {
            Expression::Var(name) => Operand::Stack(
                self.variables
                    .lookup(name)
                    .ok_or_else(|| CodegenError::PrintNonExistingVariable(name.clone()))?,
            ),
            arg => match self.operand(arg)? {
                Some(operand) => operand,
                None => {
                    self.cg_into_accumulator(arg)?;
                    ACCUMULATOR
                }
            },
        };

        let padding = pbc_utils::padding_to(STACK_ALIGNMENT, self.variables.storage_bytes());

        if padding > 0 {
            self.instructions.push(Instruction::AllocateStack(padding));
        }

        self.mov(arg, ARGUMENT);
        self.instructions
            .push(Instruction::Call(runtime::PUTBYTE.to_owned()));

        if padding > 0 {
            self.instructions
                .push(Instruction::DeallocateStack(padding));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pbc_parser::{lexer::tokenize, parse};

    use super::*;

    fn generate(input: &str) -> Result<Vec<Instruction>, CodegenError> {
        let tokens = tokenize(input).expect("the input should tokenize");
        let program = parse(tokens).expect("the input should parse");
        cg_program(program)
    }

    fn mov(src: Operand, dst: Operand) -> Instruction {
        Instruction::Mov {
            size: RegisterSize::Four,
            src,
            dst,
        }
    }

    /// Strips the fixed prologue and epilogue.
    fn body(instructions: Vec<Instruction>) -> Vec<Instruction> {
        let start = runtime::entry_prologue().len();
        let end = instructions.len() - runtime::exit_epilogue().len();
        instructions[start..end].to_vec()
    }

    #[test]
    fn test_declaration_stores_immediate() {
        let instructions = generate("let u32 x 5;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(5), Operand::Stack(-4)),
            ]
        );
    }

    #[test]
    fn test_assign_and_print() {
        let instructions = generate("x = 5; y = x; putbyte y;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(5), Operand::Stack(-4)),
                Instruction::AllocateStack(4),
                mov(Operand::Stack(-4), SCRATCH),
                mov(SCRATCH, Operand::Stack(-8)),
                Instruction::AllocateStack(8),
                mov(Operand::Stack(-8), ARGUMENT),
                Instruction::Call("putbyte".to_owned()),
                Instruction::DeallocateStack(8),
            ]
        );
    }

    #[test]
    fn test_reassignment_reuses_slot() {
        let instructions = generate("x = 'a'; x = 2;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(97), Operand::Stack(-4)),
                mov(Operand::Imm(2), Operand::Stack(-4)),
            ]
        );
    }

    #[test]
    fn test_no_padding_when_aligned() {
        let instructions =
            generate("a = 1; b = 2; c = 3; d = 4; putbyte 'x';").expect("should generate");
        let body = body(instructions);

        assert_eq!(
            body[body.len() - 2..],
            [
                mov(Operand::Imm(120), ARGUMENT),
                Instruction::Call("putbyte".to_owned()),
            ]
        );
        assert!(!body.contains(&Instruction::DeallocateStack(0)));
    }

    #[test]
    fn test_putbyte_without_variables_pads_nothing() {
        let instructions = generate("putbyte 10;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                mov(Operand::Imm(10), ARGUMENT),
                Instruction::Call("putbyte".to_owned()),
            ]
        );
    }

    #[test]
    fn test_sum_with_simple_rhs() {
        let instructions = generate("x = 1; y = x + 2;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(1), Operand::Stack(-4)),
                mov(Operand::Stack(-4), ACCUMULATOR),
                Instruction::Add {
                    src: Operand::Imm(2),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-8)),
            ]
        );
    }

    #[test]
    fn test_chain_needs_no_temporary() {
        let instructions = generate("a = 1 + 2 + 3; b = 7;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                mov(Operand::Imm(1), ACCUMULATOR),
                Instruction::Add {
                    src: Operand::Imm(2),
                    dst: ACCUMULATOR,
                },
                Instruction::Add {
                    src: Operand::Imm(3),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-4)),
                Instruction::AllocateStack(4),
                mov(Operand::Imm(7), Operand::Stack(-8)),
            ]
        );
    }

    #[test]
    fn test_grouped_sums_share_the_accumulator() {
        let instructions = generate("putbyte (1 + 2) + (3 + 4);").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                mov(Operand::Imm(1), ACCUMULATOR),
                Instruction::Add {
                    src: Operand::Imm(2),
                    dst: ACCUMULATOR,
                },
                Instruction::Add {
                    src: Operand::Imm(3),
                    dst: ACCUMULATOR,
                },
                Instruction::Add {
                    src: Operand::Imm(4),
                    dst: ACCUMULATOR,
                },
                mov(ACCUMULATOR, ARGUMENT),
                Instruction::Call("putbyte".to_owned()),
            ]
        );
    }

    #[test]
    fn test_operands_are_read_left_to_right() {
        let instructions = generate("x = 1; y = x + (x = 5);").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(1), Operand::Stack(-4)),
                mov(Operand::Stack(-4), ACCUMULATOR),
                mov(Operand::Imm(5), Operand::Stack(-4)),
                Instruction::Add {
                    src: Operand::Stack(-4),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-8)),
            ]
        );
    }

    #[test]
    fn test_computed_assignment_parks_the_sum() {
        let instructions =
            generate("x = 1; y = x + (z = x + 2); w = x + (v = x + 3);").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(1), Operand::Stack(-4)),
                // y
                mov(Operand::Stack(-4), ACCUMULATOR),
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-8)),
                mov(Operand::Stack(-4), ACCUMULATOR),
                Instruction::Add {
                    src: Operand::Imm(2),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-12)),
                Instruction::Add {
                    src: Operand::Stack(-8),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-16)),
                // w, the temporary at -8 is taken again
                mov(Operand::Stack(-4), ACCUMULATOR),
                mov(ACCUMULATOR, Operand::Stack(-8)),
                mov(Operand::Stack(-4), ACCUMULATOR),
                Instruction::Add {
                    src: Operand::Imm(3),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-20)),
                Instruction::Add {
                    src: Operand::Stack(-8),
                    dst: ACCUMULATOR,
                },
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-24)),
            ]
        );
    }

    #[test]
    fn test_long_chain() {
        let input = format!("x = 1{}; putbyte x;", " + 1".repeat(20_000));
        let instructions = generate(&input).expect("should generate");

        let adds = instructions
            .iter()
            .filter(|inst| matches!(inst, Instruction::Add { .. }))
            .count();
        let slots = instructions
            .iter()
            .filter(|inst| **inst == Instruction::AllocateStack(SLOT_SIZE))
            .count();

        assert_eq!(adds, 20_000);
        assert_eq!(slots, 1);
    }

    #[test]
    fn test_declaration_forwards_its_value() {
        let instructions = generate("y = let u32 x 5;").expect("should generate");

        assert_eq!(
            body(instructions),
            vec![
                Instruction::AllocateStack(4),
                mov(Operand::Imm(5), Operand::Stack(-4)),
                mov(Operand::Stack(-4), ACCUMULATOR),
                Instruction::AllocateStack(4),
                mov(ACCUMULATOR, Operand::Stack(-8)),
            ]
        );
    }

    #[test]
    fn test_assign_from_undeclared() {
        assert_eq!(
            generate("y = x;"),
            Err(CodegenError::AssignNonExistingVariable("x".to_owned()))
        );
        assert_eq!(
            generate("x = x;"),
            Err(CodegenError::AssignNonExistingVariable("x".to_owned()))
        );
    }

    #[test]
    fn test_print_undeclared() {
        assert_eq!(
            generate("x = 1; putbyte z;"),
            Err(CodegenError::PrintNonExistingVariable("z".to_owned()))
        );
    }

    #[test]
    fn test_read_undeclared_in_expression() {
        assert_eq!(
            generate("y = 1 + z;"),
            Err(CodegenError::ReadNonExistingVariable("z".to_owned()))
        );
        assert_eq!(
            generate("z;"),
            Err(CodegenError::ReadNonExistingVariable("z".to_owned()))
        );
    }

    #[test]
    fn test_call_is_always_aligned() {
        let input = "a = 1; putbyte a; b = a + (c = 2); putbyte b + c; \
                     let u32 d 'd'; putbyte d; e = d; f = e; g = f; putbyte (g + (1 + 2));";
        let instructions = generate(input).expect("should generate");

        let mut depth: i64 = 0;
        let mut calls = 0;
        for inst in &instructions {
            match inst {
                Instruction::AllocateStack(n) => depth += i64::from(*n),
                Instruction::DeallocateStack(n) => depth -= i64::from(*n),
                Instruction::Call(_) => {
                    calls += 1;
                    assert_eq!(depth % 16, 0, "misaligned call in {:?}", instructions);
                }
                _ => {}
            }
        }

        assert_eq!(calls, 4);
    }
}
