//! The fixed parts of every program: the `putbyte` helper, the entry point and the exit.

use pbc_asm::{FunctionDefinition, Instruction, Operand, Register, RegisterSize};

pub const PUTBYTE: &str = "putbyte";
pub const ENTRY: &str = "_start";

// x86-64 Linux syscall numbers.
const SYS_WRITE: i64 = 1;
const SYS_EXIT: i64 = 60;

const STDOUT: i64 = 1;

fn mov(size: RegisterSize, src: Operand, dst: Operand) -> Instruction {
    Instruction::Mov { size, src, dst }
}

/// Writes the low byte of %edi to stdout. Expects a 16 byte aligned stack at the call.
pub fn putbyte_function() -> FunctionDefinition {
    let rbp = Operand::Register(Register::BP);
    let rsp = Operand::Register(Register::SP);

    FunctionDefinition {
        name: PUTBYTE.to_owned(),
        global: false,
        instructions: vec![
            Instruction::Push(rbp.clone()),
            mov(RegisterSize::Eight, rsp.clone(), rbp.clone()),
            Instruction::AllocateStack(16),
            mov(
                RegisterSize::One,
                Operand::Register(Register::DI),
                Operand::Stack(-1),
            ),
            mov(
                RegisterSize::Four,
                Operand::Imm(SYS_WRITE),
                Operand::Register(Register::AX),
            ),
            mov(
                RegisterSize::Four,
                Operand::Imm(STDOUT),
                Operand::Register(Register::DI),
            ),
            Instruction::Lea {
                src: Operand::Stack(-1),
                dst: Operand::Register(Register::SI),
            },
            mov(
                RegisterSize::Four,
                Operand::Imm(1),
                Operand::Register(Register::DX),
            ),
            Instruction::Syscall,
            mov(RegisterSize::Eight, rbp.clone(), rsp),
            Instruction::Pop(rbp),
            Instruction::Ret,
        ],
    }
}

/// The kernel enters with an aligned %rsp, which becomes the frame base.
pub fn entry_prologue() -> Vec<Instruction> {
    vec![mov(
        RegisterSize::Eight,
        Operand::Register(Register::SP),
        Operand::Register(Register::BP),
    )]
}

pub fn exit_epilogue() -> Vec<Instruction> {
    vec![
        mov(
            RegisterSize::Four,
            Operand::Imm(SYS_EXIT),
            Operand::Register(Register::AX),
        ),
        mov(
            RegisterSize::Four,
            Operand::Imm(0),
            Operand::Register(Register::DI),
        ),
        Instruction::Syscall,
    ]
}
