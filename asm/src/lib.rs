#[cfg(feature = "ast")]
pub mod ast;
pub mod emit;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    Mov {
        size: RegisterSize,
        src: Operand,
        dst: Operand,
    },
    /// 32 bit, wraps on overflow.
    Add {
        src: Operand,
        dst: Operand,
    },
    Lea {
        src: Operand,
        dst: Operand,
    },
    AllocateStack(u32),
    DeallocateStack(u32),
    Push(Operand),
    Pop(Operand),
    Call(String),
    Syscall,
    Ret,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Operand {
    Register(Register),
    Imm(i64),
    /// Offset relative to the frame base in %rbp.
    Stack(i64),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Register {
    AX,
    DI,
    SI,
    DX,
    R10,
    BP,
    SP,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RegisterSize {
    One,
    Four,
    Eight,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    /// Exported with .globl
    pub global: bool,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Program(pub Vec<FunctionDefinition>);
