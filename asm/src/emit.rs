use crate::{FunctionDefinition, Instruction, Operand, Program, Register, RegisterSize};

/// A Structure that implements this trait, can emit assembly using the provided function.
/// Output is AT&T syntax for the GNU assembler.
pub trait EmitAsm {
    /// The indent_depth argument only needs to be used when you have to indent something.
    fn emit(&self, indent_depth: u32) -> String;
}

impl RegisterSize {
    fn suffix(&self) -> &'static str {
        match self {
            RegisterSize::One => "b",
            RegisterSize::Four => "l",
            RegisterSize::Eight => "q",
        }
    }
}

impl Operand {
    fn emit_size(&self, size: RegisterSize) -> String {
        match self {
            Operand::Register(reg) => format!(
                "%{}",
                match reg {
                    Register::AX => match size {
                        RegisterSize::Eight => "rax",
                        RegisterSize::Four => "eax",
                        RegisterSize::One => "al",
                    },
                    Register::DI => match size {
                        RegisterSize::Eight => "rdi",
                        RegisterSize::Four => "edi",
                        RegisterSize::One => "dil",
                    },
                    Register::SI => match size {
                        RegisterSize::Eight => "rsi",
                        RegisterSize::Four => "esi",
                        RegisterSize::One => "sil",
                    },
                    Register::DX => match size {
                        RegisterSize::Eight => "rdx",
                        RegisterSize::Four => "edx",
                        RegisterSize::One => "dl",
                    },
                    Register::R10 => match size {
                        RegisterSize::Eight => "r10",
                        RegisterSize::Four => "r10d",
                        RegisterSize::One => "r10b",
                    },
                    Register::BP => match size {
                        RegisterSize::Eight => "rbp",
                        RegisterSize::Four => "ebp",
                        RegisterSize::One => "bpl",
                    },
                    Register::SP => match size {
                        RegisterSize::Eight => "rsp",
                        RegisterSize::Four => "esp",
                        RegisterSize::One => "spl",
                    },
                }
            ),
            Operand::Imm(val) => format!("${}", val),
            Operand::Stack(offset) => format!("{}(%rbp)", offset),
        }
    }
}

impl EmitAsm for Instruction {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat(indent_depth as usize);

        match self {
            Instruction::Mov { size, src, dst } => format!(
                "{}mov{} {}, {}\n",
                tabs,
                size.suffix(),
                src.emit_size(*size),
                dst.emit_size(*size)
            ),
            Instruction::Add { src, dst } => format!(
                "{}addl {}, {}\n",
                tabs,
                src.emit_size(RegisterSize::Four),
                dst.emit_size(RegisterSize::Four)
            ),
            Instruction::Lea { src, dst } => format!(
                "{}leaq {}, {}\n",
                tabs,
                src.emit_size(RegisterSize::Eight),
                dst.emit_size(RegisterSize::Eight)
            ),
            Instruction::AllocateStack(val) => format!("{}subq ${}, %rsp\n", tabs, *val),
            Instruction::DeallocateStack(val) => format!("{}addq ${}, %rsp\n", tabs, *val),
            Instruction::Push(operand) => {
                format!("{}pushq {}\n", tabs, operand.emit_size(RegisterSize::Eight))
            }
            Instruction::Pop(operand) => {
                format!("{}popq {}\n", tabs, operand.emit_size(RegisterSize::Eight))
            }
            Instruction::Call(ident) => format!("{}call {}\n", tabs, ident),
            Instruction::Syscall => format!("{}syscall\n", tabs),
            Instruction::Ret => format!("{}ret\n", tabs),
        }
    }
}

impl EmitAsm for FunctionDefinition {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat((indent_depth + 1) as usize);

        format!(
            "{}{}:\n{}",
            if self.global {
                format!("{}.globl {}\n", tabs, self.name)
            } else {
                String::new()
            },
            self.name,
            self.instructions
                .iter()
                .map(|inst| inst.emit(indent_depth + 1))
                .collect::<String>(),
        )
    }
}

impl EmitAsm for Program {
    fn emit(&self, indent_depth: u32) -> String {
        let tabs = "\t".repeat((indent_depth + 1) as usize);

        format!(
            "{}.text\n{}\n{}.section .note.GNU-stack,\"\",@progbits\n",
            tabs,
            self.0
                .iter()
                .map(|func| func.emit(indent_depth))
                .reduce(|acm, item| format!("{}\n{}", acm, item))
                .unwrap_or_default(),
            tabs,
        )
    }
}
