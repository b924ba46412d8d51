use std::fmt::Display;

use pbc_parser::ast::Expression;

use crate::Operand;

/// Only literals have an immediate form, everything else needs the variable table.
#[derive(Debug)]
pub struct NotAnImmediate;

impl Display for NotAnImmediate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Only integer and character literals can be turned into an immediate")
    }
}

impl TryFrom<&Expression> for Operand {
    type Error = NotAnImmediate;

    fn try_from(value: &Expression) -> Result<Self, Self::Error> {
        Ok(match value {
            Expression::IntLiteral(val) => Operand::Imm(i64::from(*val)),
            Expression::CharLiteral(byte) => Operand::Imm(i64::from(*byte)),
            _ => return Err(NotAnImmediate),
        })
    }
}
