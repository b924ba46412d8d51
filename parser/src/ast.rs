pub type Identifier = String;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expression {
    Var(Identifier),
    IntLiteral(u32),
    CharLiteral(u8),
    /// The operands of one `a + b + ...` chain in source order. A parenthesized sum stays
    /// a nested operand.
    Sum(Vec<Expression>),
    Assignment {
        name: Identifier,
        value: Box<Expression>,
    },
    /// Evaluates to the value of its initializer.
    Declaration(VariableDeclaration),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum VariableType {
    U32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VariableDeclaration {
    pub ty: VariableType,
    pub name: Identifier,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Statement {
    Expression(Expression),
    PutByte(Expression),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}
