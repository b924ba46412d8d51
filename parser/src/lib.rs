pub mod ast;
pub mod lexer;

use std::{
    collections::HashMap,
    mem::{self, Discriminant},
    vec::IntoIter,
};

use thiserror::Error;

use crate::lexer::{Loc, Token, TokenKind};

/// How many expressions may be open inside each other, parentheses and assignment chains
/// included.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(PartialEq, PartialOrd)]
enum Precedence {
    Lowest = 0,
    Assignment,
    Sum,
}

impl Precedence {
    pub fn from_token(token: &TokenKind) -> Option<Self> {
        Some(match token {
            TokenKind::Plus => Self::Sum,
            TokenKind::Assign => Self::Assignment,
            _ => return None,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("Unexpected Token, expected: \"{expected}\", actual: {actual}")]
    UnexpectedToken { expected: TokenKind, actual: Token },
    #[error("Expected an expression, got {0}")]
    NoPrefixFunction(Token),
    #[error("{loc}: only a variable can be assigned to, got {target:?}")]
    InvalidAssignmentTarget { target: ast::Expression, loc: Loc },
    #[error("Expected a type in the variable declaration, got {0}")]
    InvalidType(Token),
    #[error("Expected the variable name in the declaration, got {0}")]
    ExpectedIdentifier(Token),
    #[error("The variable declaration has no initial value, got {0}")]
    MissingInitializer(Token),
    #[error("{loc}: the integer literal {digits} does not fit into 32 bits")]
    IntegerOutOfRange { digits: String, loc: Loc },
    #[error("Not all tokens parsed, {0} follows the end of input")]
    NotAllTokensParsed(Token),
    #[error("Expressions are nested too deeply, stopped at {0}")]
    NestingTooDeep(Token),
}

type PrefixFunction = fn(&mut Parser) -> Result<ast::Expression, ParserError>;
type InfixFunction = fn(&mut Parser, ast::Expression) -> Result<ast::Expression, ParserError>;

#[derive(Debug)]
pub struct Parser {
    tokens: IntoIter<Token>,
    cur_token: Token,
    peek_token: Token,
    depth: usize,

    prefix_functions: HashMap<Discriminant<TokenKind>, PrefixFunction>,
    infix_functions: HashMap<Discriminant<TokenKind>, InfixFunction>,
}

impl Parser {
    /// Takes the token sequence produced by [`lexer::tokenize`]. A missing Eof token is
    /// treated as if it was there.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut parser = Self {
            tokens: tokens.into_iter(),
            cur_token: Token {
                kind: TokenKind::Eof,
                loc: Loc { line: 1, column: 1 },
            },
            peek_token: Token {
                kind: TokenKind::Eof,
                loc: Loc { line: 1, column: 1 },
            },
            depth: 0,
            prefix_functions: HashMap::new(),
            infix_functions: HashMap::new(),
        };
        // Prefix
        parser.register_prefix(
            &TokenKind::IntLiteral(String::new()),
            Self::parse_int_literal,
        );
        parser.register_prefix(&TokenKind::CharLiteral(0), Self::parse_char_literal);
        parser.register_prefix(
            &TokenKind::Identifier(String::new()),
            Self::parse_identifier,
        );
        parser.register_prefix(&TokenKind::OpenParen, Self::parse_grouped_expression);
        parser.register_prefix(&TokenKind::KWLet, Self::parse_declaration);

        // Infix
        parser.register_infix(&TokenKind::Plus, Self::parse_sum);
        parser.register_infix(&TokenKind::Assign, Self::parse_assignment);

        parser.next_token();
        parser.next_token();

        parser
    }

    fn next_token(&mut self) -> Token {
        let eof_loc = self.peek_token.loc;
        let next = self.tokens.next().unwrap_or(Token {
            kind: TokenKind::Eof,
            loc: eof_loc,
        });
        let old_peek_token = mem::replace(&mut self.peek_token, next);
        mem::replace(&mut self.cur_token, old_peek_token)
    }

    fn register_prefix(&mut self, token: &TokenKind, func: PrefixFunction) {
        self.prefix_functions.insert(mem::discriminant(token), func);
    }

    fn register_infix(&mut self, token: &TokenKind, func: InfixFunction) {
        self.infix_functions.insert(mem::discriminant(token), func);
    }

    fn expect_peek(&mut self, expected: TokenKind) -> Result<(), ParserError> {
        if self.peek_token_is(&expected) {
            self.next_token();
            Ok(())
        } else {
            Err(ParserError::UnexpectedToken {
                expected,
                actual: self.peek_token.clone(),
            })
        }
    }

    fn peek_token_is(&self, token: &TokenKind) -> bool {
        mem::discriminant(&self.peek_token.kind) == mem::discriminant(token)
    }

    fn cur_token_is(&self, token: &TokenKind) -> bool {
        mem::discriminant(&self.cur_token.kind) == mem::discriminant(token)
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::from_token(&self.peek_token.kind).unwrap_or(Precedence::Lowest)
    }

    pub fn parse_program(&mut self) -> Result<ast::Program, ParserError> {
        let mut statements = vec![];

        while !self.cur_token_is(&TokenKind::Eof) {
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
            self.next_token();
        }

        if !self.peek_token_is(&TokenKind::Eof) {
            return Err(ParserError::NotAllTokensParsed(self.peek_token.clone()));
        }

        if let Some(token) = self.tokens.next() {
            return Err(ParserError::NotAllTokensParsed(token));
        }

        Ok(ast::Program { statements })
    }

    // WARN: This will parse a semicolon!
    fn parse_statement(&mut self) -> Result<Option<ast::Statement>, ParserError> {
        let statement = match self.cur_token.kind {
            TokenKind::Semicolon => return Ok(None),
            TokenKind::KWPutbyte => {
                self.next_token();
                ast::Statement::PutByte(self.parse_expression(Precedence::Lowest)?)
            }
            _ => ast::Statement::Expression(self.parse_expression(Precedence::Lowest)?),
        };

        self.expect_peek(TokenKind::Semicolon)?;

        Ok(Some(statement))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<ast::Expression, ParserError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParserError::NestingTooDeep(self.cur_token.clone()));
        }

        self.depth += 1;
        let expr = self.parse_nested_expression(precedence);
        self.depth -= 1;

        expr
    }

    fn parse_nested_expression(
        &mut self,
        precedence: Precedence,
    ) -> Result<ast::Expression, ParserError> {
        let prefix = self
            .prefix_functions
            .get(&mem::discriminant(&self.cur_token.kind))
            .copied()
            .ok_or_else(|| ParserError::NoPrefixFunction(self.cur_token.clone()))?;

        let mut lhs = prefix(self)?;

        while precedence < self.peek_precedence() {
            let Some(infix) = self
                .infix_functions
                .get(&mem::discriminant(&self.peek_token.kind))
                .copied()
            else {
                return Ok(lhs);
            };

            self.next_token();

            lhs = infix(self, lhs)?;
        }

        Ok(lhs)
    }

    fn parse_int_literal(&mut self) -> Result<ast::Expression, ParserError> {
        match &self.cur_token.kind {
            TokenKind::IntLiteral(digits) => {
                digits
                    .parse()
                    .map(ast::Expression::IntLiteral)
                    .map_err(|_| ParserError::IntegerOutOfRange {
                        digits: digits.clone(),
                        loc: self.cur_token.loc,
                    })
            }
            _ => unreachable!("Wrong token passed to parse_int_literal, should not happen."),
        }
    }

    fn parse_char_literal(&mut self) -> Result<ast::Expression, ParserError> {
        match self.cur_token.kind {
            TokenKind::CharLiteral(byte) => Ok(ast::Expression::CharLiteral(byte)),
            _ => unreachable!("Wrong token passed to parse_char_literal, should not happen."),
        }
    }

    fn parse_identifier(&mut self) -> Result<ast::Expression, ParserError> {
        match &self.cur_token.kind {
            TokenKind::Identifier(name) => Ok(ast::Expression::Var(name.clone())),
            _ => unreachable!("Wrong token passed to parse_identifier, should not happen."),
        }
    }

    fn parse_grouped_expression(&mut self) -> Result<ast::Expression, ParserError> {
        self.next_token();

        let expr = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(TokenKind::CloseParen)?;

        Ok(expr)
    }

    // Expects to be on let
    fn parse_declaration(&mut self) -> Result<ast::Expression, ParserError> {
        self.next_token();

        let ty = match self.cur_token.kind {
            TokenKind::KWU32 => ast::VariableType::U32,
            _ => return Err(ParserError::InvalidType(self.cur_token.clone())),
        };

        self.next_token();

        let name = match &self.cur_token.kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => return Err(ParserError::ExpectedIdentifier(self.cur_token.clone())),
        };

        // Both `let u32 x 5` and `let u32 x = 5` are accepted.
        if self.peek_token_is(&TokenKind::Assign) {
            self.next_token();
        }

        if matches!(
            self.peek_token.kind,
            TokenKind::Semicolon | TokenKind::Eof | TokenKind::CloseParen
        ) {
            return Err(ParserError::MissingInitializer(self.peek_token.clone()));
        }

        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        Ok(ast::Expression::Declaration(ast::VariableDeclaration {
            ty,
            name,
            value: Box::new(value),
        }))
    }

    // Collects the whole chain, operands are parsed one by one at Sum precedence so they
    // stop at the next `+`.
    fn parse_sum(&mut self, lhs: ast::Expression) -> Result<ast::Expression, ParserError> {
        let mut operands = vec![lhs];

        loop {
            self.next_token();
            operands.push(self.parse_expression(Precedence::Sum)?);

            if !self.peek_token_is(&TokenKind::Plus) {
                break;
            }
            self.next_token();
        }

        Ok(ast::Expression::Sum(operands))
    }

    fn parse_assignment(&mut self, lhs: ast::Expression) -> Result<ast::Expression, ParserError> {
        let name = match lhs {
            ast::Expression::Var(name) => name,
            target => {
                return Err(ParserError::InvalidAssignmentTarget {
                    target,
                    loc: self.cur_token.loc,
                })
            }
        };

        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;

        Ok(ast::Expression::Assignment {
            name,
            value: Box::new(value),
        })
    }
}

/// Parses a complete token sequence into a program.
pub fn parse(tokens: Vec<Token>) -> Result<ast::Program, ParserError> {
    Parser::new(tokens).parse_program()
}
