use std::{fmt::Display, vec::IntoIter};

use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LexerError {
    #[error("{loc}: unrecognized character '{ch}'")]
    UnknownCharacter { ch: char, loc: Loc },
    #[error("{0}: character literal is missing its closing quote")]
    UnterminatedCharLiteral(Loc),
    #[error("{loc}: the character '{ch}' in a character literal does not fit into a byte")]
    CharLiteralOutOfRange { ch: char, loc: Loc },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Loc {
    pub line: usize,
    pub column: usize,
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TokenKind {
    Eof,
    Identifier(String),
    /// The digits exactly as written. The parser does the range check.
    IntLiteral(String),
    CharLiteral(u8),
    OpenParen,
    CloseParen,
    Semicolon,

    Plus,   // +
    Assign, // =

    // Keywords
    KWLet,
    KWU32,
    KWPutbyte,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

impl TokenKind {
    pub fn from_string(string: &str) -> Self {
        match string {
            "let" => Self::KWLet,
            "u32" => Self::KWU32,
            "putbyte" => Self::KWPutbyte,
            _ => Self::Identifier(string.to_owned()),
        }
    }

    /// The source text this token was scanned from.
    pub fn lexeme(&self) -> String {
        match self {
            TokenKind::Eof => String::new(),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::IntLiteral(digits) => digits.clone(),
            TokenKind::CharLiteral(byte) => format!("'{}'", char::from(*byte)),
            TokenKind::OpenParen => "(".to_owned(),
            TokenKind::CloseParen => ")".to_owned(),
            TokenKind::Semicolon => ";".to_owned(),
            TokenKind::Plus => "+".to_owned(),
            TokenKind::Assign => "=".to_owned(),
            TokenKind::KWLet => "let".to_owned(),
            TokenKind::KWU32 => "u32".to_owned(),
            TokenKind::KWPutbyte => "putbyte".to_owned(),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Eof => write!(f, "[EOF]"),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::IntLiteral(digits) => write!(f, "<{}>", digits),
            TokenKind::CharLiteral(_) => write!(f, "<{}>", self.lexeme()),
            kind => write!(f, "[{}]", kind.lexeme()),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" at {}", self.kind, self.loc)
    }
}

#[derive(Debug)]
pub struct Lexer {
    chars: IntoIter<char>,
    loc: Loc,

    ch: Option<char>,
    peek_ch: Option<char>,

    /// Set once Eof or an error was produced, the iterator yields nothing after that.
    done: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let mut lexer = Self {
            chars: input.chars().collect::<Vec<_>>().into_iter(),
            ch: None,
            peek_ch: None,
            done: false,

            loc: Loc { column: 0, line: 1 },
        };

        lexer.peek_ch = lexer.chars.next();
        lexer.read_char();
        lexer
    }

    fn is_digit(&self) -> bool {
        matches!(self.ch, Some('0'..='9'))
    }

    fn is_valid_identifier_char(&self) -> bool {
        match self.ch {
            Some('a'..='z') | Some('_') => true,
            _ => self.is_digit(),
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match (self.ch, self.peek_ch) {
                (Some(' ' | '\n' | '\r' | '\t'), _) => self.read_char(),
                (Some('/'), Some('/')) => {
                    while !matches!(self.ch, None | Some('\n')) {
                        self.read_char();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_char(&mut self) {
        if self.ch == Some('\n') {
            self.loc.column = 0;
            self.loc.line += 1;
        }
        self.ch = self.peek_ch;
        self.peek_ch = self.chars.next();
        self.loc.column += 1;
    }

    fn read_int_literal(&mut self) -> Token {
        let old_loc = self.loc;
        let mut digits = String::new();

        while let Some(ch @ '0'..='9') = self.ch {
            digits.push(ch);
            self.read_char();
        }

        Token {
            kind: TokenKind::IntLiteral(digits),
            loc: old_loc,
        }
    }

    fn read_identifier(&mut self) -> Token {
        let old_loc = self.loc;
        let mut string = String::new();

        while let (true, Some(ch)) = (self.is_valid_identifier_char(), self.ch) {
            string.push(ch);
            self.read_char();
        }
        Token {
            kind: TokenKind::from_string(&string),
            loc: old_loc,
        }
    }

    // Expects to be on the opening quote. Always exactly three characters, no escapes.
    fn read_char_literal(&mut self) -> Result<Token, LexerError> {
        let old_loc = self.loc;
        self.read_char();

        let payload = self
            .ch
            .ok_or(LexerError::UnterminatedCharLiteral(old_loc))?;
        self.read_char();

        if self.ch != Some('\'') {
            return Err(LexerError::UnterminatedCharLiteral(old_loc));
        }
        self.read_char();

        let byte = u8::try_from(payload).map_err(|_| LexerError::CharLiteralOutOfRange {
            ch: payload,
            loc: old_loc,
        })?;

        Ok(Token {
            kind: TokenKind::CharLiteral(byte),
            loc: old_loc,
        })
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        let old_loc = self.loc;

        let Some(ch) = self.ch else {
            return Ok(Token {
                kind: TokenKind::Eof,
                loc: self.loc,
            });
        };

        let result = match ch {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            ';' => TokenKind::Semicolon,
            '+' => TokenKind::Plus,
            '=' => TokenKind::Assign,
            '\'' => return self.read_char_literal(),
            _ => {
                if self.is_digit() {
                    return Ok(self.read_int_literal());
                } else if self.is_valid_identifier_char() {
                    return Ok(self.read_identifier());
                }

                return Err(LexerError::UnknownCharacter { ch, loc: old_loc });
            }
        };

        self.read_char();
        Ok(Token {
            kind: result,
            loc: old_loc,
        })
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let token = self.next_token();

        match token {
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) => {
                self.done = true;
                None
            }
            Ok(tok) => Some(Ok(tok)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Scans the whole input in one pass. The result always ends with exactly one Eof token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = vec![];

    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);

        if is_eof {
            return Ok(tokens);
        }
    }
}
