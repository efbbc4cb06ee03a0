//! The lexical scanner, turning source text into a lazy token sequence.

use crate::{
    error::ScanError,
    token::{self, Token},
};

/// Scanner reads bytes from the source code and groups them into a sequence
/// of tokens. Tokens are produced lazily, one `scan` call at a time; once
/// the input is exhausted every further call yields `Eof`.
#[derive(Debug)]
pub struct Scanner<'src> {
    src: &'src str,
    start: usize,
    current: usize,
    line: usize,
}

impl<'src> Scanner<'src> {
    /// Create a new scanner positioned at the start of the source, line 1.
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Consume and return the next token from source.
    ///
    /// A malformed piece of input is returned as an `Err` carrying the line
    /// it was found on; scanning can continue afterwards, so errors flow
    /// through the token stream instead of ending it.
    pub fn scan(&mut self) -> Result<Token<'src>, ScanError> {
        self.skip_whitespace();
        self.start = self.current;
        if self.is_source_end() {
            return Ok(self.token(token::Type::Eof));
        }
        Ok(match self.advance() {
            b'(' => self.token(token::Type::LParen),
            b')' => self.token(token::Type::RParen),
            b'{' => self.token(token::Type::LBrace),
            b'}' => self.token(token::Type::RBrace),
            b';' => self.token(token::Type::Semicolon),
            b',' => self.token(token::Type::Comma),
            b'.' => self.token(token::Type::Dot),
            b'-' => self.token(token::Type::Minus),
            b'+' => self.token(token::Type::Plus),
            b'/' => self.token(token::Type::Slash),
            b'*' => self.token(token::Type::Star),
            b'!' => {
                if self.consume(b'=') {
                    self.token(token::Type::BangEqual)
                } else {
                    self.token(token::Type::Bang)
                }
            }
            b'=' => {
                if self.consume(b'=') {
                    self.token(token::Type::EqualEqual)
                } else {
                    self.token(token::Type::Equal)
                }
            }
            b'<' => {
                if self.consume(b'=') {
                    self.token(token::Type::LessEqual)
                } else {
                    self.token(token::Type::Less)
                }
            }
            b'>' => {
                if self.consume(b'=') {
                    self.token(token::Type::GreaterEqual)
                } else {
                    self.token(token::Type::Greater)
                }
            }
            b'"' => self.string()?,
            c if is_digit(c) => self.number(),
            c if is_alpha(c) => self.ident(),
            _ => {
                return Err(ScanError::UnexpectedCharacter { line: self.line });
            }
        })
    }

    fn ident(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }
        self.token(self.ident_type())
    }

    /// Determine whether an identifier is a keyword by examining its prefix.
    /// Anything that is not an exact keyword spelling falls back to `Ident`.
    fn ident_type(&self) -> token::Type {
        let lexeme = &self.src.as_bytes()[self.start..self.current];
        match lexeme[0] {
            b'a' => self.check_keyword(1, b"nd", token::Type::And),
            b'c' => self.check_keyword(1, b"lass", token::Type::Class),
            b'e' => self.check_keyword(1, b"lse", token::Type::Else),
            b'f' if lexeme.len() > 1 => match lexeme[1] {
                b'a' => self.check_keyword(2, b"lse", token::Type::False),
                b'o' => self.check_keyword(2, b"r", token::Type::For),
                b'u' => self.check_keyword(2, b"n", token::Type::Fun),
                _ => token::Type::Ident,
            },
            b'i' => self.check_keyword(1, b"f", token::Type::If),
            b'n' => self.check_keyword(1, b"il", token::Type::Nil),
            b'o' => self.check_keyword(1, b"r", token::Type::Or),
            b'p' => self.check_keyword(1, b"rint", token::Type::Print),
            b'r' => self.check_keyword(1, b"eturn", token::Type::Return),
            b's' => self.check_keyword(1, b"uper", token::Type::Super),
            b't' if lexeme.len() > 1 => match lexeme[1] {
                b'h' => self.check_keyword(2, b"is", token::Type::This),
                b'r' => self.check_keyword(2, b"ue", token::Type::True),
                _ => token::Type::Ident,
            },
            b'v' => self.check_keyword(1, b"ar", token::Type::Var),
            b'w' => self.check_keyword(1, b"hile", token::Type::While),
            _ => token::Type::Ident,
        }
    }

    fn check_keyword(&self, start: usize, rest: &[u8], typ: token::Type) -> token::Type {
        let lexeme = &self.src.as_bytes()[self.start..self.current];
        if lexeme.len() == start + rest.len() && &lexeme[start..] == rest {
            typ
        } else {
            token::Type::Ident
        }
    }

    fn number(&mut self) -> Token<'src> {
        while is_digit(self.peek()) {
            self.advance();
        }
        // A fractional part only counts when a digit follows the dot.
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.token(token::Type::Number)
    }

    fn string(&mut self) -> Result<Token<'src>, ScanError> {
        while self.peek() != b'"' && !self.is_source_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_source_end() {
            return Err(ScanError::UnterminatedString { line: self.line });
        }
        // The closing quote.
        self.advance();
        Ok(self.token(token::Type::String))
    }

    fn token(&self, typ: token::Type) -> Token<'src> {
        Token {
            typ,
            lexeme: &self.src[self.start..self.current],
            line: self.line,
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'/' => {
                    if self.peek_next() == b'/' {
                        while self.peek() != b'\n' && !self.is_source_end() {
                            self.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn peek(&self) -> u8 {
        if self.is_source_end() {
            b'\0'
        } else {
            self.src.as_bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.src.len() {
            b'\0'
        } else {
            self.src.as_bytes()[self.current + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.src.as_bytes()[self.current];
        self.current += 1;
        c
    }

    fn consume(&mut self, expected: u8) -> bool {
        if self.is_source_end() {
            return false;
        }
        if self.src.as_bytes()[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn is_source_end(&self) -> bool {
        self.current >= self.src.len()
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}
