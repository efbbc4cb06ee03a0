//! The single-pass compiler, turning source text straight into bytecode.
//!
//! Parsing is precedence climbing: every token type owns an optional prefix
//! action, an optional infix action, and a binding strength. There is no
//! syntax tree; each parse action emits instructions into the chunk as soon
//! as its grammar production is recognized.

use crate::{
    error::ScanError,
    token::{self, Token},
    Chunk, Heap, OpCode, Scanner, Value,
};

/// Compile the given source code into a chunk of bytecode that can be run
/// by the virtual machine.
///
/// Returns `None` when the source has errors; the diagnostics were already
/// written to the error stream, and whatever the chunk contained must not
/// be executed. String literals are interned into `heap` as they are
/// compiled.
pub fn compile(src: &str, heap: &mut Heap) -> Option<Chunk> {
    let mut parser = Parser::new(src, heap);
    parser.advance();
    parser.expression();
    parser.consume(token::Type::Eof, "Expect end of expression.");
    parser.finish()
}

/// Operator binding strengths, weakest binding first. A binary operator at
/// level N has operands parsed at level N+1, which is what makes the
/// operators left-associative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    /// =
    Assignment,
    /// or
    Or,
    /// and
    And,
    /// == !=
    Equality,
    /// < > <= >=
    Comparison,
    /// + -
    Term,
    /// * /
    Factor,
    /// ! -
    Unary,
    /// . ()
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call => Self::Primary,
            Self::Primary => Self::Primary,
        }
    }
}

type ParseFn<'src, 'heap> = fn(&mut Parser<'src, 'heap>);

/// One row of the dispatch table: how a token behaves at the start of an
/// expression, how it behaves as an operator, and how strongly it binds.
struct ParseRule<'src, 'heap> {
    prefix: Option<ParseFn<'src, 'heap>>,
    infix: Option<ParseFn<'src, 'heap>>,
    precedence: Precedence,
}

struct Parser<'src, 'heap> {
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    chunk: Chunk,
    heap: &'heap mut Heap,
}

impl<'src, 'heap> Parser<'src, 'heap> {
    fn new(src: &'src str, heap: &'heap mut Heap) -> Self {
        Self {
            scanner: Scanner::new(src),
            previous: Token::default(),
            current: Token::default(),
            had_error: false,
            panic_mode: false,
            chunk: Chunk::default(),
            heap,
        }
    }

    /// Seal the chunk and hand it over, unless an error was reported at any
    /// point during the compile.
    fn finish(mut self) -> Option<Chunk> {
        // A program is a single expression; show its value and halt.
        self.emit(OpCode::Print);
        self.emit(OpCode::Return);
        if self.had_error {
            None
        } else {
            Some(self.chunk)
        }
    }

    /// The dispatch table. Tokens with no grammar role map to the empty
    /// rule, so using one in expression position reports "Expect
    /// expression." rather than anything token-specific.
    fn rule(typ: token::Type) -> ParseRule<'src, 'heap> {
        match typ {
            token::Type::LParen => ParseRule {
                prefix: Some(Self::grouping),
                infix: None,
                precedence: Precedence::None,
            },
            token::Type::Minus => ParseRule {
                prefix: Some(Self::unary),
                infix: Some(Self::binary),
                precedence: Precedence::Term,
            },
            token::Type::Plus => ParseRule {
                prefix: None,
                infix: Some(Self::binary),
                precedence: Precedence::Term,
            },
            token::Type::Slash | token::Type::Star => ParseRule {
                prefix: None,
                infix: Some(Self::binary),
                precedence: Precedence::Factor,
            },
            token::Type::Bang => ParseRule {
                prefix: Some(Self::unary),
                infix: None,
                precedence: Precedence::None,
            },
            token::Type::BangEqual | token::Type::EqualEqual => ParseRule {
                prefix: None,
                infix: Some(Self::binary),
                precedence: Precedence::Equality,
            },
            token::Type::Greater
            | token::Type::GreaterEqual
            | token::Type::Less
            | token::Type::LessEqual => ParseRule {
                prefix: None,
                infix: Some(Self::binary),
                precedence: Precedence::Comparison,
            },
            token::Type::String => ParseRule {
                prefix: Some(Self::string),
                infix: None,
                precedence: Precedence::None,
            },
            token::Type::Number => ParseRule {
                prefix: Some(Self::number),
                infix: None,
                precedence: Precedence::None,
            },
            token::Type::False | token::Type::Nil | token::Type::True => ParseRule {
                prefix: Some(Self::literal),
                infix: None,
                precedence: Precedence::None,
            },
            _ => ParseRule {
                prefix: None,
                infix: None,
                precedence: Precedence::None,
            },
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parse everything at the given precedence level or stronger: the
    /// prefix action of the token at hand, then every infix operator whose
    /// binding is at least as strong as `precedence`.
    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        match Self::rule(self.previous.typ).prefix {
            Some(prefix) => prefix(self),
            None => {
                self.error("Expect expression.");
                return;
            }
        }
        while precedence <= Self::rule(self.current.typ).precedence {
            self.advance();
            if let Some(infix) = Self::rule(self.previous.typ).infix {
                infix(self);
            }
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.typ;
        let rule = Self::rule(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            token::Type::Plus => self.emit(OpCode::Add),
            token::Type::Minus => self.emit(OpCode::Subtract),
            token::Type::Star => self.emit(OpCode::Multiply),
            token::Type::Slash => self.emit(OpCode::Divide),
            token::Type::EqualEqual => self.emit(OpCode::Equal),
            token::Type::Greater => self.emit(OpCode::Greater),
            token::Type::Less => self.emit(OpCode::Less),
            // a != b lowers to !(a == b), a >= b to !(a < b), and
            // a <= b to !(a > b).
            token::Type::BangEqual => {
                self.emit(OpCode::Equal);
                self.emit(OpCode::Not);
            }
            token::Type::GreaterEqual => {
                self.emit(OpCode::Less);
                self.emit(OpCode::Not);
            }
            token::Type::LessEqual => {
                self.emit(OpCode::Greater);
                self.emit(OpCode::Not);
            }
            _ => unreachable!("only binary operator tokens have an infix action"),
        }
    }

    fn unary(&mut self) {
        let operator = self.previous.typ;
        // The operand compiles first; the operator applies to whatever it
        // left on the stack.
        self.parse_precedence(Precedence::Unary);
        match operator {
            token::Type::Bang => self.emit(OpCode::Not),
            token::Type::Minus => self.emit(OpCode::Negate),
            _ => unreachable!("only unary operator tokens have this prefix action"),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(token::Type::RParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        let value = self
            .previous
            .lexeme
            .parse()
            .expect("the scanner only emits valid number literals");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self) {
        // Strip the surrounding quotes; no escape sequences are processed.
        let lexeme = self.previous.lexeme;
        let id = self.heap.intern(&lexeme[1..lexeme.len() - 1]);
        self.emit_constant(Value::Str(id));
    }

    fn literal(&mut self) {
        match self.previous.typ {
            token::Type::Nil => self.emit(OpCode::Nil),
            token::Type::True => self.emit(OpCode::True),
            token::Type::False => self.emit(OpCode::False),
            _ => unreachable!("only literal tokens have this prefix action"),
        }
    }

    /// Step to the next token, surfacing any scan errors on the way. The
    /// scanner keeps producing after an error, so this always lands on a
    /// valid token eventually (at worst `Eof`).
    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            match self.scanner.scan() {
                Ok(token) => {
                    self.current = token;
                    break;
                }
                Err(err) => self.error_scan(err),
            }
        }
    }

    fn consume(&mut self, typ: token::Type, message: &str) {
        if self.current.typ == typ {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn emit(&mut self, code: OpCode) {
        self.chunk.write(code, self.previous.line);
    }

    fn emit_constant(&mut self, value: Value) {
        match self.chunk.add_const(value) {
            Some(id) => self.emit(OpCode::Constant(id)),
            None => self.error("Too many constants in one chunk."),
        }
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    /// Report a diagnostic for the given token. The first error flips the
    /// parser into panic mode, which suppresses every report after it; the
    /// expression grammar has no statement boundary to resynchronize at, so
    /// panic mode lasts until the end of the compile. `had_error` still
    /// latches, which is what fails the compile.
    fn error_at(&mut self, token: Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        if token.typ == token::Type::Eof {
            eprintln!("[Line {}] Error at end : {}", token.line, message);
        } else {
            eprintln!("[Line {}] Error at '{}' : {}", token.line, token.lexeme, message);
        }
    }

    fn error_scan(&mut self, err: ScanError) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        eprintln!("[Line {}] Error : {}", err.line(), err);
    }
}
