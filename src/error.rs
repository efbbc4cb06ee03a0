//! Error types for every stage of the interpreter pipeline.

use thiserror::Error;

/// Error while scanning Skiff source code.
///
/// Scan errors travel through the token stream instead of aborting it. The
/// scanner keeps producing tokens after reporting one, and the compiler is
/// the component that surfaces them to the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    /// A string literal is missing its closing quote.
    #[error("Unterminated string.")]
    UnterminatedString {
        /// Line on which the literal started being scanned.
        line: usize,
    },
    /// A character that is not part of the language.
    #[error("Unexpected character.")]
    UnexpectedCharacter {
        /// Line on which the character was found.
        line: usize,
    },
}

impl ScanError {
    /// The source line the error was detected on.
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedString { line } | Self::UnexpectedCharacter { line } => *line,
        }
    }
}

/// Error raised by the virtual machine while executing a chunk.
///
/// Every variant records the source line of the instruction that faulted,
/// looked up through the chunk's line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Unary negation applied to something other than a number.
    #[error("Operand must be a number.")]
    ExpectedNumber {
        /// Line of the faulting instruction.
        line: usize,
    },
    /// A numeric binary operator applied to non-number operands.
    #[error("Operands must be numbers.")]
    ExpectedNumbers {
        /// Line of the faulting instruction.
        line: usize,
    },
    /// Addition applied to operands that are neither two numbers nor two
    /// strings.
    #[error("Operands must be 2 numbers or 2 strings.")]
    ExpectedNumbersOrStrings {
        /// Line of the faulting instruction.
        line: usize,
    },
    /// Push on a full operand stack.
    #[error("Stack overflow.")]
    StackOverflow {
        /// Line of the faulting instruction.
        line: usize,
    },
}

impl RuntimeError {
    /// The source line of the instruction that raised the error.
    pub fn line(&self) -> usize {
        match self {
            Self::ExpectedNumber { line }
            | Self::ExpectedNumbers { line }
            | Self::ExpectedNumbersOrStrings { line }
            | Self::StackOverflow { line } => *line,
        }
    }
}

/// The result of one interpretation call.
#[derive(Debug, Error)]
pub enum Error {
    /// Compilation failed. The individual diagnostics were already written
    /// to the error stream while parsing.
    #[error("Compilation errors.")]
    Compile,
    /// Execution halted on a runtime error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
