//! The stack-based virtual machine that executes compiled chunks.

use std::io::{self, Write};

use crate::{compile, Chunk, Error, Heap, OpCode, RuntimeError, Value};

/// Capacity of the operand stack. Pushing past it is the detected runtime
/// error "Stack overflow." rather than an unchecked fault.
pub const MAX_STACK: usize = 256;

/// A bytecode virtual machine for the Skiff language.
///
/// The machine owns its operand stack and its object heap, so independent
/// instances never share state. Interned strings accumulate in the heap
/// until the machine itself is dropped; nothing is freed mid-run.
///
/// Output from the print instruction goes to the writer the machine was
/// built with, which is stdout for [`VM::default`].
#[derive(Debug)]
pub struct VM<W = io::Stdout> {
    stack: Vec<Value>,
    heap: Heap,
    out: W,
}

impl Default for VM<io::Stdout> {
    fn default() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<W: Write> VM<W> {
    /// Create a virtual machine that prints to the given writer.
    pub fn with_output(out: W) -> Self {
        Self {
            stack: Vec::with_capacity(MAX_STACK),
            heap: Heap::default(),
            out,
        }
    }

    /// Borrow the writer that the print instruction writes to.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Compile and run the given source code.
    ///
    /// Compile errors were already reported token by token while parsing.
    /// A runtime error is written to the error stream together with the
    /// source line of the faulting instruction, and the operand stack is
    /// reset so the next call starts clean.
    pub fn interpret(&mut self, src: &str) -> Result<(), Error> {
        let chunk = compile(src, &mut self.heap).ok_or(Error::Compile)?;
        if let Err(err) = self.run(&chunk) {
            eprintln!("{}", err);
            eprintln!("[line {}] in script", err.line());
            self.stack.clear();
            return Err(Error::Runtime(err));
        }
        Ok(())
    }

    /// The fetch-decode-execute loop. Runs until the return instruction or
    /// the first runtime error. Operand counts are fixed per opcode and the
    /// compiler's grammar guarantees the stack never underflows, so only
    /// operand *types* are checked here.
    fn run(&mut self, chunk: &Chunk) -> Result<(), RuntimeError> {
        let mut ip = 0;
        loop {
            let (code, line) = chunk.read_instruction(ip);
            let code = *code;
            ip += 1;
            match code {
                OpCode::Constant(id) => {
                    let val = chunk.read_const(id).clone();
                    self.push(val, line)?;
                }
                OpCode::Nil => self.push(Value::Nil, line)?,
                OpCode::True => self.push(Value::Bool(true), line)?,
                OpCode::False => self.push(Value::Bool(false), line)?,
                OpCode::Not => {
                    let val = self.peek_mut(0);
                    *val = Value::Bool(val.is_falsey());
                }
                OpCode::Negate => match self.peek_mut(0) {
                    Value::Number(n) => *n = -*n,
                    _ => return Err(RuntimeError::ExpectedNumber { line }),
                },
                OpCode::Equal => {
                    let rhs = self.pop();
                    let lhs = self.peek_mut(0);
                    *lhs = Value::Bool(*lhs == rhs);
                }
                OpCode::Greater => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Bool(lhs > rhs);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbers { line }),
                },
                OpCode::Less => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Bool(lhs < rhs);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbers { line }),
                },
                OpCode::Add => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Number(lhs + rhs);
                    }
                    (&Value::Str(rhs), &Value::Str(lhs)) => {
                        // Append the contents, then intern the result as a
                        // fresh (or existing) heap string.
                        let mut chars = self.heap.get_str(lhs).to_string();
                        chars.push_str(self.heap.get_str(rhs));
                        let id = self.heap.intern_owned(chars);
                        self.pop();
                        *self.peek_mut(0) = Value::Str(id);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbersOrStrings { line }),
                },
                OpCode::Subtract => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Number(lhs - rhs);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbers { line }),
                },
                OpCode::Multiply => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Number(lhs * rhs);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbers { line }),
                },
                OpCode::Divide => match (self.peek(0), self.peek(1)) {
                    (&Value::Number(rhs), &Value::Number(lhs)) => {
                        self.pop();
                        *self.peek_mut(0) = Value::Number(lhs / rhs);
                    }
                    _ => return Err(RuntimeError::ExpectedNumbers { line }),
                },
                OpCode::Print => {
                    let val = self.pop();
                    writeln!(self.out, "{}", val.as_string(&self.heap)).ok();
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    fn peek(&self, distance: usize) -> &Value {
        self.stack
            .get(self.stack.len() - 1 - distance)
            .expect("bytecode never underflows the stack")
    }

    fn peek_mut(&mut self, distance: usize) -> &mut Value {
        let idx = self.stack.len() - 1 - distance;
        self.stack
            .get_mut(idx)
            .expect("bytecode never underflows the stack")
    }

    fn push(&mut self, value: Value, line: usize) -> Result<(), RuntimeError> {
        if self.stack.len() == MAX_STACK {
            return Err(RuntimeError::StackOverflow { line });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("bytecode never underflows the stack")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(src: &str) -> (Result<(), Error>, String) {
        let mut vm = VM::with_output(Vec::new());
        let result = vm.interpret(src);
        let output = String::from_utf8(vm.output().clone()).expect("printed utf-8");
        (result, output)
    }

    fn run_ok(src: &str) -> String {
        let (result, output) = run(src);
        assert!(result.is_ok(), "{src:?} failed: {result:?}");
        output
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run_ok("1 + 2 * 3"), "7\n");
        assert_eq!(run_ok("(1 + 2) * 3"), "9\n");
        assert_eq!(run_ok("6 - 3 - 2"), "1\n");
        assert_eq!(run_ok("1 + 8 / 4"), "3\n");
    }

    #[test]
    fn number_literals_round_trip() {
        assert_eq!(run_ok("1.5"), "1.5\n");
        assert_eq!(run_ok("0.25"), "0.25\n");
        assert_eq!(run_ok("7"), "7\n");
        assert_eq!(run_ok("-0.5"), "-0.5\n");
    }

    #[test]
    fn unary_operators() {
        assert_eq!(run_ok("-(1 + 2)"), "-3\n");
        assert_eq!(run_ok("--3"), "3\n");
        assert_eq!(run_ok("!true"), "false\n");
        assert_eq!(run_ok("!nil"), "true\n");
        assert_eq!(run_ok("!0"), "false\n");
        assert_eq!(run_ok("!!false"), "false\n");
    }

    #[test]
    fn equality() {
        assert_eq!(run_ok("1 == 1"), "true\n");
        assert_eq!(run_ok("1 == 2"), "false\n");
        assert_eq!(run_ok("1 != 2"), "true\n");
        assert_eq!(run_ok("nil == nil"), "true\n");
        assert_eq!(run_ok("true == true"), "true\n");
        // Different types never compare equal.
        assert_eq!(run_ok("nil == false"), "false\n");
        assert_eq!(run_ok("0 == false"), "false\n");
        assert_eq!(run_ok(r#""a" == "a""#), "true\n");
        assert_eq!(run_ok(r#""a" == "b""#), "false\n");
    }

    #[test]
    fn desugared_comparisons_match_direct_ones() {
        assert_eq!(run_ok("2 >= 2"), "true\n");
        assert_eq!(run_ok("1 >= 2"), "false\n");
        assert_eq!(run_ok("3 >= 2"), "true\n");
        assert_eq!(run_ok("2 <= 2"), "true\n");
        assert_eq!(run_ok("2 <= 1"), "false\n");
        assert_eq!(run_ok("2 > 1"), "true\n");
        assert_eq!(run_ok("2 < 1"), "false\n");
        // a >= b agrees with !(a < b) for NaN-free doubles.
        assert_eq!(run_ok("!(2 < 2)"), "true\n");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run_ok(r#""foo" + "bar""#), "foobar\n");
        assert_eq!(run_ok(r#""foo" + "bar" + "baz""#), "foobarbaz\n");
        assert_eq!(run_ok(r#""" + """#), "\n");
        assert_eq!(run_ok(r#""foo" + "bar" == "foobar""#), "true\n");
    }

    #[test]
    fn add_type_mismatch() {
        let (result, output) = run(r#"1 + "a""#);
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ExpectedNumbersOrStrings { line: 1 }))
        ));
        assert_eq!(output, "");
    }

    #[test]
    fn negate_type_mismatch() {
        let (result, _) = run(r#"-"a""#);
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ExpectedNumber { line: 1 }))
        ));
    }

    #[test]
    fn comparison_type_mismatch() {
        let (result, _) = run(r#"1 < "a""#);
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ExpectedNumbers { line: 1 }))
        ));
        let (result, _) = run("nil > 1");
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ExpectedNumbers { line: 1 }))
        ));
    }

    #[test]
    fn runtime_errors_report_their_line() {
        let (result, _) = run("\n\n-\"x\"");
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ExpectedNumber { line: 3 }))
        ));
    }

    #[test]
    fn compile_errors_are_distinguished_from_runtime_errors() {
        let (result, _) = run("(1 + 2");
        assert!(matches!(result, Err(Error::Compile)));
    }

    #[test]
    fn machine_recovers_after_a_runtime_error() {
        let mut vm = VM::with_output(Vec::new());
        assert!(vm.interpret(r#"1 + "a""#).is_err());
        // The stack was reset, so a fresh program runs normally.
        assert!(vm.interpret("1 + 2").is_ok());
        assert_eq!(String::from_utf8(vm.output().clone()).unwrap(), "3\n");
    }
}
