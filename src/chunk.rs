//! Chunks of bytecode, the compiler's write target and the VM's read source.

use std::io;

use itertools::Itertools;

use crate::{Heap, OpCode, Value};

/// The constant pool is addressed by a single-byte operand, so it can hold
/// at most this many values.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// A chunk is a sequence of instructions plus the data they refer to. The
/// compiler writes into it and the virtual machine later reads from it; the
/// chunk itself has no behavior of its own.
///
/// Each instruction is paired with the source line it was compiled from, so
/// runtime errors can report where they happened.
///
/// # Examples
///
/// ```
/// use skiff::{Chunk, OpCode, Value};
///
/// let mut chunk = Chunk::default();
/// let const_id = chunk.add_const(Value::Number(1.0)).expect("pool has room");
/// assert!(matches!(chunk.read_const(const_id), &Value::Number(1.0)));
///
/// chunk.write(OpCode::Constant(const_id), 1);
/// assert!(matches!(chunk.read_instruction(0), (&OpCode::Constant(0), 1)));
/// ```
#[derive(Default, Debug)]
pub struct Chunk {
    instructions: Vec<OpCode>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    /// Append an instruction to the chunk, recording the source line that
    /// produced it.
    pub fn write(&mut self, code: OpCode, line: usize) {
        self.instructions.push(code);
        self.lines.push(line);
    }

    /// Read the instruction at the index together with its source line.
    pub fn read_instruction(&self, idx: usize) -> (&OpCode, usize) {
        (&self.instructions[idx], self.lines[idx])
    }

    /// The instructions written so far.
    pub fn code(&self) -> &[OpCode] {
        &self.instructions
    }

    /// Add a value to the constant pool and return its index, or `None`
    /// when the pool is full. The caller reports the compile error; the
    /// chunk just refuses the write.
    pub fn add_const(&mut self, value: Value) -> Option<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return None;
        }
        self.constants.push(value);
        Some((self.constants.len() - 1) as u8)
    }

    /// Read the constant at the given pool index.
    pub fn read_const(&self, idx: u8) -> &Value {
        &self.constants[idx as usize]
    }

    /// Write a human-readable listing of the chunk's instructions.
    ///
    /// Repeated source lines are collapsed to `   | ` in the listing, the
    /// same way the line table itself stays queryable per instruction.
    pub fn disassemble<W: io::Write>(&self, name: &str, heap: &Heap, out: &mut W) -> io::Result<()> {
        writeln!(out, "== {} ==", name)?;
        let mut prev_line = None;
        for (idx, (code, &line)) in self.instructions.iter().zip_eq(&self.lines).enumerate() {
            write!(out, "{:04} ", idx)?;
            if prev_line == Some(line) {
                write!(out, "   | ")?;
            } else {
                write!(out, "{:4} ", line)?;
            }
            prev_line = Some(line);
            match code {
                OpCode::Constant(id) => writeln!(
                    out,
                    "{:<16} {:4} '{}'",
                    "OP_CONSTANT",
                    id,
                    self.read_const(*id).as_string(heap)
                )?,
                code => writeln!(out, "{}", mnemonic(code))?,
            }
        }
        Ok(())
    }
}

fn mnemonic(code: &OpCode) -> &'static str {
    match code {
        OpCode::Constant(_) => "OP_CONSTANT",
        OpCode::Nil => "OP_NIL",
        OpCode::True => "OP_TRUE",
        OpCode::False => "OP_FALSE",
        OpCode::Not => "OP_NOT",
        OpCode::Negate => "OP_NEGATE",
        OpCode::Equal => "OP_EQUAL",
        OpCode::Greater => "OP_GREATER",
        OpCode::Less => "OP_LESS",
        OpCode::Add => "OP_ADD",
        OpCode::Subtract => "OP_SUBTRACT",
        OpCode::Multiply => "OP_MULTIPLY",
        OpCode::Divide => "OP_DIVIDE",
        OpCode::Print => "OP_PRINT",
        OpCode::Return => "OP_RETURN",
    }
}
