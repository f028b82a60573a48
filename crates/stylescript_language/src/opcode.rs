//! Bytecode instruction set for the stylescript VM.
//!
//! The VM is stack-based. Most operations consume operands from the stack
//! and push results back. Operand indices into the constant pool name
//! globals and properties as well as literals.

#![allow(clippy::doc_markdown)]

/// A single bytecode instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    // === Stack Operations ===
    /// Push a constant from the constant pool.
    Const(u16),
    /// Push `undefined`.
    Undefined,
    /// Push `null`.
    Null,
    /// Push `true`.
    True,
    /// Push `false`.
    False,
    /// Pop and discard the top of stack.
    Pop,
    /// Duplicate the top of stack.
    Dup,
    /// Duplicate the top two values: `[a, b] -> [a, b, a, b]`
    Dup2,
    /// Swap the top two values: `[a, b] -> [b, a]`
    Swap,

    // === Variables ===
    /// Push a local slot.
    LoadLocal(u16),
    /// Store top of stack into a local slot (value stays on the stack).
    StoreLocal(u16),
    /// Push the value of a frame cell (a local captured by a closure).
    LoadCell(u16),
    /// Store top of stack into a frame cell (value stays on the stack).
    StoreCell(u16),
    /// Push the value of a closure upvalue.
    LoadUpvalue(u16),
    /// Store top of stack into a closure upvalue (value stays on the stack).
    StoreUpvalue(u16),
    /// Push a global named by a constant; missing globals raise ReferenceError.
    LoadGlobal(u16),
    /// Store top of stack into a global (value stays on the stack).
    StoreGlobal(u16),
    /// Push `typeof` of a global without raising for missing names.
    TypeOfGlobal(u16),
    /// Define a global as `undefined` unless it already exists.
    DeclareGlobal(u16),
    /// Push the function object being executed.
    LoadCallee,
    /// Push the `this` value of the current call.
    LoadThis,

    // === Properties ===
    /// Named property read: `[obj] -> [obj.name]`
    GetProp(u16),
    /// Named property write: `[obj, value] -> [value]`
    SetProp(u16),
    /// Computed property read: `[obj, key] -> [obj[key]]`
    GetIndex,
    /// Computed property write: `[obj, key, value] -> [value]`
    SetIndex,

    // === Literals ===
    /// Collect the top `n` values into an array.
    NewArray(u16),
    /// Push an empty object.
    NewObject,
    /// Literal property definition: `[obj, value] -> [obj]`
    InitProp(u16),
    /// Instantiate a nested function prototype as a closure.
    MakeClosure(u16),

    // === Arithmetic ===
    /// Add or concatenate: `[a, b] -> [a + b]`
    Add,
    /// Subtract: `[a, b] -> [a - b]`
    Sub,
    /// Multiply: `[a, b] -> [a * b]`
    Mul,
    /// Divide: `[a, b] -> [a / b]`
    Div,
    /// Remainder: `[a, b] -> [a % b]`
    Mod,
    /// Negate: `[a] -> [-a]`
    Neg,
    /// Numeric conversion: `[a] -> [+a]`
    ToNumber,

    // === Bitwise ===
    /// `[a, b] -> [a & b]`
    BitAnd,
    /// `[a, b] -> [a | b]`
    BitOr,
    /// `[a, b] -> [a ^ b]`
    BitXor,
    /// `[a] -> [~a]`
    BitNot,
    /// `[a, b] -> [a << b]`
    Shl,
    /// `[a, b] -> [a >> b]`
    Shr,
    /// `[a, b] -> [a >>> b]`
    UShr,

    // === Comparison ===
    /// Loose equality: `[a, b] -> [a == b]`
    Eq,
    /// Loose inequality: `[a, b] -> [a != b]`
    Ne,
    /// Strict equality: `[a, b] -> [a === b]`
    StrictEq,
    /// Strict inequality: `[a, b] -> [a !== b]`
    StrictNe,
    /// `[a, b] -> [a < b]`
    Lt,
    /// `[a, b] -> [a <= b]`
    Le,
    /// `[a, b] -> [a > b]`
    Gt,
    /// `[a, b] -> [a >= b]`
    Ge,
    /// Property presence: `[key, obj] -> [key in obj]`
    In,

    // === Logic ===
    /// Logical not: `[a] -> [!a]`
    Not,
    /// `[a] -> [typeof a]`
    TypeOf,

    // === Control Flow ===
    /// Unconditional jump (offset relative to the next instruction).
    Jump(i32),
    /// Pop and jump if falsy.
    JumpIfFalse(i32),
    /// Pop and jump if truthy.
    JumpIfTrue(i32),
    /// Jump if the top of stack is falsy, leaving it in place.
    JumpIfFalseKeep(i32),
    /// Jump if the top of stack is truthy, leaving it in place.
    JumpIfTrueKeep(i32),
    /// Call with `n` arguments: `[callee, this, args...] -> [result]`
    Call(u8),
    /// Return from function, top of stack is return value.
    Return,
    /// Raise the top of stack as an error.
    Throw,
}

/// A sequence of bytecode instructions with a parallel line table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bytecode {
    /// The instructions.
    pub ops: Vec<Opcode>,
    /// Source line of each instruction.
    pub lines: Vec<u32>,
}

impl Bytecode {
    /// Creates an empty bytecode sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, op: Opcode, line: u32) -> usize {
        let idx = self.ops.len();
        self.ops.push(op);
        self.lines.push(line);
        idx
    }

    /// Returns the current instruction count (next instruction index).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the source line of the instruction at `idx`.
    #[must_use]
    pub fn line_at(&self, idx: usize) -> Option<u32> {
        self.lines.get(idx).copied()
    }

    /// Points the jump at `idx` to `target`.
    ///
    /// # Panics
    /// Panics if the instruction at `idx` is not a jump instruction.
    pub fn patch_jump(&mut self, idx: usize, target: usize) {
        let offset = jump_offset(idx, target);
        match &mut self.ops[idx] {
            Opcode::Jump(o)
            | Opcode::JumpIfFalse(o)
            | Opcode::JumpIfTrue(o)
            | Opcode::JumpIfFalseKeep(o)
            | Opcode::JumpIfTrueKeep(o) => *o = offset,
            other => panic!("Cannot patch non-jump instruction: {other:?}"),
        }
    }
}

/// Offset from the instruction after `from` to `to`.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
#[must_use]
pub fn jump_offset(from: usize, to: usize) -> i32 {
    to as i32 - (from as i32 + 1)
}
