//! Instruction semantics: guarded compare-then-mutate over two values.

use super::value::{CounterRef, Value};

/// Mutation opcode, the high 4 bits of an instruction header.
///
/// Wire codes 0 through 4 in declaration order; every other code decodes to
/// [`Op::Nop`], which leaves the counter unchanged. Reserved codes acting
/// as no-ops is load-bearing for existing scripts and must not be tightened
/// into a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Replace the target with the operand.
    Set,
    /// Increment the target by one.
    Inc,
    /// Decrement the target by one.
    Dec,
    /// Add the operand to the target.
    Add,
    /// Subtract the operand from the target.
    Sub,
    /// Identity: the target keeps its value (reserved opcode).
    Nop,
}

impl Op {
    /// Decodes a 4-bit opcode. Unknown codes map to [`Op::Nop`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Op::Set,
            1 => Op::Inc,
            2 => Op::Dec,
            3 => Op::Add,
            4 => Op::Sub,
            _ => Op::Nop,
        }
    }

    /// Applies the operation to `(a, b)`. Arithmetic wraps, so execution
    /// can never fail.
    pub fn apply(self, a: i64, b: i64) -> i64 {
        match self {
            Op::Set => b,
            Op::Inc => a.wrapping_add(1),
            Op::Dec => a.wrapping_sub(1),
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Nop => a,
        }
    }
}

/// Guard condition, bits 8..12 of an instruction header.
///
/// Wire codes 0 through 5 in declaration order; every other code decodes to
/// [`Cmp::Always`] (unconditional), matching the reserved-code policy of
/// [`Op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Holds when target == operand.
    Eq,
    /// Holds when target != operand.
    Neq,
    /// Holds when target < operand.
    Lt,
    /// Holds when target > operand.
    Gt,
    /// Holds when target <= operand.
    Le,
    /// Holds when target >= operand.
    Ge,
    /// Always holds (reserved comparison code).
    Always,
}

impl Cmp {
    /// Decodes a 4-bit comparison code. Unknown codes map to
    /// [`Cmp::Always`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Cmp::Eq,
            1 => Cmp::Neq,
            2 => Cmp::Lt,
            3 => Cmp::Gt,
            4 => Cmp::Le,
            5 => Cmp::Ge,
            _ => Cmp::Always,
        }
    }

    /// Evaluates the guard for `(a, b)`.
    pub fn holds(self, a: i64, b: i64) -> bool {
        match self {
            Cmp::Eq => a == b,
            Cmp::Neq => a != b,
            Cmp::Lt => a < b,
            Cmp::Gt => a > b,
            Cmp::Le => a <= b,
            Cmp::Ge => a >= b,
            Cmp::Always => true,
        }
    }
}

/// One guarded mutation: `if cmp(target, operand) { target = op(target, operand) }`.
///
/// The target is always a counter; the decoder rejects anything else before
/// an `Instruction` can exist.
#[derive(Debug)]
pub struct Instruction {
    /// Mutation applied when the guard holds.
    pub op: Op,
    /// Guard condition.
    pub cmp: Cmp,
    /// The counter being mutated.
    pub target: CounterRef,
    /// The second operand.
    pub operand: Value,
}

impl Instruction {
    /// Executes the instruction and returns its result.
    ///
    /// A failing guard yields the target's unchanged value. Either way the
    /// result is written back to the target, so even a no-op execution
    /// dirties the counter for the next rotation. The redundant write-back
    /// is an observable side effect, not an optimization target.
    pub fn run(&self) -> i64 {
        let a = self.target.get();
        let b = self.operand.get();
        let result = if self.cmp.holds(a, b) { self.op.apply(a, b) } else { a };
        self.target.set(result);
        result
    }
}
