//! Bytecode decoder.
//!
//! A script arrives as a stream of unsigned 16-bit words. Each instruction
//! is one header word followed by the extra words its two values need:
//!
//! ```text
//! header (high to low): [op: 4][cmp: 4][target kind: 4][operand kind: 4]
//! ```
//!
//! Value kinds and the words they consume (target words come first):
//!
//! | code | kind   | words | meaning                           |
//! |------|--------|-------|-----------------------------------|
//! | 0    | ZERO   | 0     | constant 0                        |
//! | 1    | NAME   | 1     | index into the resolved id list   |
//! | 2    | IMM16S | 1     | constant, sign-extended 16-bit    |
//! | 3    | IMM16U | 1     | constant, unsigned 16-bit         |
//! | 4    | IMM32S | 2     | constant, signed 32-bit, high first |
//! | 5    | IMM32U | 2     | constant, unsigned 32-bit, high first |
//! | 6    | IMM64S | 4     | constant, signed 64-bit, high to low |
//!
//! Decoding is a single left-to-right pass. Any failure aborts the whole
//! compile; no instruction is partially accepted.

use super::instruction::{Cmp, Instruction, Op};
use super::value::{CounterRef, Value};
use crate::cache::{Cache, CounterId};
use crate::error::{Error, Result};
use std::sync::Arc;

const KIND_ZERO: u8 = 0;
const KIND_NAME: u8 = 1;
const KIND_IMM16S: u8 = 2;
const KIND_IMM16U: u8 = 3;
const KIND_IMM32S: u8 = 4;
const KIND_IMM32U: u8 = 5;
const KIND_IMM64S: u8 = 6;

/// Bounds-checked cursor over the word stream.
struct CodeReader<'a> {
    words: &'a [u16],
    offset: usize,
}

impl<'a> CodeReader<'a> {
    fn new(words: &'a [u16]) -> Self {
        Self { words, offset: 0 }
    }

    fn has_more(&self) -> bool {
        self.offset < self.words.len()
    }

    fn next(&mut self) -> Result<u16> {
        match self.words.get(self.offset) {
            Some(&word) => {
                self.offset += 1;
                Ok(word)
            }
            None => Err(Error::incomplete("code incomplete")),
        }
    }
}

/// Decodes a word stream into an instruction sequence against an already
/// resolved counter-id list.
pub(crate) fn compile(
    code: &[u16],
    ids: &[CounterId],
    cache: &Arc<Cache>,
) -> Result<Vec<Instruction>> {
    let mut reader = CodeReader::new(code);
    let mut instructions = Vec::new();

    while reader.has_more() {
        let header = reader.next()?;
        let op = Op::from_code(((header >> 12) & 0xF) as u8);
        let cmp = Cmp::from_code(((header >> 8) & 0xF) as u8);

        // Target words precede operand words in the stream.
        let target = decode_target(&mut reader, ((header >> 4) & 0xF) as u8, ids, cache)?;
        let operand = decode_value(&mut reader, (header & 0xF) as u8, ids, cache)?;

        instructions.push(Instruction { op, cmp, target, operand });
    }

    Ok(instructions)
}

fn decode_target(
    reader: &mut CodeReader<'_>,
    kind: u8,
    ids: &[CounterId],
    cache: &Arc<Cache>,
) -> Result<CounterRef> {
    if kind != KIND_NAME {
        return Err(Error::InvalidTarget(format!(
            "target kind {:#x} is not a named counter",
            kind
        )));
    }
    counter_ref(reader.next()? as usize, ids, cache)
}

fn counter_ref(index: usize, ids: &[CounterId], cache: &Arc<Cache>) -> Result<CounterRef> {
    match ids.get(index) {
        Some(&id) => Ok(CounterRef::new(id, Arc::clone(cache))),
        None => Err(Error::IndexOutOfRange { index, len: ids.len() }),
    }
}

fn decode_value(
    reader: &mut CodeReader<'_>,
    kind: u8,
    ids: &[CounterId],
    cache: &Arc<Cache>,
) -> Result<Value> {
    match kind {
        KIND_ZERO => Ok(Value::Constant(0)),
        KIND_NAME => Ok(Value::Counter(counter_ref(reader.next()? as usize, ids, cache)?)),
        KIND_IMM16S => Ok(Value::Constant(reader.next()? as i16 as i64)),
        KIND_IMM16U => Ok(Value::Constant(reader.next()? as i64)),
        KIND_IMM32S => {
            let hi = reader.next()? as u32;
            let lo = reader.next()? as u32;
            Ok(Value::Constant((hi << 16 | lo) as i32 as i64))
        }
        KIND_IMM32U => {
            let hi = reader.next()? as u32;
            let lo = reader.next()? as u32;
            Ok(Value::Constant((hi << 16 | lo) as i64))
        }
        KIND_IMM64S => {
            let mut value: u64 = 0;
            for _ in 0..4 {
                value = value << 16 | reader.next()? as u64;
            }
            Ok(Value::Constant(value as i64))
        }
        _ => Err(Error::InvalidValueKind(kind)),
    }
}
