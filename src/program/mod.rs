//! Compiled transaction scripts and their execution.
//!
//! A script is a straight line of compare-then-mutate instructions over
//! named counters and constants: no branches, no loops, no calls. The
//! [`Program`] type holds the decoded instruction sequence and walks it
//! exactly once, in encoded order, collecting one result per instruction.
//!
//! ## Lifecycle
//!
//! 1. **compile**: decode the bytecode against the resolved counter ids;
//!    any malformed encoding rejects the whole script.
//! 2. **hydrate**: counters referenced but not yet cached are fetched from
//!    durable storage and seeded into the cache (not dirtied).
//! 3. **run**: synchronous, never yields, never fails. Writes land in the
//!    shared cache immediately, so later instructions observe earlier
//!    results within the same script.
//!
//! Durability of the writes is not the program's concern; the counters are
//! dirty in the cache after `run` and the background pipeline picks them up
//! from there.

mod decoder;
pub mod instruction;
pub mod value;

pub use instruction::{Cmp, Instruction, Op};
pub use value::{CounterRef, Value};

use crate::cache::{Cache, CounterId};
use crate::error::Result;
use crate::storage::Storage;
use std::sync::Arc;

/// A compiled script: resolved counter ids, decoded instructions, and the
/// results produced by running them.
///
/// A program is created once per request, executed once, and discarded
/// after its results are taken.
pub struct Program {
    ids: Vec<CounterId>,
    instructions: Vec<Instruction>,
    results: Vec<i64>,
}

impl Program {
    /// Decodes `code` into a program against the resolved id list.
    ///
    /// Fails with a compile error on a truncated stream, a non-counter
    /// target, an out-of-range counter index, or an unknown value kind.
    /// No partial program is ever produced.
    pub fn compile(code: &[u16], ids: Vec<CounterId>, cache: &Arc<Cache>) -> Result<Self> {
        let instructions = decoder::compile(code, &ids, cache)?;
        Ok(Self { ids, instructions, results: Vec::new() })
    }

    /// Fetches referenced counters that are not yet cached from durable
    /// storage and seeds them into the cache without dirtying them.
    pub fn hydrate(&self, cache: &Cache, storage: &dyn Storage) -> Result<()> {
        for &id in &self.ids {
            if cache.contains(id) {
                continue;
            }
            let Some(name) = cache.name_of(id) else { continue };
            if let Some(value) = storage.load(&name)? {
                log::debug!("hydrated counter {:?} = {}", name, value);
                cache.seed(id, value);
            }
        }
        Ok(())
    }

    /// Executes every instruction exactly once, in encoded order.
    pub fn run(&mut self) {
        self.results.reserve(self.instructions.len());
        for ins in &self.instructions {
            self.results.push(ins.run());
        }
    }

    /// The results produced so far, one per executed instruction.
    pub fn results(&self) -> &[i64] {
        &self.results
    }

    /// Consumes the program, returning its results.
    pub fn into_results(self) -> Vec<i64> {
        self.results
    }

    /// Number of decoded instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the script decoded to no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
