//! Operand values: constants and counter-backed handles.

use crate::cache::{Cache, CounterId};
use std::fmt;
use std::sync::Arc;

/// A writable handle to one counter slot in the shared cache.
///
/// Reads return the cached value (0 if never written); writes go straight
/// through to the cache and mark the counter dirty for the next rotation.
pub struct CounterRef {
    id: CounterId,
    cache: Arc<Cache>,
}

impl CounterRef {
    /// Binds a counter id to the cache it lives in.
    pub fn new(id: CounterId, cache: Arc<Cache>) -> Self {
        Self { id, cache }
    }

    /// The counter id this handle is bound to.
    pub fn id(&self) -> CounterId {
        self.id
    }

    /// Reads the counter's current cached value.
    pub fn get(&self) -> i64 {
        self.cache.get(self.id)
    }

    /// Writes through to the cache slot, dirtying it.
    pub fn set(&self, value: i64) {
        self.cache.set(self.id, value);
    }
}

impl fmt::Debug for CounterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CounterRef").field(&self.id).finish()
    }
}

/// An instruction operand: either an inline constant or a counter.
///
/// Only the counter variant is writable, and it is a distinct type
/// ([`CounterRef`]): an instruction target is a `CounterRef`, never a
/// `Value`, so writing a constant cannot be expressed at all.
#[derive(Debug)]
pub enum Value {
    /// A read-only constant decoded from the bytecode.
    Constant(i64),

    /// A counter read through the shared cache.
    Counter(CounterRef),
}

impl Value {
    /// Reads the operand's current value.
    pub fn get(&self) -> i64 {
        match self {
            Value::Constant(v) => *v,
            Value::Counter(r) => r.get(),
        }
    }
}
