//! In-memory counter store with dirty tracking.
//!
//! The cache is the single piece of shared mutable state in the engine.
//! Request threads resolve names, read and write counter values through it;
//! the durability pipeline periodically detaches everything written since
//! the last rotation and carries it to storage.
//!
//! ## Thread Safety
//!
//! All state lives behind one `parking_lot::RwLock` with narrow critical
//! sections. `rotate()` swaps the dirty set out under the write lock, so
//! every write belongs to exactly one rotation epoch: it is either still in
//! the live dirty set or already part of a detached batch, never both and
//! never neither.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Stable handle for a named counter, assigned when the name is first
/// resolved and never reassigned afterwards.
pub type CounterId = u32;

/// One rotation's worth of counter writes: counter name to its value at
/// rotation time.
pub type Batch = BTreeMap<String, i64>;

#[derive(Default)]
struct Inner {
    /// Name to id, the authoritative assignment.
    ids: HashMap<String, CounterId>,

    /// Id to name, indexed by id (ids are assigned densely).
    names: Vec<String>,

    /// Live counter values. Absent means never written and never seeded.
    values: HashMap<CounterId, i64>,

    /// Ids written since the last rotation.
    dirty: HashSet<CounterId>,
}

/// Shared counter store.
///
/// # Example
///
/// ```rust
/// use countdb::Cache;
///
/// let cache = Cache::new();
/// let ids = cache.acquire(&["hits", "misses"]);
/// cache.set(ids[0], 41);
/// assert_eq!(cache.get(ids[0]), 41);
/// assert_eq!(cache.get(ids[1]), 0);
///
/// let batch = cache.rotate();
/// assert_eq!(batch.get("hits"), Some(&41));
/// ```
#[derive(Default)]
pub struct Cache {
    inner: RwLock<Inner>,
}

impl Cache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves each name to its counter id, allocating ids for names seen
    /// for the first time. The returned ids are positional with the input.
    pub fn acquire<S: AsRef<str>>(&self, names: &[S]) -> Vec<CounterId> {
        let mut inner = self.inner.write();
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                match inner.ids.get(name).copied() {
                    Some(id) => id,
                    None => {
                        let id = inner.names.len() as CounterId;
                        inner.ids.insert(name.to_string(), id);
                        inner.names.push(name.to_string());
                        id
                    }
                }
            })
            .collect()
    }

    /// Returns the counter's current value, 0 if never written.
    pub fn get(&self, id: CounterId) -> i64 {
        self.inner.read().values.get(&id).copied().unwrap_or(0)
    }

    /// Writes a counter value and marks it dirty for the next rotation.
    pub fn set(&self, id: CounterId, value: i64) {
        let mut inner = self.inner.write();
        inner.values.insert(id, value);
        inner.dirty.insert(id);
    }

    /// Installs a value fetched from durable storage, without dirtying it.
    /// Does nothing if the slot already holds a value (a concurrent write
    /// wins over a hydrate).
    pub fn seed(&self, id: CounterId, value: i64) {
        let mut inner = self.inner.write();
        inner.values.entry(id).or_insert(value);
    }

    /// Returns true if the counter slot holds a value.
    pub fn contains(&self, id: CounterId) -> bool {
        self.inner.read().values.contains_key(&id)
    }

    /// Returns the name a counter id was assigned for.
    pub fn name_of(&self, id: CounterId) -> Option<String> {
        self.inner.read().names.get(id as usize).cloned()
    }

    /// Atomically detaches the set of counters written since the last
    /// rotation and resets dirty tracking. Cached values stay readable
    /// throughout; only the dirty marks move out.
    pub fn rotate(&self) -> Batch {
        let mut inner = self.inner.write();
        let dirty = std::mem::take(&mut inner.dirty);
        dirty
            .into_iter()
            .map(|id| {
                let name = inner.names[id as usize].clone();
                let value = inner.values.get(&id).copied().unwrap_or(0);
                (name, value)
            })
            .collect()
    }

    /// Number of counters with an assigned id.
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Returns true if no counter has been named yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_stable_and_positional() {
        let cache = Cache::new();
        let first = cache.acquire(&["a", "b", "c"]);
        assert_eq!(first, vec![0, 1, 2]);

        // Re-resolving mixes known and new names; known ids are unchanged.
        let second = cache.acquire(&["c", "d", "a"]);
        assert_eq!(second, vec![2, 3, 0]);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_get_defaults_to_zero() {
        let cache = Cache::new();
        let ids = cache.acquire(&["fresh"]);
        assert_eq!(cache.get(ids[0]), 0);
        assert!(!cache.contains(ids[0]));
    }

    #[test]
    fn test_set_marks_dirty_and_rotate_resets() {
        let cache = Cache::new();
        let ids = cache.acquire(&["x", "y"]);
        cache.set(ids[0], 10);
        cache.set(ids[1], -3);

        let batch = cache.rotate();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch["x"], 10);
        assert_eq!(batch["y"], -3);

        // Values survive the rotation, dirty marks do not.
        assert_eq!(cache.get(ids[0]), 10);
        assert!(cache.rotate().is_empty());
    }

    #[test]
    fn test_rewrite_same_value_still_dirties() {
        let cache = Cache::new();
        let ids = cache.acquire(&["n"]);
        cache.set(ids[0], 5);
        cache.rotate();

        // Writing back an unchanged value is an observable side effect.
        cache.set(ids[0], 5);
        let batch = cache.rotate();
        assert_eq!(batch["n"], 5);
    }

    #[test]
    fn test_seed_does_not_dirty_and_loses_to_writes() {
        let cache = Cache::new();
        let ids = cache.acquire(&["hydrated", "written"]);

        cache.seed(ids[0], 100);
        assert_eq!(cache.get(ids[0]), 100);
        assert!(cache.rotate().is_empty());

        cache.set(ids[1], 7);
        cache.seed(ids[1], 999);
        assert_eq!(cache.get(ids[1]), 7);
    }

    #[test]
    fn test_name_of() {
        let cache = Cache::new();
        let ids = cache.acquire(&["alpha"]);
        assert_eq!(cache.name_of(ids[0]).as_deref(), Some("alpha"));
        assert_eq!(cache.name_of(42), None);
    }
}
