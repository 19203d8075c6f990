// KEY-VALUE STORE & OVERLAYS
// Committed state is a sorted map. Every unit of work that may be discarded
// (a transaction, a proposal evaluation, a block) runs against an overlay
// that buffers writes and is either merged into its parent or dropped.
//
// SAFETY INVARIANTS:
// 1. Iteration order is byte-lexicographic on keys
// 2. A dropped overlay leaves its parent untouched
// 3. The root hash depends only on the key-value contents

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// All live entries whose key starts with `prefix`, in key order.
    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory committed store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 over the length-prefixed entries in key order.
    pub fn root_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (key, value) in &self.entries {
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value);
        }
        hasher.finalize().into()
    }

    pub fn apply(&mut self, changeset: Changeset) {
        for (key, value) in changeset.writes {
            match value {
                Some(v) => {
                    self.entries.insert(key, v);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Buffered writes of an overlay. `None` marks a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn write_to(self, target: &mut dyn KvStore) {
        for (key, value) in self.writes {
            match value {
                Some(v) => target.set(&key, v),
                None => target.delete(&key),
            }
        }
    }

    fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.writes.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Option<Vec<u8>>) {
        self.writes.insert(key.to_vec(), value);
    }

    /// Overlays buffered writes on the parent's entries for `prefix`.
    fn merge_prefix(&self, parent: Vec<(Vec<u8>, Vec<u8>)>, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = parent.into_iter().collect();
        for (key, value) in self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }
}

/// Borrowing overlay on top of any store. Used per transaction.
pub struct CacheStore<'a> {
    parent: &'a dyn KvStore,
    changes: Changeset,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a dyn KvStore) -> Self {
        CacheStore {
            parent,
            changes: Changeset::default(),
        }
    }

    pub fn into_changeset(self) -> Changeset {
        self.changes
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.changes.get(key) {
            Some(value) => value,
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.changes.set(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.changes.set(key, None);
    }

    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.changes
            .merge_prefix(self.parent.prefix_entries(prefix), prefix)
    }
}

/// Owning overlay on a committed snapshot. Lives for the span of one block
/// (or one proposal evaluation) and is merged at commit.
#[derive(Debug, Clone)]
pub struct BlockStore {
    base: Arc<MemStore>,
    changes: Changeset,
}

impl BlockStore {
    pub fn new(base: Arc<MemStore>) -> Self {
        BlockStore {
            base,
            changes: Changeset::default(),
        }
    }

    pub fn into_changeset(self) -> Changeset {
        self.changes
    }

    pub fn base(&self) -> &MemStore {
        &self.base
    }
}

impl KvStore for BlockStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.changes.get(key) {
            Some(value) => value,
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.changes.set(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.changes.set(key, None);
    }

    fn prefix_entries(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.changes
            .merge_prefix(self.base.prefix_entries(prefix), prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_discard_leaves_parent() {
        let mut base = MemStore::new();
        base.set(b"a", b"1".to_vec());
        {
            let mut cache = CacheStore::new(&base);
            cache.set(b"a", b"2".to_vec());
            cache.set(b"b", b"3".to_vec());
            assert_eq!(cache.get(b"a"), Some(b"2".to_vec()));
        }
        assert_eq!(base.get(b"a"), Some(b"1".to_vec()));
        assert!(!base.has(b"b"));
    }

    #[test]
    fn test_cache_write_and_delete() {
        let mut base = MemStore::new();
        base.set(b"k1", b"x".to_vec());
        base.set(b"k2", b"y".to_vec());
        let mut cache = CacheStore::new(&base);
        cache.delete(b"k1");
        cache.set(b"k3", b"z".to_vec());
        assert_eq!(
            cache.prefix_entries(b"k"),
            vec![(b"k2".to_vec(), b"y".to_vec()), (b"k3".to_vec(), b"z".to_vec())]
        );
        let changes = cache.into_changeset();
        base.apply(changes);
        assert!(!base.has(b"k1"));
        assert_eq!(base.get(b"k3"), Some(b"z".to_vec()));
    }

    #[test]
    fn test_nested_overlays() {
        let base = Arc::new(MemStore::new());
        let mut block = BlockStore::new(base.clone());
        block.set(b"a", b"1".to_vec());
        let mut tx = CacheStore::new(&block);
        tx.set(b"b", b"2".to_vec());
        let changes = tx.into_changeset();
        changes.write_to(&mut block);
        assert_eq!(block.get(b"b"), Some(b"2".to_vec()));
        assert!(base.is_empty());
    }

    #[test]
    fn test_root_hash_is_content_addressed() {
        let mut a = MemStore::new();
        a.set(b"x", b"1".to_vec());
        a.set(b"y", b"2".to_vec());
        let mut b = MemStore::new();
        b.set(b"y", b"2".to_vec());
        b.set(b"x", b"1".to_vec());
        assert_eq!(a.root_hash(), b.root_hash());
        b.set(b"x", b"3".to_vec());
        assert_ne!(a.root_hash(), b.root_hash());
        // Length prefixes keep key/value boundaries unambiguous.
        let mut c = MemStore::new();
        c.set(b"xy", b"".to_vec());
        let mut d = MemStore::new();
        d.set(b"x", b"y".to_vec());
        assert_ne!(c.root_hash(), d.root_hash());
    }
}
