use std::sync::Arc;

use crate::bind::FieldAccessor;

/// Per-type field dispatch: 64-bit name hash to accessor, with a
/// secondary table over the case-insensitive hash. Built once at
/// binding construction; read-only afterwards, so concurrent decode
/// calls share it without locking.
///
/// Open-addressed power-of-two buckets, linear probing. Slots store
/// accessor index + 1 so zero means empty.
#[derive(Clone)]
pub struct FieldTable {
    accessors: Vec<Arc<dyn FieldAccessor>>,
    buckets: Box<[u32]>,
    lcase_buckets: Box<[u32]>,
    mask: u64,
}

impl FieldTable {
    pub fn new(accessors: Vec<Arc<dyn FieldAccessor>>) -> Self {
        let capacity = (accessors.len().max(1) * 2).next_power_of_two();
        let mask = capacity as u64 - 1;
        let mut buckets = vec![0u32; capacity].into_boxed_slice();
        let mut lcase_buckets = vec![0u32; capacity].into_boxed_slice();
        for (index, accessor) in accessors.iter().enumerate() {
            insert(&mut buckets, mask, accessor.hash(), index as u32);
            insert(&mut lcase_buckets, mask, accessor.lcase_hash(), index as u32);
        }
        Self {
            accessors,
            buckets,
            lcase_buckets,
            mask,
        }
    }

    pub fn lookup(&self, hash: u64) -> Option<&Arc<dyn FieldAccessor>> {
        self.probe(&self.buckets, hash, |accessor| accessor.hash())
    }

    pub fn lookup_lcase(&self, hash: u64) -> Option<&Arc<dyn FieldAccessor>> {
        self.probe(&self.lcase_buckets, hash, |accessor| accessor.lcase_hash())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FieldAccessor>> {
        self.lookup(crate::utils::hash64_str(name))
    }

    /// Accessors in declaration order, for positional array mapping.
    pub fn in_order(&self) -> impl Iterator<Item = &Arc<dyn FieldAccessor>> {
        self.accessors.iter()
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    fn probe(
        &self,
        buckets: &[u32],
        hash: u64,
        key: impl Fn(&dyn FieldAccessor) -> u64,
    ) -> Option<&Arc<dyn FieldAccessor>> {
        let mut slot = (hash & self.mask) as usize;
        loop {
            match buckets[slot] {
                0 => return None,
                stored => {
                    let accessor = &self.accessors[stored as usize - 1];
                    if key(accessor.as_ref()) == hash {
                        return Some(accessor);
                    }
                }
            }
            slot = (slot + 1) & self.mask as usize;
        }
    }
}

fn insert(buckets: &mut [u32], mask: u64, hash: u64, index: u32) {
    let mut slot = (hash & mask) as usize;
    loop {
        match buckets[slot] {
            0 => {
                buckets[slot] = index + 1;
                return;
            }
            _ => slot = (slot + 1) & mask as usize,
        }
    }
}

impl std::fmt::Debug for FieldTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldTable")
            .field("len", &self.accessors.len())
            .finish()
    }
}
