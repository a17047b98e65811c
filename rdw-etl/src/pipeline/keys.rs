use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Dimension entity classes that receive surrogate keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Customer,
    Product,
}

/// Allocates surrogate keys, monotonic per entity type.
///
/// Keys are append-only: seeding moves the counter past the prior state's
/// maximum, so a key is never reused even if its natural key is later
/// retired. Key 0 is reserved for unresolved references.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    next: HashMap<EntityType, i64>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, entity: EntityType, max_existing: i64) {
        let next = self.next.entry(entity).or_insert(1);
        if max_existing >= *next {
            *next = max_existing + 1;
        }
    }

    pub fn next_key(&mut self, entity: EntityType) -> i64 {
        let next = self.next.entry(entity).or_insert(1);
        let key = *next;
        *next += 1;
        key
    }
}

/// Content digest over the tracked attribute set of a dimension entity.
///
/// Pairs are sorted by attribute name before hashing, so the digest is
/// independent of iteration order and stable across runs. Provenance and
/// audit fields must never be passed in.
pub fn compute_row_hash(attributes: &[(&str, String)]) -> String {
    let mut pairs: Vec<&(&str, String)> = attributes.iter().collect();
    pairs.sort_by_key(|pair| pair.0);

    let mut hasher = Sha256::new();
    for (name, value) in pairs {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}
