use std::collections::{HashMap as StdHashMap, HashSet as StdHashSet};
use std::hash::BuildHasherDefault;
use nohash_hasher::IntMap;
use twox_hash::XxHash64;

pub mod node_queue;

/// Map with composite keys, e.g. `(VarId, block)` pairs of linking rows
pub type FullHashMap<K, V> = StdHashMap<K, V, BuildHasherDefault<XxHash64>>;

/// Set of constraint indices
pub type HashSet<K> = StdHashSet<K, BuildHasherDefault<XxHash64>>;

/// Map keyed by variable or column ids, the id is its own hash
pub type HashMap<K, V> = IntMap<K, V>;
