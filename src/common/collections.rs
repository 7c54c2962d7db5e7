//! Hash collections used throughout the crate.
//!
//! Keys are small (window ids, group keys), so the fx hasher is a better fit
//! than siphash everywhere in the hot resolver paths.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
pub use std::collections::BTreeMap;
