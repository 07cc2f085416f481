// Small shared utilities used across optimizer modules that don't belong
// to any single component.

/// Bounded HashMap with LRU eviction, used by the plan cache.
pub mod bounded_map;
pub use bounded_map::BoundedHashMap;
