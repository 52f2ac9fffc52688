//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruReplacer`] - Least recently used, with a caller-supplied filter

mod lru;

pub use lru::LruReplacer;
