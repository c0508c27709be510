//! In-memory vector search over report chunks.
//!
//! The index is built once (`IndexBuilder::build`) and is read-only
//! afterwards, so a single instance can serve concurrent queries behind an
//! `Arc` without locking.

pub mod builder;
pub mod index;
pub mod retriever;

pub use builder::{BuildStats, IndexBuilder, DEFAULT_EMBED_BATCH};
pub use index::{Neighbor, VectorIndex};
pub use retriever::{Retriever, CONTEXT_SEPARATOR};
