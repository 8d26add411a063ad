//! Tandem memory crate - context window, reference store, and embeddings.
//!
//! Short-term memory is a bounded FIFO window of recent utterances;
//! long-term memory is a capacity-bounded vector store with cosine
//! similarity queries and periodic SQLite snapshots. The context manager
//! merges both into the bundle handed to response generation.

pub mod context;
pub mod embedding;
pub mod store;
pub mod window;

pub use context::ContextManager;
pub use embedding::{EmbeddingService, HashEmbedding};
pub use store::ReferenceStore;
pub use window::ContextWindow;
