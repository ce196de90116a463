//! Retrieval interface.
//!
//! The workflow never touches the index directly; implementations own
//! embedding, storage, and similarity search behind this trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Passage;

/// A source of scored passages for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` passages ordered by relevance to `query`.
    async fn query(&self, query: &str, k: usize) -> Result<Vec<Passage>>;
}
