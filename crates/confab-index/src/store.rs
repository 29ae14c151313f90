use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use confab_llm::LlmProvider;
use confab_store::{VectorPoint, VectorStore};
use tracing::{debug, info};
use uuid::Uuid;

use crate::document::Chunk;
use crate::error::Result;

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 4;

const CONTENT_KEY: &str = "content";

/// Facade over a vector store and an embedding provider, keyed to one
/// collection. Ingestion embeds and upserts chunks; querying embeds the
/// query text and maps search hits back to chunks.
pub struct ChunkStore<P: LlmProvider> {
    backend: Arc<dyn VectorStore>,
    provider: Arc<P>,
    collection: String,
}

impl<P: LlmProvider> ChunkStore<P> {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VectorStore>,
        provider: Arc<P>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            provider,
            collection: collection.into(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and upsert chunks, creating the collection on first use.
    ///
    /// The embedding dimension is probed with a throwaway embedding so the
    /// collection can be sized before the first real vector arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the store upsert fails.
    pub async fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let probe = self.provider.embed("dimension probe").await?;
        self.backend
            .ensure_collection(&self.collection, probe.len() as u64)
            .await?;

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self.provider.embed(&chunk.content).await?;
            let mut payload: HashMap<String, serde_json::Value> = HashMap::new();
            payload.insert(CONTENT_KEY.to_owned(), chunk.content.clone().into());
            for (key, value) in &chunk.metadata {
                payload.insert(key.clone(), value.clone().into());
            }
            points.push(VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload,
            });
        }

        let count = points.len();
        self.backend.upsert(&self.collection, points).await?;
        info!(collection = %self.collection, count, "upserted chunks");
        Ok(count)
    }

    /// Retrieve the `k` chunks most similar to `text`, best first.
    ///
    /// A missing collection yields an empty result rather than an error,
    /// so querying before any ingestion is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the store search fails.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<Chunk>> {
        if !self.backend.collection_exists(&self.collection).await? {
            debug!(collection = %self.collection, "collection missing, empty retrieval");
            return Ok(Vec::new());
        }

        let vector = self.provider.embed(text).await?;
        let hits = self
            .backend
            .search(&self.collection, vector, k as u64)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let mut content = String::new();
                let mut metadata = BTreeMap::new();
                for (key, value) in hit.payload {
                    let Some(text) = value.as_str() else {
                        continue;
                    };
                    if key == CONTENT_KEY {
                        content = text.to_owned();
                    } else {
                        metadata.insert(key, text.to_owned());
                    }
                }
                Chunk::new(content, metadata)
            })
            .collect())
    }

    /// Drop the collection if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails.
    pub async fn reset(&self) -> Result<()> {
        if self.backend.collection_exists(&self.collection).await? {
            self.backend.delete_collection(&self.collection).await?;
            info!(collection = %self.collection, "dropped collection");
        }
        Ok(())
    }
}
