use confab_llm::LlmProvider;
use tracing::info;

use crate::chunker::{ChunkerConfig, split_documents};
use crate::confluence::ConfluenceClient;
use crate::error::{IndexError, Result};
use crate::store::ChunkStore;

/// What to ingest: a whole space or an explicit set of pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Space(String),
    Pages(Vec<String>),
}

impl Selection {
    /// Validate the ingestion target. Exactly one of the two forms must
    /// be supplied; this runs before any network or store activity.
    ///
    /// # Errors
    ///
    /// Returns an error when neither or both of a space key and page ids
    /// are given.
    pub fn new(space_key: Option<String>, page_ids: Vec<String>) -> Result<Self> {
        match (space_key, page_ids.is_empty()) {
            (Some(_), false) => Err(IndexError::Selection(
                "give either a space key or page ids, not both".into(),
            )),
            (Some(key), true) => Ok(Self::Space(key)),
            (None, false) => Ok(Self::Pages(page_ids)),
            (None, true) => Err(IndexError::Selection(
                "a space key or at least one page id is required".into(),
            )),
        }
    }
}

/// Whether to rebuild the collection or add to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Drop any existing collection and index from scratch.
    Create,
    /// Add chunks to the existing collection.
    Update,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Runs the fetch, split, embed, upsert pipeline.
pub struct Ingestor<'a, P: LlmProvider> {
    client: &'a ConfluenceClient,
    store: &'a ChunkStore<P>,
    chunker: ChunkerConfig,
}

impl<'a, P: LlmProvider> Ingestor<'a, P> {
    #[must_use]
    pub fn new(
        client: &'a ConfluenceClient,
        store: &'a ChunkStore<P>,
        chunker: ChunkerConfig,
    ) -> Self {
        Self {
            client,
            store,
            chunker,
        }
    }

    /// Ingest the selected pages into the chunk store.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching, embedding, or storage fails; there
    /// is no partial-ingestion recovery.
    pub async fn run(&self, mode: Mode, selection: &Selection) -> Result<IngestReport> {
        if mode == Mode::Create {
            self.store.reset().await?;
        }

        let documents = match selection {
            Selection::Space(key) => self.client.fetch_space(key).await?,
            Selection::Pages(ids) => self.client.fetch_pages(ids).await?,
        };
        info!(documents = documents.len(), "fetched wiki pages");

        let chunks = split_documents(&documents, &self.chunker);
        let stored = self.store.upsert_chunks(&chunks).await?;
        info!(
            collection = %self.store.collection(),
            documents = documents.len(),
            chunks = stored,
            "ingestion complete"
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: stored,
        })
    }
}
