//! Wiki ingestion and retrieval-augmented answering.
//!
//! Pipeline: fetch Confluence pages ([`confluence`]), convert their
//! storage HTML to markdown ([`html`]), split into retrieval-sized
//! chunks ([`chunker`]), embed and store them ([`store`]), then answer
//! questions over the indexed content with cited sources ([`answerer`]).

pub mod answerer;
pub mod chunker;
pub mod confluence;
pub mod document;
pub mod error;
pub mod html;
pub mod ingest;
pub mod store;

pub use answerer::{Answerer, RetrievalOutcome, format_outcome, render_transcript};
pub use chunker::{ChunkerConfig, split_characters, split_documents, split_headers};
pub use confluence::{ConfluenceClient, Credentials, default_http_client};
pub use document::{Chunk, Document};
pub use error::{IndexError, Result};
pub use ingest::{IngestReport, Ingestor, Mode, Selection};
pub use store::{ChunkStore, DEFAULT_TOP_K};
