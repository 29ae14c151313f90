//! Vector storage for document chunks.
//!
//! [`VectorStore`] is the object-safe contract the ingestion and query
//! pipelines consume. Two backends are provided: [`qdrant::QdrantStore`]
//! for persistent deployments and [`in_memory::InMemoryVectorStore`] for
//! tests and offline runs.

pub mod in_memory;
pub mod qdrant;
pub mod vector_store;

pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
