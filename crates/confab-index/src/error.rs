use confab_llm::LlmError;
use confab_store::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing credentials: {0}")]
    Credentials(String),

    #[error("invalid selection: {0}")]
    Selection(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
