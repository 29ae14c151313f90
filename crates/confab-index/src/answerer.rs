use std::collections::BTreeSet;
use std::sync::Arc;

use confab_llm::{LlmProvider, Message};
use tracing::debug;

use crate::error::Result;
use crate::store::{ChunkStore, DEFAULT_TOP_K};

/// An answer plus the unique sources of the chunks that informed it,
/// in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOutcome {
    pub answer: String,
    pub sources: BTreeSet<String>,
}

/// Retrieval-augmented question answering over the chunk store.
///
/// Stateless across calls; the conversation history is owned by the
/// caller and passed in each turn.
pub struct Answerer<P: LlmProvider> {
    provider: Arc<P>,
    store: ChunkStore<P>,
    top_k: usize,
}

impl<P: LlmProvider> Answerer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: ChunkStore<P>) -> Self {
        Self {
            provider,
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Answer one user message with retrieved context.
    ///
    /// The message is appended to `history` as a user turn, the whole
    /// transcript becomes the retrieval query and the user prompt, and
    /// retrieved chunk contents are stuffed into a system message. The
    /// caller appends the assistant turn after a successful answer.
    ///
    /// Zero retrieved chunks is not an error; the model simply answers
    /// without context and the outcome carries no sources.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or the chat call fails. On failure
    /// the user turn is removed again, so `history` is left as it was.
    pub async fn answer(
        &self,
        message: &str,
        history: &mut Vec<Message>,
    ) -> Result<RetrievalOutcome> {
        history.push(Message::user(message));
        let prompt = render_transcript(history);

        match self.answer_prompt(prompt).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                history.pop();
                Err(e)
            }
        }
    }

    async fn answer_prompt(&self, prompt: String) -> Result<RetrievalOutcome> {
        let chunks = self.store.query(&prompt, self.top_k).await?;
        debug!(retrieved = chunks.len(), "retrieval done");

        let context = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = vec![
            Message::system(format!(
                "Use the following pieces of context to answer the question.\n\n{context}"
            )),
            Message::user(prompt),
        ];
        let answer = self.provider.chat(&request).await?;

        let sources = chunks
            .iter()
            .filter_map(|c| c.source().map(str::to_owned))
            .collect();
        Ok(RetrievalOutcome { answer, sources })
    }
}

/// Render a conversation as one prompt, one tagged line per turn.
#[must_use]
pub fn render_transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.tag(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render an outcome for display: the answer, then the unique sources.
#[must_use]
pub fn format_outcome(outcome: &RetrievalOutcome) -> String {
    let mut out = outcome.answer.clone();
    out.push_str("\n\n**Relevant Documents**:\n");
    for source in &outcome.sources {
        out.push_str(source);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use confab_llm::MockProvider;
    use confab_store::InMemoryVectorStore;

    use super::*;
    use crate::document::Chunk;

    fn chunk(content: &str, source: &str) -> Chunk {
        Chunk::new(
            content,
            BTreeMap::from([("source".to_owned(), source.to_owned())]),
        )
    }

    async fn answerer_with_chunks(
        provider: MockProvider,
        chunks: &[Chunk],
    ) -> Answerer<MockProvider> {
        let provider = Arc::new(provider);
        let store = ChunkStore::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::clone(&provider),
            "answer_test",
        );
        store.upsert_chunks(chunks).await.unwrap();
        Answerer::new(provider, store)
    }

    #[test]
    fn transcript_tags_each_turn() {
        let history = vec![
            Message::system("be brief"),
            Message::user("what is X?"),
            Message::assistant("X is a thing."),
        ];
        assert_eq!(
            render_transcript(&history),
            "System: be brief\nUser: what is X?\nAssistant: X is a thing."
        );
    }

    #[tokio::test]
    async fn answer_appends_user_turn() {
        let answerer = answerer_with_chunks(MockProvider::default(), &[]).await;
        let mut history = Vec::new();
        answerer.answer("hello", &mut history).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hello");
    }

    #[tokio::test]
    async fn duplicate_sources_are_deduplicated() {
        let chunks = vec![
            chunk("part one", "https://wiki/page1"),
            chunk("part two", "https://wiki/page1"),
            chunk("other", "https://wiki/page2"),
        ];
        let answerer = answerer_with_chunks(MockProvider::default(), &chunks).await;

        let mut history = Vec::new();
        let outcome = answerer.answer("question", &mut history).await.unwrap();

        assert_eq!(outcome.sources.len(), 2);
        assert!(outcome.sources.contains("https://wiki/page1"));
        assert!(outcome.sources.contains("https://wiki/page2"));
    }

    #[tokio::test]
    async fn empty_retrieval_yields_no_sources() {
        let answerer = answerer_with_chunks(
            MockProvider::with_responses(vec!["no idea".into()]),
            &[],
        )
        .await;
        let mut history = Vec::new();
        let outcome = answerer.answer("question", &mut history).await.unwrap();
        assert_eq!(outcome.answer, "no idea");
        assert!(outcome.sources.is_empty());
    }

    #[tokio::test]
    async fn chat_failure_propagates() {
        let mut provider = MockProvider::default();
        provider.fail_chat = true;
        let answerer = answerer_with_chunks(provider, &[]).await;
        let mut history = Vec::new();
        assert!(answerer.answer("question", &mut history).await.is_err());
    }

    #[tokio::test]
    async fn failed_turn_leaves_history_unchanged() {
        let mut provider = MockProvider::default();
        provider.fail_chat = true;
        let answerer = answerer_with_chunks(provider, &[]).await;

        let mut history = vec![Message::system("be brief")];
        assert!(answerer.answer("question", &mut history).await.is_err());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "be brief");
    }

    #[test]
    fn outcome_formatting_lists_sources() {
        let outcome = RetrievalOutcome {
            answer: "Restart the service.".into(),
            sources: BTreeSet::from(["https://wiki/b".to_owned(), "https://wiki/a".to_owned()]),
        };
        assert_eq!(
            format_outcome(&outcome),
            "Restart the service.\n\n**Relevant Documents**:\nhttps://wiki/a\nhttps://wiki/b\n"
        );
    }

    #[test]
    fn outcome_formatting_with_no_sources() {
        let outcome = RetrievalOutcome {
            answer: "Answered from memory.".into(),
            sources: BTreeSet::new(),
        };
        assert_eq!(
            format_outcome(&outcome),
            "Answered from memory.\n\n**Relevant Documents**:\n"
        );
    }
}
