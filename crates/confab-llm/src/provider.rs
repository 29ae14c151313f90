use serde::{Deserialize, Serialize};

/// Conversation role. Exactly three variants; deserializing any other
/// label is an error rather than a silent drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Display tag used when rendering a transcript.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One turn of a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the LLM and return the assistant response.
    ///
    /// One blocking request, one full response; no retry policy here.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response
    /// is invalid.
    fn chat(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<String, crate::LlmError>> + Send;

    /// Embed a piece of text into a vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot produce an embedding.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, crate::LlmError>> + Send;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tags() {
        assert_eq!(Role::System.tag(), "System");
        assert_eq!(Role::User.tag(), "User");
        assert_eq!(Role::Assistant.tag(), "Assistant");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn role_roundtrip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"role": "tool", "content": "hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("a").role, Role::System);
        assert_eq!(Message::user("b").role, Role::User);
        assert_eq!(Message::assistant("c").role, Role::Assistant);
        assert_eq!(Message::user("hello").content, "hello");
    }

    #[test]
    fn message_deserializes_from_history_entry() {
        let msg: Message =
            serde_json::from_str(r#"{"role": "user", "content": "What is X?"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "What is X?");
    }
}
