//! Core data types that flow between the index, the orchestrator, and callers.

use serde::{Deserialize, Serialize};

/// Coarse classification of a request, selecting the prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Coder,
    Admin,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Coder => "coder",
            Intent::Admin => "admin",
        }
    }
}

/// A record of one earlier exchange, oldest first in a history slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user: String,
    pub cmd: String,
    pub status: String,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, cmd: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            cmd: cmd.into(),
            status: status.into(),
        }
    }
}

/// An indexed paragraph of a source document with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// File path relative to the docs directory.
    pub source: String,
    /// Position of the chunk within its source, from 0.
    pub ordinal: usize,
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub hash: String,
    pub vector: Vec<f32>,
}

/// A chunk selected by a search, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// One read-only check run during an orchestration loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub command: String,
    pub output: String,
    /// `None` when the process never exited normally (timeout, spawn error, signal).
    pub exit_status: Option<i32>,
}

/// The terminal value of one orchestration run.
///
/// Serializes to `{"type": "message"|"suggestion"|"error", "content": ..., "explanation"?: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentResult {
    Message {
        content: String,
    },
    Suggestion {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Error {
        content: String,
    },
}

impl AgentResult {
    pub fn error(content: impl Into<String>) -> Self {
        AgentResult::Error {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            AgentResult::Message { content }
            | AgentResult::Suggestion { content, .. }
            | AgentResult::Error { content } => content,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AgentResult::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suggestion_shape() {
        let result = AgentResult::Suggestion {
            content: "df -h".to_string(),
            explanation: Some("Shows disk usage.".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "suggestion", "content": "df -h", "explanation": "Shows disk usage."})
        );
    }

    #[test]
    fn test_suggestion_without_explanation_omits_field() {
        let result = AgentResult::Suggestion {
            content: "ls".to_string(),
            explanation: None,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "suggestion", "content": "ls"})
        );
    }

    #[test]
    fn test_error_shape() {
        let result = AgentResult::error("Agent loop limit reached.");
        assert!(result.is_error());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "error", "content": "Agent loop limit reached."})
        );
    }

    #[test]
    fn test_message_content_accessor() {
        let result = AgentResult::Message {
            content: "hello".to_string(),
        };
        assert_eq!(result.content(), "hello");
        assert!(!result.is_error());
    }
}
