//! Request and response types for one model generation call.

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Inline binary content sent with the last user turn (e.g. a diagram).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Everything one generation call needs.
///
/// Built by the feature modules and handed to a
/// [`crate::generation::GenerationBackend`]; never persisted.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Model the caller expects. Informational: a provider is bound to one
    /// model when it is built, and backends only log a mismatch.
    pub model: Option<String>,
    /// Persona / task instruction sent as the system message.
    pub system_instruction: Option<String>,
    /// Ordered conversation; the last entry is the turn being answered.
    pub turns: Vec<Turn>,
    /// JSON schema the reply must follow. `None` for free text.
    pub response_schema: Option<serde_json::Value>,
    pub attachment: Option<Attachment>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl GenerationRequest {
    /// A single-prompt request.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(text)],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_attachment(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.attachment = Some(Attachment {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }
}

/// Text returned by the model plus token accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl GenerationResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Whether the reply carries no usable text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builds_single_user_turn() {
        let req = GenerationRequest::prompt("hi").with_system("be kind");
        assert_eq!(req.turns, vec![Turn::user("hi")]);
        assert_eq!(req.system_instruction.as_deref(), Some("be kind"));
        assert!(req.attachment.is_none());
    }

    #[test]
    fn whitespace_response_is_empty() {
        assert!(GenerationResponse::text("  \n\t").is_empty());
        assert!(!GenerationResponse::text("ok").is_empty());
    }

    #[test]
    fn attachment_debug_hides_bytes() {
        let req = GenerationRequest::prompt("x").with_attachment(vec![1, 2, 3], "image/png");
        let dbg = format!("{:?}", req.attachment);
        assert!(dbg.contains("<3 bytes>"), "got: {dbg}");
    }
}
