//! The generation boundary: one trait, one production implementation.
//!
//! Feature code only talks to [`GenerationBackend`]. [`LlmBackend`] adapts it
//! to an `edgequake_llm` provider (Gemini by default); tests plug in their own
//! implementation through [`crate::config::TutorConfigBuilder::backend`].

use crate::error::{classify_llm_error, TutorError};
use crate::generation::request::{GenerationRequest, GenerationResponse, Role};
use crate::prompts::schema_instruction;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Performs a single generation call. No retries at this level.
///
/// Errors must already be classified (see [`crate::error::classify_llm_error`]) so the retry
/// executor can tell transient failures from terminal ones.
pub trait GenerationBackend: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<GenerationResponse, TutorError>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "backend"
    }
}

/// [`GenerationBackend`] backed by an `edgequake_llm` provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

impl GenerationBackend for LlmBackend {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<GenerationResponse, TutorError>> {
        Box::pin(async move {
            let start = Instant::now();
            if let Some(requested) = unbound_model(request, self.provider.model()) {
                warn!(
                    "{}: request names model '{}' but the provider is bound to '{}'",
                    self.label,
                    requested,
                    self.provider.model()
                );
            }
            let messages = build_messages(request);
            let options = build_options(request);

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| classify_llm_error(&e))?;

            debug!(
                "{}: {} input tokens, {} output tokens, {:?}",
                self.label,
                response.prompt_tokens,
                response.completion_tokens,
                start.elapsed()
            );

            Ok(GenerationResponse {
                text: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            })
        })
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Translate a request into provider chat messages.
///
/// Layout: system instruction (with the schema appended when structured
/// output is wanted), then every turn in order. The attachment rides on the
/// final user turn.
fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);

    let mut system = request.system_instruction.clone().unwrap_or_default();
    if let Some(ref schema) = request.response_schema {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(&schema_instruction(schema));
    }
    if !system.is_empty() {
        messages.push(ChatMessage::system(system));
    }

    let last_user = request.turns.iter().rposition(|t| t.role == Role::User);

    for (i, turn) in request.turns.iter().enumerate() {
        match turn.role {
            Role::User => match (&request.attachment, Some(i) == last_user) {
                (Some(att), true) => {
                    let image = ImageData::new(STANDARD.encode(&att.bytes), att.mime_type.clone());
                    messages.push(ChatMessage::user_with_images(turn.text.clone(), vec![image]));
                }
                _ => messages.push(ChatMessage::user(turn.text.clone())),
            },
            Role::Model => messages.push(ChatMessage::assistant(turn.text.clone())),
        }
    }

    messages
}

/// The requested model, if it differs from the one the provider serves.
fn unbound_model<'a>(request: &'a GenerationRequest, bound: &str) -> Option<&'a str> {
    request.model.as_deref().filter(|m| *m != bound)
}

fn build_options(request: &GenerationRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::request::Turn;

    #[test]
    fn build_options_forwards_sampling() {
        let req = GenerationRequest {
            temperature: Some(0.4),
            max_tokens: Some(2048),
            ..Default::default()
        };
        let opts = build_options(&req);
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn messages_include_system_and_history() {
        let req = GenerationRequest {
            system_instruction: Some("persona".into()),
            turns: vec![Turn::user("a"), Turn::model("b"), Turn::user("c")],
            ..Default::default()
        };
        assert_eq!(build_messages(&req).len(), 4);
    }

    #[test]
    fn model_mismatch_is_detected() {
        let mut req = GenerationRequest::prompt("x");
        assert_eq!(unbound_model(&req, "gemini-2.5-flash"), None);
        req.model = Some("gemini-2.5-flash".into());
        assert_eq!(unbound_model(&req, "gemini-2.5-flash"), None);
        req.model = Some("gemini-2.5-pro".into());
        assert_eq!(unbound_model(&req, "gemini-2.5-flash"), Some("gemini-2.5-pro"));
    }

    #[test]
    fn messages_skip_empty_system() {
        let req = GenerationRequest::prompt("only");
        assert_eq!(build_messages(&req).len(), 1);
    }
}
