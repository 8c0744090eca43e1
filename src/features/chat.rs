//! Socratic chat: a conversation history advanced one exchange at a time.

use crate::error::TutorError;
use crate::export::{DocumentBuilder, Exportable};
use crate::generation::cleanup::clean_reply;
use crate::generation::{GenerationRequest, Role, Turn};
use crate::tutor::Tutor;
use serde::Serialize;
use tracing::{debug, warn};

/// One conversation with the tutor.
///
/// `next_turn` takes `&mut self`, so a session can only have one exchange in
/// flight at a time.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    #[serde(skip)]
    persona: String,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            history: Vec::new(),
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// All turns so far, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Number of completed student/tutor exchanges.
    pub fn exchanges(&self) -> usize {
        self.history.iter().filter(|t| t.role == Role::Model).count()
    }

    /// Send `message` and wait for the tutor's reply.
    ///
    /// Both turns are appended only once the reply arrives; on failure the
    /// history is exactly as it was before the call.
    pub async fn next_turn(&mut self, tutor: &Tutor, message: &str) -> Result<String, TutorError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TutorError::InvalidInput(
                "Type a question or an answer first.".into(),
            ));
        }

        let mut turns = self.history.clone();
        turns.push(Turn::user(message));
        let request = GenerationRequest {
            system_instruction: Some(self.persona.clone()),
            turns,
            ..Default::default()
        };

        debug!("Chat exchange {} ({} prior turns)", self.exchanges() + 1, self.history.len());
        let response = tutor.generate(request).await.map_err(|e| {
            warn!("Chat exchange failed: {}", e);
            e
        })?;

        let reply = clean_reply(&response.text).trim_end().to_string();
        self.history.push(Turn::user(message));
        self.history.push(Turn::model(reply.clone()));
        Ok(reply)
    }

    /// Forget the conversation, keeping the persona.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Exportable for ChatSession {
    fn export_title(&self) -> String {
        "Tutoring session".to_string()
    }

    fn assemble(&self, doc: &mut DocumentBuilder) {
        let mut first = true;
        for turn in &self.history {
            match turn.role {
                Role::User => {
                    if !first {
                        doc.rule();
                    }
                    first = false;
                    doc.labelled("Student:", &turn.text);
                }
                Role::Model => {
                    doc.labelled("Tutor:", &turn.text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TutorConfig;
    use crate::export::{assemble_document, ContentBlock};
    use crate::generation::{GenerationBackend, GenerationResponse};
    use futures::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        replies: Mutex<VecDeque<Result<GenerationResponse, TutorError>>>,
        seen_turns: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<GenerationResponse, TutorError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen_turns: Mutex::new(Vec::new()),
            })
        }
    }

    impl GenerationBackend for Scripted {
        fn generate<'a>(
            &'a self,
            request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<GenerationResponse, TutorError>> {
            Box::pin(async move {
                self.seen_turns.lock().unwrap().push(request.turns.len());
                self.replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(Err(TutorError::EmptyResponse))
            })
        }
    }

    fn tutor(backend: Arc<Scripted>) -> Tutor {
        let config = TutorConfig::builder().max_attempts(1).build().unwrap();
        Tutor::with_backend(config, backend)
    }

    #[tokio::test]
    async fn exchange_appends_both_turns() {
        let backend = Scripted::new(vec![
            Ok(GenerationResponse::text("What is conserved in a collision?\r\n")),
            Ok(GenerationResponse::text("Right. And if the cars stick together?")),
        ]);
        let t = tutor(backend.clone());
        let mut chat = t.chat_session();

        let r1 = chat.next_turn(&t, "Explain momentum").await.unwrap();
        assert_eq!(r1, "What is conserved in a collision?");
        let _ = chat.next_turn(&t, "  Momentum  ").await.unwrap();

        assert_eq!(chat.history().len(), 4);
        assert_eq!(chat.exchanges(), 2);
        assert_eq!(chat.history()[2], Turn::user("Momentum"));
        // Second call carried the first exchange plus the new message.
        assert_eq!(*backend.seen_turns.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn failure_leaves_history_unchanged() {
        let backend = Scripted::new(vec![
            Ok(GenerationResponse::text("Hint: think about p = m v")),
            Err(TutorError::InvalidRequest {
                detail: "blocked".into(),
            }),
        ]);
        let t = tutor(backend);
        let mut chat = t.chat_session();
        chat.next_turn(&t, "help").await.unwrap();
        let before = chat.history().to_vec();

        let err = chat.next_turn(&t, "more").await.unwrap_err();
        assert!(matches!(err, TutorError::InvalidRequest { .. }));
        assert_eq!(chat.history(), before.as_slice());
    }

    #[tokio::test]
    async fn empty_message_never_reaches_backend() {
        let backend = Scripted::new(vec![]);
        let t = tutor(backend.clone());
        let mut chat = t.chat_session();
        let err = chat.next_turn(&t, "   ").await.unwrap_err();
        assert!(matches!(err, TutorError::InvalidInput(_)));
        assert!(backend.seen_turns.lock().unwrap().is_empty());
    }

    #[test]
    fn transcript_separates_exchanges_with_rules() {
        let mut chat = ChatSession::new("p");
        chat.history = vec![
            Turn::user("q1"),
            Turn::model("a1"),
            Turn::user("q2"),
            Turn::model("a2"),
        ];
        let blocks = assemble_document(&chat);
        // title, rule, q1, a1, rule, q2, a2
        assert_eq!(blocks.len(), 7);
        let rules = blocks.iter().filter(|b| **b == ContentBlock::Rule).count();
        assert_eq!(rules, 2);
    }
}
