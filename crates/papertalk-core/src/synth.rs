//! Answer synthesis: prompt construction and language model invocation.
//!
//! The [`Synthesizer`] renders retrieved chunks and the question into a
//! fixed grounding template ([`PromptTemplate`]) and hands it, together
//! with earlier turns of the conversation, to a [`Generator`].
//!
//! Grounding is a prompt-level contract only: the template tells the model
//! to answer strictly from the supplied context and to reply with
//! [`NOT_FOUND_RESPONSE`] otherwise. Nothing here checks that the model
//! complied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{Answer, Chunk, Turn};

/// Fixed reply for questions the document does not answer.
pub const NOT_FOUND_RESPONSE: &str = "I could not find the answer in the document.";

/// Separator placed between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message in the shape both OpenAI and Ollama chat APIs accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Bundles all inputs for a single generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    /// Grounding instruction, sent as the system message.
    pub instruction: &'a str,
    /// Rendered prompt: instruction, context, and question.
    pub prompt: &'a str,
    /// Earlier turns, oldest first, for history-aware models.
    pub history: &'a [Turn],
}

impl GenerateRequest<'_> {
    /// Flatten into chat messages: system instruction, then each earlier
    /// turn as a user/assistant pair, then the prompt as the final user
    /// message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() * 2 + 2);
        messages.push(ChatMessage::new(Role::System, self.instruction));
        for turn in self.history {
            messages.push(ChatMessage::new(Role::User, turn.query.as_str()));
            messages.push(ChatMessage::new(Role::Assistant, turn.answer.as_str()));
        }
        messages.push(ChatMessage::new(Role::User, self.prompt));
        messages
    }
}

/// Capability: produce text from a prompt.
///
/// Implementations report backend failures (unreachable host, HTTP error,
/// malformed response) as [`PipelineError::Synthesis`].
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String>;
}

/// The fixed grounding template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    instruction: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            instruction: format!(
                "You are a helpful assistant answering questions about a document. \
                 Answer strictly from the context provided. Do not use outside knowledge. \
                 If the context does not contain the answer, reply exactly: \"{}\"",
                NOT_FOUND_RESPONSE
            ),
        }
    }
}

impl PromptTemplate {
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Render the prompt for one question.
    ///
    /// ```rust
    /// use papertalk_core::synth::PromptTemplate;
    ///
    /// let prompt = PromptTemplate::default().render(&[], "Who wrote it?");
    /// assert!(prompt.ends_with("Question: Who wrote it?\nAnswer:"));
    /// ```
    pub fn render(&self, chunks: &[Chunk], query: &str) -> String {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        format!(
            "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
            self.instruction,
            context,
            query.trim()
        )
    }
}

pub struct Synthesizer {
    generator: Box<dyn Generator>,
    template: PromptTemplate,
    max_history_turns: Option<usize>,
}

impl Synthesizer {
    pub fn new(generator: Box<dyn Generator>) -> Self {
        Self {
            generator,
            template: PromptTemplate::default(),
            max_history_turns: None,
        }
    }

    /// Forward only the most recent `turns` turns to the model. The
    /// session's stored history is unaffected.
    pub fn with_max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = Some(turns);
        self
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Answer `query` from `chunks`.
    ///
    /// With no chunks the model is not called and the answer is
    /// [`NOT_FOUND_RESPONSE`]. Otherwise the returned [`Answer`] carries
    /// every chunk that went into the prompt as evidence.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Synthesis`] when the generator fails or returns a
    /// blank completion.
    pub async fn synthesize(&self, chunks: Vec<Chunk>, query: &str, history: &[Turn]) -> Result<Answer> {
        if chunks.is_empty() {
            debug!("no evidence retrieved; skipping model call");
            return Ok(Answer {
                text: NOT_FOUND_RESPONSE.to_string(),
                evidence: chunks,
            });
        }

        let history = match self.max_history_turns {
            Some(n) if history.len() > n => &history[history.len() - n..],
            _ => history,
        };
        let prompt = self.template.render(&chunks, query);
        let request = GenerateRequest {
            instruction: self.template.instruction(),
            prompt: &prompt,
            history,
        };

        let text = self.generator.generate(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::Synthesis(format!(
                "model '{}' returned an empty completion",
                self.generator.model_name()
            )));
        }

        info!(
            model = self.generator.model_name(),
            evidence = chunks.len(),
            history = history.len(),
            "synthesized answer"
        );
        Ok(Answer {
            text: text.to_string(),
            evidence: chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", index),
            index,
            start: 0,
            text: text.to_string(),
            hash: String::new(),
            source: None,
        }
    }

    fn turn(q: &str, a: &str) -> Turn {
        Turn {
            query: q.to_string(),
            answer: a.to_string(),
            asked_at: Utc::now(),
        }
    }

    /// Records every message list it is given and replies with a fixed text.
    struct Recorder {
        reply: String,
        seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    #[async_trait]
    impl Generator for Recorder {
        fn model_name(&self) -> &str {
            "recorder"
        }
        async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String> {
            self.seen.lock().unwrap().push(request.messages());
            Ok(self.reply.clone())
        }
    }

    fn recorder(reply: &str) -> (Synthesizer, Arc<Mutex<Vec<Vec<ChatMessage>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let synth = Synthesizer::new(Box::new(Recorder {
            reply: reply.to_string(),
            seen: seen.clone(),
        }));
        (synth, seen)
    }

    #[test]
    fn template_puts_instruction_context_and_question_in_order() {
        let prompt = PromptTemplate::default().render(
            &[chunk(0, "Cats sleep a lot."), chunk(1, "Dogs bark.")],
            "  What do cats do? ",
        );
        let instr = prompt.find("Answer strictly from the context").unwrap();
        let ctx = prompt.find("Cats sleep a lot.\n\n---\n\nDogs bark.").unwrap();
        let q = prompt.find("Question: What do cats do?\nAnswer:").unwrap();
        assert!(instr < ctx && ctx < q);
        assert!(prompt.contains(NOT_FOUND_RESPONSE));
    }

    #[tokio::test]
    async fn no_evidence_short_circuits() {
        let (synth, seen) = recorder("should not be used");
        let answer = synth.synthesize(Vec::new(), "anything?", &[]).await.unwrap();
        assert_eq!(answer.text, NOT_FOUND_RESPONSE);
        assert!(answer.evidence.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn evidence_is_returned_even_if_unused() {
        let (synth, _) = recorder("  Forty-two.\n");
        let chunks = vec![chunk(0, "irrelevant"), chunk(1, "also irrelevant")];
        let answer = synth
            .synthesize(chunks.clone(), "What is the answer?", &[])
            .await
            .unwrap();
        assert_eq!(answer.text, "Forty-two.");
        assert_eq!(answer.evidence, chunks);
    }

    #[tokio::test]
    async fn history_is_sent_as_prior_turns() {
        let (synth, seen) = recorder("ok");
        let history = vec![turn("q1", "a1"), turn("q2", "a2")];
        synth
            .synthesize(vec![chunk(0, "ctx")], "q3", &history)
            .await
            .unwrap();

        let messages = seen.lock().unwrap()[0].clone();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User
            ]
        );
        assert_eq!(messages[1].content, "q1");
        assert!(messages[5].content.contains("Question: q3"));
    }

    #[tokio::test]
    async fn history_window_keeps_latest_turns() {
        let (synth, seen) = recorder("ok");
        let synth = synth.with_max_history_turns(1);
        let history = vec![turn("old", "a"), turn("new", "b")];
        synth
            .synthesize(vec![chunk(0, "ctx")], "q", &history)
            .await
            .unwrap();
        let messages = seen.lock().unwrap()[0].clone();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "new");
    }

    #[tokio::test]
    async fn blank_completion_is_a_synthesis_error() {
        let (synth, _) = recorder("   ");
        let err = synth
            .synthesize(vec![chunk(0, "ctx")], "q", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::new(Role::Assistant, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
