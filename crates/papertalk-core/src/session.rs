//! Conversation sessions.
//!
//! A [`Session`] owns everything one user's chat with one document needs:
//! the read-only [`Index`], the [`Retriever`], the [`Synthesizer`], and
//! the append-only [`ConversationHistory`]. Each call to
//! [`Session::ask`] is one explicit request/response round-trip.
//!
//! `ask` takes `&mut self`, so two questions can never be in flight on
//! the same session at once.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::index::Index;
use crate::models::{Answer, Turn};
use crate::retrieve::Retriever;
use crate::synth::Synthesizer;

/// Ordered (query, answer) pairs; append-only for the life of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed round-trip.
    pub fn append(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            query: query.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        });
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn state(&self) -> SessionState {
        if self.turns.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }
}

/// `Empty` until the first completed round-trip, `Active` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Active,
}

pub struct Session {
    index: Index,
    retriever: Retriever,
    synthesizer: Synthesizer,
    history: ConversationHistory,
}

impl Session {
    pub fn new(index: Index, retriever: Retriever, synthesizer: Synthesizer) -> Self {
        Self {
            index,
            retriever,
            synthesizer,
            history: ConversationHistory::new(),
        }
    }

    /// Retrieve evidence for `query`, synthesize an answer, and record the
    /// turn.
    ///
    /// The history is only extended once an answer exists: on error it is
    /// left exactly as it was and the session stays usable.
    pub async fn ask(&mut self, query: &str) -> Result<Answer> {
        let answer = match self.answer(query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "question failed; history unchanged");
                return Err(e);
            }
        };
        self.history.append(query.trim(), answer.text.as_str());
        Ok(answer)
    }

    async fn answer(&self, query: &str) -> Result<Answer> {
        let chunks = self.retriever.retrieve(&self.index, query).await?;
        self.synthesizer
            .synthesize(chunks, query, self.history.turns())
            .await
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn state(&self) -> SessionState {
        self.history.state()
    }

    /// End the session, handing the history to the caller for export.
    pub fn into_history(self) -> ConversationHistory {
        self.history
    }
}
