//! In-process conversation memory.
//!
//! Holds the ordered `(question, answer)` turns of a session. Lives for the
//! life of the process and is never evicted — bounding or summarizing older
//! turns is an open question inherited from the design, so the growth is
//! left visible rather than silently capped.

use crate::models::Turn;

#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn to the history.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// All turns, in insertion order.
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
