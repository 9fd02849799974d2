//! Answer generation: retrieve → prompt → call → record.
//!
//! Combines retrieved chunks, the session's conversation history, and the
//! new question into a chat prompt for the LLM. Retrieval runs first as a
//! precondition — an empty index fails with `IndexRead` and the LLM is
//! never invoked. Failures from the remote call surface as typed errors,
//! never as answer-shaped strings.

use tracing::info;

use crate::error::{QaError, QaResult};
use crate::index::VectorIndex;
use crate::llm::{ChatMessage, LlmClient};
use crate::memory::ConversationMemory;
use crate::models::{SearchHit, Turn};

const SYSTEM_PROMPT: &str = "You answer questions about the user's uploaded documents. \
Base your answers on the document excerpts provided below. \
If the excerpts do not contain the answer, say that the documents do not cover it.";

/// Answer a question against the index, updating conversation memory on
/// success.
pub async fn answer(
    question: &str,
    index: &VectorIndex,
    memory: &mut ConversationMemory,
    llm: &LlmClient,
    top_k: usize,
) -> QaResult<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(QaError::validation("question must not be empty"));
    }

    // Retrieval doubles as the precondition check: an empty or unreachable
    // index errors here, before any prompt is built or the LLM is called.
    let hits = index.search(question, top_k).await?;

    let messages = build_prompt(&hits, memory.history(), question);
    let reply = llm.chat(&messages).await?;

    info!(
        retrieved = hits.len(),
        history_turns = memory.len(),
        "answered question"
    );

    memory.append(question, reply.clone());
    Ok(reply)
}

/// Assemble the chat prompt: system instructions with numbered excerpts,
/// then the conversation history as alternating user/assistant messages,
/// then the new question.
fn build_prompt(hits: &[SearchHit], history: &[Turn], question: &str) -> Vec<ChatMessage> {
    let mut context = String::from(SYSTEM_PROMPT);
    context.push_str("\n\nDocument excerpts:");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("\n\n[{}] {}", i + 1, hit.text));
    }

    let mut messages = Vec::with_capacity(2 + history.len() * 2);
    messages.push(ChatMessage::system(context));
    for turn in history {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }
    messages.push(ChatMessage::user(question.to_string()));
    messages
}
