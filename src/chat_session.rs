//! Conversation history with token-budget trimming.
//!
//! The token-counting and trimming algorithm is carried over from
//! `llm_session::LLMSession` (pop the oldest message while the running
//! count exceeds budget) adapted onto the current `Message`/`Role` shapes
//! in `message.rs`.

use std::sync::Arc;

use crate::message::{Message, Role};

/// Estimates the number of tokens in a string using the same coarse
/// one-token-per-four-characters heuristic as the rest of this stack.
/// Adequate for budget trimming, not for billing.
fn count_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

fn count_message_tokens(message: &Message) -> usize {
    const ROLE_TOKEN_COST: usize = 1;
    ROLE_TOKEN_COST + count_tokens(&message.content)
}

/// A running conversation with a model: a system prompt plus a trimmed
/// history of user/assistant/tool messages.
pub struct ChatSession {
    system_prompt: Message,
    history: Vec<Message>,
    max_tokens: usize,
    token_count: usize,
}

impl ChatSession {
    pub fn new(system_prompt: impl Into<Arc<str>>, max_tokens: usize) -> Self {
        let system_prompt = Message {
            role: Role::System,
            content: system_prompt.into(),
            tool_calls: Vec::new(),
        };
        let token_count = count_message_tokens(&system_prompt);
        ChatSession {
            system_prompt,
            history: Vec::new(),
            max_tokens,
            token_count,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<Arc<str>>) {
        let old_tokens = count_message_tokens(&self.system_prompt);
        self.system_prompt = Message {
            role: Role::System,
            content: prompt.into(),
            tool_calls: Vec::new(),
        };
        let new_tokens = count_message_tokens(&self.system_prompt);
        self.token_count = self.token_count - old_tokens + new_tokens;
    }

    /// Appends `message` to the history and trims the oldest entries until
    /// the running count is back within `max_tokens`.
    pub fn push(&mut self, message: Message) {
        self.token_count += count_message_tokens(&message);
        self.history.push(message);
        self.trim();
    }

    fn trim(&mut self) {
        while self.token_count > self.max_tokens && !self.history.is_empty() {
            let removed = self.history.remove(0);
            self.token_count -= count_message_tokens(&removed);
        }
    }

    /// The full prompt to send to a gateway: system prompt followed by the
    /// trimmed history, matching `LLMSession::send_message`'s
    /// insert-then-remove-at-index-0 dance without needing the temporary
    /// mutation since the system prompt is stored separately here.
    pub fn context(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(self.system_prompt.clone());
        messages.extend(self.history.iter().cloned());
        messages
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.token_count = count_message_tokens(&self.system_prompt);
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn usage_ratio(&self) -> f64 {
        self.token_count as f64 / self.max_tokens as f64
    }
}
