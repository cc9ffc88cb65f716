//! Caller-owned conversation state.

use serde::{Deserialize, Serialize};

use feeder_core::config::HistorySettings;

/// Keep only the last `max_tokens` whitespace-delimited tokens. `None` never trims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPolicy { pub max_tokens: Option<usize> }

impl Default for HistoryPolicy {
    fn default() -> Self { Self { max_tokens: Some(2000) } }
}

impl From<&HistorySettings> for HistoryPolicy {
    fn from(settings: &HistorySettings) -> Self {
        Self { max_tokens: (settings.max_tokens > 0).then_some(settings.max_tokens) }
    }
}

impl HistoryPolicy {
    pub fn unbounded() -> Self { Self { max_tokens: None } }

    /// Text over the limit is rejoined with single spaces; text within it is untouched.
    pub fn apply(&self, text: &str) -> Option<String> {
        let max = self.max_tokens?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        (tokens.len() > max).then(|| tokens[tokens.len() - max..].join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState { history: String, policy: HistoryPolicy }

impl ConversationState {
    /// Start a conversation seeded with the project's default prompt.
    pub fn new(default_prompt: impl Into<String>, policy: HistoryPolicy) -> Self {
        Self { history: default_prompt.into(), policy }
    }

    pub fn as_str(&self) -> &str { &self.history }

    pub fn push_context(&mut self, context: &str) {
        self.history.push_str("\n\nContext:\n");
        self.history.push_str(context);
    }

    /// Append the user's turn, then trim to the policy.
    pub fn push_user(&mut self, query: &str) {
        self.history.push_str("\n\nUser: ");
        self.history.push_str(query);
        if let Some(trimmed) = self.policy.apply(&self.history) { self.history = trimmed; }
    }

    pub fn push_assistant(&mut self, response: &str) {
        self.history.push_str("\nAssistant: ");
        self.history.push_str(response);
    }
}
