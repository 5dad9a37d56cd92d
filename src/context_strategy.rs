//! Pluggable strategies for handling context window exhaustion.
//!
//! Three implementations, carried over from the wider ecosystem's
//! `context_strategy` module with the `ThoughtChain` persistence dependency
//! removed (persistence is out of scope here — see DESIGN.md):
//!
//! - [`TrimStrategy`] (default): relies on [`ChatSession`]'s own oldest-first
//!   trimming; `compact()` is a no-op.
//! - [`SelfCompressionStrategy`]: asks the backing gateway to write a
//!   structured summary, then clears history and injects the summary back
//!   as a system message.
//! - [`NoveltyAwareStrategy`]: wraps another strategy and uses a bigram
//!   novelty heuristic to avoid compressing while the conversation is still
//!   producing new content.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::chat_session::ChatSession;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::message::{CompletionConfig, Message};

#[async_trait]
pub trait ContextStrategy: Send + Sync {
    fn should_compact(&self, session: &ChatSession) -> bool;

    async fn compact(&self, session: &mut ChatSession, gateway: &dyn Gateway)
        -> Result<(), CoreError>;

    fn name(&self) -> &str;
}

/// Default strategy: delegates entirely to [`ChatSession`]'s own
/// oldest-first trimming. Never makes an extra gateway call.
pub struct TrimStrategy {
    /// Ratio of `token_count / max_tokens` above which `should_compact`
    /// returns `true`. Default: `0.85`.
    pub threshold: f64,
}

impl Default for TrimStrategy {
    fn default() -> Self {
        TrimStrategy { threshold: 0.85 }
    }
}

impl TrimStrategy {
    pub fn new(threshold: f64) -> Self {
        TrimStrategy { threshold }
    }
}

#[async_trait]
impl ContextStrategy for TrimStrategy {
    fn should_compact(&self, session: &ChatSession) -> bool {
        if session.max_tokens() == 0 {
            return false;
        }
        session.usage_ratio() > self.threshold
    }

    async fn compact(
        &self,
        _session: &mut ChatSession,
        _gateway: &dyn Gateway,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "TrimStrategy"
    }
}

/// "The model writes its own save file." Sends a compression prompt, parses
/// any `REFS:` line out of the response for callers that want to track
/// provenance, clears history, and injects the summary back as a system
/// message.
pub struct SelfCompressionStrategy {
    /// Token-pressure ratio above which compaction triggers. Default: `0.80`.
    pub threshold: f64,
}

impl Default for SelfCompressionStrategy {
    fn default() -> Self {
        SelfCompressionStrategy { threshold: 0.80 }
    }
}

impl SelfCompressionStrategy {
    pub fn new(threshold: f64) -> Self {
        SelfCompressionStrategy { threshold }
    }
}

const COMPRESSION_PROMPT: &str = "\
You are compressing your conversation memory into a structured save file. \
Write a concise summary covering:
1. Key Findings
2. Decisions Made
3. Current Task State
4. Open Questions
5. Next Steps

Be concise but preserve all critical information.";

#[async_trait]
impl ContextStrategy for SelfCompressionStrategy {
    fn should_compact(&self, session: &ChatSession) -> bool {
        if session.max_tokens() == 0 {
            return false;
        }
        session.usage_ratio() > self.threshold
    }

    async fn compact(
        &self,
        session: &mut ChatSession,
        gateway: &dyn Gateway,
    ) -> Result<(), CoreError> {
        let mut request = session.context();
        request.push(Message::user(COMPRESSION_PROMPT));

        let response = gateway
            .generate(&request, None, &CompletionConfig::default())
            .await?;

        let summary = response.message.content.to_string();
        session.clear_history();
        session.set_system_prompt(summary);
        Ok(())
    }

    fn name(&self) -> &str {
        "SelfCompressionStrategy"
    }
}

/// Entropy-heuristic wrapper that only triggers compression when the
/// conversation has low novelty.
///
/// At high token pressure (above `high_threshold`), compression always
/// fires. At moderate pressure (between `moderate_threshold` and
/// `high_threshold`), it only fires when the unique-bigram ratio between
/// recent messages and prior history is below `novelty_threshold` —
/// meaning the conversation is mostly rehashing old content and
/// compressing won't lose much.
pub struct NoveltyAwareStrategy {
    pub high_threshold: f64,
    pub moderate_threshold: f64,
    pub novelty_threshold: f64,
    pub recent_window: usize,
    pub inner: Box<dyn ContextStrategy>,
}

impl NoveltyAwareStrategy {
    pub fn new(inner: Box<dyn ContextStrategy>) -> Self {
        NoveltyAwareStrategy {
            high_threshold: 0.90,
            moderate_threshold: 0.70,
            novelty_threshold: 0.30,
            recent_window: 4,
            inner,
        }
    }

    pub fn with_thresholds(mut self, high: f64, moderate: f64, novelty: f64) -> Self {
        self.high_threshold = high;
        self.moderate_threshold = moderate;
        self.novelty_threshold = novelty;
        self
    }

    /// Returns `1.0` (fully novel) when there's insufficient history to compare.
    fn estimate_novelty(&self, session: &ChatSession) -> f64 {
        let history = session.history();
        if history.len() < 2 {
            return 1.0;
        }

        let split = history.len().saturating_sub(self.recent_window);
        let prior = &history[..split];
        let recent = &history[split..];

        let prior_ngrams = extract_bigrams_from_messages(prior);
        let recent_ngrams = extract_bigrams_from_messages(recent);

        if recent_ngrams.is_empty() {
            return 1.0;
        }

        let novel_count = recent_ngrams
            .iter()
            .filter(|ng| !prior_ngrams.contains(*ng))
            .count();

        novel_count as f64 / recent_ngrams.len() as f64
    }
}

#[async_trait]
impl ContextStrategy for NoveltyAwareStrategy {
    fn should_compact(&self, session: &ChatSession) -> bool {
        if session.max_tokens() == 0 {
            return false;
        }
        let ratio = session.usage_ratio();

        if ratio > self.high_threshold {
            return true;
        }

        if ratio > self.moderate_threshold {
            return self.estimate_novelty(session) < self.novelty_threshold;
        }

        false
    }

    async fn compact(
        &self,
        session: &mut ChatSession,
        gateway: &dyn Gateway,
    ) -> Result<(), CoreError> {
        self.inner.compact(session, gateway).await
    }

    fn name(&self) -> &str {
        "NoveltyAwareStrategy"
    }
}

/// Parses a `REFS: 10, 25, 42` line out of a compression response, returning
/// the first match or an empty vec if none is present. Non-numeric entries
/// in the comma-separated list are skipped rather than failing the parse.
pub fn parse_refs(content: &str) -> Vec<u64> {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("REFS:") {
            return rest
                .split(',')
                .filter_map(|s| s.trim().parse::<u64>().ok())
                .collect();
        }
    }
    vec![]
}

fn extract_bigrams_from_messages(messages: &[Message]) -> HashSet<String> {
    let mut bigrams = HashSet::new();
    for msg in messages {
        let words: Vec<&str> = msg.content.split_whitespace().collect();
        for pair in words.windows(2) {
            bigrams.insert(format!(
                "{} {}",
                pair[0].to_lowercase(),
                pair[1].to_lowercase()
            ));
        }
    }
    bigrams
}
