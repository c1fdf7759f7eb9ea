//! Token counting for context-window budgeting
//!
//! Exact tokenization varies by model provider, so the encoder is pluggable
//! behind the [`Tokenizer`] trait. The default estimator approximates a
//! general-purpose subword encoding from character counts. Counting is pure
//! CPU and runs once per message per history load, so implementations should
//! stay allocation-light.

use crate::thread::Message;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Fallback heuristic: roughly four characters per token.
const FALLBACK_CHARS_PER_TOKEN: usize = 4;

/// Error produced by a tokenizer implementation
#[derive(Debug, Clone, Error)]
#[error("Tokenizer error: {0}")]
pub struct TokenizerError(pub String);

/// Pluggable text encoder used for token counting
pub trait Tokenizer: Send + Sync {
    /// Encode `text` and return the number of tokens it produces
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;
}

/// Character-ratio estimator for subword encodings
///
/// Conservative approximations per provider family; an exact encoder can be
/// swapped in through the [`Tokenizer`] trait without touching callers.
#[derive(Debug, Clone)]
pub struct SubwordEstimator {
    /// Average characters per token
    chars_per_token: f32,
}

impl Default for SubwordEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SubwordEstimator {
    /// Create an estimator with the common English-text ratio
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }

    /// Create an estimator tuned for a specific provider family
    pub fn for_provider(provider: &str) -> Self {
        match provider.to_lowercase().as_str() {
            "openai" | "google" => Self {
                chars_per_token: 4.0,
            },
            // Claude tokenizers tend to produce slightly smaller tokens
            "anthropic" => Self {
                chars_per_token: 3.5,
            },
            _ => Self::new(),
        }
    }
}

impl Tokenizer for SubwordEstimator {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        if !self.chars_per_token.is_finite() || self.chars_per_token <= 0.0 {
            return Err(TokenizerError(format!(
                "invalid chars-per-token ratio: {}",
                self.chars_per_token
            )));
        }
        Ok((text.len() as f32 / self.chars_per_token).ceil() as usize)
    }
}

/// Token counter over a pluggable encoder
///
/// Never fails: an encoder error degrades to a character-count heuristic and
/// a log line, and every message with content costs at least one token.
#[derive(Clone)]
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(Arc::new(SubwordEstimator::new()))
    }
}

impl TokenCounter {
    /// Create a counter over the given encoder
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Count tokens for a single message, formatted as `"{role}: {content}"`
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        let formatted = format!("{}: {}", message.role, message.content);
        match self.tokenizer.count(&formatted) {
            Ok(count) => count.max(1),
            Err(e) => {
                warn!("Token encoding failed, using character heuristic: {}", e);
                (message.content.len() / FALLBACK_CHARS_PER_TOKEN).max(1)
            }
        }
    }

    /// Sum of per-message counts
    ///
    /// No per-message or per-conversation overhead is added; totals are a
    /// plain sum of the individual estimates.
    pub fn count_total_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count_message_tokens(m)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::MessageRole;
    use uuid::Uuid;

    struct FailingTokenizer;

    impl Tokenizer for FailingTokenizer {
        fn count(&self, _text: &str) -> Result<usize, TokenizerError> {
            Err(TokenizerError("boom".to_string()))
        }
    }

    fn message(content: &str) -> Message {
        Message::new(Uuid::new_v4(), MessageRole::User, content)
    }

    #[test]
    fn test_count_includes_role_prefix() {
        let counter = TokenCounter::default();
        // "user: " adds six characters on top of the content
        let short = counter.count_message_tokens(&message(""));
        let long = counter.count_message_tokens(&message("a".repeat(100).as_str()));
        assert!(long > short);
        assert!(short >= 1);
    }

    #[test]
    fn test_estimator_ratio() {
        let estimator = SubwordEstimator::new();
        assert_eq!(estimator.count(&"a".repeat(100)).unwrap(), 25);
    }

    #[test]
    fn test_provider_presets() {
        let openai = SubwordEstimator::for_provider("openai");
        let anthropic = SubwordEstimator::for_provider("anthropic");
        let text = "This is a test message with some content.";
        assert!(anthropic.count(text).unwrap() >= openai.count(text).unwrap());
    }

    #[test]
    fn test_encoder_failure_falls_back_to_heuristic() {
        let counter = TokenCounter::new(Arc::new(FailingTokenizer));
        let count = counter.count_message_tokens(&message(&"x".repeat(40)));
        assert_eq!(count, 10);
    }

    #[test]
    fn test_fallback_is_at_least_one() {
        let counter = TokenCounter::new(Arc::new(FailingTokenizer));
        assert_eq!(counter.count_message_tokens(&message("")), 1);
        assert_eq!(counter.count_message_tokens(&message("ab")), 1);
    }

    #[test]
    fn test_total_is_plain_sum() {
        let counter = TokenCounter::default();
        let messages = vec![message("hello"), message("world"), message("again")];
        let total: usize = messages
            .iter()
            .map(|m| counter.count_message_tokens(m))
            .sum();
        assert_eq!(counter.count_total_tokens(&messages), total);
    }
}
