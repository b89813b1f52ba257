use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// API usage counters shared across worker threads.
///
/// Tokens are approximated as `words(prompt) + 1.5 * words(response)`.
/// They are accumulated in half-token units so the total stays exact and
/// can live in an atomic.
#[derive(Debug, Default)]
pub struct UsageStats {
    calls: AtomicU64,
    half_tokens: AtomicU64,
}

/// Point-in-time copy of `UsageStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub approx_tokens: f64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call that was actually made. Pass `""` as the response
    /// when the call failed.
    pub fn record(&self, prompt: &str, response: &str) {
        let half = 2 * word_count(prompt) + 3 * word_count(response);
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.half_tokens.fetch_add(half, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            approx_tokens: self.half_tokens.load(Ordering::Relaxed) as f64 / 2.0,
        }
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.half_tokens.store(0, Ordering::Relaxed);
    }
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
