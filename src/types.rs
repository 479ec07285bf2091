//! Shared types passed between pipeline stages.

use serde::{Deserialize, Serialize};

/// Where a page's caption/hashtags came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// Reused verbatim from the content cache.
    Cache,
    /// Freshly produced by the generation endpoint.
    Generated,
    /// Deterministic local content after the endpoint failed or was skipped.
    Fallback,
}

/// Input/output token counters for cost reporting. Correctness never
/// depends on these; failed calls are billed with assumed counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// One page's resolved text content.
///
/// Invariants maintained by the sanitizer in [`crate::content`]:
/// the caption is whitespace-collapsed, free of banned terms and bare URLs,
/// and non-empty; `hashtags` holds exactly the configured count, each
/// matching `#\S+`, with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub usage: TokenUsage,
    pub source: ContentSource,
}

/// A decoded, normalized input photograph. Lives for one build only.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Normalized JPEG re-encode, embedded in the sheet and sent to the
    /// generation endpoint.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the downscaled pixels — the cache key.
    pub content_hash: String,
    /// Average-color mood (red channel dominant) driving fallback captions.
    pub warm: bool,
}

impl SourceImage {
    /// Pixel aspect ratio as height/width, used by the layout fitter.
    pub fn aspect(&self) -> f64 {
        self.height as f64 / self.width.max(1) as f64
    }
}
