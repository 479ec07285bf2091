//! # Snapsheet
//!
//! Turns a batch of photos into a printable monthly content sheet: one page
//! per photo, each carrying a posting date, the photo itself, a short
//! caption, and a hashtag line. Captions and hashtags come from a multimodal
//! generation endpoint when a key is configured, and from deterministic
//! defaults when it isn't — a build never fails because the network did.
//!
//! # Architecture: One Pipeline, Ordered Pages
//!
//! A build flows through four phases:
//!
//! ```text
//! 1. Schedule   month + interval  →  posting dates   (all-or-nothing)
//! 2. Prepare    raw bytes         →  normalized JPEG + content hash
//! 3. Resolve    hash              →  caption/hashtags (cache → endpoint → fallback)
//! 4. Assemble   per-photo layout  →  one HTML document, input order
//! ```
//!
//! Phase 3 fans out across photos under a bounded semaphore; everything else
//! is sequential. Page order is always the input order — results land in
//! index-addressed slots, never appended as they complete.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`schedule`] | Posting-date assignment with the day-29 print cutoff |
//! | [`imaging`] | Decode, normalize to RGB8 JPEG, derive content hash and color mood |
//! | [`content`] | Generation client: prompt, JSON extraction, sanitization, fallback |
//! | [`cache`] | Durable content cache keyed by image content hash, namespaced per requester |
//! | [`layout`] | Per-page fitting: line estimation, shrink loop, font tiers |
//! | [`document`] | Maud renderer — one print-ready HTML document with page breaks |
//! | [`pipeline`] | Orchestration: fan-out, slotting, assembly, reporting |
//! | [`ledger`] | Append-only token-usage ledger and cost estimation |
//! | [`config`] | `snapsheet.toml` loading, defaults, validation |
//! | [`types`] | Shared value types (`SourceImage`, `GeneratedContent`, `TokenUsage`) |
//!
//! # Design Decisions
//!
//! ## Content-Hash Caching
//!
//! Cache keys are derived from a downscaled copy of the decoded pixels, not
//! from file bytes or names. Re-exported, renamed, or re-saved copies of the
//! same photo hit the same cache entry, so a hotel re-uploading last month's
//! folder pays for zero new generation calls.
//!
//! ## Fallback Over Failure
//!
//! Every per-photo hazard degrades instead of aborting: an unreadable image
//! becomes a placeholder page, a failed or malformed generation response
//! becomes mood-keyed default content. Only bad *inputs* — an empty batch,
//! an invalid month, an interval that can't seat every photo before the
//! cutoff — reject the build, and they do so before any money is spent.
//!
//! ## Maud Over Template Engines
//!
//! The sheet is rendered with [Maud](https://maud.lambda.xyz/): compile-time
//! checked HTML, auto-escaped interpolation (captions are model output —
//! escaping is not optional), and no template files to ship. Print geometry
//! is plain CSS `@page` rules, so any browser's print dialog produces the
//! physical sheet.

pub mod cache;
pub mod config;
pub mod content;
pub mod document;
pub mod imaging;
pub mod layout;
pub mod ledger;
pub mod pipeline;
pub mod schedule;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
