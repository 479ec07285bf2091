//! Usage ledger and cost estimation.
//!
//! Token counters flow out of every build — including assumed counts for
//! calls that failed — and land here as one ledger row per build. The
//! ledger is reporting only; nothing reads it back into the pipeline.
//!
//! Storage follows the same durable-JSON-file pattern as the content
//! cache: versioned, load-or-empty on corruption, one whole-file write per
//! append. Each build touches exactly its own row, so a failed build can't
//! corrupt another's accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::PricingConfig;
use crate::types::TokenUsage;

const LEDGER_VERSION: u32 = 1;

/// One build's usage record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRow {
    pub timestamp: DateTime<Utc>,
    /// Requester namespace, `shared` when anonymous.
    pub namespace: String,
    pub pages: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Derived at write time with the rates in force; historical rows keep
    /// the rate they were billed under.
    pub cost: f64,
}

/// Append-only usage store backed by a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLedger {
    pub version: u32,
    pub rows: Vec<UsageRow>,
    #[serde(skip)]
    path: PathBuf,
}

impl UsageLedger {
    pub fn empty(path: PathBuf) -> Self {
        Self {
            version: LEDGER_VERSION,
            rows: Vec::new(),
            path,
        }
    }

    /// Load from `path`; missing, corrupt, or version-mismatched files
    /// yield an empty ledger.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(path.to_path_buf()),
        };
        let mut ledger: Self = match serde_json::from_str(&content) {
            Ok(l) => l,
            Err(_) => return Self::empty(path.to_path_buf()),
        };
        if ledger.version != LEDGER_VERSION {
            return Self::empty(path.to_path_buf());
        }
        ledger.path = path.to_path_buf();
        ledger
    }

    /// Append one row and persist immediately.
    pub fn record(
        &mut self,
        namespace: Option<&str>,
        pages: usize,
        usage: TokenUsage,
        pricing: &PricingConfig,
    ) -> io::Result<()> {
        self.rows.push(UsageRow {
            timestamp: Utc::now(),
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .unwrap_or("shared")
                .to_string(),
            pages,
            input_tokens: usage.input,
            output_tokens: usage.output,
            cost: estimate_cost(usage, pricing),
        });
        self.save()
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, json)
    }
}

/// Monetary estimate: tokens × per-million rates × currency multiplier.
pub fn estimate_cost(usage: TokenUsage, pricing: &PricingConfig) -> f64 {
    let raw = usage.input as f64 / 1_000_000.0 * pricing.input_per_million
        + usage.output as f64 / 1_000_000.0 * pricing.output_per_million;
    raw * pricing.currency_rate
}
