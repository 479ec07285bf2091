//! Sheet configuration module.
//!
//! Handles loading and validating `snapsheet.toml`. Every tuning knob of the
//! layout fitter and the generation client lives here as a named value with a
//! documented default — none of them are inlined at the call sites, so each
//! can be unit-tested and overridden independently.
//!
//! ## Config File Location
//!
//! Place `snapsheet.toml` inside the photo directory the build reads from.
//! The file is optional; missing means stock defaults.
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! # Only bump the hashtag count
//! [generation]
//! hashtag_count = 6
//! ```
//!
//! Unknown keys are rejected to catch typos early. Run
//! `snapsheet gen-config` for a stock file with every option documented.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default config file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "snapsheet.toml";

/// Top-level configuration loaded from `snapsheet.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Page geometry and fit heuristics.
    pub layout: LayoutConfig,
    /// Caption/hashtag generation settings.
    pub generation: GenerationConfig,
    /// Token pricing for the cost estimate.
    pub pricing: PricingConfig,
    /// Concurrency settings.
    pub processing: ProcessingConfig,
}

/// Page geometry and the named constants of the layout fitter.
///
/// All lengths are inches, all font sizes points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub page_width_in: f64,
    pub page_height_in: f64,
    pub margin_top_in: f64,
    pub margin_bottom_in: f64,
    pub margin_left_in: f64,
    pub margin_right_in: f64,
    /// Bold date heading size.
    pub date_pt: f64,
    /// Caption and hashtag line size at the normal tier.
    pub caption_pt: f64,
    /// Caption and hashtag line size at the compact tier.
    pub caption_compact_pt: f64,
    /// Contact block size (always one notch under the caption).
    pub contact_pt: f64,
    /// Line height multiplier over the font size.
    pub line_spacing: f64,
    /// Estimated characters per inch of column at the normal caption size.
    pub chars_per_inch: f64,
    /// Floor for the wrap estimate so narrow columns don't explode line counts.
    pub min_chars_per_line: usize,
    /// Image width multiplier per shrink-loop iteration.
    pub shrink_factor: f64,
    /// The shrink loop stops narrowing below this width.
    pub min_image_width_in: f64,
    /// Available image height never drops below this, even on text-heavy pages.
    pub min_image_height_in: f64,
    /// Vertical padding above the image block.
    pub heading_padding_in: f64,
    /// Slack subtracted from the available height to absorb renderer rounding.
    pub safety_buffer_in: f64,
    /// Captions longer than this are pre-truncated with an ellipsis.
    pub caption_max_chars: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width_in: 8.27,
            page_height_in: 11.69,
            margin_top_in: 0.5,
            margin_bottom_in: 0.5,
            margin_left_in: 0.5,
            margin_right_in: 0.5,
            date_pt: 11.0,
            caption_pt: 10.0,
            caption_compact_pt: 9.0,
            contact_pt: 9.5,
            line_spacing: 1.15,
            chars_per_inch: 13.0,
            min_chars_per_line: 20,
            shrink_factor: 0.95,
            min_image_width_in: 2.2,
            min_image_height_in: 0.5,
            heading_padding_in: 0.12,
            safety_buffer_in: 0.25,
            caption_max_chars: 420,
        }
    }
}

impl LayoutConfig {
    /// Width of the text column (page width minus side margins).
    pub fn column_width_in(&self) -> f64 {
        self.page_width_in - self.margin_left_in - self.margin_right_in
    }

    /// Vertical space between the margins.
    pub fn content_height_in(&self) -> f64 {
        self.page_height_in - self.margin_top_in - self.margin_bottom_in
    }
}

/// Settings for the external caption/hashtag generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// API root; the model path is appended.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key. An empty or unset key means
    /// the client skips the network entirely and produces fallback content.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Exactly this many hashtags on every page.
    pub hashtag_count: usize,
    /// Substituted when a generated caption sanitizes down to nothing.
    pub default_caption: String,
    /// Cycled to pad the hashtag list up to `hashtag_count`.
    pub default_hashtags: Vec<String>,
    /// Case-insensitively removed from captions and dropped from hashtags.
    pub banned_terms: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 40,
            hashtag_count: 4,
            default_caption: "A moment worth sharing ✨".to_string(),
            default_hashtags: vec![
                "#travel".to_string(),
                "#wanderlust".to_string(),
                "#goodvibes".to_string(),
                "#discover".to_string(),
            ],
            banned_terms: vec![],
        }
    }
}

/// Per-million-token rates for the cost estimate attached to build output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// Multiplier from the provider's billing currency into the reporting one.
    pub currency_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: 0.10,
            output_per_million: 0.40,
            currency_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Bound on simultaneous in-flight generation requests.
    pub max_concurrent_requests: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
        }
    }
}

impl SheetConfig {
    /// Load from an explicit file path.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `snapsheet.toml` from a directory, falling back to defaults if
    /// the file doesn't exist. Parse and validation errors still fail — a
    /// present-but-broken config should never be silently ignored.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            Self::load_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate invariants the serde layer can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.layout;
        if l.page_width_in <= 0.0 || l.page_height_in <= 0.0 {
            return Err(ConfigError::Validation(
                "layout: page dimensions must be positive".to_string(),
            ));
        }
        for (name, v) in [
            ("margin_top_in", l.margin_top_in),
            ("margin_bottom_in", l.margin_bottom_in),
            ("margin_left_in", l.margin_left_in),
            ("margin_right_in", l.margin_right_in),
        ] {
            if v < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "layout: {name} must not be negative"
                )));
            }
        }
        if l.margin_left_in >= l.page_width_in / 2.0
            || l.margin_right_in >= l.page_width_in / 2.0
            || l.margin_top_in >= l.page_height_in / 2.0
            || l.margin_bottom_in >= l.page_height_in / 2.0
        {
            return Err(ConfigError::Validation(
                "layout: each margin must stay under half the matching page dimension"
                    .to_string(),
            ));
        }
        if l.shrink_factor <= 0.0 || l.shrink_factor >= 1.0 {
            return Err(ConfigError::Validation(
                "layout: shrink_factor must be between 0 and 1 exclusive".to_string(),
            ));
        }
        if l.caption_compact_pt > l.caption_pt {
            return Err(ConfigError::Validation(
                "layout: caption_compact_pt must not exceed caption_pt".to_string(),
            ));
        }
        if l.chars_per_inch <= 0.0 || l.line_spacing <= 0.0 || l.caption_pt <= 0.0 {
            return Err(ConfigError::Validation(
                "layout: font sizes, chars_per_inch and line_spacing must be positive"
                    .to_string(),
            ));
        }
        // a ceiling under one wrapped line truncates every caption to "…"
        if l.caption_max_chars < l.min_chars_per_line {
            return Err(ConfigError::Validation(
                "layout: caption_max_chars must be at least min_chars_per_line".to_string(),
            ));
        }

        let g = &self.generation;
        if g.hashtag_count == 0 {
            return Err(ConfigError::Validation(
                "generation: hashtag_count must be at least 1".to_string(),
            ));
        }
        if g.default_hashtags.is_empty() {
            return Err(ConfigError::Validation(
                "generation: default_hashtags must not be empty (used for padding)"
                    .to_string(),
            ));
        }
        if g.default_caption.trim().is_empty() {
            return Err(ConfigError::Validation(
                "generation: default_caption must not be blank".to_string(),
            ));
        }
        if g.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "generation: timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.processing.max_concurrent_requests == 0 {
            return Err(ConfigError::Validation(
                "processing: max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The documented stock config printed by `snapsheet gen-config`.
    pub fn stock_toml() -> &'static str {
        include_str!("stock_config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Defaults & parsing
    // =========================================================================

    #[test]
    fn default_config_validates() {
        SheetConfig::default().validate().unwrap();
    }

    #[test]
    fn stock_toml_parses_and_matches_defaults() {
        let parsed: SheetConfig = toml::from_str(SheetConfig::stock_toml()).unwrap();
        parsed.validate().unwrap();
        let stock = SheetConfig::default();
        assert_eq!(parsed.layout, stock.layout);
        assert_eq!(parsed.generation.hashtag_count, stock.generation.hashtag_count);
        assert_eq!(
            parsed.generation.default_hashtags,
            stock.generation.default_hashtags
        );
        assert_eq!(
            parsed.processing.max_concurrent_requests,
            stock.processing.max_concurrent_requests
        );
    }

    #[test]
    fn sparse_config_overrides_one_value() {
        let config: SheetConfig = toml::from_str(
            r#"
            [generation]
            hashtag_count = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.hashtag_count, 6);
        // everything else keeps defaults
        assert_eq!(config.layout.caption_pt, 10.0);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<SheetConfig, _> = toml::from_str(
            r#"
            [layout]
            page_widht_in = 8.5
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn load_dir_without_file_returns_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = SheetConfig::load_dir(tmp.path()).unwrap();
        assert_eq!(config.generation.hashtag_count, 4);
    }

    #[test]
    fn load_dir_with_broken_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILENAME), "not [valid toml").unwrap();
        assert!(SheetConfig::load_dir(tmp.path()).is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn oversized_margin_rejected() {
        let mut config = SheetConfig::default();
        config.layout.margin_left_in = 4.5; // more than half of 8.27
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn negative_margin_rejected() {
        let mut config = SheetConfig::default();
        config.layout.margin_top_in = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shrink_factor_of_one_rejected() {
        let mut config = SheetConfig::default();
        config.layout.shrink_factor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn compact_tier_larger_than_normal_rejected() {
        let mut config = SheetConfig::default();
        config.layout.caption_compact_pt = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_caption_ceiling_rejected() {
        let mut config = SheetConfig::default();
        config.layout.caption_max_chars = 0;
        assert!(config.validate().is_err());
        config.layout.caption_max_chars = 5; // below min_chars_per_line
        assert!(config.validate().is_err());
        config.layout.caption_max_chars = config.layout.min_chars_per_line;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_hashtag_count_rejected() {
        let mut config = SheetConfig::default();
        config.generation.hashtag_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_default_hashtags_rejected() {
        let mut config = SheetConfig::default();
        config.generation.default_hashtags.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = SheetConfig::default();
        config.processing.max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Derived geometry
    // =========================================================================

    #[test]
    fn column_width_subtracts_side_margins() {
        let l = LayoutConfig::default();
        assert!((l.column_width_in() - (8.27 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn content_height_subtracts_vertical_margins() {
        let l = LayoutConfig::default();
        assert!((l.content_height_in() - (11.69 - 1.0)).abs() < 1e-9);
    }
}
