//! Caption and hashtag generation.
//!
//! [`GenerationClient`] asks a Gemini-style multimodal endpoint for one
//! caption and a fixed number of hashtags per photo, then forces whatever
//! comes back through a strict parse-and-sanitize funnel. Model output is
//! treated as hostile input: fenced code blocks, surrounding prose,
//! truncated JSON, banned vocabulary, bare URLs, and wrong hashtag counts
//! are all expected and handled.
//!
//! ## Nothing here ever fails the build
//!
//! Every failure mode — no API key, network error, non-2xx status, timeout,
//! undecodable JSON — collapses into deterministic fallback content computed
//! locally from the photo itself (its warm/cool average color picks the
//! caption). Callers get a [`GeneratedContent`] unconditionally; the
//! `source` field says which path produced it.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::GenerationConfig;
use crate::types::{ContentSource, GeneratedContent, SourceImage, TokenUsage};

/// Token counts billed for a call that failed before usage was reported.
const ASSUMED_INPUT_TOKENS: u64 = 1120;
const ASSUMED_OUTPUT_TOKENS: u64 = 96;

/// Fallback captions, keyed by the photo's average-color mood.
const FALLBACK_CAPTION_WARM: &str =
    "Warm tones set the mood here, comfort comes standard 🌅✨";
const FALLBACK_CAPTION_COOL: &str =
    "Cool tones and calm waters, a quiet kind of escape 🌿✨";

#[derive(Debug, Error)]
enum CallError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned {0}")]
    Status(StatusCode),
    #[error("response carried no text part")]
    EmptyResponse,
    #[error("no JSON object in response text")]
    MissingJson,
    #[error("JSON decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

// Wire shape of a generateContent response. Only the fields we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

/// The strict shape the model is instructed to return.
#[derive(Debug, Deserialize)]
struct RawGenerated {
    caption: String,
    hashtags: Vec<String>,
}

/// Client for the external caption/hashtag endpoint.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: Option<String>,
}

impl GenerationClient {
    /// `api_key: None` (or empty) puts the client in offline mode: every
    /// call short-circuits to fallback content without touching the network.
    pub fn new(config: GenerationConfig, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        }
    }

    /// Produce content for one photo. Infallible by contract — see the
    /// module docs.
    pub async fn generate(
        &self,
        image: &SourceImage,
        subject: &str,
        contact: &str,
    ) -> GeneratedContent {
        let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return self.fallback(image, TokenUsage::default());
        };
        match self.call(image, subject, contact, key).await {
            Ok(content) => content,
            Err(_) => self.fallback(
                image,
                TokenUsage {
                    input: ASSUMED_INPUT_TOKENS,
                    output: ASSUMED_OUTPUT_TOKENS,
                },
            ),
        }
    }

    async fn call(
        &self,
        image: &SourceImage,
        subject: &str,
        contact: &str,
        api_key: &str,
    ) -> Result<GeneratedContent, CallError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            api_key
        );
        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&json!({
                "contents": [{
                    "parts": [
                        {"text": build_prompt(&self.config, subject, contact)},
                        {"inline_data": {
                            "mime_type": "image/jpeg",
                            "data": BASE64.encode(&image.jpeg),
                        }}
                    ]
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CallError::Status(response.status()));
        }
        let payload: GenerateContentResponse = response.json().await?;

        let text = payload
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .map(|parts| {
                parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(CallError::EmptyResponse)?;

        let block = extract_json_block(&text).ok_or(CallError::MissingJson)?;
        let raw: RawGenerated = serde_json::from_str(&block)?;

        let usage = match payload.usage_metadata {
            Some(u) => TokenUsage {
                input: u.prompt_token_count.unwrap_or(ASSUMED_INPUT_TOKENS),
                output: u.candidates_token_count.unwrap_or(ASSUMED_OUTPUT_TOKENS),
            },
            None => TokenUsage {
                input: ASSUMED_INPUT_TOKENS,
                output: ASSUMED_OUTPUT_TOKENS,
            },
        };

        Ok(GeneratedContent {
            caption: sanitize_caption(&raw.caption, &self.config),
            hashtags: sanitize_hashtags(raw.hashtags, &self.config),
            usage,
            source: ContentSource::Generated,
        })
    }

    /// Deterministic, network-free content for one photo.
    pub fn fallback(&self, image: &SourceImage, usage: TokenUsage) -> GeneratedContent {
        let caption = if image.warm {
            FALLBACK_CAPTION_WARM
        } else {
            FALLBACK_CAPTION_COOL
        };
        GeneratedContent {
            caption: sanitize_caption(caption, &self.config),
            hashtags: sanitize_hashtags(vec![], &self.config),
            usage,
            source: ContentSource::Fallback,
        }
    }
}

/// Instructional prompt sent alongside the photo.
fn build_prompt(config: &GenerationConfig, subject: &str, contact: &str) -> String {
    let mut prompt = format!(
        "Write one single-sentence social media caption for the attached photo. \
         Use two or three emoji, no more. Keep a polished, inviting tone and \
         write in the third person plural. Do not name the venue and do not \
         include any URL or contact details. Also produce exactly {count} \
         hashtags fitting the photo, each starting with '#'.\n\
         Reply with JSON only, no prose, no code fences:\n\
         {{\n  \"caption\": \"<one sentence with emoji>\",\n  \"hashtags\": [{tags}]\n}}",
        count = config.hashtag_count,
        tags = vec!["\"#...\""; config.hashtag_count].join(", "),
    );
    if !subject.trim().is_empty() {
        prompt.push_str(&format!("\nThe photo belongs to: {}", subject.trim()));
    }
    if !contact.trim().is_empty() {
        prompt.push_str(&format!(
            "\nFor context only (never quote it): {}",
            contact.trim()
        ));
    }
    prompt
}

/// Slice model text down to its JSON object.
///
/// Models wrap JSON in code fences or surround it with prose; some truncate
/// the tail. Takes the first `{` through the last `}` and pads missing
/// closing braces when the object was cut off.
fn extract_json_block(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let tail = &text[start..];
    let mut block = match tail.rfind('}') {
        Some(end) => tail[..=end].to_string(),
        None => tail.to_string(),
    };
    let opens = block.matches('{').count();
    let closes = block.matches('}').count();
    for _ in closes..opens {
        block.push('}');
    }
    Some(block)
}

/// Clean one caption: collapse whitespace, drop tokens containing banned
/// terms or bare URLs, substitute the configured default if nothing is left.
pub fn sanitize_caption(raw: &str, config: &GenerationConfig) -> String {
    let banned: Vec<String> = config
        .banned_terms
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let kept: Vec<&str> = raw
        .split_whitespace()
        .filter(|word| {
            let lower = word.to_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                return false;
            }
            !banned.iter().any(|term| lower.contains(term.as_str()))
        })
        .collect();

    let caption = kept.join(" ");
    if caption.is_empty() {
        config.default_caption.clone()
    } else {
        caption
    }
}

/// Normalize a hashtag list to exactly `hashtag_count` tags.
///
/// Forces a leading `#`, strips inner whitespace, drops duplicates
/// (order-preserving, case-insensitive) and banned matches, truncates to
/// the configured count, and pads shortfalls by cycling the default list —
/// with a numeric suffix on repeat passes so padding can never stall on
/// duplicates.
pub fn sanitize_hashtags(raw: Vec<String>, config: &GenerationConfig) -> Vec<String> {
    let banned: Vec<String> = config
        .banned_terms
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut tags: Vec<String> = Vec::with_capacity(config.hashtag_count);
    let mut seen: Vec<String> = Vec::new();

    let push_tag = |candidate: &str, tags: &mut Vec<String>, seen: &mut Vec<String>| {
        let body: String = candidate
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if body.is_empty() {
            return;
        }
        let lower = body.to_lowercase();
        if seen.contains(&lower) {
            return;
        }
        if banned.iter().any(|term| lower.contains(term.as_str())) {
            return;
        }
        seen.push(lower);
        tags.push(format!("#{body}"));
    };

    for candidate in &raw {
        if tags.len() == config.hashtag_count {
            break;
        }
        push_tag(candidate, &mut tags, &mut seen);
    }

    // Pad by cycling the defaults; repeat passes carry a numeric suffix so
    // a short or duplicate-heavy default list can't stall the fill.
    for round in 0..=config.hashtag_count {
        if tags.len() == config.hashtag_count {
            break;
        }
        for default in &config.default_hashtags {
            if tags.len() == config.hashtag_count {
                break;
            }
            let candidate = if round == 0 {
                default.clone()
            } else {
                format!("{default}{round}")
            };
            push_tag(&candidate, &mut tags, &mut seen);
        }
    }

    // Pathological config (every default banned): neutral numbered tags
    let mut n = 1;
    while tags.len() < config.hashtag_count {
        let body = format!("photo{n}");
        if !seen.contains(&body) {
            seen.push(body.clone());
            tags.push(format!("#{body}"));
        }
        n += 1;
    }

    tags.truncate(config.hashtag_count);
    tags
}
