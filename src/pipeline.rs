//! The build pipeline: images in, finished sheet out.
//!
//! Drives the full flow for one request: validate inputs, assign dates,
//! normalize every photo, resolve caption/hashtag content (cache, endpoint,
//! or fallback), fit each page, and render the document.
//!
//! ## Concurrency model
//!
//! Content resolution fans out one task per photo on a [`JoinSet`] and fans
//! back in through a slot vector indexed by input position — page order is
//! fixed by the input order, never by completion order. A semaphore owned
//! by the pipeline instance (not a process global, so parallel pipelines
//! and tests don't share state) bounds how many endpoint calls are in
//! flight; everything outside the network call runs unthrottled.
//!
//! Rendering stays sequential: it appends to one output document.
//!
//! ## Failure containment
//!
//! Only bad *inputs* abort a build: an invalid month, an interval that
//! can't seat every image before the cutoff, or an empty image list. An
//! undecodable image costs one placeholder page; a failed or timed-out
//! generation call costs nothing visible at all (fallback content). The
//! cache file and the usage ledger are written as whole-row upserts, so one
//! page's failure can't corrupt another's record.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheStats, ContentCache};
use crate::config::{GenerationConfig, SheetConfig};
use crate::content::{GenerationClient, sanitize_hashtags};
use crate::document::{SheetPage, render_sheet};
use crate::imaging::prepare_image;
use crate::layout::{fit_page, truncate_caption};
use crate::ledger::{UsageLedger, estimate_cost};
use crate::schedule::{ScheduleError, build_schedule};
use crate::types::{ContentSource, GeneratedContent, SourceImage, TokenUsage};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no images supplied")]
    NoImages,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One sheet-build request, as validated by the caller.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub year: i32,
    pub month: u32,
    pub interval_days: u32,
    /// Subject name passed to the generation prompt (never printed).
    pub subject: String,
    /// Contact block printed on every page when non-empty.
    pub contact: String,
    /// Cache/ledger namespace, typically the requesting account.
    pub namespace: Option<String>,
}

/// Build result: the document plus reporting metadata.
#[derive(Debug)]
pub struct SheetOutput {
    pub html: Vec<u8>,
    pub pages: usize,
    pub usage: TokenUsage,
    /// Derived monetary estimate; reporting only.
    pub cost: f64,
    pub cache_stats: CacheStats,
}

/// Owns everything one build flow needs: client, cache, ledger, and the
/// concurrency gate.
pub struct SheetPipeline {
    config: SheetConfig,
    client: GenerationClient,
    cache: ContentCache,
    ledger: Option<UsageLedger>,
    gate: Arc<Semaphore>,
}

impl SheetPipeline {
    pub fn new(
        config: SheetConfig,
        api_key: Option<String>,
        cache: ContentCache,
        ledger: Option<UsageLedger>,
    ) -> Self {
        let gate = Arc::new(Semaphore::new(config.processing.max_concurrent_requests));
        let client = GenerationClient::new(config.generation.clone(), api_key);
        Self {
            config,
            client,
            cache,
            ledger,
            gate,
        }
    }

    /// Build one sheet. See the module docs for the failure contract.
    pub async fn build_sheet(
        &mut self,
        images: &[Vec<u8>],
        request: &BuildRequest,
    ) -> Result<SheetOutput, PlanError> {
        if images.is_empty() {
            return Err(PlanError::NoImages);
        }
        let dates = build_schedule(
            request.year,
            request.month,
            request.interval_days,
            images.len(),
        )?;

        // Normalize every photo up front; decode failures become
        // placeholder pages, not aborts.
        let prepared: Vec<Option<Arc<SourceImage>>> = images
            .iter()
            .map(|raw| prepare_image(raw).ok().map(Arc::new))
            .collect();

        let namespace = request.namespace.as_deref();
        let mut stats = CacheStats::default();
        let mut slots: Vec<Option<GeneratedContent>> = vec![None; images.len()];

        let mut join_set = JoinSet::new();
        for (index, maybe_image) in prepared.iter().enumerate() {
            let Some(image) = maybe_image else {
                continue; // placeholder page, resolved during assembly
            };
            if let Some(record) = self.cache.get(namespace, &image.content_hash) {
                stats.hit();
                let mut content = record.content.clone();
                content.source = ContentSource::Cache;
                // a hit bills nothing this build
                content.usage = TokenUsage::default();
                slots[index] = Some(content);
                continue;
            }
            stats.miss();

            let client = self.client.clone();
            let gate = Arc::clone(&self.gate);
            let image = Arc::clone(image);
            let subject = request.subject.clone();
            let contact = request.contact.clone();
            join_set.spawn(async move {
                let content = match gate.acquire_owned().await {
                    Ok(_permit) => client.generate(&image, &subject, &contact).await,
                    // the gate is never closed; if it somehow is, degrade
                    Err(_) => client.fallback(&image, TokenUsage::default()),
                };
                (index, content)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            // a panicked task leaves its slot empty; assembly fills it
            let Ok((index, content)) = joined else {
                continue;
            };
            if let Some(image) = &prepared[index] {
                self.cache
                    .insert(namespace, &image.content_hash, content.clone());
            }
            slots[index] = Some(content);
        }
        self.cache.save()?;

        // Sequential assembly in input order.
        let layout_cfg = &self.config.layout;
        let mut usage = TokenUsage::default();
        let mut pages = Vec::with_capacity(images.len());
        for (index, date) in dates.iter().enumerate() {
            let resolved = slots[index]
                .take()
                .unwrap_or_else(|| placeholder_content(&self.config.generation));
            usage.add(resolved.usage);

            let caption = truncate_caption(&resolved.caption, layout_cfg.caption_max_chars);
            let content = GeneratedContent { caption, ..resolved };

            let aspect = prepared[index]
                .as_ref()
                .map(|image| image.aspect())
                .unwrap_or(0.75);
            let layout = fit_page(
                layout_cfg,
                aspect,
                &content.caption,
                &request.contact,
                &content.hashtags.join(" "),
            );
            pages.push(SheetPage {
                date: *date,
                image: prepared[index].as_deref().cloned(),
                content,
                layout,
            });
        }

        let html = render_sheet(&pages, &request.contact, layout_cfg).into_bytes();
        let cost = estimate_cost(usage, &self.config.pricing);
        if let Some(ledger) = &mut self.ledger {
            ledger.record(namespace, pages.len(), usage, &self.config.pricing)?;
        }

        Ok(SheetOutput {
            html,
            pages: pages.len(),
            usage,
            cost,
            cache_stats: stats,
        })
    }
}

/// Content for a page whose image never decoded: no pixels to derive a
/// mood from, so the configured defaults are used as-is.
fn placeholder_content(config: &GenerationConfig) -> GeneratedContent {
    GeneratedContent {
        caption: config.default_caption.clone(),
        hashtags: sanitize_hashtags(vec![], config),
        usage: TokenUsage::default(),
        source: ContentSource::Fallback,
    }
}
