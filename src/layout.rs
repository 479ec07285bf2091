//! Adaptive page-layout fitting.
//!
//! Pure calculation module: given a photo's aspect ratio and the text blocks
//! that share its page, choose an image size and a font tier so that one
//! bold date line + image + caption + optional contact block + hashtag line
//! occupy exactly one physical page.
//!
//! Nothing here measures real glyphs. Line counts come from a
//! characters-per-inch heuristic over whitespace-collapsed text, which is
//! accurate enough for the single-column layout the sheet uses. The
//! remaining vertical space goes to the image:
//!
//! 1. Start the image at full column width.
//! 2. If its natural height overshoots the space left by the text, narrow
//!    it by a fixed factor per iteration (the shrink loop), down to a
//!    width floor.
//! 3. Still unfit at the floor? Drop the captions to the compact font tier
//!    (more characters per line, fewer lines, more room) and repeat.
//! 4. Still unfit? Constrain the image by height and let the width fall
//!    under the floor — the page never overflows, the photo just prints
//!    smaller.
//!
//! The shrink loop terminates in O(log(column/floor)) iterations. Extreme
//! caption lengths are kept out of the fitter entirely by
//! [`truncate_caption`], which the pipeline runs first; that bound, not the
//! fitter, is what makes the fit practical, so the guarantee is best-effort
//! by design.

use crate::config::LayoutConfig;

/// Caption/hashtag font tier chosen by the fitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontTier {
    Normal,
    Compact,
}

impl FontTier {
    /// Caption size in points for this tier.
    pub fn caption_pt(self, cfg: &LayoutConfig) -> f64 {
        match self {
            FontTier::Normal => cfg.caption_pt,
            FontTier::Compact => cfg.caption_compact_pt,
        }
    }

    /// Line height in inches for this tier.
    pub fn line_height_in(self, cfg: &LayoutConfig) -> f64 {
        self.caption_pt(cfg) * cfg.line_spacing / 72.0
    }
}

/// Resolved page layout. Computed fresh per build, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub image_width_in: f64,
    pub image_height_in: f64,
    pub tier: FontTier,
    /// Estimated total text lines on the page (date + caption + contact +
    /// hashtags) at the chosen tier.
    pub text_lines: usize,
}

/// Shorten a caption above the ceiling at a word boundary, appending `…`.
///
/// Runs before layout so the fitter only ever sees bounded text. Operates
/// on characters, not bytes, so multi-byte captions are never split.
pub fn truncate_caption(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head.as_str(),
    };
    format!("{}…", cut.trim_end())
}

/// Estimated wrapped-line count of a text block.
///
/// Zero for empty/blank text, otherwise at least one line; counts
/// whitespace-collapsed characters against `chars_per_line`.
pub fn estimate_lines(text: &str, chars_per_line: usize) -> usize {
    let collapsed: usize = text
        .split_whitespace()
        .map(|w| w.chars().count() + 1)
        .sum::<usize>()
        .saturating_sub(1); // no trailing separator
    if collapsed == 0 {
        return 0;
    }
    collapsed.div_ceil(chars_per_line.max(1))
}

/// Characters that fit on one line at the given caption size.
///
/// The heuristic constant is calibrated for the normal tier; smaller
/// sizes pack proportionally more characters per inch.
pub fn chars_per_line(cfg: &LayoutConfig, caption_pt: f64) -> usize {
    let estimate = cfg.column_width_in() * cfg.chars_per_inch * (cfg.caption_pt / caption_pt);
    (estimate.floor() as usize).max(cfg.min_chars_per_line)
}

/// Fit one page: choose image dimensions and a font tier.
///
/// `aspect` is pixel height over pixel width. `caption` must already be
/// truncated to the configured ceiling.
pub fn fit_page(
    cfg: &LayoutConfig,
    aspect: f64,
    caption: &str,
    contact: &str,
    hashtag_line: &str,
) -> PageLayout {
    let aspect = aspect.max(1e-6);
    let column = cfg.column_width_in();

    for tier in [FontTier::Normal, FontTier::Compact] {
        let (text_lines, available) = text_budget(cfg, tier, caption, contact, hashtag_line);

        let mut width = column;
        loop {
            let height = width * aspect;
            if height <= available {
                return PageLayout {
                    image_width_in: width,
                    image_height_in: height,
                    tier,
                    text_lines,
                };
            }
            let narrower = width * cfg.shrink_factor;
            if narrower < cfg.min_image_width_in {
                break; // floor reached, try the next tier
            }
            width = narrower;
        }
    }

    // Unfit at the floor width even at the compact tier: give the image
    // exactly the remaining height and accept a width under the floor.
    let tier = FontTier::Compact;
    let (text_lines, available) = text_budget(cfg, tier, caption, contact, hashtag_line);
    let width = (available / aspect).min(column);
    PageLayout {
        image_width_in: width,
        image_height_in: width * aspect,
        tier,
        text_lines,
    }
}

/// Total text lines and the image height budget they leave, for one tier.
fn text_budget(
    cfg: &LayoutConfig,
    tier: FontTier,
    caption: &str,
    contact: &str,
    hashtag_line: &str,
) -> (usize, f64) {
    let cpl = chars_per_line(cfg, tier.caption_pt(cfg));
    let text_lines = 1 // date heading
        + estimate_lines(caption, cpl)
        + estimate_lines(contact, cpl)
        + estimate_lines(hashtag_line, cpl).max(1);
    let available = cfg.content_height_in()
        - text_lines as f64 * tier.line_height_in(cfg)
        - cfg.heading_padding_in
        - cfg.safety_buffer_in;
    (text_lines, available.max(cfg.min_image_height_in))
}
