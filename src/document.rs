//! Printable sheet rendering.
//!
//! Assembles the final document from laid-out pages: one `.sheet` section
//! per photo with a centered bold date, the size-fitted image, the caption,
//! an optional contact block, and the hashtag line. Output is a single
//! self-contained HTML file — images ride along as base64 data URIs, page
//! geometry is a CSS `@page` rule, and a forced break after every sheet but
//! the last maps each photo to one physical page when printed.
//!
//! HTML comes from [maud](https://maud.lambda.xyz/): compile-time checked
//! templates with all interpolation auto-escaped, so captions straight from
//! a model can't inject markup.

use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, html};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::LayoutConfig;
use crate::layout::PageLayout;
use crate::types::{GeneratedContent, SourceImage};

/// Shown in place of the image when the upload couldn't be decoded.
const PLACEHOLDER_NOTICE: &str =
    "⚠ This image could not be read. The page is kept so the posting schedule stays intact.";

/// Everything needed to render one page.
#[derive(Debug, Clone)]
pub struct SheetPage {
    pub date: NaiveDate,
    /// `None` renders the placeholder notice instead of an image.
    pub image: Option<SourceImage>,
    pub content: GeneratedContent,
    pub layout: PageLayout,
}

/// Render the full sheet. Pages appear exactly in slice order.
pub fn render_sheet(pages: &[SheetPage], contact: &str, cfg: &LayoutConfig) -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Content sheet" }
                style { (page_css(cfg)) }
            }
            body {
                @for page in pages {
                    (render_page(page, contact, cfg))
                }
            }
        }
    };
    markup.into_string()
}

fn render_page(page: &SheetPage, contact: &str, cfg: &LayoutConfig) -> Markup {
    let caption_pt = page.layout.tier.caption_pt(cfg);
    let contact = contact.trim();
    html! {
        section .sheet {
            p .date { (page.date.format("%d.%m.%Y")) }
            @match &page.image {
                Some(image) => {
                    img .photo
                        src=(jpeg_data_uri(&image.jpeg))
                        style=(format!(
                            "width:{:.2}in;height:{:.2}in;",
                            page.layout.image_width_in, page.layout.image_height_in
                        ))
                        alt="";
                }
                None => {
                    p .placeholder { (PLACEHOLDER_NOTICE) }
                }
            }
            p .caption style=(format!("font-size:{caption_pt}pt;")) {
                (page.content.caption)
            }
            @if !contact.is_empty() {
                p .contact { (contact) }
            }
            p .tags style=(format!("font-size:{caption_pt}pt;")) {
                (page.content.hashtags.join(" "))
            }
        }
    }
}

fn jpeg_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}

/// Stylesheet derived from the layout config — the CSS mirrors the exact
/// geometry the fitter computed against.
fn page_css(cfg: &LayoutConfig) -> String {
    format!(
        "@page {{ size: {pw:.2}in {ph:.2}in; margin: {mt:.2}in {mr:.2}in {mb:.2}in {ml:.2}in; }}\n\
         body {{ margin: 0; font-family: 'Helvetica Neue', Arial, sans-serif; }}\n\
         .sheet {{ page-break-after: always; padding-top: {pad:.2}in; }}\n\
         .sheet:last-child {{ page-break-after: auto; }}\n\
         p {{ margin: 0 0 2pt 0; line-height: {spacing}; }}\n\
         .date {{ font-size: {date_pt}pt; font-weight: bold; text-align: center; }}\n\
         .photo {{ display: block; margin: 0 auto; }}\n\
         .contact {{ font-size: {contact_pt}pt; }}\n\
         .placeholder {{ font-style: italic; }}\n",
        pw = cfg.page_width_in,
        ph = cfg.page_height_in,
        mt = cfg.margin_top_in,
        mr = cfg.margin_right_in,
        mb = cfg.margin_bottom_in,
        ml = cfg.margin_left_in,
        pad = cfg.heading_padding_in,
        spacing = cfg.line_spacing,
        date_pt = cfg.date_pt,
        contact_pt = cfg.contact_pt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FontTier, fit_page};
    use crate::test_helpers::{sample_content, warm_image};

    fn page_for(date: (i32, u32, u32), caption: &str, image: Option<SourceImage>) -> SheetPage {
        let cfg = LayoutConfig::default();
        let content = sample_content(caption);
        let aspect = image.as_ref().map(|i| i.aspect()).unwrap_or(0.75);
        let layout = fit_page(&cfg, aspect, caption, "", &content.hashtags.join(" "));
        SheetPage {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            image,
            content,
            layout,
        }
    }

    #[test]
    fn one_section_per_page_in_order() {
        let cfg = LayoutConfig::default();
        let pages = vec![
            page_for((2025, 9, 1), "first page caption", Some(warm_image())),
            page_for((2025, 9, 3), "second page caption", Some(warm_image())),
            page_for((2025, 9, 5), "third page caption", Some(warm_image())),
        ];
        let html = render_sheet(&pages, "", &cfg);

        assert_eq!(html.matches("class=\"sheet\"").count(), 3);
        let first = html.find("first page caption").unwrap();
        let second = html.find("second page caption").unwrap();
        let third = html.find("third page caption").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn dates_formatted_dd_mm_yyyy() {
        let cfg = LayoutConfig::default();
        let html = render_sheet(
            &[page_for((2025, 9, 3), "c", Some(warm_image()))],
            "",
            &cfg,
        );
        assert!(html.contains("03.09.2025"));
    }

    #[test]
    fn images_embedded_as_data_uris() {
        let cfg = LayoutConfig::default();
        let html = render_sheet(
            &[page_for((2025, 9, 1), "c", Some(warm_image()))],
            "",
            &cfg,
        );
        assert!(html.contains("data:image/jpeg;base64,"));
        assert!(html.contains("width:"));
    }

    #[test]
    fn decode_failure_renders_placeholder() {
        let cfg = LayoutConfig::default();
        let html = render_sheet(&[page_for((2025, 9, 1), "c", None)], "", &cfg);
        assert!(html.contains("could not be read"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn contact_block_only_when_present() {
        let cfg = LayoutConfig::default();
        let pages = [page_for((2025, 9, 1), "c", Some(warm_image()))];
        let with = render_sheet(&pages, "Front desk +1 555 0100", &cfg);
        let without = render_sheet(&pages, "   ", &cfg);
        assert!(with.contains("Front desk +1 555 0100"));
        assert!(!without.contains("class=\"contact\""));
    }

    #[test]
    fn hashtags_render_as_single_line() {
        let cfg = LayoutConfig::default();
        let html = render_sheet(
            &[page_for((2025, 9, 1), "c", Some(warm_image()))],
            "",
            &cfg,
        );
        assert!(html.contains("#travel #wanderlust #goodvibes #discover"));
    }

    #[test]
    fn compact_tier_shrinks_caption_font() {
        let cfg = LayoutConfig::default();
        let mut page = page_for((2025, 9, 1), "c", Some(warm_image()));
        page.layout.tier = FontTier::Compact;
        let html = render_sheet(&[page], "", &cfg);
        assert!(html.contains("font-size:9pt;"));
    }

    #[test]
    fn css_carries_page_geometry() {
        let mut cfg = LayoutConfig::default();
        cfg.page_width_in = 8.5;
        cfg.page_height_in = 11.0;
        let html = render_sheet(
            &[page_for((2025, 9, 1), "c", Some(warm_image()))],
            "",
            &cfg,
        );
        assert!(html.contains("size: 8.50in 11.00in"));
    }

    #[test]
    fn caption_markup_is_escaped() {
        let cfg = LayoutConfig::default();
        let html = render_sheet(
            &[page_for((2025, 9, 1), "<script>alert(1)</script>", None)],
            "",
            &cfg,
        );
        assert!(!html.contains("<script>alert"));
    }
}
