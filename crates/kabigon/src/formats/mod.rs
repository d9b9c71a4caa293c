// ABOUTME: HTML conversion helpers used by the loaders.
// ABOUTME: Handles HTML to Markdown conversion and main-content selection.

//! Output format conversion module.
//!
//! Loaders that fetch HTML hand it to [`html_to_markdown`]. Loaders that know
//! where the interesting part of a page lives narrow it down first with
//! [`select_inner_html`] or [`extract_main_html`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static BR_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?\s*>").unwrap());
static THREE_OR_MORE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Selectors tried in order by [`extract_main_html`].
const MAIN_CONTENT_SELECTORS: &[&str] = &["main", "article"];

/// Replace <br> tags with newlines.
fn preprocess_br_tags(html: &str) -> String {
    BR_TAGS.replace_all(html, "\n").to_string()
}

/// Convert HTML to Markdown using htmd.
///
/// Skips script and style tags during conversion, preserves links and images,
/// and normalizes consecutive blank lines to max 2.
/// On conversion error, returns the original HTML string unchanged.
pub fn html_to_markdown(html: &str) -> String {
    let preprocessed = preprocess_br_tags(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript"])
        .build();

    let md = converter
        .convert(&preprocessed)
        .unwrap_or_else(|_| preprocessed.clone());

    THREE_OR_MORE_NEWLINES
        .replace_all(&md, "\n\n")
        .trim()
        .to_string()
}

/// Inner HTML of the first element matching `selector`, if any.
pub fn select_inner_html(html: &str, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let document = Html::parse_document(html);
    document.select(&selector).next().map(|el| el.inner_html())
}

/// Narrow a page to its main content: `<main>`, then `<article>`, else the whole document.
pub fn extract_main_html(html: &str) -> String {
    MAIN_CONTENT_SELECTORS
        .iter()
        .find_map(|sel| select_inner_html(html, sel))
        .unwrap_or_else(|| html.to_string())
}
