//! Content extraction from rendered markup
//!
//! A pure transform from HTML to a sequence of content items: paragraph
//! text in document order, followed by image references with their `src`
//! resolved against the page URL. Extraction never fails; malformed markup
//! yields whatever parseable subset exists.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The modality of an extracted item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted unit of content
///
/// For text items `raw_content` is the paragraph text; for image items it
/// is the resolved absolute asset URL. `source_url` is always the page the
/// item was extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub raw_content: String,
    pub source_url: String,
}

/// Extract paragraph text and image references from rendered markup
///
/// Duplicates are intentionally preserved here; within-run deduplication is
/// the pipeline's call to make.
pub fn extract(html: &str, base_url: &str) -> Vec<ContentItem> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut items = Vec::new();

    if let Ok(selector) = Selector::parse("p") {
        for elem in document.select(&selector) {
            let text = elem.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            items.push(ContentItem {
                kind: ContentKind::Text,
                raw_content: text.to_string(),
                source_url: base_url.to_string(),
            });
        }
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for elem in document.select(&selector) {
            let Some(src) = elem.value().attr("src") else {
                continue;
            };
            let src = src.trim();
            if src.is_empty() {
                continue;
            }
            let resolved = match &base {
                Some(base) => match base.join(src) {
                    Ok(url) => url.to_string(),
                    Err(_) => continue,
                },
                None => match Url::parse(src) {
                    Ok(url) => url.to_string(),
                    Err(_) => continue,
                },
            };
            items.push(ContentItem {
                kind: ContentKind::Image,
                raw_content: resolved,
                source_url: base_url.to_string(),
            });
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_paragraphs_in_document_order() {
        let html = r#"
        <html><body>
            <p>First paragraph.</p>
            <div><p>Second <strong>paragraph</strong>.</p></div>
            <p>   </p>
            <p>Third paragraph.</p>
        </body></html>
        "#;

        let items = extract(html, "https://example.com/page");
        let texts: Vec<_> = items
            .iter()
            .filter(|i| i.kind == ContentKind::Text)
            .map(|i| i.raw_content.as_str())
            .collect();

        assert_eq!(
            texts,
            vec!["First paragraph.", "Second paragraph.", "Third paragraph."]
        );
        assert!(items.iter().all(|i| i.source_url == "https://example.com/page"));
    }

    #[test]
    fn test_extract_resolves_relative_image_urls() {
        let html = r#"
        <html><body>
            <img src="/images/diagram.png" alt="Diagram" />
            <img src="photo.jpg" />
            <img src="https://cdn.example.org/banner.webp" />
        </body></html>
        "#;

        let items = extract(html, "https://example.com/docs/page");
        let urls: Vec<_> = items
            .iter()
            .filter(|i| i.kind == ContentKind::Image)
            .map(|i| i.raw_content.as_str())
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://example.com/images/diagram.png",
                "https://example.com/docs/photo.jpg",
                "https://cdn.example.org/banner.webp",
            ]
        );
    }

    #[test]
    fn test_extract_keeps_duplicates() {
        let html = r#"
        <html><body>
            <p>Repeated.</p>
            <p>Repeated.</p>
            <img src="/a.png" />
            <img src="/a.png" />
        </body></html>
        "#;

        let items = extract(html, "https://example.com/");
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_extract_skips_images_without_usable_src() {
        let html = r#"
        <html><body>
            <img alt="no src" />
            <img src="   " />
        </body></html>
        "#;

        let items = extract(html, "https://example.com/");
        assert!(items.is_empty());
    }

    #[test]
    fn test_extract_malformed_markup_is_best_effort() {
        let html = "<p>Unclosed paragraph<p>Another one<img src='/x.png'";
        let items = extract(html, "https://example.com/");
        let texts: Vec<_> = items
            .iter()
            .filter(|i| i.kind == ContentKind::Text)
            .collect();
        assert_eq!(texts.len(), 2);
    }

    #[test]
    fn test_extract_empty_page() {
        let items = extract("<html><body></body></html>", "https://example.com/");
        assert!(items.is_empty());
    }
}
