//! Ingestion pipeline
//!
//! Orchestrates one URL end to end: render the page, extract its paragraphs
//! and images, deduplicate within the run, embed each item with a bounded
//! fan-out, and upsert whatever succeeded in one batch. A fetch failure
//! aborts the run outright (no content exists yet); from embedding onward
//! failures are per-item, so a partially indexed page still lands.
//!
//! Nothing is written to the store before the final batched upsert, which
//! is also the last suspend point. Dropping or timing out the `ingest`
//! future therefore cancels the run without leaving partial state behind.

use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::extract::{extract, ContentItem, ContentKind};
use crate::render::PageRenderer;
use crate::store::{EmbeddedRecord, RecordPayload, VectorStore};
use crate::USER_AGENT;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Summary returned to the caller after one ingestion run
#[derive(Debug, Default, Serialize)]
pub struct IngestionResult {
    pub items_stored: usize,
    pub items_failed: usize,
    /// Failure details, retained for logging and diagnostics
    pub failures: Vec<ItemFailure>,
}

/// One item that failed embedding, fetch, or upsert
#[derive(Debug, Serialize)]
pub struct ItemFailure {
    pub kind: ContentKind,
    pub content: String,
    pub reason: String,
}

/// Derive the stable record ID for a piece of content
///
/// Identical content maps to the same ID on every run, so re-ingesting an
/// unchanged page replaces its records instead of growing the collection.
pub fn record_id(kind: ContentKind, raw_content: &str) -> Uuid {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(raw_content.as_bytes());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, hasher.finalize().as_bytes())
}

const PREVIEW_CHARS: usize = 80;

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", truncated)
    }
}

/// Ingestion pipeline handle
///
/// The renderer, embedder, and store are injected so tests (and alternate
/// deployments) can substitute implementations.
pub struct Ingestor {
    renderer: Arc<dyn PageRenderer>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    http: reqwest::Client,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        concurrency: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            renderer,
            embedder,
            store,
            http,
            concurrency: concurrency.max(1),
        })
    }

    /// Ingest one page into the vector store
    pub async fn ingest(&self, url: &str) -> Result<IngestionResult> {
        info!("Ingesting {}", url);

        let page = self.renderer.render(url).await?;

        let mut items = extract(&page.html, &page.url);
        let extracted = items.len();

        // Identical repeated paragraphs or image URLs would waste provider
        // calls and store slots; first occurrence wins.
        let mut seen: HashSet<(ContentKind, String)> = HashSet::new();
        items.retain(|item| seen.insert((item.kind, item.raw_content.clone())));
        if items.len() < extracted {
            debug!("Dropped {} duplicate items", extracted - items.len());
        }

        if items.is_empty() {
            debug!("No content found at {}", page.url);
            return Ok(IngestionResult::default());
        }

        self.store.ensure_collection().await?;

        let page_url = page.url.clone();
        let mut outcomes: Vec<(usize, ContentItem, Result<EmbeddedRecord>)> =
            stream::iter(items.into_iter().enumerate())
                .map(|(index, item)| {
                    let page_url = page_url.clone();
                    async move {
                        let result = self.embed_item(&page_url, &item).await;
                        (index, item, result)
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // The fan-out completes out of order; restore document order so
        // identical runs produce identical upsert batches.
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (_, item, result) in outcomes {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        url = %page_url,
                        kind = %item.kind,
                        content = %preview(&item.raw_content),
                        "Skipping item: {}", e
                    );
                    failures.push(ItemFailure {
                        kind: item.kind,
                        content: preview(&item.raw_content),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut items_stored = 0;
        if !records.is_empty() {
            let batch_summary: Vec<(ContentKind, String)> = records
                .iter()
                .map(|r| (r.payload.kind, preview(&r.payload.content)))
                .collect();

            match self.store.upsert(records).await {
                Ok(report) => {
                    items_stored = report.stored;
                    for failure in report.failed {
                        warn!(
                            url = %page_url,
                            id = %failure.id,
                            kind = %failure.kind,
                            "Record rejected: {}", failure.reason
                        );
                        failures.push(ItemFailure {
                            kind: failure.kind,
                            content: preview(&failure.content),
                            reason: failure.reason,
                        });
                    }
                }
                Err(e @ Error::SchemaMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!(url = %page_url, "Upsert failed: {}", e);
                    for (kind, content) in batch_summary {
                        failures.push(ItemFailure {
                            kind,
                            content,
                            reason: format!("upsert failed: {}", e),
                        });
                    }
                }
            }
        }

        let result = IngestionResult {
            items_stored,
            items_failed: failures.len(),
            failures,
        };
        info!(
            "Ingestion of {} complete: {} stored, {} failed",
            page_url, result.items_stored, result.items_failed
        );
        Ok(result)
    }

    async fn embed_item(&self, page_url: &str, item: &ContentItem) -> Result<EmbeddedRecord> {
        let (vector, content, source_url) = match item.kind {
            ContentKind::Text => {
                let vector = self.embedder.embed_text(&item.raw_content).await?;
                (vector, item.raw_content.clone(), page_url.to_string())
            }
            ContentKind::Image => {
                let bytes = self.fetch_image(&item.raw_content).await?;
                let format = image::guess_format(&bytes).map_err(|_| {
                    Error::InvalidInput(format!(
                        "undecodable image data from {}",
                        item.raw_content
                    ))
                })?;
                let caption = self
                    .embedder
                    .describe_image(&bytes, format.to_mime_type())
                    .await?;
                let vector = self.embedder.embed_text(&caption).await?;
                (vector, caption, item.raw_content.clone())
            }
        };

        Ok(EmbeddedRecord {
            id: record_id(item.kind, &item.raw_content),
            vector,
            payload: RecordPayload {
                kind: item.kind,
                content,
                source_url,
                ingested_at: Some(Utc::now().to_rfc3339()),
            },
        })
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching image {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {}: {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read image body of {}: {}", url, e)))?;

        Ok(bytes.to_vec())
    }
}
