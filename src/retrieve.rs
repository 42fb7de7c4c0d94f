//! Retrieval service
//!
//! Embeds a free-text query and returns the top-K most similar payloads
//! from the vector store, for use by the calling agent as RAG context.
//! Retry policy belongs to the caller; failures from the embedder or the
//! store propagate unchanged.

use crate::embed::Embedder;
use crate::error::Result;
use crate::store::{ScoredPayload, VectorStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Retrieval handle over a shared embedder and store
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    default_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        default_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            default_k: default_k.max(1),
        }
    }

    /// Return the payloads most similar to the query, ranked descending
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredPayload>> {
        let k = top_k.unwrap_or(self.default_k);
        info!("Retrieving top {} for query: {}", k, query);

        let vector = self.embedder.embed_text(query).await?;
        let results = self.store.search(vector, k).await?;

        debug!("Got {} results", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::extract::ContentKind;
    use crate::store::{EmbeddedRecord, RecordPayload, UpsertReport};
    use async_trait::async_trait;

    /// Embedder that maps any query onto a fixed axis
    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(Error::InvalidInput("empty query".to_string()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn describe_image(&self, _bytes: &[u8], _mime: &str) -> Result<String> {
            unimplemented!("not used in retrieval tests")
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "axis"
        }
    }

    /// Store preloaded with vectors of known similarity to the query axis
    struct PreloadedStore {
        records: Vec<(Vec<f32>, RecordPayload)>,
    }

    fn payload(content: &str) -> RecordPayload {
        RecordPayload {
            kind: ContentKind::Text,
            content: content.to_string(),
            source_url: "https://example.com/".to_string(),
            ingested_at: None,
        }
    }

    #[async_trait]
    impl VectorStore for PreloadedStore {
        async fn ensure_collection(&self) -> Result<()> {
            Ok(())
        }

        async fn upsert(&self, _records: Vec<EmbeddedRecord>) -> Result<UpsertReport> {
            unimplemented!("not used in retrieval tests")
        }

        async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredPayload>> {
            let mut scored: Vec<ScoredPayload> = self
                .records
                .iter()
                .map(|(v, p)| ScoredPayload {
                    score: v.iter().zip(&vector).map(|(a, b)| a * b).sum(),
                    payload: p.clone(),
                })
                .collect();
            // stable sort keeps insertion order for equal scores
            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            scored.truncate(limit);
            Ok(scored)
        }
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_similarity_descending() {
        let store = PreloadedStore {
            records: vec![
                (vec![0.8, 0.6, 0.0], payload("close")),
                (vec![0.0, 1.0, 0.0], payload("orthogonal")),
                (vec![1.0, 0.0, 0.0], payload("exact")),
            ],
        };
        let retriever = Retriever::new(Arc::new(AxisEmbedder), Arc::new(store), 5);

        let results = retriever.retrieve("anything", Some(2)).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload.content, "exact");
        assert_eq!(results[1].payload.content, "close");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_retrieve_breaks_ties_by_insertion_order() {
        let store = PreloadedStore {
            records: vec![
                (vec![1.0, 0.0, 0.0], payload("first inserted")),
                (vec![1.0, 0.0, 0.0], payload("second inserted")),
            ],
        };
        let retriever = Retriever::new(Arc::new(AxisEmbedder), Arc::new(store), 5);

        let results = retriever.retrieve("anything", None).await.unwrap();

        assert_eq!(results[0].payload.content, "first inserted");
        assert_eq!(results[1].payload.content, "second inserted");
    }

    #[tokio::test]
    async fn test_retrieve_propagates_embedder_errors() {
        let store = PreloadedStore { records: vec![] };
        let retriever = Retriever::new(Arc::new(AxisEmbedder), Arc::new(store), 5);

        let err = retriever.retrieve("   ", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
