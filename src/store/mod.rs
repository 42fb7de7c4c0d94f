//! Qdrant vector database integration
//!
//! This module wraps the Qdrant client behind the `VectorStore` trait:
//! collection management with a dimension guard, batched upserts keyed by
//! content-derived IDs (re-ingestion replaces rather than duplicates), and
//! nearest-neighbor search.

mod payload;

pub use payload::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::ContentKind;
use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A payload returned from search, with its similarity score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPayload {
    pub score: f32,
    pub payload: RecordPayload,
}

/// Per-record accounting for one upsert batch
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub stored: usize,
    pub failed: Vec<UpsertFailure>,
}

/// One record that could not be persisted
#[derive(Debug)]
pub struct UpsertFailure {
    pub id: Uuid,
    pub kind: ContentKind,
    pub content: String,
    pub reason: String,
}

/// Trait for vector store backends
///
/// Implementations own their collection name and dimension; callers inject
/// them into the pipeline so tests can substitute fakes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent; no-op when it already exists with
    /// the matching dimension, `SchemaMismatch` otherwise
    async fn ensure_collection(&self) -> Result<()>;

    /// Insert-or-replace a batch of records, reporting per-record outcomes.
    /// Records whose vector length differs from the collection dimension
    /// are rejected here, before anything reaches the backend.
    async fn upsert(&self, records: Vec<EmbeddedRecord>) -> Result<UpsertReport>;

    /// Return the `limit` payloads most similar to the query vector,
    /// ranked by similarity descending
    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredPayload>>;
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(json_from_qdrant_value).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

/// Compare a requested dimension against an existing collection's
pub(crate) fn check_dimension(
    collection: &str,
    expected: usize,
    found: Option<usize>,
) -> Result<()> {
    match found {
        Some(found) if found != expected => Err(Error::SchemaMismatch {
            collection: collection.to_string(),
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

/// Information about the backing collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection: String,
    pub points_count: usize,
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect to Qdrant using config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(
            &config.qdrant_url,
            config.qdrant_api_key(),
            &config.collection_name,
            config.embedding.dimension,
        )
        .await
    }

    /// Create a new store connection
    pub async fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        let exists = self.client.collection_exists(&self.collection).await?;
        Ok(exists)
    }

    /// Get collection statistics
    pub async fn stats(&self) -> Result<CollectionStats> {
        let info = self.client.collection_info(&self.collection).await?;

        let points_count = info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0);

        Ok(CollectionStats {
            collection: self.collection.clone(),
            points_count: points_count as usize,
        })
    }

    /// Read the configured vector dimension of the existing collection
    async fn existing_dimension(&self) -> Result<Option<usize>> {
        use qdrant_client::qdrant::vectors_config::Config as VectorsKind;

        let info = self.client.collection_info(&self.collection).await?;
        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|kind| match kind {
                VectorsKind::Params(params) => Some(params.size as usize),
                _ => None,
            });
        Ok(size)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;

        if exists {
            let found = self.existing_dimension().await?;
            check_dimension(&self.collection, self.dimension, found)?;
            if found.is_none() {
                warn!(
                    "Could not determine dimension of existing collection {}",
                    self.collection
                );
            }
            debug!("Collection {} already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(vectors_config),
            )
            .await?;

        Ok(())
    }

    async fn upsert(&self, records: Vec<EmbeddedRecord>) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();
        let mut valid: Vec<PointStruct> = Vec::with_capacity(records.len());

        for record in records {
            if record.vector.len() != self.dimension {
                report.failed.push(UpsertFailure {
                    id: record.id,
                    kind: record.payload.kind,
                    content: record.payload.content.clone(),
                    reason: format!(
                        "vector length {} does not match collection dimension {}",
                        record.vector.len(),
                        self.dimension
                    ),
                });
                continue;
            }
            valid.push(record.to_point_struct());
        }

        if valid.is_empty() {
            return Ok(report);
        }

        debug!(
            "Upserting {} points to collection {}",
            valid.len(),
            self.collection
        );

        let count = valid.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, valid).wait(true))
            .await?;
        report.stored = count;

        Ok(report)
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ScoredPayload>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, limit
        );

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, limit as u64)
                    .with_payload(true),
            )
            .await?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let map: Map<String, Value> = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect();

                match RecordPayload::try_from(map) {
                    Ok(payload) => Some(ScoredPayload {
                        score: point.score,
                        payload,
                    }),
                    Err(e) => {
                        warn!("Skipping point with unreadable payload: {}", e);
                        None
                    }
                }
            })
            .collect();

        Ok(results)
    }
}
