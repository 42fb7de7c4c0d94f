//! curator: ingest web pages into a Qdrant-backed knowledge base
//!
//! The crate renders a page (headless browser or plain fetch), extracts its
//! paragraphs and images, embeds both modalities into one vector space
//! (images via captioning), and upserts the results into Qdrant under
//! content-derived IDs. Retrieval embeds a query and returns the top-K
//! stored payloads, ready to be used as RAG context by a calling agent.

pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::{IngestionResult, Ingestor};
pub use retrieve::Retriever;

/// User agent sent by all outgoing HTTP requests
pub(crate) const USER_AGENT: &str = concat!("curator/", env!("CARGO_PKG_VERSION"));
