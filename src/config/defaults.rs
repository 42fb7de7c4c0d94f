//! Default values for configuration

/// Default Qdrant URL for local development (gRPC port)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "CURATOR_QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "website_content".to_string()
}

/// Default OpenAI-compatible embedding endpoint
pub fn default_embedding_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

/// Default environment variable name for the embedding provider API key
pub fn default_embedding_api_key_env() -> String {
    "CURATOR_EMBED_API_KEY".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

/// Default multimodal model used for image captioning
pub fn default_caption_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Default embedding dimension for text-embedding-004
pub fn default_embedding_dimension() -> usize {
    768
}

/// Default number of concurrent embedding calls per ingestion run
pub fn default_embedding_concurrency() -> usize {
    4
}

/// Default page render timeout in seconds
pub fn default_render_timeout() -> u64 {
    30
}

/// Default wait after page load for dynamic content (milliseconds)
pub fn default_render_wait() -> u64 {
    2000
}

/// Default: use the headless browser when compiled in
pub fn default_js_rendering() -> bool {
    true
}

/// Default number of retrieval results
pub fn default_query_k() -> usize {
    5
}
