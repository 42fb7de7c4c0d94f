//! Payload schema for stored records

use crate::extract::ContentKind;
use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// A record ready to be upserted into the vector store
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

impl EmbeddedRecord {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each record; this is what retrieval hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Item modality ("text" or "image")
    pub kind: ContentKind,

    /// The original paragraph text, or the caption for an image
    pub content: String,

    /// Page URL for text items, absolute asset URL for images
    pub source_url: String,

    /// When this record was last ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
}

impl RecordPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("kind".to_string(), string_to_qdrant(self.kind.as_str()));
        map.insert("content".to_string(), string_to_qdrant(&self.content));
        map.insert("source_url".to_string(), string_to_qdrant(&self.source_url));
        if let Some(ref ingested_at) = self.ingested_at {
            map.insert("ingested_at".to_string(), string_to_qdrant(ingested_at));
        }

        map
    }
}

impl TryFrom<Map<String, Value>> for RecordPayload {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(map))
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization_round_trip() {
        let payload = RecordPayload {
            kind: ContentKind::Image,
            content: "A photo of the Eiffel Tower at night.".to_string(),
            source_url: "https://example.com/eiffel.jpg".to_string(),
            ingested_at: Some("2024-01-01T00:00:00Z".to_string()),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"image\""));

        let parsed: RecordPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_payload_from_map_tolerates_missing_timestamp() {
        let mut map = Map::new();
        map.insert("kind".to_string(), Value::String("text".to_string()));
        map.insert("content".to_string(), Value::String("Hello".to_string()));
        map.insert(
            "source_url".to_string(),
            Value::String("https://example.com/".to_string()),
        );

        let payload = RecordPayload::try_from(map).unwrap();
        assert_eq!(payload.kind, ContentKind::Text);
        assert!(payload.ingested_at.is_none());
    }

    #[test]
    fn test_qdrant_payload_keys() {
        let payload = RecordPayload {
            kind: ContentKind::Text,
            content: "Hello".to_string(),
            source_url: "https://example.com/".to_string(),
            ingested_at: None,
        };

        let map = payload.to_qdrant_payload();
        assert!(map.contains_key("kind"));
        assert!(map.contains_key("content"));
        assert!(map.contains_key("source_url"));
        assert!(!map.contains_key("ingested_at"));
    }
}
