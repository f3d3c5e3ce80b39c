//! Raw inputs and the batch items created from them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// An opaque input descriptor handed to the engine by a producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    /// Display name, usually the original filename.
    pub name: String,
    /// Raw content bytes.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    /// MIME type reported by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl RawInput {
    /// Creates a new raw input.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            media_type: None,
        }
    }

    /// Creates a raw input with no content.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Returns true when the MIME type is `image/*`.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    }
}

/// One submitted unit of work.
///
/// Immutable after creation; content bytes are shared between snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Unique token generated at submission.
    pub id: Uuid,
    /// Display name.
    pub label: String,
    /// Derived identifier such as `CHQ3000`.
    pub sequence_tag: String,
    /// MIME type of the original input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip, default = "empty_content")]
    content: Arc<[u8]>,
}

fn empty_content() -> Arc<[u8]> {
    Arc::from(Vec::new())
}

impl BatchItem {
    /// Creates an item from a raw input with a fresh id.
    #[must_use]
    pub fn from_input(input: RawInput, sequence_tag: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: input.name,
            sequence_tag: sequence_tag.into(),
            media_type: input.media_type,
            content: Arc::from(input.content),
        }
    }

    /// Returns the raw content bytes.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_input_is_image() {
        assert!(RawInput::named("a.png").with_media_type("image/png").is_image());
        assert!(!RawInput::named("a.pdf").with_media_type("application/pdf").is_image());
        assert!(!RawInput::named("unknown").is_image());
    }

    #[test]
    fn test_raw_input_content_is_base64() {
        let input = RawInput::new("scan.jpg", b"hi".to_vec());
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["content"], "aGk=");

        let back: RawInput = serde_json::from_value(json).unwrap();
        assert_eq!(back.content, b"hi");
    }

    #[test]
    fn test_batch_item_from_input() {
        let input = RawInput::new("cheque.png", vec![1, 2, 3]).with_media_type("image/png");
        let item = BatchItem::from_input(input, "CHQ3000");

        assert_eq!(item.label, "cheque.png");
        assert_eq!(item.sequence_tag, "CHQ3000");
        assert_eq!(item.content(), &[1, 2, 3]);
        assert_eq!(item.id.get_version_num(), 4);
    }

    #[test]
    fn test_batch_item_clone_shares_content() {
        let item = BatchItem::from_input(RawInput::new("x", vec![9; 64]), "T1");
        let copy = item.clone();
        assert_eq!(copy, item);
        assert_eq!(copy.content_len(), 64);
    }

    #[test]
    fn test_batch_item_serialization_omits_content() {
        let item = BatchItem::from_input(RawInput::new("x", vec![7; 8]), "T1");
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["sequence_tag"], "T1");
    }
}
