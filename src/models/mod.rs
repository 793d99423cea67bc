use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{classify, ContentType};

/// One decoded QR payload. Immutable once created; the content type is
/// assigned exactly once, at creation, from the raw data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub id: String,
    pub data: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
}

impl ScanResult {
    pub fn from_payload(data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content_type: classify(&data),
            data,
        }
    }

    pub fn openable(&self) -> bool {
        self.content_type.openable()
    }
}
