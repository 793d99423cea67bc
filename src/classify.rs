use serde::{Deserialize, Serialize};

/// Coarse content category of a decoded QR payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentType {
    #[serde(rename = "URL")]
    Url,
    Email,
    Phone,
    WiFi,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Url => "URL",
            ContentType::Email => "Email",
            ContentType::Phone => "Phone",
            ContentType::WiFi => "WiFi",
            ContentType::Text => "Text",
        }
    }

    /// Whether the payload can be handed to the platform opener.
    pub fn openable(&self) -> bool {
        matches!(
            self,
            ContentType::Url | ContentType::Email | ContentType::Phone
        )
    }
}

/// Classify a decoded payload by prefix, first match wins.
///
/// Matching is case-sensitive on purpose: `HTTP://...` is treated as plain
/// text, matching how the scanned payloads are produced in the wild.
pub fn classify(data: &str) -> ContentType {
    if data.starts_with("http://") || data.starts_with("https://") {
        ContentType::Url
    } else if data.starts_with("mailto:") {
        ContentType::Email
    } else if data.starts_with("tel:") {
        ContentType::Phone
    } else if data.starts_with("wifi:") {
        ContentType::WiFi
    } else {
        ContentType::Text
    }
}
