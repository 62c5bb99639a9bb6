//! Core types for Falcon Messenger

use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

use crate::error::{ErrorKind, PlatformError, ValidationError};

/// Identifier of a publishing platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Bluesky,
    Discord,
}

impl PlatformId {
    /// Every platform this build knows about, in canonical order
    pub const ALL: [PlatformId; 2] = [PlatformId::Bluesky, PlatformId::Discord];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Bluesky => "bluesky",
            PlatformId::Discord => "discord",
        }
    }

    /// Human-readable name for log and CLI output
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformId::Bluesky => "Bluesky",
            PlatformId::Discord => "Discord",
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bluesky" => Ok(PlatformId::Bluesky),
            "discord" => Ok(PlatformId::Discord),
            _ => Err(ValidationError::UnknownTarget(s.trim().to_string())),
        }
    }
}

/// Supported image MIME types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from the leading magic bytes of the image
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Get the typical file extension for this MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An image attached to a publish request.
///
/// Exactly one representation is ever carried; a request that supplies both
/// a URL and inline bytes is rejected before dispatch.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Remote image the platform (or its client) fetches
    Url(String),
    /// Raw image bytes supplied by the caller
    Inline {
        data: Vec<u8>,
        mime_type: ImageMimeType,
    },
}

impl ImageRef {
    /// Wrap inline bytes, sniffing the MIME type and falling back to PNG
    pub fn inline(data: Vec<u8>) -> Self {
        let mime_type = ImageMimeType::sniff(&data).unwrap_or(ImageMimeType::Png);
        ImageRef::Inline { data, mime_type }
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRef::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ImageRef::Inline { data, mime_type } => f
                .debug_struct("Inline")
                .field("len", &data.len())
                .field("mime_type", mime_type)
                .finish(),
        }
    }
}

/// A request to publish one message to one or more platforms
///
/// This is the transport-neutral shape: the HTTP API and the CLI both decode
/// their inputs into it (including base64 image decoding) before handing it
/// to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub text: String,
    pub image_url: Option<String>,
    pub image_data: Option<Vec<u8>>,
    /// Requested targets; `None` means every configured platform
    pub targets: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

impl PublishRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_image_data(mut self, data: Vec<u8>) -> Self {
        self.image_data = Some(data);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of publishing to a single platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlatformResult {
    /// Platform accepted the message; `id` is its post identifier
    Success { id: String },
    Failure { error_kind: ErrorKind, message: String },
}

impl PlatformResult {
    pub fn success(id: impl Into<String>) -> Self {
        PlatformResult::Success { id: id.into() }
    }

    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        PlatformResult::Failure {
            error_kind,
            message: message.into(),
        }
    }

    pub fn from_error(error: &PlatformError) -> Self {
        Self::failure(error.kind(), error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlatformResult::Success { .. })
    }

    /// The platform's post identifier, if the publish succeeded
    pub fn post_id(&self) -> Option<&str> {
        match self {
            PlatformResult::Success { id } => Some(id),
            PlatformResult::Failure { .. } => None,
        }
    }
}

/// Aggregated outcome of a dispatch: one entry per resolved target
///
/// Serializes as `{"success": bool, "results": {"<target>": {...}, ...}}`,
/// with the results object keyed in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    #[serde(rename = "success")]
    pub overall_success: bool,
    #[serde(rename = "results", serialize_with = "serialize_ordered_results")]
    pub per_target: Vec<(PlatformId, PlatformResult)>,
}

impl DispatchResult {
    pub fn get(&self, platform: PlatformId) -> Option<&PlatformResult> {
        self.per_target
            .iter()
            .find(|(id, _)| *id == platform)
            .map(|(_, result)| result)
    }

    pub fn targets(&self) -> impl Iterator<Item = PlatformId> + '_ {
        self.per_target.iter().map(|(id, _)| *id)
    }

    pub fn success_count(&self) -> usize {
        self.per_target.iter().filter(|(_, r)| r.is_success()).count()
    }
}

fn serialize_ordered_results<S>(
    results: &[(PlatformId, PlatformResult)],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(results.iter().map(|(id, result)| (id.as_str(), result)))
}
