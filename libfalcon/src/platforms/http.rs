//! Shared HTTP plumbing for the platform clients

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::PlatformError;
use crate::types::{ImageMimeType, ImageRef};

/// Longest slice of a response body echoed into an error message
const MAX_BODY_EXCERPT: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("falcon-messenger/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a non-success HTTP status
pub(crate) fn map_status(platform: &str, status: StatusCode, body: &str) -> PlatformError {
    let detail = format!("{} returned HTTP {}: {}", platform, status.as_u16(), excerpt(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(detail),
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimit(detail),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            PlatformError::Rejected(detail)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => PlatformError::Timeout(detail),
        s if s.is_server_error() => PlatformError::Network(detail),
        _ => PlatformError::Posting(detail),
    }
}

/// Classify a transport-level failure. The request URL is stripped since
/// webhook URLs carry credentials.
pub(crate) fn map_transport_error(platform: &str, error: reqwest::Error) -> PlatformError {
    let error = error.without_url();
    if error.is_timeout() {
        PlatformError::Timeout(format!("{} request timed out: {}", platform, error))
    } else if error.is_decode() {
        PlatformError::Posting(format!("{} returned an unreadable response: {}", platform, error))
    } else {
        PlatformError::Network(format!("{} request failed: {}", platform, error))
    }
}

/// Read the body of a failed response and classify it
pub(crate) async fn error_from_response(platform: &str, response: reqwest::Response) -> PlatformError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    map_status(platform, status, &body)
}

/// Resolve an image reference into bytes plus MIME type, fetching URLs
pub(crate) async fn load_image(
    client: &reqwest::Client,
    platform: &str,
    image: &ImageRef,
) -> Result<(Vec<u8>, ImageMimeType), PlatformError> {
    match image {
        ImageRef::Inline { data, mime_type } => Ok((data.clone(), *mime_type)),
        ImageRef::Url(url) => {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| map_transport_error(platform, e))?;

            if !response.status().is_success() {
                return Err(PlatformError::Posting(format!(
                    "Failed to fetch image for {}: HTTP {}",
                    platform,
                    response.status().as_u16()
                )));
            }

            let header_mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(ImageMimeType::from_mime_str);

            let bytes = response
                .bytes()
                .await
                .map_err(|e| map_transport_error(platform, e))?
                .to_vec();

            let mime_type = header_mime
                .or_else(|| ImageMimeType::sniff(&bytes))
                .ok_or_else(|| {
                    PlatformError::Rejected(format!("{}: image URL did not return a supported image", platform))
                })?;

            Ok((bytes, mime_type))
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_EXCERPT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
        format!("{}...", cut)
    }
}
