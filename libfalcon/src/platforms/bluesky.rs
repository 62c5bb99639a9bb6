//! Bluesky platform implementation
//!
//! Talks to an AT Protocol PDS over XRPC: a session is created lazily on the
//! first publish and reused until the PDS rejects its token.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::PlatformError;
use crate::platforms::http::{
    build_client, error_from_response, load_image, map_transport_error,
};
use crate::platforms::retry::{with_retry, RetryPolicy};
use crate::platforms::Platform;
use crate::types::{ImageMimeType, ImageRef, PlatformId};

/// Default PDS used when none is configured
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

/// Post length limit (counted in grapheme clusters)
pub const BLUESKY_CHAR_LIMIT: usize = 300;

const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Clone, Deserialize)]
struct Session {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: Value,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
    handle: String,
    app_password: SecretString,
    session: Mutex<Option<Session>>,
    retry: RetryPolicy,
}

impl BlueskyClient {
    /// Create a client. No network traffic happens until the first publish.
    pub fn new(
        service: &str,
        handle: &str,
        app_password: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            service: service.trim_end_matches('/').to_string(),
            handle: handle.trim().to_string(),
            app_password: SecretString::from(app_password.to_string()),
            session: Mutex::new(None),
            retry,
        })
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    async fn create_session(&self) -> Result<Session, PlatformError> {
        tracing::debug!("Creating Bluesky session for handle: {}", self.handle);

        let response = self
            .http
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({
                "identifier": self.handle,
                "password": self.app_password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;

        if !response.status().is_success() {
            return Err(match error_from_response("bluesky", response).await {
                // createSession answers bad credentials with 400/401
                PlatformError::Rejected(msg) | PlatformError::Authentication(msg) => {
                    PlatformError::Authentication(format!(
                        "Invalid Bluesky credentials for {}: {}",
                        self.handle, msg
                    ))
                }
                other => other,
            });
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;

        tracing::debug!("Bluesky session created");
        Ok(session)
    }

    async fn session(&self) -> Result<Session, PlatformError> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok(session.clone());
        }
        let session = self.create_session().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    async fn upload_blob(
        &self,
        session: &Session,
        data: Vec<u8>,
        mime_type: ImageMimeType,
    ) -> Result<Value, PlatformError> {
        tracing::debug!("Uploading {} byte {} blob to Bluesky", data.len(), mime_type);

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .header(AUTHORIZATION, format!("Bearer {}", session.access_jwt))
            .header(CONTENT_TYPE, mime_type.as_str())
            .body(data)
            .send()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("bluesky", response).await);
        }

        let uploaded: UploadBlobResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;
        Ok(uploaded.blob)
    }

    async fn publish_once(&self, text: &str, image: Option<&ImageRef>) -> Result<String, PlatformError> {
        let session = self.session().await?;

        let mut record = json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        });

        if let Some(image) = image {
            let (data, mime_type) = load_image(&self.http, "bluesky", image).await?;
            let blob = self.upload_blob(&session, data, mime_type).await?;
            record["embed"] = json!({
                "$type": "app.bsky.embed.images",
                "images": [{ "alt": "", "image": blob }],
            });
        }

        tracing::debug!("Posting to Bluesky: {} graphemes", self.content_length(text));

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .header(AUTHORIZATION, format!("Bearer {}", session.access_jwt))
            .json(&json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;

        if !response.status().is_success() {
            let error = error_from_response("bluesky", response).await;
            if matches!(error, PlatformError::Authentication(_)) {
                // Expired or revoked token; the next publish logs in again
                self.invalidate_session().await;
            }
            return Err(error);
        }

        let created: CreateRecordResponse = response
            .json()
            .await
            .map_err(|e| map_transport_error("bluesky", e))?;

        tracing::debug!("Posted to Bluesky: {}", created.uri);
        Ok(created.uri)
    }
}

#[async_trait]
impl Platform for BlueskyClient {
    fn id(&self) -> PlatformId {
        PlatformId::Bluesky
    }

    async fn publish(
        &self,
        text: &str,
        image: Option<&ImageRef>,
    ) -> std::result::Result<String, PlatformError> {
        self.validate_content(text)?;
        with_retry(&self.retry, "bluesky", || self.publish_once(text, image)).await
    }

    fn character_limit(&self) -> Option<usize> {
        Some(BLUESKY_CHAR_LIMIT)
    }

    fn content_length(&self, content: &str) -> usize {
        content.graphemes(true).count()
    }

    async fn health_check(&self) -> bool {
        let session = match self.session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Bluesky health check failed: {}", e);
                return false;
            }
        };

        match self
            .http
            .get(self.xrpc("app.bsky.actor.getProfile"))
            .query(&[("actor", self.handle.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", session.access_jwt))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Bluesky health check failed: {}", map_transport_error("bluesky", e));
                false
            }
        }
    }
}
