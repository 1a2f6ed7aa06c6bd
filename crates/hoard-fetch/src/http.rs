use std::time::Duration;

use futures_util::TryStreamExt;
use hoard_catalog::WorkItem;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::RemoteError;
use crate::remote::{DownloadHandle, Remote, RemoteBody};

pub const DEFAULT_INITIATE_URL: &str = "https://quixel.com/v1/downloads";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://assetdownloads.quixel.com/download";

const ABSENT_CODE: &str = "ASSET_DOES_NOT_EXIST";
const EXPIRED_MESSAGE: &str = "Expired token";
const COMPONENT_MIME: &str = "image/x-exr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Transfer initiation; receives the JSON request and returns a handle.
    pub initiate: String,
    /// Base URL the handle is appended to.
    pub download: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            initiate: DEFAULT_INITIATE_URL.to_string(),
            download: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

/// Client-side deadlines. The body stream itself is unbounded here; the
/// fetcher's stall timeout covers gaps between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP and TLS connection setup.
    pub connect: Duration,
    /// Whole initiation exchange, and the response head of a transfer.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

/// Production remote over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client:    Client,
    endpoints: Endpoints,
    timeouts:  HttpTimeouts,
}

#[derive(Deserialize)]
struct Accepted {
    id: String,
}

#[derive(Deserialize, Default)]
struct Rejection {
    #[serde(default)]
    code:    Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpRemote {
    pub fn new(endpoints: Endpoints) -> Result<Self, RemoteError> { Self::with_timeouts(endpoints, HttpTimeouts::default()) }

    pub fn with_timeouts(endpoints: Endpoints, timeouts: HttpTimeouts) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("hoard/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.connect)
            .build()?;
        Ok(Self {
            client,
            endpoints,
            timeouts,
        })
    }

    /// Use a preconfigured client; only the per-request deadlines of
    /// `timeouts` apply.
    pub fn with_client(client: Client, endpoints: Endpoints, timeouts: HttpTimeouts) -> Self {
        Self {
            client,
            endpoints,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> HttpTimeouts { self.timeouts }

    pub fn endpoints(&self) -> &Endpoints { &self.endpoints }

    fn request_body(item: &WorkItem) -> serde_json::Value {
        let components: Vec<_> = item
            .components
            .iter()
            .map(|kind| json!({ "type": kind, "mimeType": COMPONENT_MIME }))
            .collect();
        json!({
            "asset": item.locator,
            "config": {
                "highpoly": true,
                "assetTypes": item.category.iter().collect::<Vec<_>>(),
                "components": components,
            }
        })
    }
}

/// Map a non-success initiation response to an error class.
pub fn classify_rejection(status: u16, body: &str) -> RemoteError {
    let rejection: Rejection = serde_json::from_str(body).unwrap_or_default();
    if rejection.code.as_deref() == Some(ABSENT_CODE) {
        return RemoteError::Absent;
    }
    if rejection.message.as_deref() == Some(EXPIRED_MESSAGE) || status == StatusCode::UNAUTHORIZED.as_u16() {
        return RemoteError::CredentialExpired;
    }
    if status == StatusCode::NOT_FOUND.as_u16() || status == StatusCode::GONE.as_u16() {
        return RemoteError::Absent;
    }
    RemoteError::Status {
        status,
        body: body.chars().take(512).collect(),
    }
}

/// Total length from a `Content-Range` value: `bytes 100-199/1000` or `bytes */1000`.
pub fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().strip_prefix("bytes")?.trim_start().rsplit_once('/')?;
    total.trim().parse().ok()
}

impl Remote for HttpRemote {
    async fn initiate(&self, item: &WorkItem, credential: &str) -> Result<DownloadHandle, RemoteError> {
        let response = self
            .client
            .post(&self.endpoints.initiate)
            .header(AUTHORIZATION, credential)
            .json(&Self::request_body(item))
            .timeout(self.timeouts.request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_rejection(status.as_u16(), &text));
        }

        let accepted: Accepted =
            serde_json::from_str(&text).map_err(|e| RemoteError::Malformed(format!("initiation response: {e}")))?;
        Ok(DownloadHandle {
            id:           accepted.id,
            expected_len: None,
        })
    }

    async fn open(&self, handle: &DownloadHandle, offset: u64) -> Result<RemoteBody, RemoteError> {
        let url = format!("{}/{}", self.endpoints.download.trim_end_matches('/'), handle.id);
        let mut request = self
            .client
            .get(url)
            .query(&[("preserveStructure", "true"), ("url", self.endpoints.initiate.as_str())]);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        // Only the response head is bounded here; a deadline on the whole
        // request would cut long transfers short.
        let response = tokio::time::timeout(self.timeouts.request, request.send())
            .await
            .map_err(|_| RemoteError::Transport(format!("no response head within {:?}", self.timeouts.request)))??;
        let status = response.status();
        let advertised_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        let (total, resumed) = match status {
            StatusCode::PARTIAL_CONTENT => (advertised_range, true),
            StatusCode::OK => (response.content_length(), false),
            // Nothing past `offset`; the size check decides whether the
            // local file is complete or overshoots.
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Ok(RemoteBody {
                    total:   advertised_range,
                    resumed: true,
                    stream:  Box::pin(futures_util::stream::empty()),
                });
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => return Err(RemoteError::Absent),
            other => {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Status {
                    status: other.as_u16(),
                    body:   body.chars().take(512).collect(),
                });
            }
        };

        let stream = response.bytes_stream().map_err(RemoteError::from);
        Ok(RemoteBody {
            total,
            resumed,
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_catalog::{Catalog, CatalogEntry, Layout};

    #[test]
    fn rejection_classes() {
        assert!(matches!(
            classify_rejection(400, r#"{"code":"ASSET_DOES_NOT_EXIST","isError":true}"#),
            RemoteError::Absent
        ));
        assert!(matches!(
            classify_rejection(400, r#"{"message":"Expired token"}"#),
            RemoteError::CredentialExpired
        ));
        assert!(matches!(classify_rejection(401, "nope"), RemoteError::CredentialExpired));
        assert!(matches!(classify_rejection(410, ""), RemoteError::Absent));
        let other = classify_rejection(503, "<html>busy</html>");
        assert_eq!(other.status_code(), Some(503));
        assert!(other.is_retryable());
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(content_range_total("bytes 100-199/1000"), Some(1000));
        assert_eq!(content_range_total("bytes */4096"), Some(4096));
        assert_eq!(content_range_total("bytes 0-9/*"), None);
        assert_eq!(content_range_total("items 1-2/3"), None);
    }

    #[test]
    fn request_body_shape() {
        let catalog: Catalog = [(
            "rock01",
            CatalogEntry::default()
                .with_category("3d")
                .with_components(["normal", "albedo"]),
        )]
        .into_iter()
        .collect();
        let item = catalog.work_item("rock01", &Layout::new("/m")).unwrap();

        let body = HttpRemote::request_body(&item);
        assert_eq!(body["asset"], "rock01");
        assert_eq!(body["config"]["assetTypes"], json!(["3d"]));
        assert_eq!(body["config"]["components"][0], json!({"type": "albedo", "mimeType": "image/x-exr"}));
        assert_eq!(body["config"]["highpoly"], true);
    }
}
