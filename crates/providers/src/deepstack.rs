use crate::ProviderError;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_URL: &str = "http://localhost:5000/v1/vision/nudity";

#[derive(Clone, Debug)]
pub struct DeepStackConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Multipart field the payload is uploaded under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadField {
    Image,
    Video,
}

impl UploadField {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadField::Image => "image",
            UploadField::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NudityResponse {
    #[serde(default)]
    pub nudity: NudityScores,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NudityScores {
    #[serde(default, rename = "unsafe")]
    pub unsafe_score: f32,
}

/// Client for a DeepStack-compatible nudity endpoint.
#[derive(Clone)]
pub struct DeepStackClient {
    client: Client,
    url: Arc<Url>,
}

impl DeepStackClient {
    pub fn new(cfg: DeepStackConfig) -> Result<Self, ProviderError> {
        let url = Url::parse(&cfg.url)
            .map_err(|e| ProviderError::RequestFailed(format!("invalid url {}: {}", cfg.url, e)))?;
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            url: Arc::new(url),
        })
    }

    /// Uploads the file and returns the parsed scores.
    ///
    /// Anything other than HTTP 200 is an error for that file.
    pub async fn nudity(
        &self,
        path: &Path,
        field: UploadField,
    ) -> Result<NudityScores, ProviderError> {
        let payload = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| field.as_str().to_string());
        let form = Form::new().part(field.as_str(), Part::bytes(payload).file_name(file_name));

        let resp = self
            .client
            .post(self.url.as_ref().clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::BadStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: NudityResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        debug!("unsafe score {} for {:?}", parsed.nudity.unsafe_score, path);
        Ok(parsed.nudity)
    }

    /// Probes the server root. Any HTTP response counts as reachable.
    pub async fn health(&self) -> Result<(), ProviderError> {
        let mut root = self.url.as_ref().clone();
        root.set_path("/");
        root.set_query(None);
        self.client
            .get(root)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unsafe_score() {
        let parsed: NudityResponse =
            serde_json::from_str(r#"{"success":true,"nudity":{"safe":0.1,"unsafe":0.87}}"#)
                .unwrap();
        assert!((parsed.nudity.unsafe_score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn missing_scores_default_to_zero() {
        let parsed: NudityResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(parsed.nudity.unsafe_score, 0.0);
    }

    #[test]
    fn rejects_invalid_url() {
        let err = DeepStackClient::new(DeepStackConfig {
            url: "not a url".to_string(),
            timeout: Duration::from_secs(1),
        })
        .err()
        .unwrap();
        assert!(matches!(err, ProviderError::RequestFailed(_)));
    }
}
