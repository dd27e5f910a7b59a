//! Detector backends: in-process detection models and the remote nudity service.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod command;
pub mod deepstack;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unexpected status {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One detected class and its confidence, as reported by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub score: f32,
}

/// A local detection model. Takes an image path and returns every detection.
#[async_trait::async_trait]
pub trait DetectionModel: Send + Sync {
    async fn detect(&self, path: &Path) -> Result<Vec<Detection>, ProviderError>;
}
