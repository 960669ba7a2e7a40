use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dto::{AnalysisEnvelope, AnalysisRequest};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bad response (status {status:?}): {detail}")]
    Response { status: Option<u16>, detail: String },
    #[error("image payload is empty")]
    EmptyImage,
    #[error("analysis cancelled")]
    Cancelled,
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// One request/response round-trip. Resolves to `Cancelled` as soon as
    /// `cancel` fires; the in-flight request is dropped.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        bearer: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisEnvelope, AnalyzeError>;
}

#[derive(Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("foodlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build analysis http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        bearer: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisEnvelope, AnalyzeError> {
        if request.image_data_base64.is_empty() {
            return Err(AnalyzeError::EmptyImage);
        }

        let mut req = self.http.post(&self.endpoint).json(request);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        info!(
            endpoint = %self.endpoint,
            image_b64_len = request.image_data_base64.len(),
            text_len = request.text.len(),
            authenticated = bearer.is_some(),
            "sending analysis request"
        );

        let round_trip = async {
            let res = req.send().await?;
            let status = res.status();
            let body = res.bytes().await?;
            debug!(%status, body_len = body.len(), "analysis response received");
            decode_body(status, &body)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("analysis request cancelled");
                Err(AnalyzeError::Cancelled)
            }
            res = round_trip => res,
        }
    }
}

fn decode_body(status: StatusCode, body: &[u8]) -> Result<AnalysisEnvelope, AnalyzeError> {
    let parsed = serde_json::from_slice::<Value>(body);

    if !status.is_success() {
        // A failing status that still explains itself reaches the user.
        if let Ok(Value::Object(map)) = &parsed {
            if let (None, Some(Value::String(message))) = (map.get("content"), map.get("message")) {
                if !message.trim().is_empty() {
                    warn!(%status, %message, "analysis service refused request");
                    return Ok(AnalysisEnvelope {
                        content: None,
                        message: Some(message.clone()),
                    });
                }
            }
        }
        warn!(%status, "analysis service returned error status");
        return Err(AnalyzeError::Response {
            status: Some(status.as_u16()),
            detail: snippet(body),
        });
    }

    match parsed {
        Ok(v @ Value::Object(_)) => {
            serde_json::from_value(v).map_err(|e| AnalyzeError::Response {
                status: Some(status.as_u16()),
                detail: format!("envelope: {e}"),
            })
        }
        Ok(_) => Err(AnalyzeError::Response {
            status: Some(status.as_u16()),
            detail: "body is not a JSON object".into(),
        }),
        Err(e) => Err(AnalyzeError::Response {
            status: Some(status.as_u16()),
            detail: format!("malformed JSON body: {e}"),
        }),
    }
}

fn snippet(body: &[u8]) -> String {
    const MAX: usize = 256;
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.into_owned(),
    }
}
