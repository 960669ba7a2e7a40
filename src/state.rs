use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::analysis::client::{AnalysisClient, HttpAnalysisClient};
use crate::config::AppConfig;
use crate::media::acquire::MediaLibrary;
use crate::media::permissions::{PermissionGate, StaticPermissions};
use crate::session::store::ScreenStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub analyzer: Arc<dyn AnalysisClient>,
    pub permissions: Arc<dyn PermissionGate>,
    pub library: MediaLibrary,
    pub screens: ScreenStore,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env().context("load configuration")?);

        let client = HttpAnalysisClient::new(config.analysis.endpoint.clone())?;
        info!(
            endpoint = client.endpoint(),
            attach_session_token = config.analysis.attach_session_token,
            jpeg_quality = config.analysis.jpeg_quality,
            "analysis client ready"
        );
        info!(
            idle_ttl_secs = config.session.idle_ttl.as_secs(),
            max_upload_bytes = config.media.max_upload_bytes,
            "screen sessions configured"
        );

        let library = MediaLibrary::new(config.media.library_dir.clone());
        if tokio::fs::metadata(library.root()).await.is_err() {
            tracing::warn!(dir = %library.root().display(), "media library directory missing; library will be empty");
        }

        let permissions = Arc::new(StaticPermissions {
            capture: config.media.capture_allowed,
            library: config.media.library_allowed,
        }) as Arc<dyn PermissionGate>;

        Ok(Self::from_parts(
            config,
            Arc::new(client) as Arc<dyn AnalysisClient>,
            permissions,
            library,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        analyzer: Arc<dyn AnalysisClient>,
        permissions: Arc<dyn PermissionGate>,
        library: MediaLibrary,
    ) -> Self {
        let screens = ScreenStore::new(config.session.idle_ttl);
        Self {
            config,
            analyzer,
            permissions,
            library,
            screens,
        }
    }
}

#[cfg(test)]
pub(crate) use fake::{FakeAnalyzer, FakeReply};

#[cfg(test)]
impl AppState {
    pub fn fake() -> (Self, Arc<FakeAnalyzer>) {
        use crate::config::{AnalysisConfig, JwtConfig, MediaConfig, SessionConfig};

        let config = Arc::new(AppConfig {
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
            analysis: AnalysisConfig {
                endpoint: "http://fake.local/analyze".into(),
                jpeg_quality: 50,
                attach_session_token: true,
                render_fallback_text: false,
            },
            media: MediaConfig {
                library_dir: std::env::temp_dir().join("foodlens-fake-library"),
                capture_allowed: true,
                library_allowed: true,
                max_upload_bytes: 5 * 1024 * 1024,
            },
            session: SessionConfig {
                idle_ttl: std::time::Duration::from_secs(30 * 60),
            },
        });

        let fake = Arc::new(FakeAnalyzer::default());
        let state = Self::from_parts(
            config.clone(),
            fake.clone() as Arc<dyn AnalysisClient>,
            Arc::new(StaticPermissions::allow_all()),
            MediaLibrary::new(config.media.library_dir.clone()),
        );
        (state, fake)
    }
}

#[cfg(test)]
mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use crate::analysis::client::{AnalysisClient, AnalyzeError};
    use crate::analysis::dto::{AnalysisEnvelope, AnalysisRequest};

    pub enum FakeReply {
        Envelope(Value),
        Delayed(Duration, Value),
        Unreachable,
    }

    /// Scripted analysis service. Replies are consumed in order.
    #[derive(Default)]
    pub struct FakeAnalyzer {
        replies: Mutex<VecDeque<FakeReply>>,
        seen: Mutex<Vec<(AnalysisRequest, Option<String>)>>,
    }

    impl FakeAnalyzer {
        pub fn push(&self, reply: FakeReply) {
            self.replies.lock().unwrap().push_back(reply);
        }

        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        pub fn last_request(&self) -> Option<AnalysisRequest> {
            self.seen.lock().unwrap().last().map(|(r, _)| r.clone())
        }

        pub fn last_bearer(&self) -> Option<String> {
            self.seen.lock().unwrap().last().and_then(|(_, b)| b.clone())
        }
    }

    fn envelope(v: Value) -> AnalysisEnvelope {
        serde_json::from_value(v).expect("scripted envelope")
    }

    #[async_trait]
    impl AnalysisClient for FakeAnalyzer {
        async fn analyze(
            &self,
            request: &AnalysisRequest,
            bearer: Option<&str>,
            cancel: &CancellationToken,
        ) -> Result<AnalysisEnvelope, AnalyzeError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.clone(), bearer.map(str::to_string)));
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| FakeReply::Envelope(json!({"message": "no scripted reply"})));

            match reply {
                FakeReply::Envelope(v) => Ok(envelope(v)),
                FakeReply::Delayed(delay, v) => tokio::select! {
                    _ = cancel.cancelled() => Err(AnalyzeError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(envelope(v)),
                },
                FakeReply::Unreachable => {
                    // a relative URL fails inside reqwest without touching the network
                    let err = reqwest::Client::new()
                        .get("not a url")
                        .send()
                        .await
                        .expect_err("relative url must fail");
                    Err(AnalyzeError::Transport(err))
                }
            }
        }
    }
}
