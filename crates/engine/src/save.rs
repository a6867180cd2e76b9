//! Commit targets for a finished trim.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Payload sent to the save collaborator on commit.
///
/// # Example
/// ```
/// use trim_engine::TrimRequest;
///
/// let request = TrimRequest {
///     asset_id: "answer-42".to_owned(),
///     start_time: 10.0,
///     end_time: 100.0,
///     duration: 120.0,
/// };
/// let json = serde_json::to_string(&request).expect("serialize request");
/// assert_eq!(
///     json,
///     r#"{"assetId":"answer-42","startTime":10.0,"endTime":100.0,"duration":120.0}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    pub asset_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

impl TrimRequest {
    pub fn trimmed_duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// External collaborator that performs the trim.
///
/// Called from a background thread; implementations may block.
pub trait SaveBackend {
    fn save(&self, request: &TrimRequest) -> Result<()>;
}

/// Bytes escaped in the asset id path segment.
const ASSET_ID_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Posts the request as JSON to `{base_url}/responses/{asset_id}/trim`.
#[derive(Clone)]
pub struct HttpSaveBackend {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpSaveBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Endpoint the request for `asset_id` is posted to. The id is
    /// percent-encoded as a single path segment.
    pub fn endpoint(&self, asset_id: &str) -> String {
        format!(
            "{}/responses/{}/trim",
            self.base_url.trim_end_matches('/'),
            utf8_percent_encode(asset_id, ASSET_ID_SEGMENT)
        )
    }
}

impl fmt::Debug for HttpSaveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSaveBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl SaveBackend for HttpSaveBackend {
    fn save(&self, request: &TrimRequest) -> Result<()> {
        let url = self.endpoint(&request.asset_id);
        debug!(%url, start = request.start_time, end = request.end_time, "posting trim request");

        let mut http = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json");
        if let Some(token) = &self.token {
            http = http.set("Authorization", &format!("Bearer {token}"));
        }

        match http.send_json(request) {
            Ok(response) => {
                info!(%url, status = response.status(), "trim request accepted");
                Ok(())
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(EngineError::CommitFailed {
                    reason: format!("HTTP {code}: {}", body.trim()),
                })
            }
            Err(err) => Err(EngineError::CommitFailed {
                reason: err.to_string(),
            }),
        }
    }
}

/// Writes the request as pretty JSON to a file.
#[derive(Debug, Clone)]
pub struct JsonFileSaveBackend {
    path: PathBuf,
}

impl JsonFileSaveBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveBackend for JsonFileSaveBackend {
    fn save(&self, request: &TrimRequest) -> Result<()> {
        let json = serde_json::to_string_pretty(request).map_err(|err| {
            EngineError::CommitFailed {
                reason: format!("serialize trim request: {err}"),
            }
        })?;
        fs::write(&self.path, json).map_err(|err| EngineError::CommitFailed {
            reason: format!("write {}: {err}", self.path.display()),
        })?;
        info!(path = %self.path.display(), asset_id = %request.asset_id, "trim request written");
        Ok(())
    }
}

/// Save backend picked at runtime by a front-end.
#[derive(Debug, Clone)]
pub enum SaveTarget {
    Http(HttpSaveBackend),
    JsonFile(JsonFileSaveBackend),
}

impl SaveTarget {
    /// Posts to `base_url` when given, otherwise writes to `fallback_path`.
    pub fn select(
        base_url: Option<&str>,
        token: Option<&str>,
        timeout: Duration,
        fallback_path: impl Into<PathBuf>,
    ) -> Self {
        match base_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => {
                let mut backend = HttpSaveBackend::new(url, timeout);
                if let Some(token) = token {
                    backend = backend.with_token(token);
                }
                Self::Http(backend)
            }
            None => Self::JsonFile(JsonFileSaveBackend::new(fallback_path)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::JsonFile(_) => "json-file",
        }
    }
}

impl SaveBackend for SaveTarget {
    fn save(&self, request: &TrimRequest) -> Result<()> {
        match self {
            Self::Http(backend) => backend.save(request),
            Self::JsonFile(backend) => backend.save(request),
        }
    }
}
