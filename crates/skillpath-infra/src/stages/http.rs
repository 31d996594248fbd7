//! HttpStageBackend -- generic [`StageHandler`] that posts stage requests to an
//! HTTP content service.
//!
//! Every stage maps to `POST {endpoint}/stages/{stage_id}` with the tagged
//! `StageInput` as JSON body. The response body is the stage's output record;
//! the `stage` tag may be omitted by the service and is filled in from the
//! request.
//!
//! Failures are classified for the retry controller:
//! - 429 is `RateLimited`, honouring a `Retry-After` header given in seconds
//! - 408, 5xx, connect errors and client timeouts are `Transient`
//! - any other status and undecodable bodies are `Fatal`
//!
//! The bearer token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building the request header.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};

use skillpath_core::stage::StageError;
use skillpath_core::stage::handler::StageHandler;
use skillpath_types::config::StageSettings;
use skillpath_types::stage::{StageId, StageInput, StageOutput};

/// Longest error body kept in a stage error message.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpStageBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

// No Debug: keeps the token out of accidental log output.

impl HttpStageBackend {
    /// Create a backend for `settings`, reading the bearer token from the
    /// environment variable named by `settings.api_key_env` when it is set.
    pub fn from_settings(settings: &StageSettings) -> Result<Self, reqwest::Error> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            tracing::debug!(
                env = %settings.api_key_env,
                "no stage API key configured, sending unauthenticated requests"
            );
        }
        Self::new(settings, api_key)
    }

    pub fn new(settings: &StageSettings, api_key: Option<SecretString>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, stage: StageId) -> String {
        format!("{}/stages/{}", self.endpoint, stage.as_str())
    }
}

impl StageHandler for HttpStageBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, input: StageInput) -> Result<StageOutput, StageError> {
        let stage = input.stage();
        let mut request = self.client.post(self.url(stage)).json(&input);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after_ms, &body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StageError::Fatal(format!("{stage} returned an undecodable body: {e}")))?;
        decode_output(stage, body)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn classify_request_error(err: reqwest::Error) -> StageError {
    if err.is_builder() {
        StageError::Fatal(format!("invalid stage request: {err}"))
    } else if err.is_timeout() {
        StageError::Transient(format!("stage request timed out: {err}"))
    } else {
        StageError::Transient(format!("stage request failed: {err}"))
    }
}

fn classify_status(status: StatusCode, retry_after_ms: Option<u64>, body: &str) -> StageError {
    let body = truncate(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => StageError::RateLimited {
            message: format!("HTTP {status}: {body}"),
            retry_after_ms,
        },
        StatusCode::REQUEST_TIMEOUT => StageError::Transient(format!("HTTP {status}: {body}")),
        s if s.is_server_error() => StageError::Transient(format!("HTTP {status}: {body}")),
        _ => StageError::Fatal(format!("HTTP {status}: {body}")),
    }
}

fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Decode a response body as the output of `stage`, tagging it if needed.
fn decode_output(stage: StageId, mut body: serde_json::Value) -> Result<StageOutput, StageError> {
    if let Some(obj) = body.as_object_mut() {
        obj.entry("stage")
            .or_insert_with(|| serde_json::Value::String(stage.as_str().to_string()));
    }
    serde_json::from_value(body)
        .map_err(|e| StageError::Fatal(format!("{stage} returned an invalid record: {e}")))
}
