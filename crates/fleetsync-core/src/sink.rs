//! Downstream delivery of forwarded observations.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::domain::Observation;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::SinkError;

/// Observations per `send` call.
pub const BATCH_SIZE: usize = 200;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Sends one batch and returns the items the sink accepted.
    async fn send(&self, observations: &[Observation]) -> Result<Vec<Value>, SinkError>;
}

/// Splits `observations` into consecutive batches of at most `size`.
pub fn batches(observations: &[Observation], size: usize) -> impl Iterator<Item = &[Observation]> {
    observations.chunks(size.max(1))
}

/// POSTs each batch as a JSON array.
///
/// The sink answers with a JSON array of accepted items; an empty body
/// counts every sent observation as accepted.
#[derive(Clone)]
pub struct HttpSink {
    http_client: Arc<dyn HttpClient>,
    url: String,
    auth: HttpAuth,
    timeout_ms: u64,
}

impl HttpSink {
    pub fn new(http_client: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            auth: HttpAuth::None,
            timeout_ms: 30_000,
        }
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[async_trait]
impl ObservationSink for HttpSink {
    async fn send(&self, observations: &[Observation]) -> Result<Vec<Value>, SinkError> {
        let body = serde_json::to_string(observations)?;
        let request = HttpRequest::post(&self.url)
            .with_header("content-type", "application/json")
            .with_auth(&self.auth)
            .with_body(body)
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| SinkError::Transport(e.message().to_owned()))?;

        if !response.is_success() {
            error!(status = response.status, body = %response.body, "sink rejected batch");
            return Err(SinkError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        if response.body.trim().is_empty() {
            return observations
                .iter()
                .map(|observation| serde_json::to_value(observation).map_err(SinkError::from))
                .collect();
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Array(accepted)) => {
                debug!(sent = observations.len(), accepted = accepted.len(), "batch delivered");
                Ok(accepted)
            }
            Ok(other) => Err(SinkError::InvalidResponse(format!(
                "expected a JSON array, got {other}"
            ))),
            Err(e) => Err(SinkError::InvalidResponse(e.to_string())),
        }
    }
}

/// Writes each observation as one JSON line. Every line written counts as
/// accepted.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|_| SinkError::Transport(String::from("writer lock poisoned")))
    }
}

#[async_trait]
impl<W: Write + Send> ObservationSink for JsonLinesSink<W> {
    async fn send(&self, observations: &[Observation]) -> Result<Vec<Value>, SinkError> {
        let mut accepted = Vec::with_capacity(observations.len());
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Transport(String::from("writer lock poisoned")))?;

        for observation in observations {
            let value = serde_json::to_value(observation)?;
            serde_json::to_writer(&mut *writer, &value)?;
            writer.write_all(b"\n")?;
            accepted.push(value);
        }
        writer.flush()?;
        Ok(accepted)
    }
}
