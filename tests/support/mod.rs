//! Test doubles shared by the behaviour suites.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleetsync_core::{
    Credentials, HttpClient, HttpError, HttpRequest, HttpResponse, Integration,
    InMemoryCheckpointStore, InMemoryStateStore, Observation, ObservationSink, PollCycle,
    PullConfig, RetryConfig, SinkError, VendorClient,
};
use serde_json::{json, Value};

pub const VENDOR_URL: &str = "https://vendor.test/Assets_Report";

/// Replays scripted vendor responses in order and records every request.
#[derive(Default)]
pub struct ScriptedVendor {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedVendor {
    pub fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(bodies: &[Value]) -> Arc<Self> {
        Self::new(
            bodies
                .iter()
                .map(|body| Ok(HttpResponse::ok_json(body.to_string())))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

impl HttpClient for ScriptedVendor {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("lock poisoned").push(request);
        let next = self
            .responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::other("no scripted response left")));
        Box::pin(async move { next })
    }
}

/// Accepts every batch unless told to fail on a given batch index.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Observation>>>,
    fail_on_batch: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(batch_index: usize) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            fail_on_batch: Some(batch_index),
        })
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub fn sent(&self) -> Vec<Observation> {
        self.batches
            .lock()
            .expect("lock poisoned")
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObservationSink for RecordingSink {
    async fn send(&self, observations: &[Observation]) -> Result<Vec<Value>, SinkError> {
        let mut batches = self.batches.lock().expect("lock poisoned");
        if self.fail_on_batch == Some(batches.len()) {
            return Err(SinkError::Rejected {
                status: 503,
                body: String::from("sink unavailable"),
            });
        }
        batches.push(observations.to_vec());
        observations
            .iter()
            .map(|observation| serde_json::to_value(observation).map_err(SinkError::from))
            .collect()
    }
}

/// Basic-schema row with sensible defaults.
pub fn basic_row(sensor_id: &str, gps_time: &str, status: &str, latitude: Value) -> Value {
    json!([
        sensor_id,
        format!("Vehicle {sensor_id}"),
        "Org1",
        gps_time,
        status,
        latitude,
        -74.006,
        1000,
        60
    ])
}

pub fn success_envelope(rows: Vec<Value>, max_gmt_update_time: Option<&str>) -> Value {
    let mut envelope = json!({
        "CommonResult": {
            "ResultCode": 0,
            "DataSet": rows,
        }
    });
    if let Some(max) = max_gmt_update_time {
        envelope["MaxGmtUpdateTime"] = json!(max);
    }
    envelope
}

pub fn error_envelope(code: i64, description: &str) -> Value {
    json!({
        "CommonResult": {
            "ResultCode": code,
            "ResultDescription": description,
        }
    })
}

pub fn credentials() -> Credentials {
    Credentials::new("fleet-ops", "s3cret").expect("valid credentials")
}

pub fn vendor_client(http: Arc<ScriptedVendor>) -> VendorClient {
    VendorClient::new(http, VENDOR_URL).with_retry(RetryConfig::fixed(Duration::ZERO, 6))
}

/// Stores and doubles wired into one cycle, kept for assertions.
pub struct Harness {
    pub vendor: Arc<ScriptedVendor>,
    pub states: Arc<InMemoryStateStore>,
    pub checkpoints: Arc<InMemoryCheckpointStore>,
    pub sink: Arc<RecordingSink>,
    pub cycle: PollCycle,
}

impl Harness {
    pub fn new(vendor: Arc<ScriptedVendor>, sink: Arc<RecordingSink>) -> Self {
        Self::with_stores(
            vendor,
            sink,
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        )
    }

    pub fn with_stores(
        vendor: Arc<ScriptedVendor>,
        sink: Arc<RecordingSink>,
        states: Arc<InMemoryStateStore>,
        checkpoints: Arc<InMemoryCheckpointStore>,
    ) -> Self {
        let cycle = PollCycle::new(
            Integration::new("int-1").expect("valid id"),
            credentials(),
            PullConfig::new(4, 0).expect("valid config"),
            vendor_client(vendor.clone()),
            states.clone(),
            checkpoints.clone(),
            sink.clone(),
        );
        Self {
            vendor,
            states,
            checkpoints,
            sink,
            cycle,
        }
    }
}
