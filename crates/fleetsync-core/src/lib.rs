//! # Fleetsync Core
//!
//! Incremental polling of the Galooli fleet-tracking API with per-device
//! deduplication.
//!
//! ## Overview
//!
//! - **Vendor client** that builds windowed requests, classifies result codes
//!   and backs off on throttling
//! - **Record conversion** from positional vendor rows to observations
//! - **Deduplication filter** that forwards only status changes and fresh
//!   quiet-period reports
//! - **Stores** for device state and checkpoints (in-memory and JSON file)
//! - **Sinks** for delivered observations (HTTP and NDJSON)
//! - **Poll cycle** tying the pieces together
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `testing` | Exposes `mockall` mocks of the store and sink traits |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`checkpoint`] | Checkpoint trait and in-memory store |
//! | [`config`] | Validated integration, credential and pull settings |
//! | [`convert`] | Raw record to observation conversion |
//! | [`dedup`] | Forward/suppress state machine |
//! | [`domain`] | Domain models (Observation, RawRecord, PollWindow) |
//! | [`error`] | Error taxonomy |
//! | [`file_store`] | JSON snapshot store |
//! | [`http_client`] | HTTP client abstraction |
//! | [`poll`] | Poll cycle and credential check |
//! | [`retry`] | Retry loop with jittered exponential backoff |
//! | [`sink`] | Observation sinks and batching |
//! | [`state`] | Device-state trait and in-memory store |
//! | [`vendor`] | Vendor client, envelope and field schemas |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fleetsync_core::*;
//!
//! let vendor = VendorClient::new(Arc::new(ReqwestHttpClient::new()), DEFAULT_BASE_URL);
//! let cycle = PollCycle::new(
//!     Integration::new("fleet-1")?,
//!     Credentials::new("user", "password")?,
//!     PullConfig::default(),
//!     vendor,
//!     Arc::new(InMemoryStateStore::new()),
//!     Arc::new(InMemoryCheckpointStore::new()),
//!     Arc::new(JsonLinesSink::new(std::io::stdout())),
//! );
//! let report = cycle.run_now().await?;
//! println!("{}", report.to_json());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  PollCycle      │────▶│ CheckpointStore  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ VendorClient    │────▶│ HTTP Client      │
//! │ (retry, codes)  │     │ (reqwest)        │
//! └────────┬────────┘     └──────────────────┘
//!          │ RawRecord
//!          ▼
//! ┌─────────────────┐
//! │ convert         │
//! └────────┬────────┘
//!          │ Observation
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Dedup filter    │────▶│ DeviceStateStore │
//! └────────┬────────┘     └──────────────────┘
//!          │ batches of 200
//!          ▼
//! ┌─────────────────┐
//! │ ObservationSink │
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - `Credentials` redacts the password in `Debug` output
//! - Passwords only leave the process as vendor query parameters

pub mod checkpoint;
pub mod config;
pub mod convert;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod file_store;
pub mod http_client;
pub mod poll;
pub mod retry;
pub mod sink;
pub mod state;
pub mod vendor;

// Stores
pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use file_store::JsonFileStore;
pub use state::{DeviceState, DeviceStateStore, InMemoryStateStore, PULL_ACTION_ID};

// Configuration
pub use config::{Credentials, Integration, PullConfig};

// Conversion and deduplication
pub use convert::{convert, convert_all, ConvertOptions};
pub use dedup::{
    Decision, DedupConfig, DedupPlan, DeduplicationFilter, ForwardReason, StateWrite,
    SuppressReason, QUIET_PERIOD_TTL,
};

// Domain models
pub use domain::{Location, Observation, PollWindow, RawRecord};

// Error types
pub use error::{DecodeError, PollError, SinkError, StoreError, ValidationError, VendorError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Orchestration
pub use poll::{verify_credentials, CredentialStatus, CycleReport, PollCycle};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Sinks
pub use sink::{batches, HttpSink, JsonLinesSink, ObservationSink, BATCH_SIZE};

// Vendor
pub use vendor::{
    FetchResult, Field, FieldSchema, VendorClient, DEFAULT_BASE_URL, REQUEST_TIMEOUT_MS,
};
