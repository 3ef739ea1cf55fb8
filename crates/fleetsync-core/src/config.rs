//! Typed configuration values consumed by the core.
//!
//! Loading and persistence belong to the caller; these types only validate.

use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::domain::timestamp::hours_offset;
use crate::vendor::{FieldSchema, DEFAULT_BASE_URL};
use crate::ValidationError;

pub const DEFAULT_LOOK_BACK_WINDOW_HOURS: u8 = 4;
pub const DEFAULT_GMT_OFFSET: i8 = 0;

/// Identity of one configured integration. Store keys are scoped by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Integration {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyIntegrationId);
        }
        Ok(Self { id, base_url: None })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Configured base URL, or the public vendor endpoint.
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }
}

/// Vendor account credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"**********")
            .finish()
    }
}

/// Settings of the pull action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullConfig {
    look_back_window_hours: u8,
    gmt_offset: i8,
    #[serde(default)]
    schema: FieldSchema,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            look_back_window_hours: DEFAULT_LOOK_BACK_WINDOW_HOURS,
            gmt_offset: DEFAULT_GMT_OFFSET,
            schema: FieldSchema::default(),
        }
    }
}

impl PullConfig {
    pub fn new(look_back_window_hours: i64, gmt_offset: i64) -> Result<Self, ValidationError> {
        let look_back_window_hours = u8::try_from(look_back_window_hours)
            .ok()
            .filter(|hours| (1..=24).contains(hours))
            .ok_or(ValidationError::LookBackOutOfRange {
                value: look_back_window_hours,
            })?;
        let gmt_offset = i8::try_from(gmt_offset)
            .ok()
            .filter(|hours| (-12..=12).contains(hours))
            .ok_or(ValidationError::GmtOffsetOutOfRange { value: gmt_offset })?;

        Ok(Self {
            look_back_window_hours,
            gmt_offset,
            schema: FieldSchema::default(),
        })
    }

    pub fn with_schema(mut self, schema: FieldSchema) -> Self {
        self.schema = schema;
        self
    }

    pub const fn look_back_window_hours(&self) -> u8 {
        self.look_back_window_hours
    }

    pub const fn gmt_offset(&self) -> i8 {
        self.gmt_offset
    }

    pub const fn schema(&self) -> FieldSchema {
        self.schema
    }

    /// Re-checks the ranges; values deserialized from storage bypass `new`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::new(
            i64::from(self.look_back_window_hours),
            i64::from(self.gmt_offset),
        )
        .map(|_| ())
    }

    pub fn utc_offset(&self) -> Result<UtcOffset, ValidationError> {
        self.validate()?;
        hours_offset(self.gmt_offset).ok_or(ValidationError::GmtOffsetOutOfRange {
            value: i64::from(self.gmt_offset),
        })
    }
}
