//! Service configuration loaded from an optional TOML file and `FLEETSYNC_*`
//! environment variables. Environment values win over the file.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use fleetsync_core::{
    Credentials, DedupConfig, FieldSchema, Integration, PullConfig, ValidationError,
    BATCH_SIZE, QUIET_PERIOD_TTL,
};
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of text
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_integration_id")]
    pub integration_id: String,

    /// Overrides the public vendor endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_look_back_window_hours")]
    pub look_back_window_hours: i64,

    #[serde(default)]
    pub gmt_offset: i64,

    #[serde(default)]
    pub schema: FieldSchema,

    #[serde(default = "default_quiet_statuses")]
    pub quiet_statuses: Vec<String>,

    #[serde(default)]
    pub moving_only: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// JSON snapshot for device state and checkpoints; in-memory when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Downstream endpoint; observations go to stdout when unset
    #[serde(default)]
    pub sink_url: Option<String>,

    #[serde(default)]
    pub sink_token: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_integration_id() -> String {
    "default".to_string()
}

fn default_look_back_window_hours() -> i64 {
    4
}

fn default_quiet_statuses() -> Vec<String> {
    vec!["off".to_string()]
}

fn default_batch_size() -> usize {
    BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    6
}

impl ServiceConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("FLEETSYNC")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("quiet_statuses"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn integration(&self) -> Result<Integration, ValidationError> {
        let integration = Integration::new(self.integration_id.clone())?;
        Ok(match &self.base_url {
            Some(base_url) => integration.with_base_url(base_url.clone()),
            None => integration,
        })
    }

    pub fn credentials(&self) -> Result<Credentials, ValidationError> {
        Credentials::new(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        )
    }

    pub fn pull_config(&self) -> Result<PullConfig, ValidationError> {
        Ok(PullConfig::new(self.look_back_window_hours, self.gmt_offset)?.with_schema(self.schema))
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            quiet_statuses: self.quiet_statuses.clone(),
            quiet_period: QUIET_PERIOD_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_toml(contents: &str) -> ServiceConfig {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        Config::builder()
            .add_source(File::from(file.path()))
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize")
    }

    #[test]
    fn defaults_apply_to_empty_file() {
        let config = load_toml("");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.integration_id, "default");
        assert_eq!(config.look_back_window_hours, 4);
        assert_eq!(config.gmt_offset, 0);
        assert_eq!(config.schema, FieldSchema::Basic);
        assert_eq!(config.quiet_statuses, vec!["off".to_string()]);
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.max_attempts, 6);
        assert!(config.state_file.is_none());
    }

    #[test]
    fn file_values_build_core_types() {
        let config = load_toml(
            r#"
            integration_id = "fleet-7"
            base_url = "https://vendor.test/Assets_Report"
            username = "ops"
            password = "s3cret"
            look_back_window_hours = 12
            gmt_offset = -5
            schema = "extended"
            quiet_statuses = ["off", "parked"]
            "#,
        );

        let integration = config.integration().expect("valid");
        assert_eq!(integration.endpoint(), "https://vendor.test/Assets_Report");
        assert_eq!(config.credentials().expect("valid").username(), "ops");

        let pull = config.pull_config().expect("valid");
        assert_eq!(pull.look_back_window_hours(), 12);
        assert_eq!(pull.gmt_offset(), -5);
        assert_eq!(pull.schema(), FieldSchema::Extended);
        assert!(config.dedup_config().is_quiet("Parked"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = load_toml("look_back_window_hours = 30");
        assert_eq!(
            config.pull_config().expect_err("out of range"),
            ValidationError::LookBackOutOfRange { value: 30 }
        );
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = load_toml("");
        assert_eq!(
            config.credentials().expect_err("missing"),
            ValidationError::EmptyUsername
        );
    }
}
