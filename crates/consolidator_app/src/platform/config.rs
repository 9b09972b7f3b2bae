//! `consolidator.ron` settings, then environment, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use consolidator_client::{ApiSettings, ReporterSettings};
use consolidator_core::{PollSettings, DEFAULT_MAX_TICKS, DEFAULT_POLL_INTERVAL};
use consolidator_logging::con_info;
use serde::{Deserialize, Serialize};
use url::Url;

use super::logging::LogDestination;

pub const CONFIG_FILENAME: &str = "consolidator.ron";

const ENV_SERVER_URL: &str = "CONSOLIDATOR_SERVER_URL";
const ENV_WEBHOOK_URL: &str = "CONSOLIDATOR_WEBHOOK_URL";
const ENV_OUTPUT_DIR: &str = "CONSOLIDATOR_OUTPUT_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_polls: DEFAULT_MAX_TICKS,
            request_timeout_secs: 30,
            output_dir: PathBuf::from("output"),
            webhook_url: None,
            spreadsheet_id: None,
            sheet_name: None,
            log_destination: LogDestination::File,
        }
    }
}

/// Values given on the command line; `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
    pub log_destination: Option<LogDestination>,
}

impl AppConfig {
    /// Loads `path` (or `./consolidator.ron`), then applies environment and CLI layers.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        let text = match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => None,
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };

        let mut config = Self::from_sources(text.as_deref(), |key| std::env::var(key).ok())
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// File layer (if any) plus environment layer.
    pub fn from_sources(
        file_text: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match file_text {
            Some(text) => ron::from_str::<AppConfig>(text)?,
            None => AppConfig::default(),
        };
        if let Some(url) = env(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            config.server_url = url;
        }
        if let Some(url) = env(ENV_WEBHOOK_URL).filter(|v| !v.trim().is_empty()) {
            config.webhook_url = Some(url);
        }
        if let Some(dir) = env(ENV_OUTPUT_DIR).filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.server_url {
            self.server_url = url.clone();
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(url) = &overrides.webhook_url {
            self.webhook_url = Some(url.clone());
        }
        if let Some(id) = &overrides.spreadsheet_id {
            self.spreadsheet_id = Some(id.clone());
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(max) = overrides.max_polls {
            self.max_polls = max;
        }
        if let Some(destination) = overrides.log_destination {
            self.log_destination = destination;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.max_polls == 0 {
            bail!("max_polls must be greater than zero");
        }
        Url::parse(&self.server_url)
            .with_context(|| format!("server_url '{}' is not a valid URL", self.server_url))?;
        Ok(())
    }

    pub fn api_settings(&self) -> Result<ApiSettings> {
        let mut settings = ApiSettings::parse(&self.server_url)?;
        settings.request_timeout = Duration::from_secs(self.request_timeout_secs.max(1));
        Ok(settings)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_ticks: self.max_polls,
        }
    }

    pub fn reporter_settings(&self) -> Result<ReporterSettings> {
        let Some(raw) = self.webhook_url.as_deref() else {
            bail!("no webhook_url configured (set it in {CONFIG_FILENAME} or {ENV_WEBHOOK_URL})");
        };
        let Some(spreadsheet_id) = self.spreadsheet_id.clone() else {
            bail!("no spreadsheet_id configured");
        };
        let url = Url::parse(raw).with_context(|| format!("webhook_url '{raw}' is not a valid URL"))?;
        let mut settings = ReporterSettings::new(url, spreadsheet_id);
        settings.sheet_name = self.sheet_name.clone();
        Ok(settings)
    }

    pub fn log_summary(&self) {
        con_info!(
            "config: server={} poll={}ms x{} output={}",
            self.server_url,
            self.poll_interval_ms,
            self.max_polls,
            self.output_dir.display()
        );
    }
}
