//! Configuration file support (`.appdeliver.toml`) and merging with CLI input.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use appdeliver_retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, RetryStrategyConfig, RetryStrategyType};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthInputs, Credentials};
use crate::engine::{Reporter, UploadRequest};
use crate::error::ConfigError;
use crate::types::PackageDetails;

pub const CONFIG_FILE_NAME: &str = ".appdeliver.toml";

/// `[retry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Preset: default, aggressive, conservative, or custom
    #[serde(default)]
    pub policy: RetryPolicy,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    #[serde(default)]
    pub strategy: RetryStrategyType,
    #[serde(default)]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::Default,
            max_attempts: default_max_attempts(),
            base_delay: default_delay(),
            max_delay: default_delay(),
            strategy: RetryStrategyType::Constant,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Strategy in effect: the preset, or the explicit values for `custom`.
    pub fn effective(&self) -> RetryStrategyConfig {
        match self.policy {
            RetryPolicy::Custom => RetryStrategyConfig {
                strategy: self.strategy,
                max_attempts: self.max_attempts,
                base_delay: self.base_delay,
                max_delay: self.max_delay,
                jitter: self.jitter,
            },
            preset => preset.to_config(),
        }
    }
}

/// Configuration loaded from `.appdeliver.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverConfig {
    /// auto, ios, macos or tvos
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Extra altool flags, shell-quoted
    #[serde(default)]
    pub additional_params: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_platform() -> String {
    "auto".to_string()
}

impl Default for DeliverConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            additional_params: String::new(),
            verbose: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Values given on the command line or through the environment.
///
/// `None` and empty strings mean "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub ipa_path: Option<PathBuf>,
    pub pkg_path: Option<PathBuf>,
    pub auth: AuthInputs,
    pub app_id: Option<String>,
    pub bundle_id: Option<String>,
    pub bundle_version: Option<String>,
    pub bundle_short_version: Option<String>,
    pub platform: Option<String>,
    pub altool_options: Option<String>,
    pub retry_times: Option<String>,
    pub verbose: bool,
}

impl DeliverConfig {
    /// Load `.appdeliver.toml` from `dir`. Returns `Ok(None)` if there is none.
    pub fn load_from_workspace(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&config_path).map(Some)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: DeliverConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.platform.as_str(), "auto" | "ios" | "macos" | "tvos") {
            bail!(
                "platform must be one of auto, ios, macos, tvos (got {:?})",
                self.platform
            );
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be greater than 0");
        }
        if self.retry.max_delay < self.retry.base_delay {
            bail!("retry.max_delay must be greater than or equal to retry.base_delay");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            bail!("retry.jitter must be between 0.0 and 1.0");
        }
        Ok(())
    }

    /// Merge CLI values over this file and validate the result.
    ///
    /// CLI values win over the file; the file wins over defaults.
    pub fn build_request(
        &self,
        cli: CliOverrides,
        xcode_major_version: u32,
        reporter: &mut dyn Reporter,
    ) -> Result<UploadRequest, ConfigError> {
        let file_path = select_artifact(cli.ipa_path, cli.pkg_path)?;

        let raw_params = non_empty(cli.altool_options).unwrap_or_else(|| self.additional_params.clone());
        let additional_params = shlex::split(&raw_params)
            .ok_or_else(|| ConfigError::InvalidAdditionalParams(raw_params.clone()))?;

        let credentials = Credentials::resolve(&cli.auth)?;

        let mut retry = self.retry.effective();
        if let Some(raw) = non_empty(cli.retry_times) {
            retry.max_attempts = parse_retry_times(&raw, reporter);
        }

        Ok(UploadRequest {
            file_path,
            package_details: PackageDetails {
                bundle_id: cli.bundle_id.unwrap_or_default(),
                bundle_version: cli.bundle_version.unwrap_or_default(),
                bundle_short_version_string: cli.bundle_short_version.unwrap_or_default(),
            },
            platform_selector: non_empty(cli.platform).unwrap_or_else(|| self.platform.clone()),
            additional_params,
            credentials,
            xcode_major_version,
            app_id: cli.app_id.unwrap_or_default(),
            verbose: cli.verbose || self.verbose,
            retry,
        })
    }

    pub fn default_toml_template() -> String {
        r#"# appdeliver configuration
# Place this file next to your pipeline definition as .appdeliver.toml

# auto, ios, macos or tvos
platform = "auto"

# Extra altool flags, shell-quoted
additional_params = ""

verbose = false

[retry]
# default, aggressive, conservative or custom
policy = "default"
# The values below apply with policy = "custom"
max_attempts = 10
base_delay = "5s"
max_delay = "5s"
strategy = "constant"
jitter = 0.0
"#
        .to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pick the artifact to upload; a `.pkg` wins over an `.ipa`.
fn select_artifact(ipa: Option<PathBuf>, pkg: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let given = |p: &PathBuf| !p.as_os_str().is_empty();
    pkg.filter(given)
        .or_else(|| ipa.filter(given))
        .ok_or(ConfigError::MissingArtifact)
}

/// Attempt budget from raw text. Unparsable or zero values fall back to the
/// default with a warning.
pub fn parse_retry_times(raw: &str, reporter: &mut dyn Reporter) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            reporter.warn(&format!(
                "Invalid retry count {raw:?}, using the default of {DEFAULT_MAX_ATTEMPTS}"
            ));
            DEFAULT_MAX_ATTEMPTS
        }
    }
}
