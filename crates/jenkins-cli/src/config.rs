//! Configuration file and settings resolution.
//!
//! Precedence, highest first: command-line flag, environment
//! (`JENKINS_URL`, `JENKINS_AUTH`, handled by clap), config file, built-in
//! default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jenkins_client::{BackoffPolicy, CorrelationConfig, Credentials, WaitConfig};
use jenkins_proto::{BuildParams, TriggerParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::error::CliError;

/// Polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// First delay between status polls.
    pub initial_interval_ms: u64,
    /// Longest delay between status polls.
    pub max_interval_ms: u64,
    /// Growth of the delay after each poll.
    pub growth_factor: f64,
    /// Multiplier on the server's estimate for the default timeout.
    pub safety_factor: f64,
    /// Smallest default timeout.
    pub timeout_floor_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1000,
            max_interval_ms: 15_000,
            growth_factor: 1.5,
            safety_factor: 3.0,
            timeout_floor_secs: 60,
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Server URL.
    pub server_url: Option<String>,
    /// User for API token authentication.
    pub auth_user: Option<String>,
    /// API token.
    pub auth_token: Option<String>,
    /// Verify TLS certificates.
    pub check_certificate: bool,
    /// Parameters sent with every trigger, under user-supplied ones.
    pub default_params: Option<String>,
    /// Directory that also receives streamed console text.
    pub console_log_dir: Option<PathBuf>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Bound on waiting for a queue item to be scheduled.
    pub correlation_timeout_secs: u64,
    /// Status polling.
    pub poll: PollConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            auth_user: None,
            auth_token: None,
            check_certificate: true,
            default_params: None,
            console_log_dir: None,
            request_timeout_secs: 30,
            correlation_timeout_secs: 120,
            poll: PollConfig::default(),
        }
    }
}

const TEMPLATE: &str = r#"# jenkins configuration

# Server URL; JENKINS_URL and --url take precedence.
# server_url = "https://ci.example.com"

# API token credentials; JENKINS_AUTH=user:token and --auth take precedence.
# auth_user = "alice"
# auth_token = "0123456789abcdef"

# Verify TLS certificates.
check_certificate = true

# Sent with every trigger, under the ones given with -p.
# default_params = "token=secret,delay=0"

# Also write streamed console text to <dir>/<job>-<build>-console.log.
# console_log_dir = "/tmp/jenkins-logs"

request_timeout_secs = 30
correlation_timeout_secs = 120

[poll]
initial_interval_ms = 1000
max_interval_ms = 15000
growth_factor = 1.5
safety_factor = 3.0
timeout_floor_secs = 60
"#;

impl Config {
    /// `<config dir>/jenkins-cli/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jenkins-cli").join("config.toml"))
    }

    /// Commented template of the defaults.
    #[must_use]
    pub const fn template() -> &'static str {
        TEMPLATE
    }

    /// Load from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CliError::Config(format!(
                    "failed to read config file '{}': {e}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] for invalid TOML or values.
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let config: Self =
            toml::from_str(content).map_err(|e| CliError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the values.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(url) = &self.server_url {
            validate_url(url)?;
        }
        if self.auth_user.is_some() != self.auth_token.is_some() {
            return Err(CliError::Config(
                "auth_user and auth_token must be set together".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CliError::Config("request_timeout_secs must be greater than 0".into()));
        }
        if let Some(params) = &self.default_params {
            params
                .parse::<BuildParams>()
                .map_err(|e| CliError::Config(format!("default_params: {e}")))?;
        }
        self.wait_config().validate()?;
        self.correlation_config().validate()?;
        Ok(())
    }

    /// Wait policy from the `[poll]` table.
    #[must_use]
    pub const fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            backoff: BackoffPolicy {
                initial: Duration::from_millis(self.poll.initial_interval_ms),
                factor: self.poll.growth_factor,
                max: Duration::from_millis(self.poll.max_interval_ms),
            },
            safety_factor: self.poll.safety_factor,
            floor: Duration::from_secs(self.poll.timeout_floor_secs),
        }
    }

    /// Correlation policy.
    #[must_use]
    pub fn correlation_config(&self) -> CorrelationConfig {
        CorrelationConfig {
            timeout: Duration::from_secs(self.correlation_timeout_secs),
            ..CorrelationConfig::default()
        }
    }
}

fn validate_url(url: &str) -> Result<(), CliError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CliError::Config(format!(
            "server URL must start with http:// or https://, got '{url}'"
        )))
    }
}

/// Everything an invocation needs to reach the server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server URL.
    pub url: String,
    /// Credentials, if any.
    pub credentials: Option<Credentials>,
    /// Verify TLS certificates.
    pub check_certificate: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Parameters sent with every trigger, under user-supplied ones.
    pub default_params: BuildParams,
    /// Directory that also receives streamed console text.
    pub console_log_dir: Option<PathBuf>,
    /// Wait policy.
    pub wait: WaitConfig,
    /// Correlation policy.
    pub correlation: CorrelationConfig,
}

impl Settings {
    /// Merge command line (flags and environment) over the config file.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] without a server URL, for a malformed
    /// URL, or for malformed credentials.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self, CliError> {
        let url = cli
            .url
            .clone()
            .or_else(|| config.server_url.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "no server URL: use --url, JENKINS_URL or server_url in the config file".into(),
                )
            })?;
        validate_url(&url)?;

        let credentials = match (&cli.auth, &config.auth_user, &config.auth_token) {
            (Some(auth), _, _) => Some(Credentials::parse(auth).map_err(|e| CliError::Config(e.to_string()))?),
            (None, Some(user), Some(token)) => Some(Credentials::new(user.clone(), token.clone())),
            _ => None,
        };

        let default_params = config
            .default_params
            .as_deref()
            .map(str::parse::<BuildParams>)
            .transpose()
            .map_err(|e| CliError::Config(format!("default_params: {e}")))?
            .unwrap_or_default();

        Ok(Self {
            url,
            credentials,
            check_certificate: config.check_certificate && !cli.insecure,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            default_params,
            console_log_dir: config.console_log_dir.clone(),
            wait: config.wait_config(),
            correlation: config.correlation_config(),
        })
    }

    /// Trigger parameters: the user's over the configured defaults.
    ///
    /// Defaults are always sent, so a configured `token` reaches a plain
    /// trigger too.
    #[must_use]
    pub fn build_params(&self, user: BuildParams) -> TriggerParams {
        TriggerParams::new(user, self.default_params.clone())
    }
}
