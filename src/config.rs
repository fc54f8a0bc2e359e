//! Torflux configuration
//!
//! Every option has a default matching the stock deployment (control ports
//! 9051 and 9054, log under `./log`), so running without a config file behaves
//! exactly like the fixed-constant tool. A TOML file passed with `--settings`
//! overrides individual fields; missing sections and keys fall back to the
//! defaults.
//!
//! The control host is always `127.0.0.1` and cannot be configured.

use crate::audit::{AuditLog, DEFAULT_PADDING_LINES};
use crate::credential::DEFAULT_CREDENTIAL_ENV;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loopback address every control endpoint lives on
pub const CONTROL_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Main and DNS Tor instances, in visiting order
pub const DEFAULT_ENDPOINTS: [u16; 2] = [9051, 9054];

pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive cap for a single reply; one byte is reserved
pub const DEFAULT_RECV_CAP: usize = 8192;

pub const DEFAULT_LOG_DIR: &str = "./log";
pub const DEFAULT_LOG_FILE: &str = "tor_circuit_refresh_log.txt";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Complete configuration record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FluxConfig {
    pub control: ControlConfig,
    pub audit: AuditConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

/// Control-port settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControlConfig {
    /// Ports on 127.0.0.1, visited in order
    pub endpoints: Vec<u16>,

    /// Send/receive timeout applied to every protocol step
    #[serde(with = "humantime_duration")]
    pub socket_timeout: Duration,

    /// Receive cap per reply, in bytes
    pub recv_cap: usize,

    /// Environment variable holding the password
    pub credential_env: String,
}

/// Audit log location and layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    /// Blank lines written after the session-end record
    pub padding_lines: usize,
}

/// Run policy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Exit non-zero when any endpoint failed
    pub strict: bool,

    /// Rotate a second time and compare listings
    pub verify_change: bool,
}

/// Diagnostic logging (stderr), separate from the audit log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.to_vec(),
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            recv_cap: DEFAULT_RECV_CAP,
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            padding_lines: DEFAULT_PADDING_LINES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl FluxConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: FluxConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.control.endpoints.contains(&0) {
            return Err(ConfigError::InvalidPort);
        }
        if self.control.socket_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.control.recv_cap < 2 {
            return Err(ConfigError::InvalidRecvCap(self.control.recv_cap));
        }
        Ok(())
    }

    /// Audit log handle for the configured location
    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(&self.audit.log_dir, &self.audit.log_file)
            .with_padding_lines(self.audit.padding_lines)
    }

    /// Default configuration as commented TOML
    pub fn generate_default_toml() -> String {
        format!(
            r#"# Torflux configuration
#
# Every key is optional; omitted keys keep the values shown here.

[control]
# Control ports on 127.0.0.1, visited in order.
# The first is the target of `--config main`, the second of `--config dns`.
endpoints = [{main}, {dns}]

# Send/receive timeout for each protocol step
socket_timeout = "{timeout}"

# Bytes accepted per reply (one byte is reserved)
recv_cap = {recv_cap}

# Environment variable holding the control-port password
credential_env = "{credential_env}"

[audit]
log_dir = "{log_dir}"
log_file = "{log_file}"

# Blank lines written after the session-end record
padding_lines = {padding_lines}

[refresh]
# Exit 1 when any endpoint fails (default: best effort, exit 0)
strict = false

# Rotate a second time and compare circuit listings
verify_change = false

[logging]
# Diagnostic level on stderr: trace, debug, info, warn, error
level = "{level}"
"#,
            main = DEFAULT_ENDPOINTS[0],
            dns = DEFAULT_ENDPOINTS[1],
            timeout = humantime::format_duration(DEFAULT_SOCKET_TIMEOUT),
            recv_cap = DEFAULT_RECV_CAP,
            credential_env = DEFAULT_CREDENTIAL_ENV,
            log_dir = DEFAULT_LOG_DIR,
            log_file = DEFAULT_LOG_FILE,
            padding_lines = DEFAULT_PADDING_LINES,
            level = DEFAULT_LOG_LEVEL,
        )
    }
}

/// `Duration` as a humantime string ("5s", "1m 30s")
mod humantime_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
