//! Error types for the control-port client, audit log and configuration.

use std::io;
use std::path::PathBuf;

/// Protocol step a control-port failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Authenticate,
    Signal,
    CircuitStatus,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Authenticate => "AUTHENTICATE",
            Step::Signal => "SIGNAL",
            Step::CircuitStatus => "GETINFO circuit-status",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result type for control-port operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Control-port client errors
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("connect to 127.0.0.1:{port} failed: {source}")]
    Connect {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("I/O error during {step}: {source}")]
    Io {
        step: Step,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for {step} reply")]
    Timeout { step: Step },

    #[error("connection closed before {step} reply")]
    Closed { step: Step },

    #[error("{step} rejected: {reply}")]
    Rejected { step: Step, reply: String },

    #[error("credential contains bytes that cannot be sent on the control port")]
    InvalidCredential,
}

/// Audit log errors (never fatal to a run)
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("could not create log directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not open log file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write log file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Tor control port password ({var}) is not set or empty")]
    MissingCredential { var: String },

    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("socket_timeout must be greater than zero")]
    ZeroTimeout,

    #[error("at least one control endpoint must be configured")]
    NoEndpoints,

    #[error("control port 0 is not a valid endpoint")]
    InvalidPort,

    #[error("recv_cap must be at least 2 bytes, got {0}")]
    InvalidRecvCap(usize),

    #[error("invalid config type '{0}', expected 'main' or 'dns'")]
    InvalidInstance(String),

    #[error("invalid action '{0}', expected 'start', 'stop', 'hup' or 'newnym'")]
    InvalidAction(String),
}
