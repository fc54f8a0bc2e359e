//! Session driver
//!
//! One run reads the credential, brackets the work in session-start and
//! session-end audit records, and visits every configured endpoint in order.
//! Endpoint failures are recorded by the rotator and never stop the run; only
//! a missing credential is fatal, and it is detected before any connection is
//! made.
//!
//! Single-instance actions (`hup`, `stop`, `newnym`) target the first or
//! second endpoint and are not bracketed in session records.

use crate::audit::{AppendOptions, AuditLog, TAG};
use crate::config::{FluxConfig, RefreshConfig};
use crate::control::{CircuitRotator, ControlClient, Session, Signal};
use crate::credential::Credential;
use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Which Tor instance a single-instance action is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    /// First configured endpoint (9051 by default)
    Main,
    /// Second configured endpoint (9054 by default)
    Dns,
}

impl Instance {
    pub fn port(&self, endpoints: &[u16]) -> Option<u16> {
        let index = match self {
            Instance::Main => 0,
            Instance::Dns => 1,
        };
        endpoints.get(index).copied()
    }
}

impl FromStr for Instance {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(Instance::Main),
            "dns" => Ok(Instance::Dns),
            _ => Err(ConfigError::InvalidInstance(s.to_string())),
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Main => f.write_str("main"),
            Instance::Dns => f.write_str("dns"),
        }
    }
}

/// What to do to a single instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Launching the router is left to its service manager; always refused
    Start,
    /// `SIGNAL HALT`
    Stop,
    /// `SIGNAL HUP`
    Hup,
    /// Rotate circuits on this instance only
    NewNym,
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "hup" => Ok(Action::Hup),
            "newnym" => Ok(Action::NewNym),
            _ => Err(ConfigError::InvalidAction(s.to_string())),
        }
    }
}

/// What a refresh run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub sessions: Vec<Session>,
    /// Second rotation pass, when change verification is on
    pub verification: Option<Vec<Session>>,
    /// Whether any listing changed between the passes; `None` when nothing
    /// could be compared or verification was off
    pub changed: Option<bool>,
}

impl RefreshReport {
    /// Ports whose visit failed in any pass
    pub fn failed_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .sessions
            .iter()
            .chain(self.verification.iter().flatten())
            .filter(|s| !s.ok)
            .map(|s| s.port)
            .collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    /// Best effort exits 0; strict mode exits 1 if any endpoint failed.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && !self.failed_ports().is_empty() {
            1
        } else {
            0
        }
    }
}

/// Runs rotation sessions against the configured endpoints.
pub struct Driver<R> {
    rotator: R,
    audit: AuditLog,
    endpoints: Vec<u16>,
    credential_env: String,
    refresh: RefreshConfig,
}

impl Driver<ControlClient> {
    /// Driver talking to real control ports
    pub fn from_config(config: &FluxConfig) -> Self {
        Self::new(ControlClient::from_config(config), config)
    }
}

impl<R: CircuitRotator> Driver<R> {
    pub fn new(rotator: R, config: &FluxConfig) -> Self {
        Self {
            rotator,
            audit: config.audit_log(),
            endpoints: config.control.endpoints.clone(),
            credential_env: config.control.credential_env.clone(),
            refresh: config.refresh.clone(),
        }
    }

    pub fn strict(&self) -> bool {
        self.refresh.strict
    }

    /// Read the password, writing the fatal record if it is missing.
    pub fn load_credential(&self) -> Result<Credential, ConfigError> {
        Credential::from_env(&self.credential_env).map_err(|e| {
            self.audit.append(
                &format!(
                    "{TAG} [ERROR] Tor control port password ({}) is not set or empty.",
                    self.credential_env
                ),
                AppendOptions::ECHO,
            );
            e
        })
    }

    /// Rotate circuits on every endpoint.
    pub async fn run(&self) -> Result<RefreshReport, ConfigError> {
        let credential = self.load_credential()?;

        self.audit
            .append(&format!("{TAG} Starting Tor circuit refresh..."), AppendOptions::ECHO);

        let sessions = self.rotate_all(&credential).await;

        let (verification, changed) = if self.refresh.verify_change {
            let second = self.rotate_all(&credential).await;
            let changed = listings_changed(&sessions, &second);
            self.record_change(changed);
            (Some(second), changed)
        } else {
            (None, None)
        };

        self.audit.append(
            &format!("{TAG} Tor circuit refresh completed."),
            AppendOptions::CLOSING,
        );

        let report = RefreshReport {
            sessions,
            verification,
            changed,
        };
        info!(failed = ?report.failed_ports(), "refresh finished");
        Ok(report)
    }

    /// Run an action named on the command line against one instance.
    ///
    /// `action` defaults to `hup`. Unknown names are written to the audit log
    /// and reported as a failed action, after the credential check.
    pub async fn control(&self, instance: &str, action: Option<&str>) -> Result<bool, ConfigError> {
        let credential = self.load_credential()?;

        let instance = match instance.parse::<Instance>() {
            Ok(instance) => instance,
            Err(e) => {
                warn!(error = %e, "rejected control request");
                self.audit.append(
                    &format!("{TAG} [ERROR] Invalid config type. Use 'main' or 'dns'."),
                    AppendOptions::ECHO,
                );
                return Ok(false);
            }
        };

        let action = match action.map(str::parse::<Action>).transpose() {
            Ok(action) => action.unwrap_or(Action::Hup),
            Err(e) => {
                warn!(error = %e, "rejected control request");
                self.audit.append(
                    &format!(
                        "{TAG} [ERROR] Invalid action. Use 'start', 'stop', 'hup', or 'newnym'."
                    ),
                    AppendOptions::ECHO,
                );
                return Ok(false);
            }
        };

        Ok(self.perform(instance, action, &credential).await)
    }

    /// Run `action` against one instance.
    pub async fn act(&self, instance: Instance, action: Action) -> Result<bool, ConfigError> {
        let credential = self.load_credential()?;
        Ok(self.perform(instance, action, &credential).await)
    }

    async fn perform(&self, instance: Instance, action: Action, credential: &Credential) -> bool {
        let Some(port) = instance.port(&self.endpoints) else {
            self.audit.append(
                &format!("{TAG} [ERROR] No control endpoint configured for '{instance}'."),
                AppendOptions::ECHO,
            );
            return false;
        };

        match action {
            Action::Start => {
                self.audit.append(
                    &format!(
                        "{TAG} [ERROR] Starting Tor is not supported; start the '{instance}' instance with its service manager."
                    ),
                    AppendOptions::ECHO,
                );
                false
            }
            Action::Stop => self.rotator.send_signal(port, credential, Signal::Halt).await,
            Action::Hup => self.rotator.send_signal(port, credential, Signal::Hup).await,
            Action::NewNym => self.rotator.rotate(port, credential).await.ok,
        }
    }

    async fn rotate_all(&self, credential: &Credential) -> Vec<Session> {
        let mut sessions = Vec::with_capacity(self.endpoints.len());
        for &port in &self.endpoints {
            sessions.push(self.rotator.rotate(port, credential).await);
        }
        sessions
    }

    fn record_change(&self, changed: Option<bool>) {
        match changed {
            Some(true) => self.audit.append(
                &format!("{TAG} Tor circuits have been successfully refreshed."),
                AppendOptions::CLOSING,
            ),
            Some(false) => self
                .audit
                .append(&format!("{TAG} Tor circuits did not change."), AppendOptions::QUIET),
            None => self.audit.append(
                &format!("{TAG} Circuit change could not be verified."),
                AppendOptions::QUIET,
            ),
        }
    }
}

/// Compare listings port by port, skipping visits that failed in either pass.
fn listings_changed(first: &[Session], second: &[Session]) -> Option<bool> {
    let mut compared = false;
    for (before, after) in first.iter().zip(second) {
        if !(before.ok && after.ok) {
            continue;
        }
        if before.listing != after.listing {
            return Some(true);
        }
        compared = true;
    }
    compared.then_some(false)
}
