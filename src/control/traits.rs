//! Control-port abstractions
//!
//! The driver talks to endpoints only through [`CircuitRotator`], so it can be
//! exercised with [`super::mock::MockRotator`] instead of live sockets.

use super::command::Signal;
use crate::credential::Credential;
use async_trait::async_trait;

/// Outcome of one endpoint visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub port: u16,
    pub ok: bool,
    /// Circuit listing; empty unless every step succeeded
    pub listing: String,
}

impl Session {
    pub fn failed(port: u16) -> Self {
        Self {
            port,
            ok: false,
            listing: String::new(),
        }
    }

    pub fn succeeded(port: u16, listing: String) -> Self {
        Self {
            port,
            ok: true,
            listing,
        }
    }
}

/// Something that can rotate circuits and signal the router on a control
/// endpoint. Implementations write their own per-endpoint audit records and
/// never return errors: failure is reported through the outcome.
#[async_trait]
pub trait CircuitRotator: Send + Sync {
    /// Authenticate, send `SIGNAL NEWNYM`, fetch `circuit-status`.
    async fn rotate(&self, port: u16, credential: &Credential) -> Session;

    /// Authenticate and send `SIGNAL <signal>`, with no listing fetched.
    /// Returns true on success.
    async fn send_signal(&self, port: u16, credential: &Credential, signal: Signal) -> bool;
}
