//! Control-port client
//!
//! One endpoint visit is a short, strictly ordered exchange on a fresh
//! loopback connection:
//!
//! ```text
//!   connect -> AUTHENTICATE -> SIGNAL NEWNYM -> GETINFO circuit-status -> close
//! ```
//!
//! Every write and every read is bounded by the configured socket timeout.
//! Any step that fails ends the visit; the socket is shut down and dropped on
//! every path out of [`ControlClient::rotate`] and
//! [`ControlClient::send_signal`].

use super::command::{self, Signal};
use super::reply::{read_reply, Reply};
use super::traits::{CircuitRotator, Session};
use crate::audit::{AppendOptions, AuditLog, TAG};
use crate::config::{FluxConfig, CONTROL_HOST, DEFAULT_RECV_CAP, DEFAULT_SOCKET_TIMEOUT};
use crate::credential::Credential;
use crate::error::{ControlError, ControlResult, Step};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

const CIRCUIT_STATUS_KEY: &str = "circuit-status";

/// Client for the loopback control endpoints.
#[derive(Debug, Clone)]
pub struct ControlClient {
    audit: AuditLog,
    socket_timeout: Duration,
    recv_cap: usize,
}

impl ControlClient {
    pub fn new(audit: AuditLog) -> Self {
        Self {
            audit,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            recv_cap: DEFAULT_RECV_CAP,
        }
    }

    pub fn from_config(config: &FluxConfig) -> Self {
        Self::new(config.audit_log())
            .with_socket_timeout(config.control.socket_timeout)
            .with_recv_cap(config.control.recv_cap)
    }

    pub fn with_socket_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = socket_timeout;
        self
    }

    pub fn with_recv_cap(mut self, recv_cap: usize) -> Self {
        self.recv_cap = recv_cap;
        self
    }

    /// Rotate circuits on `127.0.0.1:<port>` and fetch the circuit listing.
    pub async fn rotate(&self, port: u16, credential: &Credential) -> Session {
        self.record(&format!(
            "{TAG} Sending {} signal to control port {port}...",
            Signal::NewNym.keyword()
        ));

        let mut stream = match self.connect(port).await {
            Ok(stream) => stream,
            Err(e) => {
                self.record_failure(port, Signal::NewNym, &e);
                return Session::failed(port);
            }
        };

        let result = self.rotate_on(&mut stream, credential).await;
        close(stream).await;

        match result {
            Ok(listing) => {
                self.record(&format!(
                    "{TAG} Current Circuit Status (control port {port}):"
                ));
                self.record(&listing_body(listing.as_bytes()));
                self.record(&format!(
                    "{TAG} New Tor Circuits Requested Successfully on control port {port}."
                ));
                Session::succeeded(port, listing.text())
            }
            Err(e) => {
                self.record_failure(port, Signal::NewNym, &e);
                Session::failed(port)
            }
        }
    }

    /// Send a bare signal to the instance on `127.0.0.1:<port>`: `HUP` to
    /// reload its configuration, `HALT` to stop it.
    pub async fn send_signal(&self, port: u16, credential: &Credential, signal: Signal) -> bool {
        let mut stream = match self.connect(port).await {
            Ok(stream) => stream,
            Err(e) => {
                self.record_failure(port, signal, &e);
                return false;
            }
        };

        let result = match self.authenticate(&mut stream, credential).await {
            Ok(()) => self.signal(&mut stream, signal).await,
            Err(e) => Err(e),
        };
        close(stream).await;

        match result {
            Ok(()) => {
                self.audit
                    .append(&signal_sent_message(port, signal), AppendOptions::ECHO);
                true
            }
            Err(e) => {
                self.record_failure(port, signal, &e);
                false
            }
        }
    }

    async fn rotate_on(&self, stream: &mut TcpStream, credential: &Credential) -> ControlResult<Reply> {
        self.authenticate(stream, credential).await?;
        self.signal(stream, Signal::NewNym).await?;

        let listing = self
            .exchange(stream, Step::CircuitStatus, &command::getinfo(CIRCUIT_STATUS_KEY))
            .await?;
        if listing.truncated {
            debug!(bytes = listing.len(), "circuit listing truncated at receive cap");
        }
        Ok(listing)
    }

    async fn connect(&self, port: u16) -> ControlResult<TcpStream> {
        let addr = SocketAddr::from((CONTROL_HOST, port));
        debug!(%addr, "connecting to control port");
        TcpStream::connect(addr)
            .await
            .map_err(|source| ControlError::Connect { port, source })
    }

    async fn authenticate(&self, stream: &mut TcpStream, credential: &Credential) -> ControlResult<()> {
        let line = command::authenticate(credential)?;
        let reply = self.exchange(stream, Step::Authenticate, &line).await?;
        expect_success(Step::Authenticate, reply)
    }

    async fn signal(&self, stream: &mut TcpStream, signal: Signal) -> ControlResult<()> {
        let reply = self
            .exchange(stream, Step::Signal, &command::signal(signal))
            .await?;
        expect_success(Step::Signal, reply)
    }

    /// Send one command line and read its reply.
    async fn exchange(&self, stream: &mut TcpStream, step: Step, line: &[u8]) -> ControlResult<Reply> {
        match timeout(self.socket_timeout, stream.write_all(line)).await {
            Err(_) => return Err(ControlError::Timeout { step }),
            Ok(Err(source)) => return Err(ControlError::Io { step, source }),
            Ok(Ok(())) => {}
        }
        debug!(%step, "command sent");

        let reply = read_reply(stream, step, self.socket_timeout, self.recv_cap).await?;
        debug!(%step, bytes = reply.len(), complete = reply.complete, "reply received");
        Ok(reply)
    }

    fn record(&self, message: &str) {
        self.audit.append(message, AppendOptions::QUIET);
    }

    fn record_failure(&self, port: u16, signal: Signal, err: &ControlError) {
        warn!(port, error = %err, "control port visit failed");
        self.record(&failure_message(port, signal, err));
    }
}

#[async_trait]
impl CircuitRotator for ControlClient {
    async fn rotate(&self, port: u16, credential: &Credential) -> Session {
        ControlClient::rotate(self, port, credential).await
    }

    async fn send_signal(&self, port: u16, credential: &Credential, signal: Signal) -> bool {
        ControlClient::send_signal(self, port, credential, signal).await
    }
}

fn expect_success(step: Step, reply: Reply) -> ControlResult<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(ControlError::Rejected {
            step,
            reply: reply.status_line(),
        })
    }
}

async fn close(mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown of control connection failed");
    }
}

fn signal_sent_message(port: u16, signal: Signal) -> String {
    match signal {
        Signal::Halt => format!("{TAG} Tor process on control port {port} stopped successfully"),
        _ => format!(
            "{TAG} {} signal sent successfully to control port {port}",
            signal.keyword()
        ),
    }
}

/// Audit wording for a failed visit, chosen by the step that failed.
fn failure_message(port: u16, signal: Signal, err: &ControlError) -> String {
    let what = match err {
        ControlError::Connect { source, .. } => {
            return format!("{TAG} [ERROR] Connection to Tor control port {port} failed: {source}");
        }
        ControlError::InvalidCredential => "Tor authentication failed",
        ControlError::Io { step, .. }
        | ControlError::Timeout { step }
        | ControlError::Closed { step }
        | ControlError::Rejected { step, .. } => match step {
            Step::Authenticate => "Tor authentication failed",
            Step::Signal => {
                return format!(
                    "{TAG} [ERROR] Failed to send {} signal to control port {port}: {err}",
                    signal.keyword()
                );
            }
            Step::CircuitStatus => "Failed to read circuit status",
        },
    };
    format!("{TAG} [ERROR] {what} on control port {port}: {err}")
}

/// Listing as one audit record: lossy UTF-8, LF line endings, no trailing
/// line break.
fn listing_body(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw).replace('\r', "");
    text.trim_end_matches('\n').to_string()
}
