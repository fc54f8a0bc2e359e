//! Torflux - Tor circuit rotation over the local control ports
//!
//! Connects to each configured Tor control endpoint on 127.0.0.1,
//! authenticates with a password, sends `SIGNAL NEWNYM`, and records the
//! resulting `circuit-status` listing in an append-only audit log.
//!
//! - [`control`]: control-port protocol client
//! - [`audit`]: timestamped audit log sink
//! - [`driver`]: one refresh run across all endpoints
//! - [`config`]: configuration record and TOML loading

pub mod audit;
pub mod clock;
pub mod config;
pub mod control;
pub mod credential;
pub mod driver;
pub mod error;

pub use audit::{AppendOptions, AuditLog};
pub use config::FluxConfig;
pub use control::{CircuitRotator, ControlClient, Session};
pub use credential::Credential;
pub use driver::{Action, Driver, Instance, RefreshReport};
pub use error::{AuditError, ConfigError, ControlError};
