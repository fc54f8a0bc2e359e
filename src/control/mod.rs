//! Tor control-port access
//!
//! Line-oriented protocol over loopback TCP: password authentication,
//! `SIGNAL NEWNYM`/`SIGNAL HUP`, and `GETINFO circuit-status`.

pub mod client;
pub mod command;
pub mod mock;
pub mod reply;
pub mod traits;

pub use client::ControlClient;
pub use command::Signal;
pub use mock::{MockCall, MockRotator};
pub use reply::{Reply, ReplyFramer};
pub use traits::{CircuitRotator, Session};
