//! Control-port command encoding
//!
//! Commands are single CRLF-terminated lines. The password travels as a
//! QuotedString, so `"` and `\` are backslash-escaped on write. CR, LF and NUL
//! have no representation inside a quoted string and are refused.

use crate::credential::Credential;
use crate::error::{ControlError, ControlResult};
use zeroize::Zeroizing;

/// Signals this utility sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Switch to clean circuits for new streams
    NewNym,
    /// Reload the torrc
    Hup,
    /// Shut the router down immediately
    Halt,
}

impl Signal {
    pub fn keyword(&self) -> &'static str {
        match self {
            Signal::NewNym => "NEWNYM",
            Signal::Hup => "HUP",
            Signal::Halt => "HALT",
        }
    }
}

/// Wire form of `AUTHENTICATE "<password>"`. Wiped on drop.
pub fn authenticate(credential: &Credential) -> ControlResult<Zeroizing<Vec<u8>>> {
    let quoted = quote(credential.expose())?;
    let mut line = Zeroizing::new(Vec::with_capacity(quoted.len() + 16));
    line.extend_from_slice(b"AUTHENTICATE ");
    line.extend_from_slice(quoted.as_bytes());
    line.extend_from_slice(b"\r\n");
    Ok(line)
}

/// Wire form of `SIGNAL <keyword>`
pub fn signal(signal: Signal) -> Vec<u8> {
    format!("SIGNAL {}\r\n", signal.keyword()).into_bytes()
}

/// Wire form of `GETINFO <key>`
pub fn getinfo(key: &str) -> Vec<u8> {
    format!("GETINFO {key}\r\n").into_bytes()
}

/// Render `value` as a control-protocol QuotedString.
pub fn quote(value: &str) -> ControlResult<Zeroizing<String>> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(ControlError::InvalidCredential);
    }

    let mut out = Zeroizing::new(String::with_capacity(value.len() + 2));
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}
