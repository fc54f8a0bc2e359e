// Fake Tor control endpoint for integration tests.
//
// Binds 127.0.0.1:0, serves connections one at a time, records every command
// line it receives, and answers according to a fixed behaviour.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use torflux::FluxConfig;

pub const LISTING: &str = "250+circuit-status=\r\n\
    1 BUILT $AAAA~relay1,$BBBB~relay2,$CCCC~relay3 PURPOSE=GENERAL\r\n\
    .\r\n\
    250 OK\r\n";

#[derive(Debug, Clone)]
pub enum Behavior {
    /// 250 to everything, `listing` for GETINFO
    Healthy { listing: String },
    /// 515 to AUTHENTICATE
    RejectAuth,
    /// 250 to AUTHENTICATE, 552 to SIGNAL
    RejectSignal,
    /// Accept and read, never write
    Stall,
    /// 250 to AUTHENTICATE and SIGNAL, then hang up on GETINFO without a reply
    CloseOnGetinfo,
    /// Answer the first command with one byte every `interval`, never a full line
    Trickle { interval: Duration },
}

impl Behavior {
    pub fn healthy() -> Self {
        Behavior::Healthy {
            listing: LISTING.to_string(),
        }
    }
}

#[derive(Default)]
struct Shared {
    commands: Mutex<Vec<String>>,
    accepted: AtomicUsize,
    closed: AtomicUsize,
}

pub struct FakeControlPort {
    port: u16,
    shared: Arc<Shared>,
}

impl FakeControlPort {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());

        let server_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                server_shared.accepted.fetch_add(1, Ordering::SeqCst);
                serve(stream, &behavior, &server_shared).await;
                server_shared.closed.fetch_add(1, Ordering::SeqCst);
            }
        });

        Self { port, shared }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Command lines received so far, without CRLF
    pub fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().unwrap().clone()
    }

    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Wait until every accepted connection has been closed by the client.
    pub async fn wait_all_closed(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let accepted = self.shared.accepted.load(Ordering::SeqCst);
            if self.shared.closed.load(Ordering::SeqCst) == accepted {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(stream: TcpStream, behavior: &Behavior, shared: &Shared) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match lines.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end_matches(['\r', '\n']).to_string();
        shared.commands.lock().unwrap().push(command.clone());

        let reply = match behavior {
            Behavior::Stall => continue,
            Behavior::CloseOnGetinfo if command.starts_with("GETINFO") => return,
            Behavior::Trickle { interval } => {
                while write_half.write_all(b"x").await.is_ok() {
                    tokio::time::sleep(*interval).await;
                }
                return;
            }
            Behavior::RejectAuth if command.starts_with("AUTHENTICATE") => {
                "515 Authentication failed\r\n".to_string()
            }
            Behavior::RejectSignal if command.starts_with("SIGNAL") => {
                "552 Unrecognized signal\r\n".to_string()
            }
            Behavior::Healthy { listing } if command == "GETINFO circuit-status" => listing.clone(),
            _ => "250 OK\r\n".to_string(),
        };

        if write_half.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// A loopback port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config pointing at `ports`, logging under `log_dir`, password in `credential_env`
pub fn test_config(ports: &[u16], log_dir: &Path, credential_env: &str) -> FluxConfig {
    let mut config = FluxConfig::default();
    config.control.endpoints = ports.to_vec();
    config.control.credential_env = credential_env.to_string();
    config.control.socket_timeout = Duration::from_secs(2);
    config.audit.log_dir = log_dir.to_path_buf();
    config
}

pub fn read_log(config: &FluxConfig) -> String {
    std::fs::read_to_string(config.audit_log().path()).unwrap_or_default()
}
