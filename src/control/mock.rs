//! Mock rotator for driver tests
//!
//! Scripted per-port outcomes, with every call recorded for assertions.

use super::command::Signal;
use super::traits::{CircuitRotator, Session};
use crate::credential::Credential;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A call seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Rotate(u16),
    Signal(u16, Signal),
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    listings: HashMap<u16, VecDeque<Option<String>>>,
    signal_ok: HashMap<u16, bool>,
}

/// Mock control endpoints
#[derive(Clone, Default)]
pub struct MockRotator {
    state: Arc<Mutex<MockState>>,
}

impl MockRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next rotation on `port`. `None` is a failed
    /// visit. A port with nothing queued fails.
    pub fn push_listing(&self, port: u16, listing: Option<&str>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .listings
            .entry(port)
            .or_default()
            .push_back(listing.map(str::to_string));
        self
    }

    /// Outcome of every signal sent to `port`. Unset ports fail.
    pub fn set_signal_ok(&self, port: u16, ok: bool) -> &Self {
        self.state.lock().unwrap().signal_ok.insert(port, ok);
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl CircuitRotator for MockRotator {
    async fn rotate(&self, port: u16, _credential: &Credential) -> Session {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Rotate(port));
        let next = state
            .listings
            .get_mut(&port)
            .and_then(VecDeque::pop_front)
            .flatten();
        match next {
            Some(listing) => Session::succeeded(port, listing),
            None => Session::failed(port),
        }
    }

    async fn send_signal(&self, port: u16, _credential: &Credential, signal: Signal) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Signal(port, signal));
        state.signal_ok.get(&port).copied().unwrap_or(false)
    }
}
