//! Reply framing for the control protocol
//!
//! A reply is a run of lines `NNN-text` (mid), `NNN+key=` followed by a data
//! block ending in a lone `.` line, and exactly one final line `NNN text`.
//! [`ReplyFramer`] tracks that grammar byte by byte so a reply is recognised as
//! complete no matter how the stream is chunked, and data-block lines that
//! happen to look like status lines (`123 BUILT ...`) do not end it early.
//!
//! [`read_reply`] stops at the first of: the final line, EOF, the receive cap
//! or the reply deadline. The deadline covers the whole reply, so a peer
//! trickling bytes cannot hold a step open past one timeout. Anything received
//! before EOF or the deadline is still returned; only an empty read is an
//! error.

use crate::error::{ControlError, ControlResult, Step};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};

const READ_CHUNK: usize = 4096;

/// Incremental recogniser for the end of one reply.
#[derive(Debug, Default, Clone)]
pub struct ReplyFramer {
    head: [u8; 4],
    line_len: usize,
    in_data: bool,
    complete: bool,
}

impl ReplyFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes. Returns the offset just past the final line once
    /// the reply is complete; bytes after it do not belong to this reply.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<usize> {
        if self.complete {
            return Some(0);
        }
        for (i, &b) in chunk.iter().enumerate() {
            if b == b'\n' {
                self.end_line();
                if self.complete {
                    return Some(i + 1);
                }
                continue;
            }
            if self.line_len < self.head.len() {
                self.head[self.line_len] = b;
            }
            self.line_len += 1;
        }
        None
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn end_line(&mut self) {
        let head = &self.head[..self.line_len.min(self.head.len())];

        if self.in_data {
            if head == b"." || head == b".\r" {
                self.in_data = false;
            }
        } else if head.len() == 4 && head[..3].iter().all(u8::is_ascii_digit) {
            match head[3] {
                b' ' => self.complete = true,
                b'+' => self.in_data = true,
                _ => {}
            }
        }

        self.line_len = 0;
    }
}

/// One reply as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    bytes: Vec<u8>,
    /// The final status line was seen
    pub complete: bool,
    /// Reading stopped at the receive cap
    pub truncated: bool,
}

impl Reply {
    pub fn new(bytes: Vec<u8>, complete: bool, truncated: bool) -> Self {
        Self {
            bytes,
            complete,
            truncated,
        }
    }

    /// Lenient success check: the reply mentions status 250 anywhere.
    pub fn is_success(&self) -> bool {
        self.bytes.windows(3).any(|w| w == b"250")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// First line without its terminator, for error messages
    pub fn status_line(&self) -> String {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

/// Read one reply from `reader`.
///
/// The whole reply must arrive within `read_timeout`. At most `recv_cap - 1`
/// bytes are kept; hitting the cap returns a truncated reply.
pub async fn read_reply<R>(
    reader: &mut R,
    step: Step,
    read_timeout: Duration,
    recv_cap: usize,
) -> ControlResult<Reply>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + read_timeout;
    let limit = recv_cap.saturating_sub(1);
    let mut framer = ReplyFramer::new();
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; limit.clamp(1, READ_CHUNK)];

    loop {
        let room = limit - bytes.len();
        if room == 0 {
            return Ok(Reply::new(bytes, false, true));
        }
        let want = room.min(chunk.len());

        let n = match timeout_at(deadline, reader.read(&mut chunk[..want])).await {
            Err(_) if bytes.is_empty() => return Err(ControlError::Timeout { step }),
            Ok(Ok(0)) if bytes.is_empty() => return Err(ControlError::Closed { step }),
            Ok(Err(source)) if bytes.is_empty() => return Err(ControlError::Io { step, source }),
            Err(_) | Ok(Ok(0)) | Ok(Err(_)) => return Ok(Reply::new(bytes, false, false)),
            Ok(Ok(n)) => n,
        };

        let received = &chunk[..n];
        if let Some(end) = framer.feed(received) {
            bytes.extend_from_slice(&received[..end]);
            return Ok(Reply::new(bytes, true, false));
        }
        bytes.extend_from_slice(received);
    }
}
