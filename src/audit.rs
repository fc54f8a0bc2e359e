//! Append-only audit log
//!
//! Every record is a single line `[YYYY-MM-DD HH:MM:SS] <message>` appended to
//! `<log_dir>/<log_file>`. The file is opened, written with one `write_all` and
//! closed again for each record, so no descriptor outlives a call and external
//! writers to the same path interleave whole records.
//!
//! Failing to write the log never aborts a run: the error is reported on
//! stderr and the console echo (if requested) has already happened. A failed
//! echo, such as a closed stdout pipe, is traced and the record still goes to
//! the file.

use crate::clock;
use crate::error::AuditError;
use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Tag carried by every record this utility writes.
pub const TAG: &str = "[TOR-FLUX]";

/// Default number of blank lines written after a padded record.
pub const DEFAULT_PADDING_LINES: usize = 5;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Per-record switches for [`AuditLog::append`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Follow the record with blank lines to separate sessions
    pub pad: bool,
    /// Mirror the record on stdout
    pub echo: bool,
}

impl AppendOptions {
    /// File only.
    pub const QUIET: Self = Self {
        pad: false,
        echo: false,
    };

    /// File and stdout.
    pub const ECHO: Self = Self {
        pad: false,
        echo: true,
    };

    /// File and stdout, followed by session padding.
    pub const CLOSING: Self = Self {
        pad: true,
        echo: true,
    };
}

/// Handle to the audit log file. Cheap to clone; holds only paths.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
    path: PathBuf,
    padding_lines: usize,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl AsRef<Path>) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self {
            dir,
            path,
            padding_lines: DEFAULT_PADDING_LINES,
        }
    }

    pub fn with_padding_lines(mut self, padding_lines: usize) -> Self {
        self.padding_lines = padding_lines;
        self
    }

    /// Full path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped record.
    ///
    /// Errors are reported on stderr and swallowed.
    pub fn append(&self, message: &str, options: AppendOptions) {
        let record = format!("[{}] {}", clock::timestamp(), message);

        if options.echo {
            if let Err(e) = echo(&record) {
                warn!(error = %e, "console echo failed");
            }
        }

        if let Err(e) = self.write_record(&record, options.pad) {
            warn!(error = %e, "audit record dropped");
            let _ = writeln!(io::stderr().lock(), "[ERROR] {e}");
        }
    }

    /// Write an already formatted record, creating the log directory if needed.
    pub fn write_record(&self, record: &str, pad: bool) -> Result<(), AuditError> {
        DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&self.dir)
            .map_err(|source| AuditError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(FILE_MODE)
            .open(&self.path)
            .map_err(|source| AuditError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut buf = String::with_capacity(record.len() + 1 + self.padding_lines);
        buf.push_str(record);
        buf.push('\n');
        if pad {
            buf.push_str(&"\n".repeat(self.padding_lines));
        }

        file.write_all(buf.as_bytes())
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Mirror a record on stdout. A closed stdout is an error, not a panic.
fn echo(record: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{record}")?;
    stdout.flush()
}
