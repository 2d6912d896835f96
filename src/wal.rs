use crate::events::DomainEvent;
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

/// Errors from the durability log.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt log record at line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },
}

pub type WalResult<T> = Result<T, WalError>;

/// Append-only durability log: one JSON-serialized [`DomainEvent`] per line.
///
/// `append` is the durability commit point for live processing — it writes,
/// flushes and syncs before returning, so a successful return means the event
/// survives a crash. At startup the log is read in full and replayed through
/// the engine to reconstruct book state; a log file that does not exist yet is
/// an empty log, not an error.
pub struct EventLog {
    path: PathBuf,
    file: File,
    len: usize,
}

impl EventLog {
    /// Open (or create) the log at `path`, positioned for appending.
    pub fn open(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        // Seed the record count; contents are validated by `replay`.
        let len = BufReader::new(File::open(&path)?).lines().count();
        info!(path = %path.display(), records = len, "opened event log");
        Ok(Self { path, file, len })
    }

    /// Durably record one event, in strict arrival order. Synchronous: the
    /// write has reached storage when this returns `Ok`.
    pub fn append(&mut self, event: &DomainEvent) -> WalResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.len += 1;
        Ok(())
    }

    /// Every previously appended event, in original append order.
    ///
    /// A record that fails to parse is a hard error: silently skipping it
    /// would desynchronize the rebuilt book from the attested log.
    pub fn replay(&self) -> WalResult<Vec<DomainEvent>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut events = Vec::with_capacity(self.len);
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let event =
                serde_json::from_str(&line).map_err(|source| WalError::Corrupt {
                    line: i + 1,
                    source,
                })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Records appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
