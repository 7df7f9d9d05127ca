//! The `Log` collaborator: durable append-only storage for recorded messages.
//!
//! The distilled spec treats this purely as an external interface
//! (`Open`/`InsertMessage`). SPEC_FULL.md §4.F supplements it with a concrete
//! [`FileLog`] so the crate is runnable without a separate storage backend;
//! the recorder itself only ever depends on the [`Log`] trait.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::OpenMode;

/// Durable append-only message store, consumed by [`crate::recorder::Recorder`].
///
/// `insert_message` mirrors the external contract's bool-returning, non-
/// throwing shape: failures are logged by the caller and swallowed, not
/// propagated as a `Result`.
pub trait Log: Send {
    /// Open (or create) the log at `path` in the given mode.
    fn open(&mut self, path: &Path, mode: OpenMode) -> bool;

    /// Append one message. Returns `false` on any I/O failure.
    fn insert_message(&mut self, ts_utc_ns: i64, topic: &str, type_name: &str, bytes: &[u8]) -> bool;
}

/// A factory that produces a fresh, unopened [`Log`] instance.
///
/// The recorder instantiates a new log object on every `start()` call (per
/// SPEC_FULL.md §4.G) rather than reusing a single long-lived one, so a
/// factory closure is threaded through instead of a bare trait object.
pub type LogFactory = std::sync::Arc<dyn Fn() -> Box<dyn Log> + Send + Sync>;

/// Append-only binary log backed by a single file.
///
/// Record format: `i64 ts_utc_ns`, then the same `u64`-length-prefixed
/// idiom used by the wire codec for `topic`, `type_name`, and `bytes`, in
/// that order. This format is explicitly not a stability contract — see
/// SPEC_FULL.md §4.F.
pub struct FileLog {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl Default for FileLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLog {
    pub fn new() -> Self {
        Self {
            writer: None,
            path: None,
        }
    }

    fn write_record(writer: &mut BufWriter<File>, ts_utc_ns: i64, topic: &str, type_name: &str, bytes: &[u8]) -> io::Result<()> {
        writer.write_all(&ts_utc_ns.to_ne_bytes())?;
        for field in [topic.as_bytes(), type_name.as_bytes(), bytes] {
            writer.write_all(&(field.len() as u64).to_ne_bytes())?;
            writer.write_all(field)?;
        }
        writer.flush()
    }
}

impl Log for FileLog {
    fn open(&mut self, path: &Path, mode: OpenMode) -> bool {
        let OpenMode::Write = mode;
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                self.writer = Some(BufWriter::new(file));
                self.path = Some(path.to_path_buf());
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open log file");
                false
            }
        }
    }

    fn insert_message(&mut self, ts_utc_ns: i64, topic: &str, type_name: &str, bytes: &[u8]) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            return false;
        };
        match Self::write_record(writer, ts_utc_ns, topic, type_name, bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "failed to append log record");
                false
            }
        }
    }
}

/// Read back records written by [`FileLog`]. Exercised only by this module's
/// own tests — the recorder itself is always tested against a fake `Log`.
/// Not a stability contract: the on-disk format may change freely.
#[cfg(test)]
pub(crate) fn read_records(path: &Path) -> io::Result<Vec<(i64, String, String, Vec<u8>)>> {
    use std::io::Read;

    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;

    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        let ts = i64::from_ne_bytes(buf[offset..offset + 8].try_into().unwrap());
        offset += 8;

        let mut fields: Vec<Vec<u8>> = Vec::with_capacity(3);
        for _ in 0..3 {
            let len = u64::from_ne_bytes(buf[offset..offset + 8].try_into().unwrap()) as usize;
            offset += 8;
            fields.push(buf[offset..offset + len].to_vec());
            offset += len;
        }

        records.push((
            ts,
            String::from_utf8(fields[0].clone()).unwrap(),
            String::from_utf8(fields[1].clone()).unwrap(),
            fields[2].clone(),
        ));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_file_and_writes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");

        let mut log = FileLog::new();
        assert!(log.open(&path, OpenMode::Write));
        assert!(log.insert_message(42, "sensor/imu", "bytes", b"hello"));
        assert!(log.insert_message(43, "sensor/imu", "bytes", b"world"));

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (42, "sensor/imu".to_string(), "bytes".to_string(), b"hello".to_vec()));
        assert_eq!(records[1], (43, "sensor/imu".to_string(), "bytes".to_string(), b"world".to_vec()));
    }

    #[test]
    fn insert_before_open_fails() {
        let mut log = FileLog::new();
        assert!(!log.insert_message(0, "t", "t", b""));
    }

    #[test]
    fn open_fails_on_unwritable_path() {
        let mut log = FileLog::new();
        assert!(!log.open(Path::new("/nonexistent-dir-for-sure/out.log"), OpenMode::Write));
    }
}
