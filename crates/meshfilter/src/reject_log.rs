//! JSON-lines file sink for rejected messages.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use meshfilter_core::{RejectRecord, RejectSink};

use crate::error::RelayError;

/// Appends one JSON object per line for every rejected message.
#[derive(Debug)]
pub struct JsonLinesRejectLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesRejectLog {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: &Path) -> Result<Self, RelayError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| RelayError::RejectLog {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "logging rejected messages");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &RejectRecord) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl RejectSink for JsonLinesRejectLog {
    fn record(&self, record: &RejectRecord) {
        if let Err(e) = self.append(record) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to write reject log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshfilter_core::RejectReason;

    fn record(packet_id: u32, reason: RejectReason) -> RejectRecord {
        RejectRecord {
            timestamp: 1_700_000_000_000,
            reason,
            from: "!12345678".into(),
            to: "!ffffffff".into(),
            packet_id,
            topic: "msh/US/2/e/LongFast/!12345678".into(),
            channel: "LongFast".into(),
            gateway: "!87654321".into(),
            port: None,
            payload: None,
            bitfield: None,
        }
    }

    #[test]
    fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.jsonl");

        let log = JsonLinesRejectLog::open(&path).unwrap();
        log.record(&record(1, RejectReason::Encrypted));
        log.record(&record(2, RejectReason::NoBitfield));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: RejectRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.packet_id, 2);
        assert_eq!(second.reason, RejectReason::NoBitfield);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.jsonl");

        JsonLinesRejectLog::open(&path)
            .unwrap()
            .record(&record(1, RejectReason::Encrypted));
        JsonLinesRejectLog::open(&path)
            .unwrap()
            .record(&record(2, RejectReason::Encrypted));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesRejectLog::open(&dir.path().join("missing/rejected.jsonl")).unwrap_err();
        assert!(matches!(err, RelayError::RejectLog { .. }));
    }
}
