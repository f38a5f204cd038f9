//! Committer
//!
//! Registry of output tables and the raw log. Files are opened lazily on
//! the first write, in append mode, and stay open until [`Committer::close`].
//!
//! # Header invariant
//!
//! A table's header row is written if and only if the file's append
//! position is zero when it is first opened in this process. Restarting
//! against an existing file therefore never duplicates the header and
//! never truncates earlier rows.
//!
//! # Durability
//!
//! Every row and every raw line is flushed before the call returns.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::layout::OutputLayout;
use crate::domain::tables::marshal_receipt_time;

/// Extension of table files.
const TABLE_EXTENSION: &str = "csv";

/// Name and extension of the raw log.
const RAW_NAME: &str = "raw";
const RAW_EXTENSION: &str = "json";

// =============================================================================
// Error Type
// =============================================================================

/// Errors raised while persisting. All of them are fatal for the recorder.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// Output directory could not be created.
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDirectory {
        /// Directory path.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// Output file could not be opened.
    #[error("cannot open output file {}: {source}", path.display())]
    Open {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// Append position of an opened file could not be read.
    #[error("cannot read write position of {}: {source}", path.display())]
    Position {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// A table row could not be written or flushed.
    #[error("cannot write row to {}: {source}", path.display())]
    WriteRow {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        source: csv::Error,
    },

    /// Raw payload or a flush could not be written.
    #[error("cannot write to {}: {source}", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// Commit targeted a table that was never registered.
    #[error("table {0} is not registered")]
    UnknownTable(String),

    /// Commit after [`Committer::close`].
    #[error("committer is closed")]
    Closed,
}

// =============================================================================
// Capture Mode
// =============================================================================

/// What the committer persists, which also decides the status format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Decoded rows into per-category tables.
    #[default]
    Tables,
    /// Exact inbound payloads into the raw log.
    Raw,
}

// =============================================================================
// Tables
// =============================================================================

/// An open table file.
struct TableWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

/// A registered table.
struct Table {
    header: Vec<String>,
    writer: Option<TableWriter>,
    rows: u64,
}

/// The shared raw log.
struct RawLog {
    path: PathBuf,
    file: File,
}

// =============================================================================
// Committer
// =============================================================================

/// Owns every output file handle of the process.
pub struct Committer {
    layout: OutputLayout,
    mode: CaptureMode,
    tables: BTreeMap<String, Table>,
    raw: Option<RawLog>,
    raw_count: u64,
    raw_offset: u64,
    closed: bool,
}

impl Committer {
    /// Create a committer writing into `layout`.
    #[must_use]
    pub const fn new(layout: OutputLayout, mode: CaptureMode) -> Self {
        Self {
            layout,
            mode,
            tables: BTreeMap::new(),
            raw: None,
            raw_count: 0,
            raw_offset: 0,
            closed: false,
        }
    }

    /// Output layout.
    #[must_use]
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Register a table and its header. Call once per table before writing.
    pub fn register_table<S: AsRef<str>>(&mut self, name: &str, header: &[S]) {
        self.tables.insert(
            name.to_string(),
            Table {
                header: header.iter().map(|h| h.as_ref().to_string()).collect(),
                writer: None,
                rows: 0,
            },
        );
    }

    /// Append one row to `table`, opening its file on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is unknown, the committer is closed, or
    /// the file cannot be opened, written or flushed.
    pub fn commit_record<S: AsRef<[u8]>>(
        &mut self,
        table: &str,
        fields: &[S],
    ) -> Result<(), CommitError> {
        if self.closed {
            return Err(CommitError::Closed);
        }

        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| CommitError::UnknownTable(table.to_string()))?;

        if entry.writer.is_none() {
            let path = self.layout.file_path(table, TABLE_EXTENSION);
            entry.writer = Some(open_table(path, &entry.header)?);
        }

        let Some(open) = entry.writer.as_mut() else {
            return Err(CommitError::UnknownTable(table.to_string()));
        };

        open.writer
            .write_record(fields)
            .and_then(|()| open.writer.flush().map_err(csv::Error::from))
            .map_err(|source| CommitError::WriteRow {
                path: open.path.clone(),
                source,
            })?;

        entry.rows += 1;
        Ok(())
    }

    /// Append one raw line: receipt timestamp, a space, the payload, `\n`.
    ///
    /// # Errors
    ///
    /// Returns an error if the committer is closed or the raw log cannot be
    /// opened or written.
    pub fn commit_raw(
        &mut self,
        received_at: &DateTime<Local>,
        payload: &[u8],
    ) -> Result<(), CommitError> {
        if self.closed {
            return Err(CommitError::Closed);
        }

        if self.raw.is_none() {
            let (raw, offset) = self.open_raw()?;
            self.raw = Some(raw);
            self.raw_offset = offset;
        }
        let Some(raw) = self.raw.as_mut() else {
            return Err(CommitError::Closed);
        };

        let mut line = marshal_receipt_time(received_at).into_bytes();
        line.reserve(payload.len() + 2);
        line.push(b' ');
        line.extend_from_slice(payload);
        line.push(b'\n');

        raw.file
            .write_all(&line)
            .and_then(|()| raw.file.flush())
            .map_err(|source| CommitError::Write {
                path: raw.path.clone(),
                source,
            })?;

        self.raw_offset += line.len() as u64;
        self.raw_count += 1;
        Ok(())
    }

    /// Rows written to `table` by this process.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.tables.get(table).map(|t| t.rows)
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// One-line summary of the counters.
    ///
    /// Raw mode: `raw_count=<n> raw_offset=<bytes>`. Table mode:
    /// `<table>=<count> ` for every registered table, ascending by name.
    #[must_use]
    pub fn status(&self) -> String {
        match self.mode {
            CaptureMode::Raw => {
                format!("raw_count={} raw_offset={}", self.raw_count, self.raw_offset)
            }
            CaptureMode::Tables => {
                let mut out = String::new();
                for (name, table) in &self.tables {
                    let _ = write!(out, "{name}={} ", table.rows);
                }
                out
            }
        }
    }

    /// Flush and release every open handle. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure; every handle is released regardless.
    pub fn close(&mut self) -> Result<(), CommitError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;

        if let Some(mut raw) = self.raw.take() {
            if let Err(source) = raw.file.flush() {
                first_error.get_or_insert(CommitError::Write {
                    path: raw.path.clone(),
                    source,
                });
            }
            tracing::debug!(path = %raw.path.display(), "Closed raw log");
        }

        for (name, table) in &mut self.tables {
            if let Some(mut open) = table.writer.take() {
                if let Err(source) = open.writer.flush() {
                    first_error.get_or_insert(CommitError::Write {
                        path: open.path.clone(),
                        source,
                    });
                }
                tracing::debug!(table = %name, rows = table.rows, "Closed table");
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn open_raw(&self) -> Result<(RawLog, u64), CommitError> {
        let path = self.layout.file_path(RAW_NAME, RAW_EXTENSION);
        tracing::info!(path = %path.display(), "Opening raw log");

        let mut file = open_append(&path)?;
        let offset = append_position(&mut file, &path)?;

        Ok((RawLog { path, file }, offset))
    }
}

impl Drop for Committer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "Failed to close committer");
        }
    }
}

impl std::fmt::Debug for Committer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Committer")
            .field("layout", &self.layout)
            .field("mode", &self.mode)
            .field("status", &self.status())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn open_append(path: &Path) -> Result<File, CommitError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| CommitError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn append_position(file: &mut File, path: &Path) -> Result<u64, CommitError> {
    file.seek(SeekFrom::End(0))
        .map_err(|source| CommitError::Position {
            path: path.to_path_buf(),
            source,
        })
}

fn open_table(path: PathBuf, header: &[String]) -> Result<TableWriter, CommitError> {
    tracing::info!(path = %path.display(), "Opening table");

    let mut file = open_append(&path)?;
    let position = append_position(&mut file, &path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    if position == 0 {
        writer
            .write_record(header)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|source| CommitError::WriteRow {
                path: path.clone(),
                source,
            })?;
    }

    Ok(TableWriter { path, writer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn layout_in(dir: &Path) -> OutputLayout {
        let template = dir.display().to_string();
        OutputLayout::resolve(Some(&template), NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
            .unwrap()
    }

    #[test]
    fn header_written_once_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);
        committer.register_table("level", &["type", "price"]);

        committer.commit_record("level", &["l2update", "1.5"]).unwrap();
        committer.commit_record("level", &["l2update", "1.6"]).unwrap();
        committer.close().unwrap();

        let text = std::fs::read_to_string(dir.path().join("20240307.level.csv")).unwrap();
        assert_eq!(text, "type,price\nl2update,1.5\nl2update,1.6\n");
        assert_eq!(committer.row_count("level"), Some(2));
    }

    #[test]
    fn unregistered_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);

        let err = committer.commit_record("ticker", &["x"]).unwrap_err();
        assert!(matches!(err, CommitError::UnknownTable(name) if name == "ticker"));
    }

    #[test]
    fn files_are_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);
        committer.register_table("ticker", &["type"]);
        committer.register_table("match", &["type"]);

        committer.commit_record("match", &["match"]).unwrap();

        assert!(dir.path().join("20240307.match.csv").exists());
        assert!(!dir.path().join("20240307.ticker.csv").exists());
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);
        committer.register_table("error", &["message"]);

        committer.commit_record("error", &["a,b"]).unwrap();
        committer.close().unwrap();

        let text = std::fs::read_to_string(dir.path().join("20240307.error.csv")).unwrap();
        assert_eq!(text, "message\n\"a,b\"\n");
    }

    #[test]
    fn status_orders_tables_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);
        committer.register_table("b", &["x"]);
        committer.register_table("a", &["x"]);

        for _ in 0..2 {
            committer.commit_record("b", &["1"]).unwrap();
        }
        for _ in 0..5 {
            committer.commit_record("a", &["1"]).unwrap();
        }

        assert_eq!(committer.status(), "a=5 b=2 ");
    }

    #[test]
    fn raw_line_layout_and_counters() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Raw);
        let ts = Local::now();
        let payload = br#"{"type":"heartbeat"}"#;

        committer.commit_raw(&ts, payload).unwrap();
        committer.commit_raw(&ts, payload).unwrap();

        let expected_line = format!("{} {}\n", marshal_receipt_time(&ts), r#"{"type":"heartbeat"}"#);
        assert_eq!(
            committer.status(),
            format!("raw_count=2 raw_offset={}", expected_line.len() * 2)
        );

        committer.close().unwrap();
        let text = std::fs::read_to_string(dir.path().join("20240307.raw.json")).unwrap();
        assert_eq!(text, expected_line.repeat(2));
    }

    #[test]
    fn raw_offset_continues_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240307.raw.json"), b"0123456789\n").unwrap();

        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Raw);
        committer.commit_raw(&Local::now(), b"{}").unwrap();

        let len = std::fs::metadata(dir.path().join("20240307.raw.json"))
            .unwrap()
            .len();
        assert_eq!(committer.status(), format!("raw_count=1 raw_offset={len}"));
    }

    #[test]
    fn commits_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut committer = Committer::new(layout_in(dir.path()), CaptureMode::Tables);
        committer.register_table("ticker", &["type"]);
        committer.commit_record("ticker", &["ticker"]).unwrap();

        committer.close().unwrap();
        committer.close().unwrap();

        assert!(matches!(
            committer.commit_record("ticker", &["ticker"]),
            Err(CommitError::Closed)
        ));
        assert!(matches!(
            committer.commit_raw(&Local::now(), b"{}"),
            Err(CommitError::Closed)
        ));
    }

    proptest::proptest! {
        #[test]
        fn status_lists_every_table_sorted(names in proptest::collection::btree_set("[a-z]{1,8}", 1..6)) {
            let mut committer = Committer::new(
                OutputLayout::resolve(None, NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()).unwrap(),
                CaptureMode::Tables,
            );
            for name in names.iter().rev() {
                committer.register_table(name, &["x"]);
            }

            let expected: String = names.iter().map(|name| format!("{name}=0 ")).collect();
            proptest::prop_assert_eq!(committer.status(), expected);
        }
    }
}
