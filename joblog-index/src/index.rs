use crate::error::IndexError;
use crate::registry::ColumnRegistry;
use itertools::izip;
use joblog_parser::{LineRecord, SYNC_LOST_MESSAGE, parse_line};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use unicode_width::UnicodeWidthStr;

/// one decorated log entry materialized by [`LogIndex::rows`]
///
/// transient: regenerated from disk plus the in-memory index on every
/// window query, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rel_time: f64,
    pub host: String,
    pub pid: String,
    pub tid: String,
    pub subsystem: String,
    pub message: String,
}

/// tracked maximum display widths for the columns not covered by a registry
#[derive(Debug, Default, Clone, Copy)]
struct TrackedWidths {
    time: usize,
    pid: usize,
    tid: usize,
}

/// incremental positional index over one append-only job log file
///
/// the file's first line is an opaque identity token; a change of identity
/// between scans means the file was replaced and all indexed state is
/// discarded. every other line is indexed by the byte offset where it
/// starts, so windows of rows can be re-read from disk on demand instead of
/// being held in memory.
///
/// single-owner, single-thread: callers invoking `scan()`/`rows()` from
/// more than one thread must serialize access themselves. no file handle
/// is held between calls.
pub struct LogIndex {
    path: PathBuf,
    identity: Option<String>,
    start_time: Option<f64>,
    // last successfully parsed timestamp, anchor for sync-lost rows
    anchor: f64,
    row_offsets: Vec<u64>,
    host_codes: Vec<u32>,
    pid_texts: Vec<String>,
    tid_texts: Vec<String>,
    subsystem_codes: Vec<u32>,
    rel_times: Vec<f64>,
    hosts: ColumnRegistry,
    subsystems: ColumnRegistry,
    widths: TrackedWidths,
}

// strip one trailing \n (and a preceding \r, for logs written on Windows)
fn trim_line_ending(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

impl LogIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut index = Self {
            path: path.into(),
            identity: None,
            start_time: None,
            anchor: 0.0,
            row_offsets: Vec::new(),
            host_codes: Vec::new(),
            pid_texts: Vec::new(),
            tid_texts: Vec::new(),
            subsystem_codes: Vec::new(),
            rel_times: Vec::new(),
            hosts: ColumnRegistry::new(),
            subsystems: ColumnRegistry::new(),
            widths: TrackedWidths::default(),
        };
        index.blank();
        index
    }

    /// discard all indexed state; the next `scan()` rebuilds from scratch
    pub fn blank(&mut self) {
        self.identity = None;
        self.start_time = None;
        self.anchor = 0.0;
        self.row_offsets.clear();
        self.host_codes.clear();
        self.pid_texts.clear();
        self.tid_texts.clear();
        self.subsystem_codes.clear();
        self.rel_times.clear();
        self.hosts.clear();
        self.subsystems.clear();
        self.widths = TrackedWidths::default();
    }

    /// extend the index over all bytes appended since the last scan, or
    /// rebuild it if the file's identity line has changed.
    ///
    /// returns the number of newly indexed rows and a status message
    /// containing one of "new file detected", "file extended" or
    /// "file overwritten".
    ///
    /// unparseable lines become placeholder rows (see
    /// [`joblog_parser::LineRecord::sync_lost`]); only I/O failures error,
    /// and rows indexed before the failure remain valid.
    pub fn scan(&mut self) -> Result<(usize, String), IndexError> {
        let file =
            File::open(&self.path).map_err(|e| IndexError::new("open", &self.path, e))?;
        let mut reader = BufReader::new(file);
        let mut raw = Vec::new();

        // line 1 is the identity token
        let identity_len = reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| IndexError::new("read identity line", &self.path, e))?;
        let identity = String::from_utf8_lossy(trim_line_ending(&raw)).into_owned();

        let status = match self.identity.as_deref() {
            None => {
                log::debug!("LogIndex: new file detected: {}", self.path.display());
                self.identity = Some(identity);
                "new file detected"
            }
            Some(prev) if prev == identity => "file extended",
            Some(_) => {
                log::debug!("LogIndex: file overwritten: {}", self.path.display());
                self.blank();
                self.identity = Some(identity);
                "file overwritten"
            }
        };

        // resume position: just past the identity line, or at the last
        // indexed row, which is re-read to confirm the file has not shrunk
        let mut offset = identity_len as u64;
        if let Some(&last) = self.row_offsets.last() {
            reader
                .seek(SeekFrom::Start(last))
                .map_err(|e| IndexError::new("seek to last row", &self.path, e))?;
            raw.clear();
            let reread = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| IndexError::new("reread last row", &self.path, e))?;
            if reread == 0 {
                return Err(IndexError::new(
                    "reread last row",
                    &self.path,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "file shrank below the last indexed row",
                    ),
                ));
            }
            offset = last + reread as u64;
        }

        let mut added = 0usize;
        loop {
            raw.clear();
            let n = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| IndexError::new("read line", &self.path, e))?;
            if n == 0 {
                break;
            }

            let record = match std::str::from_utf8(trim_line_ending(&raw)) {
                Ok(text) => parse_line(text, self.anchor),
                // a torn multi-byte sequence from an interleaved write
                Err(_) => LineRecord::sync_lost(self.anchor),
            };

            self.push_row(offset, record);
            offset += n as u64;
            added += 1;
        }

        if added > 0 {
            log::debug!(
                "LogIndex: {} rows added ({} total): {}",
                added,
                self.row_offsets.len(),
                self.path.display()
            );
        }

        Ok((added, status.to_string()))
    }

    fn push_row(&mut self, offset: u64, record: LineRecord) {
        // first processed row after a reset anchors the relative-time column
        let start = *self.start_time.get_or_insert(record.timestamp);
        let rel_time = record.timestamp - start;
        self.anchor = record.timestamp;

        self.widths.time = self.widths.time.max(format!("{rel_time:.1}").len());
        self.widths.pid = self.widths.pid.max(record.pid.width());
        self.widths.tid = self.widths.tid.max(record.tid.width());

        self.row_offsets.push(offset);
        self.host_codes.push(self.hosts.code_for(&record.host));
        self.subsystem_codes
            .push(self.subsystems.code_for(&record.subsystem));
        self.pid_texts.push(record.pid);
        self.tid_texts.push(record.tid);
        self.rel_times.push(rel_time);
    }

    /// materialize the window of already-indexed rows `[start, stop]`.
    ///
    /// negative indices resolve relative to the row count, python-slice
    /// style, so `rows(-3, -1)` is the last three rows. `stop` is clamped
    /// to the last row; an empty or inverted range yields an empty vec.
    ///
    /// the file is opened once for the whole window. a row whose offset is
    /// past the current end of file (truncated since indexing) ends the
    /// window early with the rows collected so far.
    pub fn rows(&self, start: isize, stop: isize) -> Result<Vec<Row>, IndexError> {
        let len = self.row_offsets.len() as isize;
        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        start = start.max(0);
        stop = stop.min(len - 1);
        if start >= len || start > stop {
            return Ok(Vec::new());
        }
        let (a, b) = (start as usize, stop as usize);

        let file =
            File::open(&self.path).map_err(|e| IndexError::new("open", &self.path, e))?;
        let mut reader = BufReader::new(file);
        let mut raw = Vec::new();
        let mut out = Vec::with_capacity(b - a + 1);

        for (&offset, &rel_time, &host_code, pid, tid, &subsystem_code) in izip!(
            &self.row_offsets[a..=b],
            &self.rel_times[a..=b],
            &self.host_codes[a..=b],
            &self.pid_texts[a..=b],
            &self.tid_texts[a..=b],
            &self.subsystem_codes[a..=b],
        ) {
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(|e| IndexError::new("seek to row", &self.path, e))?;
            raw.clear();
            let n = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| IndexError::new("read row", &self.path, e))?;
            if n == 0 {
                // file truncated since indexing: return what we have
                log::warn!(
                    "LogIndex: row window cut short at offset {}: {}",
                    offset,
                    self.path.display()
                );
                break;
            }

            let text = String::from_utf8_lossy(trim_line_ending(&raw));
            let message = match text.split_once(": ") {
                Some((_, msg)) => msg.to_string(),
                // no header separator: the line never parsed, show the
                // same placeholder the index recorded for it
                None => SYNC_LOST_MESSAGE.to_string(),
            };

            out.push(Row {
                rel_time,
                host: self.hosts.resolve(host_code).to_string(),
                pid: pid.clone(),
                tid: tid.clone(),
                subsystem: self.subsystems.resolve(subsystem_code).to_string(),
                message,
            });
        }

        Ok(out)
    }

    /// searchable text for one row, built from the in-memory columns only
    /// (no disk read): host, pid, tid and subsystem
    pub fn field_text(&self, row: usize) -> String {
        format!(
            "{} {} {} {}",
            self.hosts.resolve(self.host_codes[row]),
            self.pid_texts[row],
            self.tid_texts[row],
            self.subsystems.resolve(self.subsystem_codes[row]),
        )
    }

    /// identity token read from the file's first line, if any scan succeeded
    pub fn uuid(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn n_rows(&self) -> usize {
        self.row_offsets.len()
    }

    /// timestamp of the first row processed after a reset
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// maximum observed display widths, in fixed column order:
    /// (time, host, pid, tid, subsystem)
    pub fn widths(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.widths.time,
            self.hosts.max_width(),
            self.widths.pid,
            self.widths.tid,
            self.subsystems.max_width(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
