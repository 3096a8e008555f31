//! # joblog-index
//!
//! An incremental positional index over append-only, multi-process job log
//! files, plus the windowed row-retrieval contract a paginated viewer
//! consumes.
//!
//! ## Overview
//!
//! A job log is written by many processes and threads across hosts, with a
//! one-line identity token at the top and one structured entry per line
//! after it:
//!
//! ```text
//! <uuid-or-identity-line>
//! <timestamp> <host>_<pid>_<tid> <subsystem>: <message>
//! <timestamp> <host>_<pid>_<tid> <subsystem>: <message>
//! ```
//!
//! [`LogIndex::scan`] extends the index over newly appended lines (or
//! rebuilds it when the identity line changed), keeping only per-row byte
//! offsets, interned host/subsystem codes and small per-row fields in
//! memory. [`LogIndex::rows`] then re-reads any window of rows from disk
//! and decorates them from the index, so a viewer showing one screenful at
//! a time never forces the whole log into memory.
//!
//! ## Model
//!
//! Synchronous and single-owner: `scan()` and `rows()` are blocking calls,
//! no handle is held between them, and concurrent callers must serialize
//! access themselves. Lines that fail to parse become visible placeholder
//! rows rather than errors (interleaved stdout from concurrent producers is
//! expected); only I/O failures surface, as [`IndexError`].

mod error;
mod filter;
mod index;
mod registry;

pub use error::IndexError;
pub use filter::RowFilter;
pub use index::{LogIndex, Row};
pub use registry::ColumnRegistry;
