//! Write-Ahead Log Module
//!
//! Durability for writes accepted by a tablet peer before they reach a
//! durable row set.
//!
//! ## Responsibilities
//! - Append entries before they are applied to the tablet
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering and replay filtering
//! - Drop a torn tail left by a crash mid-append
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```
//! The CRC covers the LSN bytes and the data.

mod entry;
mod reader;
mod writer;

pub use entry::{LogEntry, WriteOp, HEADER_SIZE};
pub use reader::{LogReader, ReadResult};
pub use writer::LogWriter;
