//! Error types for tabletd
//!
//! One error type covers the bootstrap stages, the maintenance operations
//! and the storage collaborators underneath them. The stage variants carry
//! the tablet id in their message so a fatal diagnostic names both the
//! tablet and the stage that failed.

use thiserror::Error;

/// Result type alias using TabletError
pub type Result<T> = std::result::Result<T, TabletError>;

/// Unified error type for tabletd operations
#[derive(Debug, Error)]
pub enum TabletError {
    // -------------------------------------------------------------------------
    // Bootstrap Stages
    // -------------------------------------------------------------------------
    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Tablet open failed: {0}")]
    Open(String),

    #[error("Peer init failed: {0}")]
    Init(String),

    #[error("Peer start failed: {0}")]
    Start(String),

    // -------------------------------------------------------------------------
    // Maintenance Operations
    // -------------------------------------------------------------------------
    #[error("Flush failed: {0}")]
    Flush(String),

    #[error("Compaction failed: {0}")]
    Compact(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Schema / Catalog / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TabletError {
    fn from(e: bincode::Error) -> Self {
        TabletError::Serialization(e.to_string())
    }
}
