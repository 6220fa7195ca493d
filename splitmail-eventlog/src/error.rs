//! Error types for the event log.

use crate::traits::Offset;

/// Error type for event log operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The log no longer accepts appends.
    #[error("event log is closed")]
    Closed,

    /// A seek or commit referenced an offset past the end of the log.
    #[error("offset {offset} is beyond high water mark {high_water_mark}")]
    InvalidOffset {
        offset: Offset,
        high_water_mark: Offset,
    },
}

/// Result type alias for event log operations.
pub type Result<T> = std::result::Result<T, Error>;
