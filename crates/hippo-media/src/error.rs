//! Error types for hippo-media.

use std::io;
use thiserror::Error;

/// Result type for hippo-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fragment index parsing and resolution.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred, including short reads.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Box size, type, version or consistency violation.
    #[error("Invalid format: {0}")]
    Format(String),

    /// The file is readable but carries no random-access trailer.
    #[error("Fragment index unavailable: {0}")]
    IndexUnavailable(String),

    /// No `tfra` box exists for the requested track.
    #[error("Track {track_id} not found in fragment index")]
    TrackNotFound { track_id: u32 },

    /// The track exists but has no entry with exactly this time.
    #[error("No fragment at time {time} for track {track_id}")]
    TimeNotFound { track_id: u32, time: u64 },
}

/// Coarse classification of [`Error`], used by callers that map failures
/// to transport-level responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Format,
    IndexUnavailable,
    TrackNotFound,
    TimeNotFound,
}

impl Error {
    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an index-unavailable error.
    pub fn index_unavailable(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Format(_) => ErrorKind::Format,
            Self::IndexUnavailable(_) => ErrorKind::IndexUnavailable,
            Self::TrackNotFound { .. } => ErrorKind::TrackNotFound,
            Self::TimeNotFound { .. } => ErrorKind::TimeNotFound,
        }
    }

    /// Whether the failure means "nothing to serve" rather than a fault
    /// while reading.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let io_err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"));
        assert_eq!(io_err.kind(), ErrorKind::Io);
        assert!(!io_err.is_not_found());

        assert_eq!(Error::format("bad").kind(), ErrorKind::Format);
        assert!(Error::format("bad").is_not_found());
        assert!(Error::index_unavailable("none").is_not_found());
        assert!(Error::TrackNotFound { track_id: 3 }.is_not_found());
        assert_eq!(
            Error::TimeNotFound { track_id: 1, time: 9 }.kind(),
            ErrorKind::TimeNotFound
        );
    }

    #[test]
    fn test_display() {
        let err = Error::TimeNotFound { track_id: 2, time: 6000 };
        assert_eq!(err.to_string(), "No fragment at time 6000 for track 2");
    }
}
