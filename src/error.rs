//! Error handling.

use thiserror::Error;

/// Enum with all errors in this crate.
///
/// The variants fall into two families that callers are expected to treat differently:
///
/// - bounds errors ([`is_bounds`][CursorError::is_bounds]) mean the caller asked for a range
///   that cannot exist, such as a negative index or a range past a known length;
/// - end-of-data errors ([`is_end_of_data`][CursorError::is_end_of_data]) mean the underlying
///   stream ended earlier than the read needed, which recursive parsers usually treat as "the
///   container ended early".
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CursorError {
    /// A read was attempted at a negative index.
    #[error("attempt to read using a negative index ({0})")]
    NegativeIndex(i64),

    /// A negative number of bytes was requested.
    #[error("number of requested bytes must be zero or greater (got {0})")]
    NegativeCount(i64),

    /// The requested range exceeds a known length.
    #[error(
        "attempt to read beyond the end of the data (requested index: {index}, requested count: {count}, length: {length})"
    )]
    OutOfBounds {
        /// Requested start index.
        index: i64,
        /// Requested number of bytes.
        count: i64,
        /// The length that was exceeded.
        length: i64,
    },

    /// `index + count` does not fit in an `i64`.
    #[error(
        "requested index summed with requested count exceeds the addressable range (requested index: {index}, requested count: {count})"
    )]
    Overflow {
        /// Requested start index.
        index: i64,
        /// Requested number of bytes.
        count: i64,
    },

    /// The stream ended before the requested bytes could be read.
    #[error("End of data: expected to read {count} bytes at index {index}, {available} available")]
    EndOfData {
        /// Requested start index.
        index: i64,
        /// Requested number of bytes.
        count: i64,
        /// Number of bytes that were actually available.
        available: i64,
    },

    /// General error.
    #[error("General error: {0}")]
    General(String),

    /// IO Error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl CursorError {
    /// Returns `true` for errors caused by an invalid request: negative index or count, a range
    /// past a known length, or an overflowing range.
    pub fn is_bounds(&self) -> bool {
        matches!(
            self,
            CursorError::NegativeIndex(_)
                | CursorError::NegativeCount(_)
                | CursorError::OutOfBounds { .. }
                | CursorError::Overflow { .. }
        )
    }

    /// Returns `true` if the stream ran out of data before the read could complete.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, CursorError::EndOfData { .. })
    }
}

/// Crate-specific result type.
pub type CursorResult<T> = std::result::Result<T, CursorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_families_are_disjoint() {
        let bounds = [
            CursorError::NegativeIndex(-1),
            CursorError::NegativeCount(-2),
            CursorError::OutOfBounds {
                index: 4,
                count: 4,
                length: 6,
            },
            CursorError::Overflow {
                index: i64::MAX,
                count: 1,
            },
        ];
        for err in bounds {
            assert!(err.is_bounds(), "{err}");
            assert!(!err.is_end_of_data(), "{err}");
        }

        let eod = CursorError::EndOfData {
            index: 8,
            count: 4,
            available: 2,
        };
        assert!(eod.is_end_of_data());
        assert!(!eod.is_bounds());

        let io: CursorError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(!io.is_bounds());
        assert!(!io.is_end_of_data());
    }

    #[test]
    fn messages_name_the_range() {
        let err = CursorError::OutOfBounds {
            index: 9,
            count: 2,
            length: 10,
        };
        assert_eq!(
            err.to_string(),
            "attempt to read beyond the end of the data (requested index: 9, requested count: 2, length: 10)"
        );
    }
}
