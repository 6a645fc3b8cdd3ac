//! Error type shared by every codec operation.

use thiserror::Error;

/// Errors raised while parsing, decoding, or addressing HL7 v2 data.
///
/// Structural variants are fatal to the unit being parsed (one segment, or the
/// whole message in strict mode). Advisory problems are never errors; they are
/// reported as [`Warning`](crate::diagnostics::Warning)s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The header line does not declare a usable delimiter set.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A segment line shorter than its 3-character identifier.
    #[error("segment too short: {0:?}")]
    SegmentTooShort(String),

    /// Identifier is not 3 alphanumerics followed by the field separator.
    #[error("invalid segment identifier: {0:?}")]
    InvalidSegmentIdentifier(String),

    /// An escape character without a matching closer.
    #[error("unterminated escape sequence at offset {offset}")]
    UnterminatedEscape { offset: usize },

    /// An escape token the codec does not know.
    #[error("unknown escape sequence: {0:?}")]
    UnknownEscapeSequence(String),

    /// Input holds no segment lines at all.
    #[error("empty message")]
    EmptyMessage,

    /// The first line is not a message header.
    #[error("message does not start with a header segment, found {0:?}")]
    MissingHeader(String),

    /// No header segment survived parsing.
    #[error("no valid header segment")]
    NoValidHeader,

    /// Input exceeds the configured size limit.
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    /// Bytes are not valid in the configured character encoding.
    #[error("invalid {encoding} text at byte {offset}")]
    InvalidEncoding { encoding: &'static str, offset: usize },

    /// A `Z` segment was found while custom segments are disallowed.
    #[error("custom segment {0} not allowed")]
    CustomSegmentNotAllowed(String),

    /// Batch or file input without a `BHS`/`FHS` header line.
    #[error("missing batch header")]
    MissingBatchHeader,

    /// Batch or file input without its matching trailer line.
    #[error("missing batch trailer, expected {0}")]
    MissingBatchTrailer(&'static str),

    /// A segment inside a batch that precedes any message header.
    #[error("segment {prefix} at line {line} belongs to no message")]
    OrphanSegment { line: usize, prefix: String },

    /// A positional path that cannot be parsed.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

impl Error {
    /// Returns true for failures of the escape codec.
    pub fn is_escape(&self) -> bool {
        matches!(
            self,
            Error::UnterminatedEscape { .. } | Error::UnknownEscapeSequence(_)
        )
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
