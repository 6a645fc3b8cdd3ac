//! Parser configuration.
//!
//! `ParserConfig` is plain data with serde support so hosts can load it from
//! whatever configuration format they already use:
//!
//! ```yaml
//! strict: true
//! max_message_size: 1048576
//! recovery: skip_invalid_segments
//! terminator: any
//! encoding: auto_detect
//! ```

use serde::{Deserialize, Serialize};

use crate::delimiters::DelimiterSet;

/// Default size limit: 10 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// What to do when one segment (or one message of a batch) fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRecoveryMode {
    /// Propagate the first failure.
    #[default]
    Strict,
    /// Record the failure, drop the unit, continue.
    SkipInvalidSegments,
    /// Like `SkipInvalidSegments`, but keep segments whose only defect is a
    /// bad escape sequence.
    BestEffort,
}

impl ErrorRecoveryMode {
    pub fn is_strict(self) -> bool {
        self == ErrorRecoveryMode::Strict
    }
}

/// Character encoding of byte input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterEncoding {
    Utf8,
    Ascii,
    Latin1,
    /// BOM → UTF-8, 7-bit clean → ASCII, anything else → Latin-1.
    #[default]
    AutoDetect,
}

impl CharacterEncoding {
    pub fn name(self) -> &'static str {
        match self {
            CharacterEncoding::Utf8 => "UTF-8",
            CharacterEncoding::Ascii => "ASCII",
            CharacterEncoding::Latin1 => "ISO-8859-1",
            CharacterEncoding::AutoDetect => "auto-detect",
        }
    }
}

/// Segment terminator accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineTerminator {
    Cr,
    Lf,
    CrLf,
    /// CR, LF or CRLF, mixed freely.
    #[default]
    Any,
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Strict field checking: report empty required header fields.
    pub strict: bool,
    /// Upper bound on the size of one message, in bytes.
    pub max_message_size: usize,
    /// Accept site-defined `Z` segments.
    pub allow_custom_segments: bool,
    pub encoding: CharacterEncoding,
    pub terminator: LineTerminator,
    /// Read delimiters from each header line; otherwise use `delimiters`.
    pub auto_detect_delimiters: bool,
    pub delimiters: DelimiterSet,
    pub recovery: ErrorRecoveryMode,
    /// Reject segments containing malformed escape sequences.
    pub check_escapes: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            strict: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            allow_custom_segments: true,
            encoding: CharacterEncoding::default(),
            terminator: LineTerminator::default(),
            auto_detect_delimiters: true,
            delimiters: DelimiterSet::default(),
            recovery: ErrorRecoveryMode::default(),
            check_escapes: true,
        }
    }
}

impl ParserConfig {
    /// All-or-nothing parsing for validation gateways.
    pub fn strict() -> Self {
        ParserConfig {
            strict: true,
            recovery: ErrorRecoveryMode::Strict,
            ..ParserConfig::default()
        }
    }

    /// Partial success for bulk ingestion.
    pub fn lenient() -> Self {
        ParserConfig {
            strict: false,
            recovery: ErrorRecoveryMode::BestEffort,
            ..ParserConfig::default()
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn with_custom_segments(mut self, allow: bool) -> Self {
        self.allow_custom_segments = allow;
        self
    }

    pub fn with_encoding(mut self, encoding: CharacterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_terminator(mut self, terminator: LineTerminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Turn delimiter discovery off and use `delimiters` for every message.
    pub fn with_fixed_delimiters(mut self, delimiters: DelimiterSet) -> Self {
        self.auto_detect_delimiters = false;
        self.delimiters = delimiters;
        self
    }

    pub fn with_recovery(mut self, recovery: ErrorRecoveryMode) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_escape_checking(mut self, check: bool) -> Self {
        self.check_escapes = check;
        self
    }
}
