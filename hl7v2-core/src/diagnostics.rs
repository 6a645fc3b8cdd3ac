//! Parse diagnostics and the recovery-mode failure sink.
//!
//! Every parse returns its value together with a [`ParseDiagnostics`]
//! record. Warnings are advisory and never block a parse; segment errors are
//! the failures a recovery mode absorbed instead of propagating.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::config::{CharacterEncoding, ErrorRecoveryMode};
use crate::error::{Error, Result};

// ============================================================================
// Warnings
// ============================================================================

/// Advisory findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Identifier is not an uppercase letter followed by two uppercase
    /// letters or digits.
    IdentifierShape,
    /// `MSH`, `BHS` or `FHS` after the first line of a message.
    UnexpectedHeaderSegment,
    /// Not a standard identifier and not a `Z` segment.
    UnrecognizedSegment,
    /// MSH-9, MSH-10, MSH-11 or MSH-12 is empty (strict field checking).
    EmptyRequiredField,
    /// Segment kept with an undecodable escape sequence.
    InvalidEscape,
}

impl WarningKind {
    pub fn message(&self) -> &'static str {
        match self {
            WarningKind::IdentifierShape => "segment identifier has an unconventional shape",
            WarningKind::UnexpectedHeaderSegment => "header segment inside message body",
            WarningKind::UnrecognizedSegment => "unrecognized segment identifier",
            WarningKind::EmptyRequiredField => "required header field is empty",
            WarningKind::InvalidEscape => "segment kept with invalid escape sequence",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    /// 1-based physical line number.
    pub line: usize,
    pub detail: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.kind.message(), self.detail)
    }
}

/// A failure a recovery mode absorbed. For `parse_all` and batches, `line`
/// is the first line of the skipped message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentError {
    pub line: usize,
    /// Up to three characters of the offending line.
    pub prefix: String,
    pub error: Error,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} ({}): {}", self.line, self.prefix, self.error)
    }
}

// ============================================================================
// ParseDiagnostics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseDiagnostics {
    pub warnings: Vec<Warning>,
    pub errors: Vec<SegmentError>,
    pub segments_parsed: usize,
    pub segments_skipped: usize,
    pub elapsed: Duration,
    /// Set by the byte entry points.
    pub encoding: Option<CharacterEncoding>,
}

impl ParseDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// No warnings and no absorbed errors.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, line: usize, detail: impl Into<String>) {
        self.warnings.push(Warning {
            kind,
            line,
            detail: detail.into(),
        });
    }

    /// The failure sink. `Strict` hands the error back for propagation;
    /// the other modes record it and let the caller skip the unit.
    pub(crate) fn absorb(
        &mut self,
        mode: ErrorRecoveryMode,
        line: usize,
        prefix: String,
        error: Error,
    ) -> Result<()> {
        if mode.is_strict() {
            return Err(error);
        }
        warn!(line, prefix = %prefix, error = %error, "skipping unparseable input");
        self.segments_skipped += 1;
        self.errors.push(SegmentError {
            line,
            prefix,
            error,
        });
        Ok(())
    }

    /// Fold another record into this one, keeping this record's timing and
    /// encoding.
    pub(crate) fn merge(&mut self, other: ParseDiagnostics) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
        self.segments_parsed += other.segments_parsed;
        self.segments_skipped += other.segments_skipped;
    }
}

/// A parsed value with its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: T,
    pub diagnostics: ParseDiagnostics,
}

impl<T> Parsed<T> {
    pub fn new(value: T, diagnostics: ParseDiagnostics) -> Self {
        Parsed { value, diagnostics }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        Parsed {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}
