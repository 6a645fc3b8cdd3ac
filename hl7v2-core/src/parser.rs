//! Message parser.
//!
//! A parse moves through three phases: expect the header, accumulate
//! segments, assemble. The first phase is fail-fast in every recovery mode;
//! during accumulation each line's failure goes through the
//! [`ErrorRecoveryMode`] sink in [`ParseDiagnostics::absorb`].
//!
//! ```text
//! text ──lines()──▶ header line ──DelimiterSet──▶ parse_segment per line
//!                                                     │
//!                              Message::new ◀── survivors + warnings
//! ```

use std::sync::Arc;
use std::time::Instant;

use memchr::{memchr, memchr2, memmem};
use tracing::debug;

use crate::config::{CharacterEncoding, ErrorRecoveryMode, LineTerminator, ParserConfig};
use crate::delimiters::DelimiterSet;
use crate::diagnostics::{ParseDiagnostics, Parsed, WarningKind};
use crate::encoding;
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::segment::{self, prefix_of};
use crate::value::{Message, Segment};

/// Header fields reported empty under strict field checking: message type,
/// control id, processing id, version.
const REQUIRED_HEADER_FIELDS: [usize; 4] = [9, 10, 11, 12];

pub(crate) const MESSAGE_HEADER: &str = "MSH";

// ============================================================================
// Lines
// ============================================================================

/// One non-blank input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    /// 1-based physical line number.
    pub number: usize,
    /// Byte offset of `text` in the input.
    pub offset: usize,
    pub text: &'a str,
}

impl<'a> Line<'a> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    pub fn starts_with(&self, id: &str) -> bool {
        self.text.starts_with(id)
    }
}

/// Split `text` on `terminator`, dropping blank lines. Stray CR or LF left
/// at either end of a line is stripped.
pub(crate) fn lines(text: &str, terminator: LineTerminator) -> Vec<Line<'_>> {
    let bytes = text.as_bytes();
    let crlf = memmem::Finder::new(b"\r\n");
    let mut out = Vec::new();
    let mut start = 0;
    let mut number = 0;

    while start <= bytes.len() {
        number += 1;
        let rest = &bytes[start..];
        let found = match terminator {
            LineTerminator::Cr => memchr(b'\r', rest).map(|i| (i, 1)),
            LineTerminator::Lf => memchr(b'\n', rest).map(|i| (i, 1)),
            LineTerminator::CrLf => crlf.find(rest).map(|i| (i, 2)),
            LineTerminator::Any => memchr2(b'\r', b'\n', rest).map(|i| {
                let width = if rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                (i, width)
            }),
        };
        let (len, width) = found.unwrap_or((rest.len(), 0));
        // Terminators are ASCII, so these are char boundaries.
        let raw = &text[start..start + len];
        let trimmed_front = raw.trim_start_matches(['\r', '\n']);
        let line = trimmed_front.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            out.push(Line {
                number,
                offset: start + (raw.len() - trimmed_front.len()),
                text: line,
            });
        }
        if width == 0 {
            break;
        }
        start += len + width;
    }
    out
}

/// Group lines into messages, each starting at an `MSH` line. Lines before
/// the first header form a group of their own.
pub(crate) fn message_groups<'l, 'a>(lines: &'l [Line<'a>]) -> Vec<&'l [Line<'a>]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.starts_with(MESSAGE_HEADER) {
            groups.push(&lines[start..i]);
            start = i;
        }
    }
    if start < lines.len() {
        groups.push(&lines[start..]);
    }
    groups
}

/// Length counted against `max_message_size`: trailing line terminators
/// are not part of the message.
pub(crate) fn content_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|&b| b != b'\r' && b != b'\n').map_or(0, |i| i + 1)
}

// ============================================================================
// Parser
// ============================================================================

/// Message parser. Cheap to clone and safe to share; all state lives in the
/// configuration and the optional buffer pool.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
    pool: Option<Arc<BufferPool>>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Parser { config, pool: None }
    }

    /// Use `pool` for byte-to-text scratch buffers.
    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut ParserConfig {
        &mut self.config
    }

    pub fn buffer_pool(&self) -> Option<&Arc<BufferPool>> {
        self.pool.as_ref()
    }

    /// Parse one message, discarding diagnostics.
    pub fn parse(&self, text: &str) -> Result<Message> {
        self.parse_with_diagnostics(text).map(Parsed::into_value)
    }

    /// Parse one message.
    pub fn parse_with_diagnostics(&self, text: &str) -> Result<Parsed<Message>> {
        let started = Instant::now();
        self.check_size(content_len(text.as_bytes()))?;

        let lines = lines(text, self.config.terminator);
        let mut diagnostics = ParseDiagnostics::new();
        let message = self.parse_lines(&lines, &mut diagnostics)?;
        diagnostics.elapsed = started.elapsed();
        debug!(
            segments = diagnostics.segments_parsed,
            skipped = diagnostics.segments_skipped,
            warnings = diagnostics.warnings.len(),
            "parsed message"
        );
        Ok(Parsed::new(message, diagnostics))
    }

    /// Parse one message from bytes in the configured character encoding.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Parsed<Message>> {
        self.check_size(content_len(bytes))?;
        self.with_text(bytes, |text, used| {
            let mut parsed = self.parse_with_diagnostics(text)?;
            parsed.diagnostics.encoding = Some(used);
            Ok(parsed)
        })
    }

    /// Parse every message in `text`. Each message starts at an `MSH` line.
    ///
    /// Under a recovery mode, a message that fails as a whole is skipped and
    /// recorded against its first line.
    pub fn parse_all(&self, text: &str) -> Result<Parsed<Vec<Message>>> {
        let started = Instant::now();
        let lines = lines(text, self.config.terminator);
        if lines.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let mut diagnostics = ParseDiagnostics::new();
        let mut messages = Vec::new();
        for group in message_groups(&lines) {
            let mut own = ParseDiagnostics::new();
            match self.parse_lines(group, &mut own) {
                Ok(message) => {
                    diagnostics.merge(own);
                    messages.push(message);
                }
                Err(error) => {
                    let first = group[0];
                    debug!(line = first.number, "message skipped");
                    diagnostics.merge(own);
                    diagnostics.absorb(self.config.recovery, first.number, prefix_of(first.text), error)?;
                }
            }
        }
        diagnostics.elapsed = started.elapsed();
        Ok(Parsed::new(messages, diagnostics))
    }

    /// Parse every message in `bytes`.
    pub fn parse_all_bytes(&self, bytes: &[u8]) -> Result<Parsed<Vec<Message>>> {
        self.with_text(bytes, |text, used| {
            let mut parsed = self.parse_all(text)?;
            parsed.diagnostics.encoding = Some(used);
            Ok(parsed)
        })
    }

    // ------------------------------------------------------------------------
    // Internals shared with the batch and streaming parsers
    // ------------------------------------------------------------------------

    pub(crate) fn check_size(&self, size: usize) -> Result<()> {
        let max = self.config.max_message_size;
        if size > max {
            return Err(Error::MessageTooLarge { size, max });
        }
        Ok(())
    }

    /// Decode `bytes` and hand the text to `f`. UTF-8 and ASCII text is
    /// borrowed from `bytes`; Latin-1 is transcoded into a pooled buffer when
    /// a pool is attached.
    pub(crate) fn with_text<T>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&str, CharacterEncoding) -> Result<T>,
    ) -> Result<T> {
        let used = encoding::resolve(bytes, self.config.encoding);
        match &self.pool {
            Some(pool) if !encoding::is_borrowable(used) => {
                let mut buffer = pool.acquire();
                encoding::decode_into(bytes, used, &mut buffer)?;
                f(buffer.as_str(), used)
            }
            _ => {
                let (text, used) = encoding::decode(bytes, used)?;
                f(&text, used)
            }
        }
    }

    /// Delimiters for a header line: discovered, or the fixed configured set
    /// checked against the line.
    pub(crate) fn delimiters_for(&self, header: &str) -> Result<DelimiterSet> {
        let discovered = DelimiterSet::from_header_line(header)?;
        if self.config.auto_detect_delimiters || discovered == self.config.delimiters {
            Ok(discovered)
        } else {
            Err(Error::MalformedHeader(format!(
                "header declares {}{}, configured {}{}",
                discovered.field,
                discovered.encoding_characters(),
                self.config.delimiters.field,
                self.config.delimiters.encoding_characters(),
            )))
        }
    }

    /// Assemble one message from its lines.
    pub(crate) fn parse_lines(&self, lines: &[Line<'_>], diagnostics: &mut ParseDiagnostics) -> Result<Message> {
        let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
            return Err(Error::EmptyMessage);
        };
        self.check_size(last.end() - first.offset)?;
        if !first.starts_with(MESSAGE_HEADER) {
            return Err(Error::MissingHeader(prefix_of(first.text)));
        }
        let delims = self.delimiters_for(first.text)?;

        let mut segments = Vec::with_capacity(lines.len());
        for line in lines {
            if let Some(segment) = self.parse_line(line, &delims, diagnostics)? {
                self.inspect(&segment, line.number, !segments.is_empty(), diagnostics);
                segments.push(segment);
            }
        }
        diagnostics.segments_parsed += segments.len();

        let message = Message::new(segments)?;
        if self.config.strict {
            self.check_required_fields(&message, first.number, diagnostics);
        }
        Ok(message)
    }

    /// Parse one line, routing failures through the recovery sink. `None`
    /// means the line was skipped.
    pub(crate) fn parse_line(
        &self,
        line: &Line<'_>,
        delims: &DelimiterSet,
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<Option<Segment>> {
        let mode = self.config.recovery;
        let error = match self.parse_segment(line.text, delims, self.config.check_escapes) {
            Ok(segment) => return Ok(Some(segment)),
            Err(error) => error,
        };

        if mode == ErrorRecoveryMode::BestEffort && error.is_escape() {
            if let Ok(segment) = self.parse_segment(line.text, delims, false) {
                diagnostics.warn(WarningKind::InvalidEscape, line.number, error.to_string());
                return Ok(Some(segment));
            }
        }
        diagnostics.absorb(mode, line.number, prefix_of(line.text), error)?;
        Ok(None)
    }

    fn parse_segment(&self, text: &str, delims: &DelimiterSet, check_escapes: bool) -> Result<Segment> {
        let segment = segment::parse_segment(text, delims, check_escapes)?;
        if segment.id().is_custom() && !self.config.allow_custom_segments {
            return Err(Error::CustomSegmentNotAllowed(segment.id().to_string()));
        }
        Ok(segment)
    }

    fn inspect(&self, segment: &Segment, line: usize, in_body: bool, diagnostics: &mut ParseDiagnostics) {
        let id = segment.id();
        if !id.is_conventional() {
            diagnostics.warn(WarningKind::IdentifierShape, line, id.as_str());
        }
        if in_body && segment.is_header() {
            diagnostics.warn(WarningKind::UnexpectedHeaderSegment, line, id.as_str());
        }
        if !id.is_standard() && !id.is_custom() {
            diagnostics.warn(WarningKind::UnrecognizedSegment, line, id.as_str());
        }
    }

    fn check_required_fields(&self, message: &Message, line: usize, diagnostics: &mut ParseDiagnostics) {
        let header = message.header();
        for n in REQUIRED_HEADER_FIELDS {
            if header.field(n).map_or(true, |f| f.is_empty()) {
                diagnostics.warn(WarningKind::EmptyRequiredField, line, format!("{}-{n}", header.id()));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
