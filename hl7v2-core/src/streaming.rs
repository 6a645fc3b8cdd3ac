//! Incremental parsing over arbitrarily chunked input.
//!
//! ```text
//! feed(chunk) ──▶ byte buffer ──pull()──▶ FrameScanner ──frame──▶ Parser
//!                     ▲                        │
//!                     └──── consumed prefix ◀──┘ drained
//! ```
//!
//! The scanner holds at most one pending frame. Nothing is parsed until
//! [`StreamingParser::pull`] is called, so a caller that stops pulling
//! simply drops the parser.
//!
//! Frame boundaries:
//! - messages end immediately before the next line starting with `MSH`, or
//!   at end of input once [`StreamingParser::finish`] was called;
//! - batches start at a `BHS` line and end after the `BTS` line that closes
//!   it, counting nested pairs.
//!
//! Bytes before the first start line are discarded.

use memchr::{memchr2, memrchr2};
use tracing::{debug, trace};

use crate::batch::Batch;
use crate::config::{CharacterEncoding, ParserConfig};
use crate::delimiters::DelimiterSet;
use crate::diagnostics::Parsed;
use crate::error::{Error, Result};
use crate::parser::{content_len, Parser, MESSAGE_HEADER};
use crate::value::Message;

const BATCH_HEADER: &[u8] = b"BHS";
const BATCH_TRAILER: &[u8] = b"BTS";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull<T> {
    /// A complete unit.
    Ready(T),
    /// No complete unit is buffered; feed more input.
    NeedMoreData,
    /// Input finished and fully consumed.
    Exhausted,
}

impl<T> Pull<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Pull::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Pull::Ready(value) => Some(value),
            _ => None,
        }
    }
}

// ============================================================================
// Frame scanner
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Message,
    Batch,
}

impl Framing {
    fn start_marker(self) -> &'static [u8] {
        match self {
            Framing::Message => MESSAGE_HEADER.as_bytes(),
            Framing::Batch => BATCH_HEADER,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scan {
    Frame(Vec<u8>),
    TooLarge(usize),
    NeedMoreData,
    Exhausted,
}

#[derive(Debug)]
pub(crate) struct FrameScanner {
    framing: Framing,
    buffer: Vec<u8>,
    finished: bool,
    /// `buffer[0]` is the start line of a frame.
    started: bool,
    /// `buffer[0]` begins a line.
    at_line_start: bool,
    /// Start of the next line to examine.
    cursor: usize,
    /// Open `BHS` lines seen in the current batch frame.
    depth: usize,
    max_size: usize,
    /// A UTF-8 byte-order mark preceded a start line.
    saw_bom: bool,
}

impl FrameScanner {
    pub fn new(framing: Framing, max_size: usize) -> Self {
        FrameScanner {
            framing,
            buffer: Vec::new(),
            finished: false,
            started: false,
            at_line_start: true,
            cursor: 0,
            depth: 0,
            max_size,
            saw_bom: false,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn saw_bom(&self) -> bool {
        self.saw_bom
    }

    pub fn next_frame(&mut self) -> Scan {
        if !self.started && !self.locate_start() {
            return if self.finished {
                self.buffer.clear();
                Scan::Exhausted
            } else {
                Scan::NeedMoreData
            };
        }

        loop {
            let start = self.cursor;
            if start >= self.buffer.len() {
                break;
            }
            let terminator = find_terminator(&self.buffer, start);
            let line = &self.buffer[start..];

            match self.framing {
                Framing::Message => {
                    if start > 0 && line.starts_with(MESSAGE_HEADER.as_bytes()) {
                        return self.take(start);
                    }
                }
                Framing::Batch => {
                    // Batch markers only count on complete lines.
                    if terminator.is_none() && !self.finished {
                        break;
                    }
                    if line.starts_with(BATCH_HEADER) {
                        self.depth += 1;
                    } else if line.starts_with(BATCH_TRAILER) {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            let end = terminator.map_or(self.buffer.len(), |t| line_after(&self.buffer, t));
                            return self.take(end);
                        }
                    }
                }
            }

            match terminator {
                Some(t) => self.cursor = line_after(&self.buffer, t),
                None => break,
            }
        }

        if self.finished {
            let end = self.buffer.len();
            return self.take(end);
        }
        if self.pending_len() > self.max_size {
            return self.overflow();
        }
        Scan::NeedMoreData
    }

    /// Drop bytes up to the first start line. Returns false when none is
    /// buffered yet; a partial line that may still become one is kept.
    fn locate_start(&mut self) -> bool {
        let marker = self.framing.start_marker();
        let mut pos = 0;

        if !self.at_line_start {
            match find_terminator(&self.buffer, 0) {
                Some(t) => pos = line_after(&self.buffer, t),
                None => {
                    self.discard(self.buffer.len(), false);
                    return false;
                }
            }
        }

        loop {
            let rest = &self.buffer[pos..];
            let body = rest.strip_prefix(UTF8_BOM).unwrap_or(rest);
            if body.starts_with(marker) {
                let bom = rest.len() - body.len();
                self.saw_bom |= bom > 0;
                self.discard(pos + bom, true);
                self.started = true;
                self.cursor = 0;
                self.depth = 0;
                return true;
            }
            match find_terminator(&self.buffer, pos) {
                Some(t) => pos = line_after(&self.buffer, t),
                None => {
                    if could_start(rest, marker) {
                        self.discard(pos, true);
                    } else {
                        self.discard(self.buffer.len(), false);
                    }
                    return false;
                }
            }
        }
    }

    fn discard(&mut self, n: usize, at_line_start: bool) {
        if n > 0 {
            debug!(bytes = n, "discarding bytes outside any frame");
            self.buffer.drain(..n);
        }
        self.at_line_start = at_line_start;
    }

    fn take(&mut self, end: usize) -> Scan {
        let frame: Vec<u8> = self.buffer.drain(..end).collect();
        trace!(bytes = frame.len(), remaining = self.buffer.len(), "frame complete");
        self.reset();
        Scan::Frame(frame)
    }

    /// Size of the pending frame as the parser would measure it. A partial
    /// next header and trailing terminators do not count.
    fn pending_len(&self) -> usize {
        let mut end = self.buffer.len();
        if self.framing == Framing::Message
            && self.cursor > 0
            && self.cursor < end
            && could_start(&self.buffer[self.cursor..], MESSAGE_HEADER.as_bytes())
        {
            end = self.cursor;
        }
        content_len(&self.buffer[..end])
    }

    /// The pending frame outgrew the limit: drop it and resynchronise on the
    /// next start line. An unterminated tail that may still become a start
    /// line is kept.
    fn overflow(&mut self) -> Scan {
        let size = self.pending_len();
        let marker = self.framing.start_marker();
        let tail = memrchr2(b'\r', b'\n', &self.buffer).map(|t| t + 1);
        let keep = tail.filter(|&t| could_start(&self.buffer[t..], marker));
        debug!(
            bytes = size,
            max = self.max_size,
            kept = keep.map_or(0, |t| self.buffer.len() - t),
            "pending frame exceeds limit"
        );
        let dropped = keep.unwrap_or(self.buffer.len());
        self.buffer.drain(..dropped);
        self.reset();
        self.at_line_start = keep.is_some();
        Scan::TooLarge(size)
    }

    fn reset(&mut self) {
        self.started = false;
        self.at_line_start = true;
        self.cursor = 0;
        self.depth = 0;
    }
}

/// A partial line that more input could turn into a start line.
fn could_start(partial: &[u8], marker: &[u8]) -> bool {
    if partial.len() < marker.len() && marker.starts_with(partial) {
        return true;
    }
    match partial.strip_prefix(UTF8_BOM) {
        Some(body) => body.len() < marker.len() && marker.starts_with(body),
        None => UTF8_BOM.starts_with(partial),
    }
}

fn find_terminator(buffer: &[u8], from: usize) -> Option<usize> {
    memchr2(b'\r', b'\n', &buffer[from..]).map(|i| from + i)
}

/// Start of the line after the terminator at `t`, treating CRLF as one.
fn line_after(buffer: &[u8], t: usize) -> usize {
    if buffer[t] == b'\r' && buffer.get(t + 1) == Some(&b'\n') {
        t + 2
    } else {
        t + 1
    }
}

/// The scanner strips a stream's byte-order mark, so auto-detection would
/// no longer see it; pin UTF-8 instead.
fn follow_bom(parser: &mut Parser, scanner: &FrameScanner) {
    if scanner.saw_bom() && parser.config().encoding == CharacterEncoding::AutoDetect {
        parser.config_mut().encoding = CharacterEncoding::Utf8;
    }
}

// ============================================================================
// StreamingParser
// ============================================================================

/// Pull-driven message parser over chunked bytes.
///
/// ```
/// use hl7v2_core::{Pull, StreamingParser};
///
/// let mut stream = StreamingParser::new();
/// stream.feed(b"MSH|^~\\&|A\rPID|1\rMS");
/// assert_eq!(stream.pull(), Pull::NeedMoreData);
/// stream.feed(b"H|^~\\&|B\r");
/// assert!(stream.pull().is_ready());
/// stream.finish();
/// assert!(stream.pull().is_ready());
/// assert_eq!(stream.pull(), Pull::Exhausted);
/// ```
#[derive(Debug)]
pub struct StreamingParser {
    parser: Parser,
    scanner: FrameScanner,
    delimiters: Option<DelimiterSet>,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::with_parser(Parser::new())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_parser(Parser::with_config(config))
    }

    /// Stream with an existing parser, including its buffer pool.
    pub fn with_parser(parser: Parser) -> Self {
        let max = parser.config().max_message_size;
        StreamingParser {
            parser,
            scanner: FrameScanner::new(Framing::Message, max),
            delimiters: None,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.scanner.feed(chunk);
    }

    /// Signal end of input. The remaining buffer becomes the last message.
    pub fn finish(&mut self) {
        self.scanner.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.scanner.is_finished()
    }

    /// Bytes held for the pending message.
    pub fn buffered(&self) -> usize {
        self.scanner.buffered()
    }

    /// Delimiters of the last message parsed.
    pub fn delimiters(&self) -> Option<&DelimiterSet> {
        self.delimiters.as_ref()
    }

    pub fn pull(&mut self) -> Pull<Result<Parsed<Message>>> {
        match self.scanner.next_frame() {
            Scan::Frame(bytes) => {
                follow_bom(&mut self.parser, &self.scanner);
                let parsed = self.parser.parse_bytes(&bytes);
                if let Ok(parsed) = &parsed {
                    self.delimiters = Some(*parsed.value.delimiters());
                }
                Pull::Ready(parsed)
            }
            Scan::TooLarge(size) => Pull::Ready(Err(Error::MessageTooLarge {
                size,
                max: self.parser.config().max_message_size,
            })),
            Scan::NeedMoreData => Pull::NeedMoreData,
            Scan::Exhausted => Pull::Exhausted,
        }
    }
}

impl Default for StreamingParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Yields ready messages; `None` means nothing is ready right now, not
/// necessarily the end of the stream.
impl Iterator for StreamingParser {
    type Item = Result<Parsed<Message>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().ready()
    }
}

// ============================================================================
// BatchStreamingParser
// ============================================================================

/// Pull-driven `BHS` … `BTS` extractor over chunked bytes.
#[derive(Debug)]
pub struct BatchStreamingParser {
    parser: Parser,
    scanner: FrameScanner,
}

impl BatchStreamingParser {
    pub fn new() -> Self {
        Self::with_parser(Parser::new())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_parser(Parser::with_config(config))
    }

    pub fn with_parser(parser: Parser) -> Self {
        let max = parser.config().max_message_size;
        BatchStreamingParser {
            parser,
            scanner: FrameScanner::new(Framing::Batch, max),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.scanner.feed(chunk);
    }

    pub fn finish(&mut self) {
        self.scanner.finish();
    }

    pub fn buffered(&self) -> usize {
        self.scanner.buffered()
    }

    pub fn pull(&mut self) -> Pull<Result<Parsed<Batch>>> {
        match self.scanner.next_frame() {
            Scan::Frame(bytes) => {
                follow_bom(&mut self.parser, &self.scanner);
                Pull::Ready(self.parser.parse_batch_bytes(&bytes))
            }
            Scan::TooLarge(size) => Pull::Ready(Err(Error::MessageTooLarge {
                size,
                max: self.parser.config().max_message_size,
            })),
            Scan::NeedMoreData => Pull::NeedMoreData,
            Scan::Exhausted => Pull::Exhausted,
        }
    }
}

impl Default for BatchStreamingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for BatchStreamingParser {
    type Item = Result<Parsed<Batch>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().ready()
    }
}
