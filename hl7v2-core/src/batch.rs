//! Batch and file containers.
//!
//! ```text
//! FHS ─┬─ BHS ─┬─ MSH ... (message)
//!      │       ├─ MSH ...
//!      │       └─ BTS|2
//!      ├─ MSH ...
//!      └─ FTS|2
//! ```
//!
//! One [`Batch`] type models both levels; [`ContainerKind`] says which
//! header/trailer pair it uses. The trailer's declared count is advisory:
//! [`Batch::validate`] checks it on demand and a mismatch never stops
//! construction or access.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::diagnostics::{ParseDiagnostics, Parsed};
use crate::error::{Error, Result};
use crate::parser::{lines, Line, Parser, MESSAGE_HEADER};
use crate::segment::prefix_of;
use crate::value::{Message, Segment, SEGMENT_TERMINATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// `FHS` … `FTS`
    File,
    /// `BHS` … `BTS`
    Batch,
}

impl ContainerKind {
    pub fn header_id(self) -> &'static str {
        match self {
            ContainerKind::File => "FHS",
            ContainerKind::Batch => "BHS",
        }
    }

    pub fn trailer_id(self) -> &'static str {
        match self {
            ContainerKind::File => "FTS",
            ContainerKind::Batch => "BTS",
        }
    }

    fn of_line(text: &str) -> Option<Self> {
        if text.starts_with("FHS") {
            Some(ContainerKind::File)
        } else if text.starts_with("BHS") {
            Some(ContainerKind::Batch)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem {
    Message(Message),
    Batch(Batch),
}

/// A declared count that disagrees with the container's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    pub kind: ContainerKind,
    pub declared: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    kind: ContainerKind,
    header: Segment,
    items: Arc<[BatchItem]>,
    trailer: Segment,
}

impl Batch {
    /// Build a container. `header` must be `FHS` or `BHS` and `trailer` the
    /// matching `FTS` or `BTS`.
    pub fn new(header: Segment, items: Vec<BatchItem>, trailer: Segment) -> Result<Self> {
        let kind = ContainerKind::of_line(header.id().as_str()).ok_or(Error::MissingBatchHeader)?;
        if trailer.id() != kind.trailer_id() {
            return Err(Error::MissingBatchTrailer(kind.trailer_id()));
        }
        Ok(Batch {
            kind,
            header,
            items: items.into(),
            trailer,
        })
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn header(&self) -> &Segment {
        &self.header
    }

    pub fn trailer(&self) -> &Segment {
        &self.trailer
    }

    /// Direct children in wire order.
    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Messages directly inside this container.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.items.iter().filter_map(|item| match item {
            BatchItem::Message(message) => Some(message),
            BatchItem::Batch(_) => None,
        })
    }

    /// Nested containers.
    pub fn batches(&self) -> impl Iterator<Item = &Batch> {
        self.items.iter().filter_map(|item| match item {
            BatchItem::Batch(batch) => Some(batch),
            BatchItem::Message(_) => None,
        })
    }

    /// Every message at any depth, in wire order.
    pub fn all_messages(&self) -> Vec<&Message> {
        let mut out = Vec::new();
        self.collect_messages(&mut out);
        out
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a Message>) {
        for item in self.items.iter() {
            match item {
                BatchItem::Message(message) => out.push(message),
                BatchItem::Batch(batch) => batch.collect_messages(out),
            }
        }
    }

    /// Count from trailer field 1, if present and numeric.
    pub fn declared_count(&self) -> Option<usize> {
        let field = self.trailer.field(1)?;
        field.value().ok()?.trim().parse().ok()
    }

    /// True when every declared count, here and in nested containers,
    /// matches the number of direct items. A missing count is not checked.
    pub fn validate(&self) -> bool {
        self.count_mismatches().is_empty()
    }

    pub fn count_mismatches(&self) -> Vec<CountMismatch> {
        let mut out = Vec::new();
        self.collect_mismatches(&mut out);
        out
    }

    fn collect_mismatches(&self, out: &mut Vec<CountMismatch>) {
        if let Some(declared) = self.declared_count() {
            if declared != self.items.len() {
                out.push(CountMismatch {
                    kind: self.kind,
                    declared,
                    actual: self.items.len(),
                });
            }
        }
        for batch in self.batches() {
            batch.collect_mismatches(out);
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.header.serialize());
        for item in self.items.iter() {
            out.push_str(SEGMENT_TERMINATOR);
            match item {
                BatchItem::Message(message) => out.push_str(&message.serialize()),
                BatchItem::Batch(batch) => batch.write_to(out),
            }
        }
        out.push_str(SEGMENT_TERMINATOR);
        out.push_str(&self.trailer.serialize());
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ============================================================================
// Parsing
// ============================================================================

impl Parser {
    /// Parse a `FHS`/`BHS` container.
    ///
    /// Header and trailer failures are fatal. A message that fails, or a
    /// segment that precedes every message header, goes through the
    /// recovery sink.
    pub fn parse_batch(&self, text: &str) -> Result<Parsed<Batch>> {
        let started = Instant::now();
        let lines = lines(text, self.config().terminator);
        let mut diagnostics = ParseDiagnostics::new();
        let batch = self.parse_container(&lines, &mut diagnostics)?;
        diagnostics.elapsed = started.elapsed();
        debug!(
            items = batch.len(),
            skipped = diagnostics.segments_skipped,
            "parsed {}",
            batch.kind().header_id()
        );
        Ok(Parsed::new(batch, diagnostics))
    }

    /// Parse a container from bytes in the configured character encoding.
    pub fn parse_batch_bytes(&self, bytes: &[u8]) -> Result<Parsed<Batch>> {
        self.with_text(bytes, |text, used| {
            let mut parsed = self.parse_batch(text)?;
            parsed.diagnostics.encoding = Some(used);
            Ok(parsed)
        })
    }

    fn parse_container(&self, lines: &[Line<'_>], diagnostics: &mut ParseDiagnostics) -> Result<Batch> {
        let first = lines.first().ok_or(Error::MissingBatchHeader)?;
        let kind = ContainerKind::of_line(first.text).ok_or(Error::MissingBatchHeader)?;
        let last = lines
            .last()
            .filter(|line| lines.len() > 1 && line.starts_with(kind.trailer_id()))
            .ok_or(Error::MissingBatchTrailer(kind.trailer_id()))?;

        let delims = self.delimiters_for(first.text)?;
        let header = crate::segment::parse_segment(first.text, &delims, false)?;
        let trailer = crate::segment::parse_segment(last.text, &delims, false)?;

        let interior = &lines[1..lines.len() - 1];
        let mut items = Vec::new();
        let mut current: Option<usize> = None;
        let mut i = 0;

        while i < interior.len() {
            let line = &interior[i];
            if line.starts_with("BHS") {
                self.flush(interior, &mut current, i, &mut items, diagnostics)?;
                let end = matching_trailer(interior, i).ok_or(Error::MissingBatchTrailer("BTS"))?;
                let nested = self.parse_container(&interior[i..=end], diagnostics)?;
                items.push(BatchItem::Batch(nested));
                i = end + 1;
                continue;
            }
            if line.starts_with(MESSAGE_HEADER) {
                self.flush(interior, &mut current, i, &mut items, diagnostics)?;
                current = Some(i);
            } else if current.is_none() {
                let error = Error::OrphanSegment {
                    line: line.number,
                    prefix: prefix_of(line.text),
                };
                diagnostics.absorb(self.config().recovery, line.number, prefix_of(line.text), error)?;
            }
            i += 1;
        }
        self.flush(interior, &mut current, interior.len(), &mut items, diagnostics)?;

        Batch::new(header, items, trailer)
    }

    /// Parse the open message `interior[start..end]`, if any.
    fn flush(
        &self,
        interior: &[Line<'_>],
        current: &mut Option<usize>,
        end: usize,
        items: &mut Vec<BatchItem>,
        diagnostics: &mut ParseDiagnostics,
    ) -> Result<()> {
        let Some(start) = current.take() else {
            return Ok(());
        };
        let group = &interior[start..end];
        let mut own = ParseDiagnostics::new();
        let outcome = self.parse_lines(group, &mut own);
        diagnostics.merge(own);
        match outcome {
            Ok(message) => items.push(BatchItem::Message(message)),
            Err(error) => {
                let first = group[0];
                diagnostics.absorb(self.config().recovery, first.number, prefix_of(first.text), error)?;
            }
        }
        Ok(())
    }
}

/// Index of the `BTS` closing the `BHS` at `open`, counting nested pairs.
fn matching_trailer(lines: &[Line<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, line) in lines.iter().enumerate().skip(open) {
        if line.starts_with("BHS") {
            depth += 1;
        } else if line.starts_with("BTS") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
