//! Immutable value tree: Message → Segment → Field → Repetition → Component
//! → Subcomponent.
//!
//! Children live in `Arc<[T]>` and text in `Arc<str>`, so every node is cheap
//! to clone and safe to share between threads. Nothing is mutated after
//! construction; `with_*` methods build new nodes that share the untouched
//! children.
//!
//! # Empty positions
//!
//! A position whose wire text is empty has no children. Constructors
//! normalise a single empty child to the same form, so a tree built by hand
//! compares equal to the tree parsed from its serialization.
//!
//! # Numbering
//!
//! `field(n)`, `repetition(n)`, `component(n)` and `subcomponent(n)` use HL7
//! positional numbering starting at 1. `Index<usize>` on [`Segment`] and
//! [`Message`] is 0-based like a slice.

use std::borrow::Cow;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::delimiters::DelimiterSet;
use crate::error::{Error, Result};
use crate::escape;
use crate::segment_id::SegmentId;

// ============================================================================
// Subcomponent
// ============================================================================

/// Atomic leaf: still-escaped wire text plus the delimiters needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subcomponent {
    raw: Arc<str>,
    delims: DelimiterSet,
}

impl Subcomponent {
    /// Build from a literal value, escaping delimiters as needed.
    pub fn new(value: &str, delims: DelimiterSet) -> Self {
        Subcomponent {
            raw: Arc::from(escape::encode(value, &delims).as_ref()),
            delims,
        }
    }

    /// Build from wire text that is already escaped.
    pub fn from_raw(raw: impl Into<Arc<str>>, delims: DelimiterSet) -> Self {
        Subcomponent {
            raw: raw.into(),
            delims,
        }
    }

    /// The escaped wire text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The decoded value. This is the only fallible read in the tree.
    pub fn value(&self) -> Result<Cow<'_, str>> {
        escape::decode(&self.raw, &self.delims)
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delims
    }

    pub fn serialize(&self) -> String {
        self.raw.to_string()
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.raw);
    }
}

// ============================================================================
// Component
// ============================================================================

/// Ordered subcomponents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    subcomponents: Arc<[Subcomponent]>,
    delims: DelimiterSet,
}

impl Component {
    pub fn new(subcomponents: Vec<Subcomponent>, delims: DelimiterSet) -> Self {
        let subcomponents = match subcomponents.as_slice() {
            [only] if only.is_empty() => Vec::new(),
            _ => subcomponents,
        };
        Component {
            subcomponents: subcomponents.into(),
            delims,
        }
    }

    /// A component holding one literal value.
    pub fn from_value(value: &str, delims: DelimiterSet) -> Self {
        Component::new(vec![Subcomponent::new(value, delims)], delims)
    }

    pub fn empty(delims: DelimiterSet) -> Self {
        Component {
            subcomponents: Arc::from([]),
            delims,
        }
    }

    pub fn subcomponents(&self) -> &[Subcomponent] {
        &self.subcomponents
    }

    /// Subcomponent by 1-based position.
    pub fn subcomponent(&self, n: usize) -> Option<&Subcomponent> {
        n.checked_sub(1).and_then(|i| self.subcomponents.get(i))
    }

    /// Decoded value of the first subcomponent, empty if there is none.
    pub fn value(&self) -> Result<Cow<'_, str>> {
        match self.subcomponents.first() {
            Some(sub) => sub.value(),
            None => Ok(Cow::Borrowed("")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subcomponents.iter().all(Subcomponent::is_empty)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        for (i, sub) in self.subcomponents.iter().enumerate() {
            if i > 0 {
                out.push(self.delims.subcomponent);
            }
            sub.write_to(out);
        }
    }
}

// ============================================================================
// Repetition
// ============================================================================

/// One value at a field position: ordered components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repetition {
    components: Arc<[Component]>,
    delims: DelimiterSet,
}

impl Repetition {
    pub fn new(components: Vec<Component>, delims: DelimiterSet) -> Self {
        let components = match components.as_slice() {
            [only] if only.subcomponents.is_empty() => Vec::new(),
            _ => components,
        };
        Repetition {
            components: components.into(),
            delims,
        }
    }

    pub fn empty(delims: DelimiterSet) -> Self {
        Repetition {
            components: Arc::from([]),
            delims,
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component by 1-based position.
    pub fn component(&self, n: usize) -> Option<&Component> {
        n.checked_sub(1).and_then(|i| self.components.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.components.iter().all(Component::is_empty)
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        for (i, comp) in self.components.iter().enumerate() {
            if i > 0 {
                out.push(self.delims.component);
            }
            comp.write_to(out);
        }
    }
}

// ============================================================================
// Field
// ============================================================================

/// A field: zero or more repetitions of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    repetitions: Arc<[Repetition]>,
    delims: DelimiterSet,
}

impl Field {
    pub fn new(repetitions: Vec<Repetition>, delims: DelimiterSet) -> Self {
        let repetitions = match repetitions.as_slice() {
            [only] if only.components.is_empty() => Vec::new(),
            _ => repetitions,
        };
        Field {
            repetitions: repetitions.into(),
            delims,
        }
    }

    /// A field holding one literal value (single repetition, component and
    /// subcomponent).
    pub fn from_value(value: &str, delims: DelimiterSet) -> Self {
        Field::new(
            vec![Repetition::new(
                vec![Component::from_value(value, delims)],
                delims,
            )],
            delims,
        )
    }

    /// A field whose text is stored verbatim and never split.
    pub(crate) fn opaque(raw: &str, delims: DelimiterSet) -> Self {
        let sub = Subcomponent::from_raw(raw, delims);
        Field::new(
            vec![Repetition::new(
                vec![Component::new(vec![sub], delims)],
                delims,
            )],
            delims,
        )
    }

    pub fn empty(delims: DelimiterSet) -> Self {
        Field {
            repetitions: Arc::from([]),
            delims,
        }
    }

    pub fn repetitions(&self) -> &[Repetition] {
        &self.repetitions
    }

    /// Repetition by 1-based position.
    pub fn repetition(&self, n: usize) -> Option<&Repetition> {
        n.checked_sub(1).and_then(|i| self.repetitions.get(i))
    }

    /// Component of the first repetition by 1-based position.
    pub fn component(&self, n: usize) -> Option<&Component> {
        self.repetitions.first().and_then(|r| r.component(n))
    }

    /// Decoded value of the first component of the first repetition.
    pub fn value(&self) -> Result<Cow<'_, str>> {
        match self.component(1) {
            Some(comp) => comp.value(),
            None => Ok(Cow::Borrowed("")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repetitions.iter().all(Repetition::is_empty)
    }

    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delims
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        for (i, rep) in self.repetitions.iter().enumerate() {
            if i > 0 {
                out.push(self.delims.repetition);
            }
            rep.write_to(out);
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ============================================================================
// Segment
// ============================================================================

/// Header-family segments carry the delimiter declaration in field 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Header,
    Ordinary,
}

/// One line of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    id: SegmentId,
    kind: SegmentKind,
    fields: Arc<[Field]>,
    delims: DelimiterSet,
}

impl Segment {
    /// Build a segment.
    ///
    /// For header-family identifiers (`MSH`, `BHS`, `FHS`) fields 1 and 2 are
    /// synthesised from `delims`, and `fields` starts at field 3.
    pub fn new(id: &str, fields: Vec<Field>, delims: DelimiterSet) -> Result<Self> {
        let id = SegmentId::new(id)?;
        if id.is_header() {
            Ok(Segment::header(id, fields, delims))
        } else {
            Ok(Segment::ordinary(id, fields, delims))
        }
    }

    pub(crate) fn header(id: SegmentId, rest: Vec<Field>, delims: DelimiterSet) -> Self {
        let mut fields = Vec::with_capacity(rest.len() + 2);
        fields.push(Field::opaque(&delims.field.to_string(), delims));
        fields.push(Field::opaque(&delims.encoding_characters(), delims));
        fields.extend(rest);
        Segment {
            id,
            kind: SegmentKind::Header,
            fields: fields.into(),
            delims,
        }
    }

    pub(crate) fn ordinary(id: SegmentId, fields: Vec<Field>, delims: DelimiterSet) -> Self {
        Segment {
            id,
            kind: SegmentKind::Ordinary,
            fields: fields.into(),
            delims,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn is_header(&self) -> bool {
        self.kind == SegmentKind::Header
    }

    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delims
    }

    /// All fields, starting with field 1.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field by 1-based position.
    pub fn field(&self, n: usize) -> Option<&Field> {
        n.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True for an identifier-only segment.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The raw 4-character declaration of a header segment.
    pub fn encoding_characters(&self) -> Option<&str> {
        match self.kind {
            SegmentKind::Header => self
                .field(2)
                .and_then(|f| f.component(1))
                .and_then(|c| c.subcomponent(1))
                .map(Subcomponent::raw),
            SegmentKind::Ordinary => None,
        }
    }

    /// New segment with field `n` (1-based) replaced, padding with empty
    /// fields when `n` is past the end. Fields 1 and 2 of a header segment
    /// cannot be replaced.
    pub fn with_field(&self, n: usize, field: Field) -> Result<Segment> {
        if n == 0 || (self.is_header() && n <= 2) {
            return Err(Error::MalformedHeader(format!(
                "field {n} of {} cannot be replaced",
                self.id
            )));
        }
        let mut fields = self.fields.to_vec();
        if fields.len() < n {
            fields.resize(n, Field::empty(self.delims));
        }
        fields[n - 1] = field;
        Ok(Segment {
            fields: fields.into(),
            ..self.clone()
        })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(self.id.as_str());
        let skip = match self.kind {
            // Field 1 is the separator itself.
            SegmentKind::Header => 1,
            SegmentKind::Ordinary => 0,
        };
        for field in &self.fields[skip.min(self.fields.len())..] {
            out.push(self.delims.field);
            field.write_to(out);
        }
    }
}

/// 0-based over the field list: `segment[n]` is `field(n + 1)`, so in
/// `PID||||Smith` the value sits at `segment[3]` and `segment[4]` panics.
/// Use [`Segment::field`] for HL7 positions or when the field may be absent.
impl Index<usize> for Segment {
    type Output = Field;

    fn index(&self, index: usize) -> &Field {
        &self.fields[index]
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ============================================================================
// Message
// ============================================================================

/// Segment terminator used when serializing.
pub const SEGMENT_TERMINATOR: &str = "\r";

/// A complete message: an `MSH` header followed by zero or more segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    segments: Arc<[Segment]>,
    delims: DelimiterSet,
}

impl Message {
    /// Fails with [`Error::NoValidHeader`] unless the first segment is `MSH`.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        let delims = match segments.first() {
            Some(first) if first.id.is_message_header() && first.is_header() => first.delims,
            _ => return Err(Error::NoValidHeader),
        };
        Ok(Message {
            segments: segments.into(),
            delims,
        })
    }

    pub fn header(&self) -> &Segment {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All segments with identifier `id`, in order.
    pub fn segments_by_id(&self, id: &str) -> Vec<&Segment> {
        self.segments.iter().filter(|s| s.id == id).collect()
    }

    /// First segment with identifier `id`.
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn delimiters(&self) -> &DelimiterSet {
        &self.delims
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a message holds at least its header.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// MSH-9 as wire text, for example `ADT^A01`.
    pub fn message_type(&self) -> Option<String> {
        self.header_field(9).map(Field::serialize)
    }

    /// MSH-10, the message control id.
    pub fn control_id(&self) -> Option<String> {
        self.header_value(10)
    }

    /// MSH-12, the version id.
    pub fn version(&self) -> Option<String> {
        self.header_value(12)
    }

    fn header_field(&self, n: usize) -> Option<&Field> {
        self.header().field(n).filter(|f| !f.is_empty())
    }

    fn header_value(&self, n: usize) -> Option<String> {
        self.header_field(n)
            .and_then(|f| f.value().ok())
            .map(Cow::into_owned)
    }

    /// New message with `segment` appended.
    pub fn with_segment(&self, segment: Segment) -> Message {
        let mut segments = self.segments.to_vec();
        segments.push(segment);
        Message {
            segments: segments.into(),
            delims: self.delims,
        }
    }

    /// New message with the segment at `index` (0-based) replaced.
    pub fn replace_segment(&self, index: usize, segment: Segment) -> Result<Message> {
        let mut segments = self.segments.to_vec();
        match segments.get_mut(index) {
            Some(slot) => *slot = segment,
            None => {
                return Err(Error::InvalidPath(format!(
                    "segment index {index} out of range"
                )))
            }
        }
        Message::new(segments)
    }

    /// Wire text with segments joined by CR.
    pub fn serialize(&self) -> String {
        self.serialize_with(SEGMENT_TERMINATOR)
    }

    pub fn serialize_with(&self, terminator: &str) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push_str(terminator);
            }
            segment.write_to(&mut out);
        }
        out
    }
}

impl Index<usize> for Message {
    type Output = Segment;

    fn index(&self, index: usize) -> &Segment {
        &self.segments[index]
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> DelimiterSet {
        DelimiterSet::default()
    }

    fn header() -> Segment {
        Segment::new(
            "MSH",
            vec![
                Field::from_value("APP", d()),
                Field::from_value("FAC", d()),
            ],
            d(),
        )
        .unwrap()
    }

    #[test]
    fn test_subcomponent_escapes() {
        let sub = Subcomponent::new("a|b", d());
        assert_eq!(sub.raw(), "a\\F\\b");
        assert_eq!(sub.value().unwrap(), "a|b");
    }

    #[test]
    fn test_empty_normalisation() {
        let sub = Subcomponent::from_raw("", d());
        let comp = Component::new(vec![sub], d());
        let built = Field::new(vec![Repetition::new(vec![comp], d())], d());
        assert_eq!(built, Field::empty(d()));
        assert!(built.is_empty());
        assert_eq!(built.serialize(), "");
        assert_eq!(built.value().unwrap(), "");
    }

    #[test]
    fn test_component_serialize() {
        let comp = Component::new(
            vec![
                Subcomponent::new("a", d()),
                Subcomponent::new("", d()),
                Subcomponent::new("c", d()),
            ],
            d(),
        );
        assert_eq!(comp.serialize(), "a&&c");
        assert_eq!(comp.subcomponent(3).unwrap().raw(), "c");
        assert!(comp.subcomponent(0).is_none());
    }

    #[test]
    fn test_field_serialize() {
        let field = Field::new(
            vec![
                Repetition::new(
                    vec![
                        Component::from_value("Doe", d()),
                        Component::from_value("Jane", d()),
                    ],
                    d(),
                ),
                Repetition::new(vec![Component::from_value("Roe", d())], d()),
            ],
            d(),
        );
        assert_eq!(field.serialize(), "Doe^Jane~Roe");
        assert_eq!(field.value().unwrap(), "Doe");
        assert_eq!(field.repetition(2).unwrap().serialize(), "Roe");
    }

    #[test]
    fn test_header_segment() {
        let msh = header();
        assert!(msh.is_header());
        assert_eq!(msh.field(1).unwrap().serialize(), "|");
        assert_eq!(msh.encoding_characters(), Some("^~\\&"));
        assert_eq!(msh.field(3).unwrap().serialize(), "APP");
        assert_eq!(msh.serialize(), "MSH|^~\\&|APP|FAC");
    }

    #[test]
    fn test_segment_with_field() {
        let pid = Segment::new("PID", vec![Field::from_value("1", d())], d()).unwrap();
        let updated = pid.with_field(3, Field::from_value("123", d())).unwrap();
        assert_eq!(pid.serialize(), "PID|1");
        assert_eq!(updated.serialize(), "PID|1||123");
        assert!(header().with_field(2, Field::empty(d())).is_err());
    }

    #[test]
    fn test_index_is_zero_based() {
        let fields = vec![
            Field::empty(d()),
            Field::empty(d()),
            Field::empty(d()),
            Field::from_value("Smith", d()),
        ];
        let pid = Segment::new("PID", fields, d()).unwrap();
        assert_eq!(pid.serialize(), "PID||||Smith");
        assert_eq!(pid[3], *pid.field(4).unwrap());
        assert_eq!(pid[3].value().unwrap(), "Smith");
        assert!(pid.field(5).is_none());
    }

    #[test]
    fn test_empty_positions_keep_separators() {
        let field = Field::new(
            vec![
                Repetition::new(vec![Component::empty(d()), Component::empty(d())], d()),
                Repetition::empty(d()),
            ],
            d(),
        );
        assert_eq!(field.serialize(), "^~");
    }

    #[test]
    fn test_message_requires_header() {
        let pid = Segment::new("PID", vec![], d()).unwrap();
        assert_eq!(Message::new(vec![]), Err(Error::NoValidHeader));
        assert_eq!(Message::new(vec![pid.clone()]), Err(Error::NoValidHeader));
        let bhs = Segment::new("BHS", vec![], d()).unwrap();
        assert_eq!(Message::new(vec![bhs]), Err(Error::NoValidHeader));

        let msg = Message::new(vec![header(), pid]).unwrap();
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.serialize(), "MSH|^~\\&|APP|FAC\rPID");
        assert!(msg.replace_segment(0, Segment::new("EVN", vec![], d()).unwrap()).is_err());
    }

    #[test]
    fn test_with_segment_shares_structure() {
        let msg = Message::new(vec![header()]).unwrap();
        let evn = Segment::new("EVN", vec![Field::from_value("A01", d())], d()).unwrap();
        let longer = msg.with_segment(evn);
        assert_eq!(msg.len(), 1);
        assert_eq!(longer.len(), 2);
        assert!(Arc::ptr_eq(&msg.header().fields, &longer.header().fields));
    }
}
