//! Segment parser: one terminator-split line → one [`Segment`].
//!
//! The identifier decides the segment kind once, here. Header-family lines
//! (`MSH`, `BHS`, `FHS`) keep their delimiter declaration as one opaque
//! subcomponent; every other line is split on field, repetition, component
//! and subcomponent separators in that order.

use crate::delimiters::DelimiterSet;
use crate::error::{Error, Result};
use crate::escape;
use crate::segment_id::SegmentId;
use crate::value::{Component, Field, Repetition, Segment, Subcomponent};

/// Parse one segment line.
///
/// With `check_escapes`, every subcomponent outside the header declaration
/// must decode cleanly or the whole segment fails with the escape error.
pub fn parse_segment(line: &str, delims: &DelimiterSet, check_escapes: bool) -> Result<Segment> {
    let id = parse_identifier(line, delims)?;
    // parse_identifier guarantees 3 ASCII bytes up front.
    let body = &line[3..];

    if id.is_header() {
        return parse_header(id, body, delims, check_escapes);
    }

    let fields = match body.strip_prefix(delims.field) {
        None => Vec::new(),
        Some(rest) => rest
            .split(delims.field)
            .map(|text| parse_field(text, delims, check_escapes))
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(Segment::ordinary(id, fields, *delims))
}

/// Validate the 3-character prefix and what follows it.
pub fn parse_identifier(line: &str, delims: &DelimiterSet) -> Result<SegmentId> {
    if line.chars().count() < 3 {
        return Err(Error::SegmentTooShort(line.to_string()));
    }
    let id = line
        .get(..3)
        .and_then(|prefix| SegmentId::new(prefix).ok())
        .ok_or_else(|| Error::InvalidSegmentIdentifier(prefix_of(line)))?;

    match line[3..].chars().next() {
        None => Ok(id),
        Some(c) if c == delims.field => Ok(id),
        Some(_) => Err(Error::InvalidSegmentIdentifier(prefix_of(line))),
    }
}

/// Up to the first three characters of `line`, used in diagnostics.
pub fn prefix_of(line: &str) -> String {
    line.chars().take(3).collect()
}

fn parse_header(
    id: SegmentId,
    body: &str,
    delims: &DelimiterSet,
    check_escapes: bool,
) -> Result<Segment> {
    let Some(rest) = body.strip_prefix(delims.field) else {
        return Err(Error::MalformedHeader(format!(
            "{id} does not use field separator {:?}",
            delims.field
        )));
    };

    let mut parts = rest.split(delims.field);
    let declared = parts.next().unwrap_or_default();
    if declared != delims.encoding_characters() {
        return Err(Error::MalformedHeader(format!(
            "{id} declares {declared:?}, expected {:?}",
            delims.encoding_characters()
        )));
    }

    let fields = parts
        .map(|text| parse_field(text, delims, check_escapes))
        .collect::<Result<Vec<_>>>()?;
    Ok(Segment::header(id, fields, *delims))
}

/// Split one field's text into repetitions, components and subcomponents.
pub fn parse_field(text: &str, delims: &DelimiterSet, check_escapes: bool) -> Result<Field> {
    let d = *delims;
    if text.is_empty() {
        return Ok(Field::empty(d));
    }

    let mut repetitions = Vec::new();
    for rep in text.split(d.repetition) {
        let mut components = Vec::new();
        for comp in rep.split(d.component) {
            let mut subs = Vec::new();
            for sub in comp.split(d.subcomponent) {
                if check_escapes {
                    escape::decode(sub, &d)?;
                }
                subs.push(Subcomponent::from_raw(sub, d));
            }
            components.push(Component::new(subs, d));
        }
        repetitions.push(Repetition::new(components, d));
    }
    Ok(Field::new(repetitions, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d() -> DelimiterSet {
        DelimiterSet::default()
    }

    fn parse(line: &str) -> Result<Segment> {
        parse_segment(line, &d(), true)
    }

    #[test]
    fn test_ordinary_segment() {
        let seg = parse("PID|1||123^^^H^MR||Doe^Jane").unwrap();
        assert_eq!(seg.id(), "PID");
        assert_eq!(seg.len(), 5);
        assert_eq!(seg.field(3).unwrap().serialize(), "123^^^H^MR");
        assert_eq!(seg.field(3).unwrap().component(4).unwrap().value().unwrap(), "H");
        assert_eq!(seg.field(5).unwrap().component(2).unwrap().value().unwrap(), "Jane");
    }

    #[test]
    fn test_empty_fields_preserved() {
        let seg = parse("PID||||Smith").unwrap();
        assert_eq!(seg.len(), 4);
        assert!(seg.field(3).unwrap().is_empty());
        assert_eq!(seg.field(4).unwrap().value().unwrap(), "Smith");
        assert_eq!(seg.serialize(), "PID||||Smith");

        let trailing = parse("OBX|1|||").unwrap();
        assert_eq!(trailing.len(), 4);
        assert_eq!(trailing.serialize(), "OBX|1|||");
    }

    #[test]
    fn test_identifier_only() {
        let seg = parse("ZZZ").unwrap();
        assert!(seg.is_empty());
        assert_eq!(seg.serialize(), "ZZZ");
    }

    #[test]
    fn test_repetitions_and_subcomponents() {
        let seg = parse("PID|1||A&B^C~D").unwrap();
        let field = seg.field(3).unwrap();
        assert_eq!(field.repetitions().len(), 2);
        let first = field.component(1).unwrap();
        assert_eq!(first.subcomponents().len(), 2);
        assert_eq!(first.subcomponent(2).unwrap().raw(), "B");
        assert_eq!(field.repetition(2).unwrap().serialize(), "D");
    }

    #[test]
    fn test_header_declaration_is_opaque() {
        let seg = parse("MSH|^~\\&|APP|FAC").unwrap();
        assert!(seg.is_header());
        assert_eq!(seg.field(1).unwrap().serialize(), "|");
        assert_eq!(seg.encoding_characters(), Some("^~\\&"));
        assert_eq!(seg.field(2).unwrap().repetitions().len(), 1);
        assert_eq!(seg.field(3).unwrap().value().unwrap(), "APP");
        assert_eq!(seg.serialize(), "MSH|^~\\&|APP|FAC");
    }

    #[test]
    fn test_header_mismatched_declaration() {
        assert!(matches!(
            parse("MSH|#~\\&|APP"),
            Err(Error::MalformedHeader(_))
        ));
        assert!(matches!(parse("MSH"), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(parse("PI"), Err(Error::SegmentTooShort("PI".into())));
        assert_eq!(parse(""), Err(Error::SegmentTooShort(String::new())));
    }

    #[test]
    fn test_invalid_identifier() {
        assert_eq!(
            parse("P-D|1"),
            Err(Error::InvalidSegmentIdentifier("P-D".into()))
        );
        assert_eq!(
            parse("PIDX|1"),
            Err(Error::InvalidSegmentIdentifier("PID".into()))
        );
        assert_eq!(
            parse("éAB|1"),
            Err(Error::InvalidSegmentIdentifier("éAB".into()))
        );
    }

    #[test]
    fn test_escape_checking() {
        assert!(matches!(
            parse("NTE|1||bad \\Q\\ token"),
            Err(Error::UnknownEscapeSequence(_))
        ));
        let lenient = parse_segment("NTE|1||bad \\Q\\ token", &d(), false).unwrap();
        assert_eq!(lenient.field(3).unwrap().serialize(), "bad \\Q\\ token");
    }

    #[test]
    fn test_custom_delimiters() {
        let delims = DelimiterSet::parse("#~\\&", '|').unwrap();
        let seg = parse_segment("PID|1||A#B^C", &delims, true).unwrap();
        let field = seg.field(3).unwrap();
        assert_eq!(field.component(1).unwrap().value().unwrap(), "A");
        assert_eq!(field.component(2).unwrap().value().unwrap(), "B^C");
    }
}
