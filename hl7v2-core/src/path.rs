//! Positional paths: `SEG[(occurrence)]-field[(repetition)][.component[.subcomponent]]`.
//!
//! Every number is 1-based, as in HL7 documentation. `PID-3(2).1` is the
//! first component of the second repetition of PID-3; `OBX(2)-5` is field 5
//! of the second OBX segment.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::segment_id::SegmentId;
use crate::value::{Component, Message, Repetition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub segment: SegmentId,
    pub occurrence: usize,
    pub field: usize,
    pub repetition: usize,
    pub component: Option<usize>,
    pub subcomponent: Option<usize>,
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let invalid = || Error::InvalidPath(path.to_string());

        let (head, tail) = path.split_once('-').ok_or_else(invalid)?;
        let (id, occurrence) = split_index(head).ok_or_else(invalid)?;
        let segment = SegmentId::new(id).map_err(|_| invalid())?;

        let mut parts = tail.split('.');
        let (field, repetition) = parts.next().and_then(split_index).ok_or_else(invalid)?;
        let field = position(field).ok_or_else(invalid)?;
        let component = parts.next().map(|p| position(p).ok_or_else(invalid)).transpose()?;
        let subcomponent = parts.next().map(|p| position(p).ok_or_else(invalid)).transpose()?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(FieldPath {
            segment,
            occurrence,
            field,
            repetition,
            component,
            subcomponent,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment)?;
        if self.occurrence != 1 {
            write!(f, "({})", self.occurrence)?;
        }
        write!(f, "-{}", self.field)?;
        if self.repetition != 1 {
            write!(f, "({})", self.repetition)?;
        }
        if let Some(c) = self.component {
            write!(f, ".{c}")?;
        }
        if let Some(s) = self.subcomponent {
            write!(f, ".{s}")?;
        }
        Ok(())
    }
}

/// `"PID(2)"` → `("PID", 2)`; no suffix means 1.
fn split_index(text: &str) -> Option<(&str, usize)> {
    match text.split_once('(') {
        None => Some((text, 1)),
        Some((name, rest)) => {
            let n = position(rest.strip_suffix(')')?)?;
            Some((name, n))
        }
    }
}

fn position(text: &str) -> Option<usize> {
    text.parse().ok().filter(|&n| n > 0)
}

impl Message {
    /// Look up a value by path.
    ///
    /// Returns the decoded text when the addressed node is a single value,
    /// and the wire text when it still has structure below it. Fields 1 and
    /// 2 of a header segment come back verbatim.
    ///
    /// ```
    /// use hl7v2_core::Parser;
    ///
    /// let msg = Parser::new().parse("MSH|^~\\&|A\rPID|1||123^^^H^MR~456").unwrap();
    /// assert_eq!(msg.get("PID-3.4").unwrap().as_deref(), Some("H"));
    /// assert_eq!(msg.get("PID-3(2)").unwrap().as_deref(), Some("456"));
    /// assert_eq!(msg.get("PID-3").unwrap().as_deref(), Some("123^^^H^MR"));
    /// assert_eq!(msg.get("PV1-2").unwrap(), None);
    /// ```
    pub fn get(&self, path: &str) -> Result<Option<String>> {
        let path: FieldPath = path.parse()?;
        self.resolve(&path)
    }

    /// Look up a parsed path. An occurrence of 0 is `InvalidPath`; other
    /// zero positions address nothing and answer `None`.
    pub fn resolve(&self, path: &FieldPath) -> Result<Option<String>> {
        let occurrence = path
            .occurrence
            .checked_sub(1)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        let segment = self
            .segments()
            .iter()
            .filter(|s| s.id() == path.segment)
            .nth(occurrence);
        let Some(field) = segment.and_then(|s| s.field(path.field)) else {
            return Ok(None);
        };

        if segment.is_some_and(|s| s.is_header()) && path.field <= 2 {
            return Ok(Some(field.serialize()));
        }

        let Some(repetition) = field.repetition(path.repetition) else {
            // An empty field still answers its first repetition.
            return Ok((path.repetition == 1 && field.is_empty()).then(String::new));
        };
        let Some(n) = path.component else {
            return repetition_text(repetition).map(Some);
        };
        let Some(component) = repetition.component(n) else {
            return Ok(None);
        };
        match path.subcomponent {
            None => component_text(component).map(Some),
            Some(n) => component
                .subcomponent(n)
                .map(|sub| sub.value().map(Cow::into_owned))
                .transpose(),
        }
    }
}

fn repetition_text(repetition: &Repetition) -> Result<String> {
    match repetition.components() {
        [only] => component_text(only),
        _ => Ok(repetition.serialize()),
    }
}

fn component_text(component: &Component) -> Result<String> {
    match component.subcomponents() {
        [_] | [] => component.value().map(Cow::into_owned),
        _ => Ok(component.serialize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    const TEXT: &str = "MSH|^~\\&|A|B|C|D|20240101||ADT^A01|1|P|2.5\r\
                        PID|1||123^^^H^MR~456||Doe^Jane||||||1 Main\\S\\Rear&Apt 2\r\
                        OBX|1|ST|||first\r\
                        OBX|2|ST|||second";

    fn msg() -> Message {
        Parser::new().parse(TEXT).unwrap()
    }

    fn get(path: &str) -> Option<String> {
        msg().get(path).unwrap()
    }

    #[test]
    fn test_parse_path() {
        let path: FieldPath = "OBX(2)-5(3).1.2".parse().unwrap();
        assert_eq!(path.segment, "OBX");
        assert_eq!(path.occurrence, 2);
        assert_eq!(path.field, 5);
        assert_eq!(path.repetition, 3);
        assert_eq!(path.component, Some(1));
        assert_eq!(path.subcomponent, Some(2));
        assert_eq!(path.to_string(), "OBX(2)-5(3).1.2");
        assert_eq!("PID-3".parse::<FieldPath>().unwrap().to_string(), "PID-3");
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["", "PID", "PID-", "PID-0", "PI-3", "PID-3.", "PID-3.1.2.3", "PID(0)-3", "PID-3(x)", "PID-a"] {
            assert!(
                matches!(bad.parse::<FieldPath>(), Err(Error::InvalidPath(_))),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(get("PID-3.1").as_deref(), Some("123"));
        assert_eq!(get("PID-3.4").as_deref(), Some("H"));
        assert_eq!(get("PID-3").as_deref(), Some("123^^^H^MR"));
        assert_eq!(get("PID-3(2)").as_deref(), Some("456"));
        assert_eq!(get("PID-5.2").as_deref(), Some("Jane"));
        assert_eq!(get("MSH-9.2").as_deref(), Some("A01"));
        assert_eq!(get("OBX(2)-5").as_deref(), Some("second"));
    }

    #[test]
    fn test_decoding_and_subcomponents() {
        assert_eq!(get("PID-11.1.1").as_deref(), Some("1 Main^Rear"));
        assert_eq!(get("PID-11.1.2").as_deref(), Some("Apt 2"));
        assert_eq!(get("PID-11").as_deref(), Some("1 Main\\S\\Rear&Apt 2"));
    }

    #[test]
    fn test_header_declaration_verbatim() {
        assert_eq!(get("MSH-1").as_deref(), Some("|"));
        assert_eq!(get("MSH-2").as_deref(), Some("^~\\&"));
    }

    #[test]
    fn test_missing() {
        assert_eq!(get("PID-2").as_deref(), Some(""));
        assert_eq!(get("PID-99"), None);
        assert_eq!(get("PID-3(3)"), None);
        assert_eq!(get("PID-3.9"), None);
        assert_eq!(get("OBX(3)-1"), None);
        assert_eq!(get("PV1-2"), None);
    }

    #[test]
    fn test_hand_built_zero_positions() {
        let msg = msg();
        let mut path: FieldPath = "OBX-5".parse().unwrap();
        path.occurrence = 0;
        assert!(matches!(msg.resolve(&path), Err(Error::InvalidPath(_))));

        let mut path: FieldPath = "PID-3".parse().unwrap();
        path.field = 0;
        assert_eq!(msg.resolve(&path), Ok(None));
        path.field = 3;
        path.component = Some(0);
        assert_eq!(msg.resolve(&path), Ok(None));
    }
}
