//! The five special characters of an HL7 v2 message.
//!
//! Delimiters are data, not grammar: the header line declares them in its
//! first eight characters (`MSH|^~\&`), and everything after that point on the
//! same line is already split with the declared set.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Field, component, repetition, escape, and subcomponent separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelimiterSet {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl DelimiterSet {
    /// Length of the encoding declaration carried in the header's second field.
    pub const ENCODING_LEN: usize = 4;

    /// Parse the 4-character encoding declaration (`^~\&`) together with the
    /// field separator that precedes it.
    pub fn parse(encoding_field: &str, field_separator: char) -> Result<Self> {
        let mut chars = encoding_field.chars();
        let (Some(component), Some(repetition), Some(escape), Some(subcomponent), None) = (
            chars.next(),
            chars.next(),
            chars.next(),
            chars.next(),
            chars.next(),
        ) else {
            return Err(Error::MalformedHeader(format!(
                "encoding characters must be exactly 4, got {encoding_field:?}"
            )));
        };

        let set = DelimiterSet {
            field: field_separator,
            component,
            repetition,
            escape,
            subcomponent,
        };
        set.check()?;
        Ok(set)
    }

    /// Discover the delimiters from a header-family line such as
    /// `MSH|^~\&|SENDER|...`.
    pub fn from_header_line(line: &str) -> Result<Self> {
        let mut chars = line.char_indices().skip(3);
        let Some((sep_idx, field_separator)) = chars.next() else {
            return Err(Error::MalformedHeader(format!(
                "header too short to declare delimiters: {line:?}"
            )));
        };
        let rest = &line[sep_idx + field_separator.len_utf8()..];
        let encoding = rest.split(field_separator).next().unwrap_or_default();
        Self::parse(encoding, field_separator)
    }

    /// True if `c` is one of the five special characters.
    #[inline]
    pub fn is_delimiter(&self, c: char) -> bool {
        c == self.field
            || c == self.component
            || c == self.repetition
            || c == self.escape
            || c == self.subcomponent
    }

    /// The 4-character declaration as written in the header (`^~\&`).
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    fn check(&self) -> Result<()> {
        let all = [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ];
        for (i, c) in all.iter().enumerate() {
            if matches!(c, '\r' | '\n') || c.is_alphanumeric() {
                return Err(Error::MalformedHeader(format!(
                    "{c:?} cannot be used as a delimiter"
                )));
            }
            if all[i + 1..].contains(c) {
                return Err(Error::MalformedHeader(format!(
                    "delimiter {c:?} declared twice"
                )));
            }
        }
        Ok(())
    }
}

impl Default for DelimiterSet {
    fn default() -> Self {
        DelimiterSet {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let d = DelimiterSet::default();
        assert_eq!(d.field, '|');
        assert_eq!(d.encoding_characters(), "^~\\&");
    }

    #[test]
    fn test_parse() {
        let d = DelimiterSet::parse("#~\\&", '|').unwrap();
        assert_eq!(d.component, '#');
        assert!(d.is_delimiter('#'));
        assert!(!d.is_delimiter('^'));
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!(matches!(
            DelimiterSet::parse("^~\\", '|'),
            Err(Error::MalformedHeader(_))
        ));
        assert!(matches!(
            DelimiterSet::parse("^~\\&#", '|'),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_parse_duplicate() {
        assert!(matches!(
            DelimiterSet::parse("^^\\&", '|'),
            Err(Error::MalformedHeader(_))
        ));
        assert!(matches!(
            DelimiterSet::parse("|~\\&", '|'),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_from_header_line() {
        let d = DelimiterSet::from_header_line("MSH*%~\\&*APP").unwrap();
        assert_eq!(d.field, '*');
        assert_eq!(d.component, '%');

        let d = DelimiterSet::from_header_line("MSH|^~\\&").unwrap();
        assert_eq!(d, DelimiterSet::default());

        assert!(DelimiterSet::from_header_line("MSH").is_err());
        assert!(DelimiterSet::from_header_line("MSH|^~|X").is_err());
    }
}
