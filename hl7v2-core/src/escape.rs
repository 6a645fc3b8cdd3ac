//! Escape codec: literal delimiter/control characters <-> escaped text.
//!
//! | token    | meaning                 |
//! |----------|-------------------------|
//! | `\F\`    | field separator         |
//! | `\S\`    | component separator     |
//! | `\T\`    | subcomponent separator  |
//! | `\R\`    | repetition separator    |
//! | `\E\`    | escape character        |
//! | `\.br\`  | line break              |
//! | `\Xhh\`  | literal byte(s), hex    |
//!
//! The escape character shown is the default; the codec always uses the one
//! declared by the message's [`DelimiterSet`].

use std::borrow::Cow;

use crate::delimiters::DelimiterSet;
use crate::error::{Error, Result};

/// Decode escaped wire text into its literal value.
pub fn decode<'a>(text: &'a str, delims: &DelimiterSet) -> Result<Cow<'a, str>> {
    if !text.contains(delims.escape) {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;

    while let Some(open) = rest.find(delims.escape) {
        out.push_str(&rest[..open]);
        let after_open = open + delims.escape.len_utf8();
        let Some(close) = rest[after_open..].find(delims.escape) else {
            return Err(Error::UnterminatedEscape {
                offset: offset + open,
            });
        };
        let token = &rest[after_open..after_open + close];
        decode_token(token, delims, &mut out)?;

        let consumed = after_open + close + delims.escape.len_utf8();
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn decode_token(token: &str, delims: &DelimiterSet, out: &mut String) -> Result<()> {
    match token {
        "F" => out.push(delims.field),
        "S" => out.push(delims.component),
        "T" => out.push(delims.subcomponent),
        "R" => out.push(delims.repetition),
        "E" => out.push(delims.escape),
        ".br" => out.push('\n'),
        _ => {
            let hex = token
                .strip_prefix('X')
                .filter(|h| !h.is_empty() && h.len() % 2 == 0)
                .ok_or_else(|| Error::UnknownEscapeSequence(token.to_string()))?;
            for pair in hex.as_bytes().chunks(2) {
                let byte = std::str::from_utf8(pair)
                    .ok()
                    .and_then(|p| u8::from_str_radix(p, 16).ok())
                    .ok_or_else(|| Error::UnknownEscapeSequence(token.to_string()))?;
                out.push(char::from(byte));
            }
        }
    }
    Ok(())
}

/// Escape a literal value for the wire.
///
/// The output never contains a delimiter character outside an escape token.
pub fn encode<'a>(text: &'a str, delims: &DelimiterSet) -> Cow<'a, str> {
    if !needs_escaping(text, delims) {
        return Cow::Borrowed(text);
    }

    let esc = delims.escape;
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        let token = if c == delims.field {
            "F"
        } else if c == delims.component {
            "S"
        } else if c == delims.subcomponent {
            "T"
        } else if c == delims.repetition {
            "R"
        } else if c == esc {
            "E"
        } else if c == '\n' {
            ".br"
        } else if c == '\r' {
            "X0D"
        } else {
            out.push(c);
            continue;
        };
        out.push(esc);
        out.push_str(token);
        out.push(esc);
    }
    Cow::Owned(out)
}

/// True if [`encode`] would change `text`.
#[inline]
pub fn needs_escaping(text: &str, delims: &DelimiterSet) -> bool {
    text.chars()
        .any(|c| delims.is_delimiter(c) || c == '\n' || c == '\r')
}
