//! Byte input → text.
//!
//! Detection works on byte patterns only: a UTF-8 byte-order mark selects
//! UTF-8, 7-bit clean input is ASCII, and anything else is read as Latin-1,
//! which maps every byte and so never fails.

use std::borrow::Cow;

use crate::config::CharacterEncoding;
use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Pick an encoding for `bytes` by inspecting them.
pub fn detect(bytes: &[u8]) -> CharacterEncoding {
    if bytes.starts_with(UTF8_BOM) {
        CharacterEncoding::Utf8
    } else if bytes.is_ascii() {
        CharacterEncoding::Ascii
    } else {
        CharacterEncoding::Latin1
    }
}

/// `encoding` with `AutoDetect` resolved against `bytes`.
pub fn resolve(bytes: &[u8], encoding: CharacterEncoding) -> CharacterEncoding {
    match encoding {
        CharacterEncoding::AutoDetect => detect(bytes),
        fixed => fixed,
    }
}

/// True when text in `encoding` can be borrowed from the input bytes.
pub fn is_borrowable(encoding: CharacterEncoding) -> bool {
    matches!(encoding, CharacterEncoding::Utf8 | CharacterEncoding::Ascii)
}

/// Decode `bytes` with `encoding`, resolving `AutoDetect` first.
///
/// Returns the text and the encoding actually used. A leading UTF-8 BOM is
/// stripped. UTF-8 and ASCII input is borrowed; Latin-1 allocates.
pub fn decode(bytes: &[u8], encoding: CharacterEncoding) -> Result<(Cow<'_, str>, CharacterEncoding)> {
    let encoding = resolve(bytes, encoding);
    let text = match borrowed(bytes, encoding)? {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    };
    Ok((text, encoding))
}

/// Decode into a caller-provided buffer, appending to it.
///
/// Latin-1 is transcoded straight into `out`, so a pooled buffer is the only
/// allocation.
pub fn decode_into(bytes: &[u8], encoding: CharacterEncoding, out: &mut String) -> Result<CharacterEncoding> {
    let encoding = resolve(bytes, encoding);
    match borrowed(bytes, encoding)? {
        Some(text) => out.push_str(text),
        None => {
            out.reserve(bytes.len());
            out.extend(bytes.iter().map(|&b| char::from(b)));
        }
    }
    Ok(encoding)
}

/// Validated text for the borrowable encodings, `None` for Latin-1.
fn borrowed(bytes: &[u8], encoding: CharacterEncoding) -> Result<Option<&str>> {
    match encoding {
        CharacterEncoding::Utf8 => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            std::str::from_utf8(body)
                .map(Some)
                .map_err(|e| Error::InvalidEncoding {
                    encoding: encoding.name(),
                    offset: e.valid_up_to(),
                })
        }
        CharacterEncoding::Ascii => {
            if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
                return Err(Error::InvalidEncoding {
                    encoding: encoding.name(),
                    offset,
                });
            }
            // ASCII is valid UTF-8.
            Ok(Some(std::str::from_utf8(bytes).unwrap_or_default()))
        }
        CharacterEncoding::Latin1 | CharacterEncoding::AutoDetect => Ok(None),
    }
}
