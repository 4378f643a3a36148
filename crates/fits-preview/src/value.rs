//! Header value parsing.

use alloc::string::String;
use core::str;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `T` or `F`.
    Logical(bool),
    Integer(i64),
    Float(f64),
    /// Content between single quotes, trailing blanks removed.
    String(String),
    /// `(real, imaginary)` pair; integer pairs are widened to floats.
    Complex(f64, f64),
}

impl Value {
    /// Returns the value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float, promoting integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse the value field (card bytes 10..80) of a card with a value indicator.
///
/// Returns the value and the trailing comment, or `None` when the field is
/// blank or unparseable. Real-world writers put comments after ` /` without
/// the space the standard asks for, so both forms are accepted.
pub fn parse_value(field: &[u8]) -> Option<(Value, Option<&str>)> {
    let start = field.iter().position(|&b| b != b' ')?;
    let field = &field[start..];

    if field[0] == b'\'' {
        let (text, rest) = parse_quoted(field);
        return Some((Value::String(text), find_comment(rest)));
    }

    let (value_part, comment) = match find_separator(field) {
        Some(idx) => (&field[..idx], find_comment(&field[idx..])),
        None => (field, None),
    };
    let text = str::from_utf8(value_part).ok()?.trim();
    parse_scalar(text).map(|v| (v, comment))
}

/// Read a quoted string starting at `field[0] == '\''`.
///
/// A doubled quote is a literal quote. A missing closing quote is tolerated.
/// Returns the content and the bytes after the closing quote.
fn parse_quoted(field: &[u8]) -> (String, &[u8]) {
    let mut text = String::new();
    let mut i = 1;
    while i < field.len() {
        match field[i] {
            b'\'' if field.get(i + 1) == Some(&b'\'') => {
                text.push('\'');
                i += 2;
            }
            b'\'' => {
                i += 1;
                break;
            }
            b => {
                text.push(b as char);
                i += 1;
            }
        }
    }
    let trimmed_len = text.trim_end().len();
    text.truncate(trimmed_len);
    (text, &field[i.min(field.len())..])
}

/// Index of the first `/` that starts a comment in an unquoted value field.
fn find_separator(field: &[u8]) -> Option<usize> {
    field.iter().position(|&b| b == b'/')
}

/// Extract the comment text from the bytes following a value.
fn find_comment(rest: &[u8]) -> Option<&str> {
    let slash = rest.iter().position(|&b| b == b'/')?;
    let text = str::from_utf8(&rest[slash + 1..]).ok()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_scalar(text: &str) -> Option<Value> {
    match text {
        "" => None,
        "T" => Some(Value::Logical(true)),
        "F" => Some(Value::Logical(false)),
        _ if text.starts_with('(') => parse_complex(text),
        _ => {
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::Integer(n));
            }
            parse_float(text).map(Value::Float)
        }
    }
}

fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (re, im) = inner.split_once(',')?;
    Some(Value::Complex(parse_float(re.trim())?, parse_float(im.trim())?))
}

/// Parse a float, accepting Fortran-style `D` exponents.
fn parse_float(text: &str) -> Option<f64> {
    if text.contains(['D', 'd']) {
        let normalized: String = text
            .chars()
            .map(|c| match c {
                'D' => 'E',
                'd' => 'e',
                other => other,
            })
            .collect();
        normalized.parse().ok()
    } else {
        text.parse().ok()
    }
}
