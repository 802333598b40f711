//! Text escaping and number formatting for the line protocol.
//!
//! Special character rules follow the line protocol reference: commas,
//! spaces and equals signs are backslash-escaped in identifiers, double
//! quotes and backslashes in quoted string field values. Embedded newlines
//! cannot be represented at all and are rejected.

use crate::{error::CodecError, CodecResult};

fn check_newline(s: &str, what: &str) -> CodecResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(CodecError::Encoding(format!("{} contains a line break: {:?}", what, s)));
    }

    Ok(())
}

/// Escape a measurement name. Commas and spaces are escaped; equals signs
/// are allowed unescaped in measurements.
pub fn escape_measurement(s: &str) -> CodecResult<String> {
    check_newline(s, "measurement")?;

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | ',' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Escape a tag key, tag value or field key.
pub fn escape_identifier(s: &str) -> CodecResult<String> {
    check_newline(s, "identifier")?;

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | ',' | ' ' | '=' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Escape a string field value and wrap it in double quotes.
/// Identifier escaping never applies inside the quotes.
pub fn escape_string_field(s: &str) -> CodecResult<String> {
    check_newline(s, "string field value")?;

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');

    Ok(out)
}

/// Render an integer field value. The trailing `i` marker distinguishes
/// integer fields from floats on the wire.
pub fn format_integer(n: i64) -> String {
    format!("{}i", n)
}

/// Render a float field value. `Display` for `f64` produces the shortest
/// decimal text that round-trips to the same value.
pub fn format_float(d: f64) -> String {
    format!("{}", d)
}

/// Render a boolean field value. Bare `true`/`false`, unquoted, no marker.
pub fn format_bool(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}
