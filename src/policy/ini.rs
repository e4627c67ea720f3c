//! Lenient reader for the `[section]` / `key = value` policy format
//!
//! Every entry is handed to a callback together with its section. A line
//! the reader cannot make sense of, or that the callback rejects, does not
//! stop the parse: the remaining lines are still delivered and only the
//! number of the first offending line is reported back.
//!
//! ```text
//! ; comment            # comment
//! [patterns]
//! p1 = /dev/input/*    ──► handler("patterns", "p1", "/dev/input/*")
//! [attributes]
//! PRODUCT : 1234 ; c   ──► handler("attributes", "PRODUCT", "1234")
//!     5678             ──► handler("attributes", "PRODUCT", "5678")
//! ```
//!
//! An indented line following an entry continues it: it is delivered as
//! another value for the previous name in the same section.

const BOM: char = '\u{feff}';

/// Walk `text`, calling `handler(section, name, value)` for every entry.
///
/// The handler returns `false` to reject an entry. Returns `Err(line)` with
/// the 1-based number of the first rejected or malformed line.
pub fn parse<F>(text: &str, mut handler: F) -> Result<(), usize>
where
    F: FnMut(&str, &str, &str) -> bool,
{
    let mut section = "";
    let mut previous_name: Option<&str> = None;
    let mut first_error = None;

    for (index, raw) in text.lines().enumerate() {
        let raw = if index == 0 {
            raw.strip_prefix(BOM).unwrap_or(raw)
        } else {
            raw
        };
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        let continued = previous_name.filter(|_| raw.starts_with(char::is_whitespace));
        let accepted = if let Some(name) = continued {
            handler(section, name, strip_inline_comment(line).trim())
        } else if let Some(rest) = line.strip_prefix('[') {
            previous_name = None;
            match rest.find(']') {
                Some(end) => {
                    section = &rest[..end];
                    true
                }
                None => false,
            }
        } else {
            match split_entry(line) {
                Some((name, value)) => {
                    previous_name = Some(name);
                    handler(section, name, value)
                }
                None => false,
            }
        };

        if !accepted && first_error.is_none() {
            first_error = Some(index + 1);
        }
    }

    match first_error {
        Some(line) => Err(line),
        None => Ok(()),
    }
}

/// Split `name = value` / `name : value` on the first separator.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let at = line.find(|c| c == '=' || c == ':')?;
    let name = line[..at].trim();
    let value = strip_inline_comment(&line[at + 1..]).trim();
    Some((name, value))
}

/// An inline comment starts at a `;` that follows whitespace.
fn strip_inline_comment(value: &str) -> &str {
    let mut previous_blank = false;
    for (at, c) in value.char_indices() {
        if c == ';' && previous_blank {
            return &value[..at];
        }
        previous_blank = c.is_whitespace();
    }
    value
}
