//! Quoting rules of the logical decoding text output.
//!
//! Values are quoted like SQL string literals (`'it''s'`) and identifiers like SQL identifiers
//! (`"My Table"`). Unquoting inverts quoting exactly.

/// Quotes `value` as a single-quoted literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    quote_with(value, '\'')
}

/// Quotes `value` as a double-quoted identifier, doubling embedded double quotes.
pub fn quote_identifier(value: &str) -> String {
    quote_with(value, '"')
}

/// Reads a quoted token at the start of `input`.
///
/// Returns the unescaped content and the number of bytes consumed, or [`None`] if `input` does
/// not start with `quote` or the token is never closed.
pub fn unquote_prefix(input: &str, quote: char) -> Option<(String, usize)> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c == quote => {}
        _ => return None,
    }

    let mut content = String::new();
    while let Some((index, c)) = chars.next() {
        if c != quote {
            content.push(c);
            continue;
        }

        // A doubled quote is an escaped quote, anything else closes the token.
        match chars.clone().next() {
            Some((_, next)) if next == quote => {
                content.push(quote);
                chars.next();
            }
            _ => return Some((content, index + quote.len_utf8())),
        }
    }

    None
}

fn quote_with(value: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push(quote);
    for c in value.chars() {
        if c == quote {
            quoted.push(quote);
        }
        quoted.push(c);
    }
    quoted.push(quote);

    quoted
}
