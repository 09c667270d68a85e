use crate::cdc_error;
use crate::decoding::escape::unquote_prefix;
use crate::error::{CdcError, CdcResult, ErrorKind};

/// Characters that end a bare identifier.
const IDENTIFIER_TERMINATORS: &[char] = &['.', '[', ':', ','];

/// Raw value token of a column, before conversion to its logical type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// The unquoted `null` literal.
    Null,
    /// A single-quoted literal, already unescaped.
    Quoted(String),
    /// An unquoted literal such as a number or `true`.
    Bare(String),
}

/// Left-to-right cursor over a single logical decoding record.
///
/// Every failing method reports the byte offset where scanning stopped so that a rejected record
/// can be located precisely.
#[derive(Debug)]
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consumes `c` if it is the next character.
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            return true;
        }

        false
    }

    /// Consumes `s` if the remaining input starts with it.
    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            return true;
        }

        false
    }

    pub fn expect(&mut self, c: char) -> CdcResult<()> {
        if self.eat(c) {
            return Ok(());
        }

        Err(self.error(format!("Expected `{c}`")))
    }

    pub fn expect_str(&mut self, s: &str) -> CdcResult<()> {
        if self.eat_str(s) {
            return Ok(());
        }

        Err(self.error(format!("Expected `{s}`")))
    }

    /// Skips whitespace and returns how many characters were skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        let skipped = rest.len() - trimmed.len();
        self.pos += skipped;

        rest[..skipped].chars().count()
    }

    /// Reads a double-quoted or bare identifier.
    pub fn identifier(&mut self) -> CdcResult<String> {
        if self.peek() == Some('"') {
            let Some((identifier, consumed)) = unquote_prefix(self.rest(), '"') else {
                return Err(self.error("Unterminated quoted identifier"));
            };
            self.pos += consumed;

            return Ok(identifier);
        }

        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || IDENTIFIER_TERMINATORS.contains(&c))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("Expected an identifier"));
        }
        self.pos += end;

        Ok(rest[..end].to_owned())
    }

    /// Reads a bracketed type hint, e.g. `[character varying(20)]`.
    ///
    /// The hint runs until the first `]` that is directly followed by `:`, which allows hints
    /// that contain brackets themselves such as `integer[]`.
    pub fn type_hint(&mut self) -> CdcResult<String> {
        self.expect('[')?;

        let Some(end) = self.rest().find("]:") else {
            return Err(self.error("Unterminated type hint"));
        };
        let hint = self.rest()[..end].to_owned();
        self.pos += end + 1;

        Ok(hint)
    }

    /// Reads a value token that ends at whitespace, at `,` or at the end of the record.
    pub fn value(&mut self) -> CdcResult<RawValue> {
        if self.peek() == Some('\'') {
            let Some((value, consumed)) = unquote_prefix(self.rest(), '\'') else {
                return Err(self.error("Unterminated quoted value"));
            };
            self.pos += consumed;

            return Ok(RawValue::Quoted(value));
        }

        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("Expected a value"));
        }
        self.pos += end;

        match &rest[..end] {
            "null" => Ok(RawValue::Null),
            bare => Ok(RawValue::Bare(bare.to_owned())),
        }
    }

    /// Builds a parse error pointing at the current position.
    pub fn error(&self, reason: impl AsRef<str>) -> CdcError {
        cdc_error!(
            ErrorKind::ParseError,
            "Malformed logical decoding record",
            format!(
                "{} at byte {} of `{}`",
                reason.as_ref(),
                self.pos,
                self.input
            )
        )
    }
}
