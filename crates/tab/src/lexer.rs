//! Character-level scanner for the expression source.
//!
//! The parser drives this scanner the way a PEG drives its rules:
//! whitespace is skipped before every token, and failed speculative
//! scans restore the position themselves. Literal scanning lives here;
//! the grammar lives in `parse`.

use crate::{
    command::Lit,
    error::{Error, RunResult},
};

pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0 }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn peek_raw(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek_raw()?;
        self.pos += 1;
        Some(c)
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek_raw(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
    }

    /// Skips whitespace, then consumes `c` if it is next.
    pub fn eat(&mut self, c: u8) -> bool {
        self.skip_ws();
        if self.peek_raw() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skips whitespace, then consumes the whole token if it is next.
    pub fn eat_seq(&mut self, token: &[u8]) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Skips whitespace, then looks at the next byte without consuming.
    pub fn peek_is(&mut self, c: u8) -> bool {
        self.skip_ws();
        self.peek_raw() == Some(c)
    }

    pub fn peek_seq(&mut self, token: &[u8]) -> bool {
        self.skip_ws();
        self.src[self.pos..].starts_with(token)
    }

    /// True when the next token is a string literal quote.
    pub fn peek_string(&mut self) -> bool {
        self.skip_ws();
        matches!(self.peek_raw(), Some(b'"' | b'\''))
    }

    /// The unparsed remainder, lossily decoded and capped for messages.
    #[must_use]
    pub fn rest_display(&self) -> String {
        let rest = &self.src[self.pos.min(self.src.len())..];
        let shown = &rest[..rest.len().min(40)];
        String::from_utf8_lossy(shown).into_owned()
    }

    /// Scans a name: `@`, `$`, or an alphabetic head followed by
    /// alphanumerics and underscores.
    pub fn scan_name(&mut self) -> Option<&'a str> {
        self.skip_ws();
        match self.peek_raw()? {
            b'@' => {
                self.pos += 1;
                Some("@")
            }
            b'$' => {
                self.pos += 1;
                Some("$")
            }
            c if c.is_ascii_alphabetic() => {
                let start = self.pos;
                while matches!(self.peek_raw(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                    self.pos += 1;
                }
                std::str::from_utf8(&self.src[start..self.pos]).ok()
            }
            _ => None,
        }
    }

    /// Consumes `word` only when it is a whole name at the cursor.
    pub fn scan_keyword(&mut self, word: &str) -> bool {
        let save = self.pos;
        match self.scan_name() {
            Some(name) if name == word => true,
            _ => {
                self.pos = save;
                false
            }
        }
    }

    /// Scans a string literal, single or double quoted, decoding the
    /// `\t \n \r \e \\` escapes and escaped quotes.
    pub fn scan_string(&mut self) -> Option<RunResult<Vec<u8>>> {
        self.skip_ws();
        let quote = match self.peek_raw()? {
            q @ (b'"' | b'\'') => q,
            _ => return None,
        };
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Some(Err(Error::syntax("unterminated string"))),
                Some(c) if c == quote => return Some(Ok(out)),
                Some(b'\\') => match self.bump() {
                    None => return Some(Err(Error::syntax("unterminated string"))),
                    Some(b't') => out.push(b'\t'),
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'e') => out.push(0x1b),
                    Some(c) => out.push(c),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Scans a numeric literal. Plain integers default to `UInt`; a
    /// leading `-` or an `i`/`s`/`l` suffix makes an `Int`, a `u` suffix
    /// forces `UInt`, `0x…` is `UInt`, and anything with a point or an
    /// exponent is a `Real`.
    pub fn scan_number(&mut self) -> Option<RunResult<Lit>> {
        self.skip_ws();
        let start = self.pos;

        // hex form
        if self.src[self.pos..].starts_with(b"0x") {
            let digits_start = self.pos + 2;
            let mut end = digits_start;
            while matches!(self.src.get(end), Some(c) if c.is_ascii_hexdigit()) {
                end += 1;
            }
            if end > digits_start {
                self.pos = end;
                let text = std::str::from_utf8(&self.src[digits_start..end]).unwrap_or("");
                return Some(
                    u64::from_str_radix(text, 16)
                        .map(Lit::UInt)
                        .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
                );
            }
        }

        let sign = match self.peek_raw() {
            Some(c @ (b'-' | b'+')) => {
                self.pos += 1;
                Some(c)
            }
            _ => None,
        };
        let digits_start = self.pos;
        while matches!(self.peek_raw(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return None;
        }

        let mut is_real = false;
        if self.peek_raw() == Some(b'.') {
            is_real = true;
            self.pos += 1;
            while matches!(self.peek_raw(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek_raw(), Some(b'e' | b'E')) {
            // commit to the exponent only when digits follow
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek_raw(), Some(b'-' | b'+')) {
                self.pos += 1;
            }
            let exp_digits = self.pos;
            while matches!(self.peek_raw(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos > exp_digits {
                is_real = true;
            } else {
                self.pos = save;
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        if is_real {
            return Some(
                text.parse::<f64>()
                    .map(Lit::Real)
                    .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
            );
        }

        // integer suffixes
        match self.peek_raw() {
            Some(b'u' | b'U') => {
                self.pos += 1;
                if sign.is_some() {
                    self.pos = start;
                    return None;
                }
                Some(
                    text.parse::<u64>()
                        .map(Lit::UInt)
                        .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
                )
            }
            Some(b'i' | b's' | b'l') => {
                self.pos += 1;
                Some(
                    text.parse::<i64>()
                        .map(Lit::Int)
                        .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
                )
            }
            _ => {
                if sign == Some(b'+') {
                    // a leading plus only belongs to Real literals
                    self.pos = start;
                    return None;
                }
                if sign == Some(b'-') {
                    Some(
                        text.parse::<i64>()
                            .map(Lit::Int)
                            .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
                    )
                } else {
                    Some(
                        text.parse::<u64>()
                            .map(Lit::UInt)
                            .map_err(|_| Error::syntax(format!("malformed number: {text}"))),
                    )
                }
            }
        }
    }
}
