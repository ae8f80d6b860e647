//! Content Stream Parser
//!
//! Splits a decoded page content stream into `(operator, operands)` pairs in
//! stream order, the form the event listener hub fans out. Content streams
//! use the same object syntax as the body of the file but admit arbitrary
//! operator words, so they get their own in-memory tokenizer.

use super::{ParseError, ParseResult};
use crate::objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfString};

/// One operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOperator {
    pub operator: String,
    pub operands: Vec<PdfObject>,
}

enum ContentToken {
    Object(PdfObject),
    Operator(String),
}

/// Parser over one decoded content stream.
pub struct ContentParser<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> ContentParser<'a> {
    /// Parse a whole content stream into operator applications.
    pub fn parse(input: &'a [u8]) -> ParseResult<Vec<ContentOperator>> {
        let mut parser = Self { input, position: 0 };
        let mut operations = Vec::new();
        let mut operands: Vec<PdfObject> = Vec::new();

        while let Some(token) = parser.next_token()? {
            match token {
                ContentToken::Object(obj) => operands.push(obj),
                ContentToken::Operator(op) => {
                    if op == "BI" {
                        // Inline image: skip its dictionary and binary data,
                        // surfacing only the bracketing operators
                        operations.push(ContentOperator {
                            operator: "BI".to_string(),
                            operands: std::mem::take(&mut operands),
                        });
                        parser.skip_inline_image()?;
                        operations.push(ContentOperator {
                            operator: "EI".to_string(),
                            operands: Vec::new(),
                        });
                    } else {
                        operations.push(ContentOperator {
                            operator: op,
                            operands: std::mem::take(&mut operands),
                        });
                    }
                }
            }
        }

        Ok(operations)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.position + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => {
                    self.position += 1;
                }
                b'%' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' || c == b'\r' {
                            break;
                        }
                        self.position += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::SyntaxError {
            position: self.position as u64,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> ParseResult<Option<ContentToken>> {
        self.skip_whitespace_and_comments();

        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        let token = match ch {
            b'+' | b'-' | b'.' | b'0'..=b'9' => ContentToken::Object(self.read_number()?),
            b'(' => ContentToken::Object(PdfObject::String(PdfString(self.read_literal_string()?))),
            b'/' => ContentToken::Object(PdfObject::Name(PdfName(self.read_name()?))),
            b'[' => {
                self.position += 1;
                ContentToken::Object(PdfObject::Array(self.read_array()?))
            }
            b']' => return Err(self.syntax_error("unbalanced ']'")),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.position += 2;
                    ContentToken::Object(PdfObject::Dictionary(self.read_dictionary()?))
                } else {
                    self.position += 1;
                    ContentToken::Object(PdfObject::String(PdfString(self.read_hex_string()?)))
                }
            }
            b'>' => return Err(self.syntax_error("unbalanced '>'")),
            _ => {
                let word = self.read_operator_word();
                if word.is_empty() {
                    return Err(self.syntax_error(format!("unexpected byte 0x{ch:02X}")));
                }
                match word.as_str() {
                    "true" => ContentToken::Object(PdfObject::Boolean(true)),
                    "false" => ContentToken::Object(PdfObject::Boolean(false)),
                    "null" => ContentToken::Object(PdfObject::Null),
                    _ => ContentToken::Operator(word),
                }
            }
        };

        Ok(Some(token))
    }

    fn read_number(&mut self) -> ParseResult<PdfObject> {
        let start = self.position;
        let mut has_dot = false;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.position += 1;
        }
        while let Some(ch) = self.peek() {
            match ch {
                b'0'..=b'9' => self.position += 1,
                b'.' if !has_dot => {
                    has_dot = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        let text = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| self.syntax_error("invalid number"))?;

        if has_dot {
            text.parse::<f64>()
                .map(PdfObject::Real)
                .map_err(|_| self.syntax_error(format!("invalid real: '{text}'")))
        } else {
            text.parse::<i64>()
                .map(PdfObject::Integer)
                .map_err(|_| self.syntax_error(format!("invalid integer: '{text}'")))
        }
    }

    fn read_literal_string(&mut self) -> ParseResult<Vec<u8>> {
        self.position += 1; // consume '('
        let mut string = Vec::new();
        let mut depth = 1;

        while depth > 0 {
            let ch = self
                .bump()
                .ok_or_else(|| self.syntax_error("unterminated string"))?;
            match ch {
                b'\\' => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.syntax_error("unterminated string escape"))?;
                    match escaped {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(b'\x08'),
                        b'f' => string.push(b'\x0C'),
                        b'0'..=b'7' => {
                            let mut value = escaped - b'0';
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(next @ b'0'..=b'7') => {
                                        self.position += 1;
                                        value = value.wrapping_mul(8).wrapping_add(next - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            string.push(value);
                        }
                        other => string.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    string.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth > 0 {
                        string.push(ch);
                    }
                }
                _ => string.push(ch),
            }
        }

        Ok(string)
    }

    fn read_hex_string(&mut self) -> ParseResult<Vec<u8>> {
        let mut digits: Vec<u8> = Vec::new();
        loop {
            let ch = self
                .bump()
                .ok_or_else(|| self.syntax_error("unterminated hex string"))?;
            match ch {
                b'>' => break,
                c if c.is_ascii_hexdigit() => digits.push(c),
                c if c.is_ascii_whitespace() => {}
                c => return Err(self.syntax_error(format!("invalid hex digit 0x{c:02X}"))),
            }
        }
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }
        Ok(digits
            .chunks(2)
            .map(|pair| {
                let high = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
                let low = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
                (high << 4) | low
            })
            .collect())
    }

    fn read_name(&mut self) -> ParseResult<String> {
        self.position += 1; // consume '/'
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || super::lexer::is_pdf_delimiter(ch) {
                break;
            }
            self.position += 1;
            if ch == b'#' {
                let hex: Vec<u8> = [self.bump(), self.bump()]
                    .into_iter()
                    .flatten()
                    .collect();
                if hex.len() != 2 {
                    return Err(self.syntax_error("incomplete hex code in name"));
                }
                let text = std::str::from_utf8(&hex)
                    .map_err(|_| self.syntax_error("invalid hex code in name"))?;
                let value = u8::from_str_radix(text, 16)
                    .map_err(|_| self.syntax_error("invalid hex code in name"))?;
                name.push(value as char);
            } else {
                name.push(ch as char);
            }
        }
        Ok(name)
    }

    fn read_array(&mut self) -> ParseResult<PdfArray> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                Some(b']') => {
                    self.position += 1;
                    break;
                }
                Some(_) => match self.next_token()? {
                    Some(ContentToken::Object(obj)) => items.push(obj),
                    Some(ContentToken::Operator(op)) => {
                        return Err(self.syntax_error(format!("operator '{op}' inside array")))
                    }
                    None => return Err(self.syntax_error("unterminated array")),
                },
                None => return Err(self.syntax_error("unterminated array")),
            }
        }
        Ok(PdfArray(items))
    }

    fn read_dictionary(&mut self) -> ParseResult<PdfDictionary> {
        let mut dict = PdfDictionary::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.peek() == Some(b'>') && self.peek_at(1) == Some(b'>') {
                self.position += 2;
                break;
            }
            let key = match self.next_token()? {
                Some(ContentToken::Object(PdfObject::Name(name))) => name,
                Some(_) => return Err(self.syntax_error("dictionary key must be a name")),
                None => return Err(self.syntax_error("unterminated dictionary")),
            };
            let value = match self.next_token()? {
                Some(ContentToken::Object(obj)) => obj,
                Some(ContentToken::Operator(op)) => {
                    return Err(self.syntax_error(format!("operator '{op}' as dictionary value")))
                }
                None => return Err(self.syntax_error("unterminated dictionary")),
            };
            dict.0.insert(key, value);
        }
        Ok(dict)
    }

    fn read_operator_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            // The quote operators ' and " are single-character words
            if word.is_empty() && (ch == b'\'' || ch == b'"') {
                self.position += 1;
                word.push(ch as char);
                break;
            }
            if ch.is_ascii_whitespace() || super::lexer::is_pdf_delimiter(ch) {
                break;
            }
            if !word.is_empty() && (ch == b'\'' || ch == b'"') {
                break;
            }
            self.position += 1;
            word.push(ch as char);
        }
        word
    }

    /// Skip the dictionary and binary payload of an inline image, leaving
    /// the position just past the closing `EI`.
    fn skip_inline_image(&mut self) -> ParseResult<()> {
        // Find "ID", then scan for whitespace-delimited "EI"
        let id_at = find_operator(&self.input[self.position..], b"ID")
            .ok_or_else(|| self.syntax_error("inline image without ID"))?;
        self.position += id_at + 2;
        // One whitespace byte separates ID from the binary data
        if matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.position += 1;
        }
        let ei_at = find_operator(&self.input[self.position..], b"EI")
            .ok_or_else(|| self.syntax_error("inline image without EI"))?;
        self.position += ei_at + 2;
        Ok(())
    }
}

/// Find a two-byte operator bounded by whitespace (or buffer edges).
fn find_operator(haystack: &[u8], op: &[u8; 2]) -> Option<usize> {
    let mut i = 0;
    while i + 2 <= haystack.len() {
        if &haystack[i..i + 2] == op {
            let before_ok = i == 0 || haystack[i - 1].is_ascii_whitespace();
            let after_ok = i + 2 == haystack.len() || haystack[i + 2].is_ascii_whitespace();
            if before_ok && after_ok {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}
