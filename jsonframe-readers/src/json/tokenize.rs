//! Tokenizer for a single JSON record
//!
//! Produces a flat token stream for one record (object, array, or scalar).
//! String and field-name literals have their escapes decoded up front;
//! numbers are kept as raw lexemes until inference or building decides the
//! concrete numeric type.
//!
//! Two forms of malformed-but-common JSON are tolerated by policy rather
//! than recovered from: an empty value after a field colon and a trailing
//! comma before a closing bracket both yield an explicit `Token::Null`.
//! Literal control bytes inside quoted strings pass through unchanged.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// A JSON token, transient to one record pass
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// Object key, escapes decoded
    FieldName(Cow<'a, str>),
    /// String value, escapes decoded
    Str(Cow<'a, str>),
    /// Numeric value as its raw lexeme
    Number(&'a str),
    /// `true` / `false`
    Bool(bool),
    /// `null`, an empty value, or a trailing-comma element
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Expect the top-level value
    Start,
    /// Expect a value (after `:`, after `,` in an array)
    Value,
    /// Right after `[`: value or `]`
    ValueOrClose,
    /// Right after `{`: key or `}`
    KeyOrClose,
    /// After `,` in an object: key, or `}` for a tolerated trailing comma
    Key,
    /// After a key: `:`
    Colon,
    /// After a value inside a container
    CommaOrClose,
    /// Top-level value finished
    Done,
}

/// Pull tokenizer over one record's bytes
pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Byte offset of this record within its source, for error context
    base: usize,
    stack: Vec<Container>,
    state: State,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer for one record; `base` is the record's byte offset
    /// within its source and is only used for error reporting
    pub fn new(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            base,
            stack: Vec::new(),
            state: State::Start,
        }
    }

    /// Produce the next token, or `None` at the end of the record
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            self.skip_whitespace();
            match self.state {
                State::Done => {
                    if self.pos < self.bytes.len() {
                        return Err(self.unexpected("trailing content after record"));
                    }
                    return Ok(None);
                }
                State::Start => {
                    if self.pos >= self.bytes.len() {
                        return Ok(None);
                    }
                    return Ok(Some(self.parse_value_start()?));
                }
                State::Value | State::ValueOrClose => {
                    let byte = self.peek().ok_or_else(|| self.unexpected("end of record"))?;
                    if self.state == State::ValueOrClose && byte == b']' {
                        self.pos += 1;
                        return Ok(Some(self.close(Container::Array)?));
                    }
                    // Empty value: emit a null without consuming the delimiter
                    if byte == b',' || byte == b'}' || byte == b']' {
                        self.state = State::CommaOrClose;
                        return Ok(Some(Token::Null));
                    }
                    return Ok(Some(self.parse_value_start()?));
                }
                State::KeyOrClose | State::Key => {
                    let byte = self.peek().ok_or_else(|| self.unexpected("end of record"))?;
                    match byte {
                        b'}' => {
                            self.pos += 1;
                            return Ok(Some(self.close(Container::Object)?));
                        }
                        b'"' => {
                            let name = self.parse_string()?;
                            self.state = State::Colon;
                            return Ok(Some(Token::FieldName(name)));
                        }
                        _ => return Err(self.unexpected("expected field name or '}'")),
                    }
                }
                State::Colon => {
                    match self.peek() {
                        Some(b':') => {
                            self.pos += 1;
                            self.state = State::Value;
                        }
                        _ => return Err(self.unexpected("expected ':' after field name")),
                    }
                    // No token for the colon itself
                }
                State::CommaOrClose => {
                    let byte = self.peek().ok_or_else(|| self.unexpected("end of record"))?;
                    match (byte, self.stack.last()) {
                        (b',', Some(Container::Object)) => {
                            self.pos += 1;
                            self.state = State::Key;
                        }
                        (b',', Some(Container::Array)) => {
                            self.pos += 1;
                            self.state = State::Value;
                        }
                        (b'}', Some(Container::Object)) => {
                            self.pos += 1;
                            return Ok(Some(self.close(Container::Object)?));
                        }
                        (b']', Some(Container::Array)) => {
                            self.pos += 1;
                            return Ok(Some(self.close(Container::Array)?));
                        }
                        _ => return Err(self.unexpected("expected ',' or closing bracket")),
                    }
                }
            }
        }
    }

    /// Consume a whole value (used when skipping unobserved fields)
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let token = self
                .next_token()?
                .ok_or_else(|| self.unexpected("end of record inside value"))?;
            match token {
                Token::ObjectStart | Token::ArrayStart => depth += 1,
                Token::ObjectEnd | Token::ArrayEnd => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                match token {
                    // A field name is not a complete value
                    Token::FieldName(_) => continue,
                    _ => return Ok(()),
                }
            }
        }
    }

    fn parse_value_start(&mut self) -> Result<Token<'a>> {
        let byte = self.peek().ok_or_else(|| self.unexpected("end of record"))?;
        match byte {
            b'{' => {
                self.pos += 1;
                self.stack.push(Container::Object);
                self.state = State::KeyOrClose;
                Ok(Token::ObjectStart)
            }
            b'[' => {
                self.pos += 1;
                self.stack.push(Container::Array);
                self.state = State::ValueOrClose;
                Ok(Token::ArrayStart)
            }
            b'"' => {
                let value = self.parse_string()?;
                self.finish_value();
                Ok(Token::Str(value))
            }
            b't' | b'f' | b'n' => self.parse_keyword(),
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.parse_number(),
            _ => Err(self.unexpected("expected a JSON value")),
        }
    }

    fn finish_value(&mut self) {
        self.state = if self.stack.is_empty() {
            State::Done
        } else {
            State::CommaOrClose
        };
    }

    fn close(&mut self, expected: Container) -> Result<Token<'a>> {
        match self.stack.pop() {
            Some(container) if container == expected => {
                self.finish_value();
                Ok(match expected {
                    Container::Object => Token::ObjectEnd,
                    Container::Array => Token::ArrayEnd,
                })
            }
            _ => Err(self.unexpected("unbalanced brackets")),
        }
    }

    fn parse_keyword(&mut self) -> Result<Token<'a>> {
        let rest = &self.bytes[self.pos..];
        let (token, len) = if rest.starts_with(b"true") {
            (Token::Bool(true), 4)
        } else if rest.starts_with(b"false") {
            (Token::Bool(false), 5)
        } else if rest.starts_with(b"null") {
            (Token::Null, 4)
        } else {
            return Err(self.unexpected("expected a JSON value"));
        };
        if rest.get(len).is_some_and(u8::is_ascii_alphanumeric) {
            return Err(self.unexpected("expected a JSON value"));
        }
        self.pos += len;
        self.finish_value();
        Ok(token)
    }

    fn parse_number(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| matches!(b, b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9'))
        {
            self.pos += 1;
        }
        let lexeme = &self.bytes[start..self.pos];
        if !lexeme.iter().any(u8::is_ascii_digit) {
            return Err(self.unexpected("malformed number"));
        }
        let text = std::str::from_utf8(lexeme)
            .map_err(|_| self.unexpected("malformed number"))?;
        self.finish_value();
        Ok(Token::Number(text))
    }

    fn parse_string(&mut self) -> Result<Cow<'a, str>> {
        let quote_pos = self.pos;
        self.pos += 1;
        let start = self.pos;

        // Fast path: no escapes, borrow directly
        let mut i = start;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' => {
                    let text = std::str::from_utf8(&self.bytes[start..i])
                        .map_err(|_| self.unexpected("invalid UTF-8 in string"))?;
                    self.pos = i + 1;
                    return Ok(Cow::Borrowed(text));
                }
                b'\\' => return self.parse_escaped_string(quote_pos, start, i),
                _ => i += 1,
            }
        }
        Err(Error::UnterminatedString {
            offset: self.base + quote_pos,
        })
    }

    fn parse_escaped_string(
        &mut self,
        quote_pos: usize,
        start: usize,
        first_escape: usize,
    ) -> Result<Cow<'a, str>> {
        let mut out: Vec<u8> = Vec::with_capacity(first_escape - start + 16);
        out.extend_from_slice(&self.bytes[start..first_escape]);
        let mut i = first_escape;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' => {
                    let text = String::from_utf8(out)
                        .map_err(|_| self.unexpected("invalid UTF-8 in string"))?;
                    self.pos = i + 1;
                    return Ok(Cow::Owned(text));
                }
                b'\\' => {
                    let escape = *self
                        .bytes
                        .get(i + 1)
                        .ok_or(Error::UnterminatedString {
                            offset: self.base + quote_pos,
                        })?;
                    match escape {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let decoded = self.decode_unicode_escape(i)?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(decoded.0.encode_utf8(&mut buf).as_bytes());
                            i = decoded.1;
                            continue;
                        }
                        _ => return Err(self.unexpected("invalid escape sequence")),
                    }
                    i += 2;
                }
                byte => {
                    out.push(byte);
                    i += 1;
                }
            }
        }
        Err(Error::UnterminatedString {
            offset: self.base + quote_pos,
        })
    }

    /// Decode `\uXXXX` (with surrogate pairing) starting at the backslash;
    /// returns the character and the index just past the escape
    fn decode_unicode_escape(&self, backslash: usize) -> Result<(char, usize)> {
        let high = self.read_hex4(backslash + 2)?;
        let after_high = backslash + 6;

        if (0xD800..=0xDBFF).contains(&high) {
            if self.bytes.get(after_high) == Some(&b'\\')
                && self.bytes.get(after_high + 1) == Some(&b'u')
            {
                let low = self.read_hex4(after_high + 2)?;
                if (0xDC00..=0xDFFF).contains(&low) {
                    let combined =
                        0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    let character = char::from_u32(combined)
                        .ok_or_else(|| self.unexpected("invalid unicode escape"))?;
                    return Ok((character, after_high + 6));
                }
            }
            return Err(self.unexpected("unpaired surrogate in unicode escape"));
        }

        let character =
            char::from_u32(high).ok_or_else(|| self.unexpected("invalid unicode escape"))?;
        Ok((character, after_high))
    }

    fn read_hex4(&self, start: usize) -> Result<u32> {
        let digits = self
            .bytes
            .get(start..start + 4)
            .ok_or_else(|| self.unexpected("truncated unicode escape"))?;
        let mut value = 0u32;
        for &digit in digits {
            let nibble = match digit {
                b'0'..=b'9' => u32::from(digit - b'0'),
                b'a'..=b'f' => u32::from(digit - b'a') + 10,
                b'A'..=b'F' => u32::from(digit - b'A') + 10,
                _ => return Err(self.unexpected("invalid hex digit in unicode escape")),
            };
            value = value * 16 + nibble;
        }
        Ok(value)
    }

    /// Current byte offset within the source, for error context
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, found: &str) -> Error {
        Error::UnexpectedToken {
            offset: self.base + self.pos,
            found: found.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        let mut tokenizer = Tokenizer::new(input.as_bytes(), 0);
        let mut out = Vec::new();
        while let Some(token) = tokenizer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn object_record() {
        assert_eq!(
            tokens(r#"{"a": 1, "b": "x"}"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("a".into()),
                Token::Number("1"),
                Token::FieldName("b".into()),
                Token::Str("x".into()),
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn array_record_keeps_raw_number_lexemes() {
        assert_eq!(
            tokens("[1.5, -2e3, 18446744073709551615]"),
            vec![
                Token::ArrayStart,
                Token::Number("1.5"),
                Token::Number("-2e3"),
                Token::Number("18446744073709551615"),
                Token::ArrayEnd,
            ]
        );
    }

    #[test]
    fn empty_value_after_colon_is_null() {
        assert_eq!(
            tokens(r#"{"0":1.0,"1":}"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("0".into()),
                Token::Number("1.0"),
                Token::FieldName("1".into()),
                Token::Null,
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn spaced_empty_value_is_null() {
        assert_eq!(
            tokens(r#"{ "0" : null , "1" : }"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("0".into()),
                Token::Null,
                Token::FieldName("1".into()),
                Token::Null,
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn trailing_comma_in_array_is_null_element() {
        assert_eq!(
            tokens("[1.0,]"),
            vec![
                Token::ArrayStart,
                Token::Number("1.0"),
                Token::Null,
                Token::ArrayEnd,
            ]
        );
        assert_eq!(
            tokens("[null, ]"),
            vec![
                Token::ArrayStart,
                Token::Null,
                Token::Null,
                Token::ArrayEnd,
            ]
        );
    }

    #[test]
    fn trailing_comma_in_object_adds_nothing() {
        assert_eq!(
            tokens(r#"{"a":1,}"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("a".into()),
                Token::Number("1"),
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(tokens("[]"), vec![Token::ArrayStart, Token::ArrayEnd]);
        assert_eq!(tokens("{}"), vec![Token::ObjectStart, Token::ObjectEnd]);
    }

    #[test]
    fn escape_sequences_decode() {
        assert_eq!(
            tokens(r#"{"a":"ab\"cd","b":"a\tb\t","c":"\\\b"}"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("a".into()),
                Token::Str("ab\"cd".into()),
                Token::FieldName("b".into()),
                Token::Str("a\tb\t".into()),
                Token::FieldName("c".into()),
                Token::Str("\\\u{8}".into()),
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn unicode_escapes_and_surrogate_pairs() {
        assert_eq!(tokens(r#"["\u00e9"]"#)[1], Token::Str("é".into()));
        assert_eq!(
            tokens(r#"["\ud83d\ude00"]"#)[1],
            Token::Str("\u{1F600}".into())
        );
    }

    #[test]
    fn literal_control_bytes_pass_through() {
        let input = "{\"a\":\"x\ty\"}";
        assert_eq!(tokens(input)[2], Token::Str("x\ty".into()));
    }

    #[test]
    fn nested_structures() {
        assert_eq!(
            tokens(r#"{"c1":{"f1":"s"},"c2":["l1","l2"]}"#),
            vec![
                Token::ObjectStart,
                Token::FieldName("c1".into()),
                Token::ObjectStart,
                Token::FieldName("f1".into()),
                Token::Str("s".into()),
                Token::ObjectEnd,
                Token::FieldName("c2".into()),
                Token::ArrayStart,
                Token::Str("l1".into()),
                Token::Str("l2".into()),
                Token::ArrayEnd,
                Token::ObjectEnd,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_offset() {
        let mut tokenizer = Tokenizer::new(br#"{"a":"oops"#, 100);
        tokenizer.next_token().unwrap();
        tokenizer.next_token().unwrap();
        let err = tokenizer.next_token().unwrap_err();
        assert!(matches!(err, Error::UnterminatedString { offset: 105 }));
    }

    #[test]
    fn unbalanced_brackets_are_rejected() {
        let mut tokenizer = Tokenizer::new(b"[1, 2}", 0);
        let result = loop {
            match tokenizer.next_token() {
                Ok(Some(_)) => continue,
                other => break other,
            }
        };
        assert!(matches!(result, Err(Error::UnexpectedToken { .. })));
    }

    #[test]
    fn skip_value_consumes_whole_subtree() {
        let mut tokenizer = Tokenizer::new(br#"{"a":{"x":[1,2],"y":3},"b":4}"#, 0);
        assert_eq!(tokenizer.next_token().unwrap(), Some(Token::ObjectStart));
        assert_eq!(
            tokenizer.next_token().unwrap(),
            Some(Token::FieldName("a".into()))
        );
        tokenizer.skip_value().unwrap();
        assert_eq!(
            tokenizer.next_token().unwrap(),
            Some(Token::FieldName("b".into()))
        );
    }
}
