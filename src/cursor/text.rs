use memchr::memchr2;
use serde_json::{Map, Number, Value};
use smol_str::SmolStr;

use crate::error::DecodeError;
use crate::utils::{hash64_lcase, hash64_str, NO_FIELD_HASH};
use crate::Result;

use super::{SavePoint, TokenCursor, WireFormat};

const MAX_DEPTH: usize = 256;

/// Streaming cursor over the textual token grammar: `{ } [ ] : ,`,
/// double-quoted strings with short escapes, numbers, `true`/`false`/
/// `null`. Positions are byte offsets into the input.
pub struct TextCursor<'a> {
    input: &'a [u8],
    pos: usize,
    last: SmolStr,
    lcase: u64,
}

impl<'a> TextCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            last: SmolStr::default(),
            lcase: NO_FIELD_HASH,
        }
    }

    fn skip_ws(&mut self) {
        while let Some(&byte) = self.input.get(self.pos) {
            if matches!(byte, b' ' | b'\t' | b'\r' | b'\n') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        let mut i = self.pos;
        while let Some(&byte) = self.input.get(i) {
            if matches!(byte, b' ' | b'\t' | b'\r' | b'\n') {
                i += 1;
            } else {
                return Some(byte);
            }
        }
        None
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.input.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_ws();
        let end = self.pos + word.len();
        if self.input.len() < end || &self.input[self.pos..end] != word.as_bytes() {
            return false;
        }
        if self
            .input
            .get(end)
            .is_some_and(|byte| byte.is_ascii_alphanumeric())
        {
            return false;
        }
        self.pos = end;
        true
    }

    /// Caller has positioned `pos` on the opening quote.
    fn parse_string(&mut self) -> Result<SmolStr> {
        let start = self.pos + 1;
        self.pos = start;
        match memchr2(b'"', b'\\', &self.input[start..]) {
            Some(rel) if self.input[start + rel] == b'"' => {
                let end = start + rel;
                let text = std::str::from_utf8(&self.input[start..end])
                    .map_err(|_| DecodeError::malformed("invalid utf-8 in string", start))?;
                self.pos = end + 1;
                Ok(SmolStr::new(text))
            }
            Some(_) => self.parse_string_slow(start),
            None => Err(DecodeError::malformed("unterminated string", start)),
        }
    }

    fn parse_string_slow(&mut self, start: usize) -> Result<SmolStr> {
        let mut out = String::new();
        let mut i = start;
        loop {
            let rel = memchr2(b'"', b'\\', &self.input[i..])
                .ok_or_else(|| DecodeError::malformed("unterminated string", start))?;
            let chunk = std::str::from_utf8(&self.input[i..i + rel])
                .map_err(|_| DecodeError::malformed("invalid utf-8 in string", i))?;
            out.push_str(chunk);
            i += rel;
            if self.input[i] == b'"' {
                self.pos = i + 1;
                return Ok(SmolStr::new(out));
            }
            let escape = *self
                .input
                .get(i + 1)
                .ok_or_else(|| DecodeError::malformed("unterminated escape", i))?;
            let decoded = match escape {
                b'n' => '\n',
                b'r' => '\r',
                b't' => '\t',
                b'"' => '"',
                b'\\' => '\\',
                b'/' => '/',
                _ => return Err(DecodeError::malformed("invalid escape", i)),
            };
            out.push(decoded);
            i += 2;
        }
    }

    fn parse_number(&mut self) -> Result<Number> {
        self.skip_ws();
        let start = self.pos;
        let mut end = self.pos;
        let mut float = false;
        while let Some(&byte) = self.input.get(end) {
            match byte {
                b'0'..=b'9' | b'-' | b'+' => end += 1,
                b'.' | b'e' | b'E' => {
                    float = true;
                    end += 1;
                }
                _ => break,
            }
        }
        if end == start {
            return Err(DecodeError::malformed("expected number", start));
        }
        let text = std::str::from_utf8(&self.input[start..end])
            .map_err(|_| DecodeError::malformed("invalid number", start))?;
        self.pos = end;
        if !float {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Number::from(value));
            }
            if let Ok(value) = text.parse::<u64>() {
                return Ok(Number::from(value));
            }
        }
        let value: f64 = text
            .parse()
            .map_err(|_| DecodeError::malformed("invalid number", start))?;
        Number::from_f64(value).ok_or_else(|| DecodeError::malformed("non-finite number", start))
    }

    fn read_any_at(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::malformed("nesting too deep", self.pos));
        }
        self.skip_ws();
        match self.input.get(self.pos) {
            Some(b'"') => Ok(Value::String(self.parse_string()?.to_string())),
            Some(b'{') => {
                self.pos += 1;
                let mut map = Map::new();
                loop {
                    if self.eat(b'}') {
                        break;
                    }
                    self.eat(b',');
                    self.skip_ws();
                    if self.eat(b'}') {
                        break;
                    }
                    if self.input.get(self.pos) != Some(&b'"') {
                        return Err(DecodeError::malformed("expected field name", self.pos));
                    }
                    let key = self.parse_string()?;
                    if !self.eat(b':') {
                        return Err(DecodeError::malformed(
                            "expected ':' after field name",
                            self.pos,
                        ));
                    }
                    let value = self.read_any_at(depth + 1)?;
                    map.insert(key.to_string(), value);
                }
                Ok(Value::Object(map))
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    if self.eat(b']') {
                        break;
                    }
                    self.eat(b',');
                    if self.eat(b']') {
                        break;
                    }
                    items.push(self.read_any_at(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            Some(b't') | Some(b'f') => self.read_bool_token().map(Value::Bool),
            Some(b'n') => {
                if self.eat_keyword("null") {
                    Ok(Value::Null)
                } else {
                    Err(DecodeError::malformed("unexpected token", self.pos))
                }
            }
            Some(b'-') | Some(b'0'..=b'9') => Ok(Value::Number(self.parse_number()?)),
            Some(_) => Err(DecodeError::malformed("unexpected token", self.pos)),
            None => Err(DecodeError::malformed("unexpected end of input", self.pos)),
        }
    }

    fn read_bool_token(&mut self) -> Result<bool> {
        if self.eat_keyword("true") {
            Ok(true)
        } else if self.eat_keyword("false") {
            Ok(false)
        } else {
            Err(DecodeError::malformed("expected boolean", self.pos))
        }
    }
}

impl TokenCursor for TextCursor<'_> {
    fn format(&self) -> WireFormat {
        WireFormat::Text
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn next_if_null(&mut self) -> bool {
        self.eat_keyword("null")
    }

    fn next_if_object_start(&mut self) -> bool {
        self.eat(b'{')
    }

    fn next_if_object_end(&mut self) -> bool {
        self.eat(b'}')
    }

    fn next_if_array_start(&mut self) -> bool {
        self.eat(b'[')
    }

    fn next_if_array_end(&mut self) -> bool {
        self.eat(b']')
    }

    fn next_if_comma(&mut self) -> bool {
        self.eat(b',')
    }

    fn is_array_start(&self) -> bool {
        self.peek() == Some(b'[')
    }

    fn is_string(&self) -> bool {
        self.peek() == Some(b'"')
    }

    fn is_number(&self) -> bool {
        matches!(self.peek(), Some(b'-') | Some(b'0'..=b'9'))
    }

    fn is_bool(&self) -> bool {
        matches!(self.peek(), Some(b't') | Some(b'f'))
    }

    fn is_field_boundary(&self) -> bool {
        matches!(self.peek(), Some(b'"') | Some(b',') | Some(b'}'))
    }

    fn next_field_name_hash(&mut self) -> Result<u64> {
        self.eat(b',');
        self.skip_ws();
        match self.input.get(self.pos) {
            Some(b'"') => {
                let name = self.parse_string()?;
                if !self.eat(b':') {
                    return Err(DecodeError::malformed(
                        "expected ':' after field name",
                        self.pos,
                    ));
                }
                let hash = hash64_str(&name);
                self.lcase = hash64_lcase(&name);
                self.last = name;
                Ok(hash)
            }
            // Stray separator: consume one and report "no field".
            Some(b',') | Some(b':') => {
                self.pos += 1;
                Ok(NO_FIELD_HASH)
            }
            // Leave object end for the caller's end-of-object check.
            Some(b'}') => Ok(NO_FIELD_HASH),
            Some(_) => Err(DecodeError::malformed("expected field name", self.pos)),
            None => Err(DecodeError::malformed("unexpected end of input", self.pos)),
        }
    }

    fn lcase_hash(&self) -> u64 {
        self.lcase
    }

    fn last_string(&self) -> &str {
        &self.last
    }

    fn read_value_hash(&mut self) -> Result<Option<u64>> {
        self.skip_ws();
        if self.input.get(self.pos) != Some(&b'"') {
            return Ok(None);
        }
        let text = self.parse_string()?;
        let hash = hash64_str(&text);
        self.last = text;
        Ok(Some(hash))
    }

    fn read_any(&mut self) -> Result<Value> {
        self.read_any_at(0)
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.skip_ws();
        self.read_bool_token()
    }

    fn mark(&self) -> SavePoint {
        SavePoint { offset: self.pos }
    }

    fn restore(&mut self, save: SavePoint) {
        self.pos = save.offset;
    }
}
