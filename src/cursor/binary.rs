use serde_json::{Map, Number, Value};
use smol_str::SmolStr;

use crate::error::DecodeError;
use crate::utils::{hash64_lcase, hash64_str, NO_FIELD_HASH};
use crate::Result;

use super::{SavePoint, TokenCursor, WireFormat};

const MAX_DEPTH: usize = 256;

/// One-byte token tags for the binary wire grammar.
mod tag {
    pub const NULL: u8 = 0x01;
    pub const TRUE: u8 = 0x02;
    pub const FALSE: u8 = 0x03;
    pub const I64: u8 = 0x04;
    pub const F64: u8 = 0x05;
    pub const STR: u8 = 0x06;
    pub const OBJ_START: u8 = 0x07;
    pub const OBJ_END: u8 = 0x08;
    pub const ARR_START: u8 = 0x09;
    pub const ARR_END: u8 = 0x0a;
}

/// Cursor over the length/tag-prefixed binary token stream. Field
/// names travel as ordinary string tokens and hash exactly like their
/// textual counterparts.
pub struct BinaryCursor<'a> {
    input: &'a [u8],
    pos: usize,
    last: SmolStr,
    lcase: u64,
}

impl<'a> BinaryCursor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            last: SmolStr::default(),
            lcase: NO_FIELD_HASH,
        }
    }

    fn peek_tag(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat_tag(&mut self, expected: u8) -> bool {
        if self.peek_tag() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.input.len() {
            return Err(DecodeError::malformed("truncated input", self.pos));
        }
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_str_payload(&mut self) -> Result<&'a str> {
        let len_bytes = self.take(4)?;
        let len = u32::from_be_bytes(len_bytes.try_into().expect("4 bytes")) as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::malformed("invalid utf-8 in string", self.pos - len))
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::malformed("nesting too deep", self.pos));
        }
        let offset = self.pos;
        let tag = self
            .peek_tag()
            .ok_or_else(|| DecodeError::malformed("unexpected end of input", offset))?;
        self.pos += 1;
        match tag {
            tag::NULL => Ok(Value::Null),
            tag::TRUE => Ok(Value::Bool(true)),
            tag::FALSE => Ok(Value::Bool(false)),
            tag::I64 => {
                let bytes = self.take(8)?;
                Ok(Value::Number(Number::from(i64::from_be_bytes(
                    bytes.try_into().expect("8 bytes"),
                ))))
            }
            tag::F64 => {
                let bytes = self.take(8)?;
                let value = f64::from_be_bytes(bytes.try_into().expect("8 bytes"));
                Number::from_f64(value)
                    .map(Value::Number)
                    .ok_or_else(|| DecodeError::malformed("non-finite number", offset))
            }
            tag::STR => Ok(Value::String(self.read_str_payload()?.to_string())),
            tag::OBJ_START => {
                let mut map = Map::new();
                while !self.eat_tag(tag::OBJ_END) {
                    if self.peek_tag() != Some(tag::STR) {
                        return Err(DecodeError::malformed("expected field name", self.pos));
                    }
                    self.pos += 1;
                    let key = self.read_str_payload()?.to_string();
                    let value = self.read_value_at(depth + 1)?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }
            tag::ARR_START => {
                let mut items = Vec::new();
                while !self.eat_tag(tag::ARR_END) {
                    items.push(self.read_value_at(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            _ => Err(DecodeError::malformed("unknown token tag", offset)),
        }
    }
}

impl TokenCursor for BinaryCursor<'_> {
    fn format(&self) -> WireFormat {
        WireFormat::Binary
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn next_if_null(&mut self) -> bool {
        self.eat_tag(tag::NULL)
    }

    fn next_if_object_start(&mut self) -> bool {
        self.eat_tag(tag::OBJ_START)
    }

    fn next_if_object_end(&mut self) -> bool {
        self.eat_tag(tag::OBJ_END)
    }

    fn next_if_array_start(&mut self) -> bool {
        self.eat_tag(tag::ARR_START)
    }

    fn next_if_array_end(&mut self) -> bool {
        self.eat_tag(tag::ARR_END)
    }

    fn next_if_comma(&mut self) -> bool {
        false
    }

    fn is_array_start(&self) -> bool {
        self.peek_tag() == Some(tag::ARR_START)
    }

    fn is_string(&self) -> bool {
        self.peek_tag() == Some(tag::STR)
    }

    fn is_number(&self) -> bool {
        matches!(self.peek_tag(), Some(tag::I64) | Some(tag::F64))
    }

    fn is_bool(&self) -> bool {
        matches!(self.peek_tag(), Some(tag::TRUE) | Some(tag::FALSE))
    }

    fn is_field_boundary(&self) -> bool {
        matches!(self.peek_tag(), Some(tag::STR) | Some(tag::OBJ_END))
    }

    fn next_field_name_hash(&mut self) -> Result<u64> {
        match self.peek_tag() {
            Some(tag::STR) => {
                self.pos += 1;
                let name = SmolStr::new(self.read_str_payload()?);
                let hash = hash64_str(&name);
                self.lcase = hash64_lcase(&name);
                self.last = name;
                Ok(hash)
            }
            Some(tag::OBJ_END) => Ok(NO_FIELD_HASH),
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
        if self.peek_tag() != Some(tag::STR) {
            return Ok(None);
        }
        self.pos += 1;
        let text = SmolStr::new(self.read_str_payload()?);
        let hash = hash64_str(&text);
        self.last = text;
        Ok(Some(hash))
    }

    fn read_any(&mut self) -> Result<Value> {
        self.read_value_at(0)
    }

    fn read_bool(&mut self) -> Result<bool> {
        if self.eat_tag(tag::TRUE) {
            Ok(true)
        } else if self.eat_tag(tag::FALSE) {
            Ok(false)
        } else {
            Err(DecodeError::malformed("expected boolean", self.pos))
        }
    }

    fn mark(&self) -> SavePoint {
        SavePoint { offset: self.pos }
    }

    fn restore(&mut self, save: SavePoint) {
        self.pos = save.offset;
    }
}

/// Emits raw binary tokens. This is the authoring side of the token
/// grammar only; object encoding lives outside this crate.
#[derive(Debug, Default)]
pub struct BinaryTokenWriter {
    out: Vec<u8>,
}

impl BinaryTokenWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn null(&mut self) -> &mut Self {
        self.out.push(tag::NULL);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.out.push(if value { tag::TRUE } else { tag::FALSE });
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.out.push(tag::I64);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.out.push(tag::F64);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.out.push(tag::STR);
        self.out
            .extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.out.extend_from_slice(value.as_bytes());
        self
    }

    /// Field names are plain string tokens.
    pub fn field(&mut self, name: &str) -> &mut Self {
        self.str(name)
    }

    pub fn object_start(&mut self) -> &mut Self {
        self.out.push(tag::OBJ_START);
        self
    }

    pub fn object_end(&mut self) -> &mut Self {
        self.out.push(tag::OBJ_END);
        self
    }

    pub fn array_start(&mut self) -> &mut Self {
        self.out.push(tag::ARR_START);
        self
    }

    pub fn array_end(&mut self) -> &mut Self {
        self.out.push(tag::ARR_END);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[rstest::rstest]
    fn test_writer_cursor_roundtrip() {
        let mut writer = BinaryTokenWriter::new();
        writer
            .object_start()
            .field("name")
            .str("Rex")
            .field("barks")
            .i64(3)
            .object_end();
        let bytes = writer.finish();

        let mut cursor = BinaryCursor::new(&bytes);
        let value = cursor.read_any().unwrap();
        assert_eq!(value, json!({"name": "Rex", "barks": 3}));
    }

    #[rstest::rstest]
    fn test_field_hash_matches_text_hashing() {
        let mut writer = BinaryTokenWriter::new();
        writer.object_start().field("name").str("Rex").object_end();
        let bytes = writer.finish();

        let mut cursor = BinaryCursor::new(&bytes);
        assert!(cursor.next_if_object_start());
        assert_eq!(cursor.next_field_name_hash().unwrap(), hash64_str("name"));
        assert_eq!(cursor.lcase_hash(), hash64_lcase("name"));
        assert_eq!(cursor.read_value_hash().unwrap(), Some(hash64_str("Rex")));
        assert!(cursor.next_if_object_end());
    }

    #[rstest::rstest]
    fn test_save_point_reproduces_stream() {
        let mut writer = BinaryTokenWriter::new();
        writer
            .object_start()
            .field("a")
            .i64(1)
            .field("b")
            .i64(2)
            .object_end();
        let bytes = writer.finish();

        let mut cursor = BinaryCursor::new(&bytes);
        assert!(cursor.next_if_object_start());
        let save = cursor.mark();
        assert_eq!(cursor.next_field_name_hash().unwrap(), hash64_str("a"));
        cursor.read_any().unwrap();
        cursor.restore(save);
        assert_eq!(cursor.next_field_name_hash().unwrap(), hash64_str("a"));
    }

    #[rstest::rstest]
    fn test_truncated_input_errors() {
        let mut writer = BinaryTokenWriter::new();
        writer.str("truncated");
        let bytes = writer.finish();
        let mut cursor = BinaryCursor::new(&bytes[..4]);
        assert!(cursor.read_any().is_err());
    }

    #[rstest::rstest]
    fn test_unknown_tag_errors() {
        let mut cursor = BinaryCursor::new(&[0xff]);
        assert!(cursor.read_any().is_err());
    }
}
