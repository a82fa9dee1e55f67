//! Bencoding for torrent metainfo documents.
//!
//! Implements the subset of bencoding needed to build and read metainfo
//! files: the four value types, canonical encoding (dictionary keys sorted,
//! which `BTreeMap` gives for free), and a strict decoder.

use crate::error::{ErrorKind, Result};
use std::collections::BTreeMap;

/// A bencoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Create a string value from a `&str`
    #[inline]
    pub fn string(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }

    /// Create an integer value
    #[inline]
    pub fn integer(i: i64) -> Self {
        Self::Integer(i)
    }

    /// Create an empty list
    #[inline]
    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    /// Create an empty dict
    #[inline]
    pub fn dict() -> Self {
        Self::Dict(BTreeMap::new())
    }

    /// Add an item to a list (builder pattern)
    #[inline]
    pub fn push(mut self, value: Value) -> Self {
        if let Self::List(ref mut list) = self {
            list.push(value);
        }
        self
    }

    /// Insert a key-value pair into a dict (builder pattern)
    #[inline]
    pub fn insert(mut self, key: &str, value: Value) -> Self {
        if let Self::Dict(ref mut dict) = self {
            dict.insert(key.as_bytes().to_vec(), value);
        }
        self
    }

    /// Encode to bencoded bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode into an existing buffer
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Integer(i) => {
                buf.push(b'i');
                buf.extend_from_slice(i.to_string().as_bytes());
                buf.push(b'e');
            }
            Self::Bytes(bytes) => {
                buf.extend_from_slice(bytes.len().to_string().as_bytes());
                buf.push(b':');
                buf.extend_from_slice(bytes);
            }
            Self::List(list) => {
                buf.push(b'l');
                for item in list {
                    item.encode_into(buf);
                }
                buf.push(b'e');
            }
            Self::Dict(dict) => {
                buf.push(b'd');
                // BTreeMap keeps keys sorted
                for (key, value) in dict {
                    buf.extend_from_slice(key.len().to_string().as_bytes());
                    buf.push(b':');
                    buf.extend_from_slice(key);
                    value.encode_into(buf);
                }
                buf.push(b'e');
            }
        }
    }

    /// Decode a complete bencoded document. Trailing bytes are rejected.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let value = Self::decode_at(data, &mut pos)?;
        if pos != data.len() {
            exn::bail!(ErrorKind::Malformed("trailing bytes"));
        }
        Ok(value)
    }

    fn decode_at(data: &[u8], pos: &mut usize) -> Result<Self> {
        match data.get(*pos).copied() {
            Some(b'i') => {
                *pos += 1;
                let end = Self::find(data, *pos, b'e')?;
                let digits = std::str::from_utf8(&data[*pos..end])
                    .map_err(|_| ErrorKind::Malformed("non-ascii integer"))?;
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| ErrorKind::Malformed("invalid integer"))?;
                *pos = end + 1;
                Ok(Self::Integer(value))
            }
            Some(b'l') => {
                *pos += 1;
                let mut list = Vec::new();
                while data.get(*pos) != Some(&b'e') {
                    list.push(Self::decode_at(data, pos)?);
                }
                *pos += 1;
                Ok(Self::List(list))
            }
            Some(b'd') => {
                *pos += 1;
                let mut dict = BTreeMap::new();
                while data.get(*pos) != Some(&b'e') {
                    let Self::Bytes(key) = Self::decode_at(data, pos)? else {
                        exn::bail!(ErrorKind::Malformed("non-string dict key"));
                    };
                    dict.insert(key, Self::decode_at(data, pos)?);
                }
                *pos += 1;
                Ok(Self::Dict(dict))
            }
            Some(b'0'..=b'9') => {
                let colon = Self::find(data, *pos, b':')?;
                let length = std::str::from_utf8(&data[*pos..colon])
                    .ok()
                    .and_then(|digits| digits.parse::<usize>().ok())
                    .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("invalid string length")))?;
                let start = colon + 1;
                let end = start
                    .checked_add(length)
                    .filter(|end| *end <= data.len())
                    .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("string overruns input")))?;
                *pos = end;
                Ok(Self::Bytes(data[start..end].to_vec()))
            }
            _ => exn::bail!(ErrorKind::Malformed("unexpected byte")),
        }
    }

    fn find(data: &[u8], from: usize, byte: u8) -> Result<usize> {
        data[from..]
            .iter()
            .position(|b| *b == byte)
            .map(|offset| from + offset)
            .ok_or_else(|| exn::Exn::from(ErrorKind::Malformed("unterminated token")))
    }

    /// Look up a dictionary entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Dict(dict) => dict.get(key.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integer() {
        assert_eq!(Value::integer(42).encode(), b"i42e");
        assert_eq!(Value::integer(-1).encode(), b"i-1e");
        assert_eq!(Value::integer(0).encode(), b"i0e");
    }

    #[test]
    fn test_encode_string() {
        assert_eq!(Value::string("spam").encode(), b"4:spam");
        assert_eq!(Value::string("").encode(), b"0:");
    }

    #[test]
    fn test_encode_list() {
        let list = Value::list()
            .push(Value::string("spam"))
            .push(Value::integer(42));
        assert_eq!(list.encode(), b"l4:spami42ee");
    }

    #[test]
    fn test_encode_dict_sorts_keys() {
        let dict = Value::dict()
            .insert("foo", Value::integer(42))
            .insert("bar", Value::string("spam"));
        assert_eq!(dict.encode(), b"d3:bar4:spam3:fooi42ee");
    }

    #[test]
    fn test_decode_round_trip() {
        let original = Value::dict()
            .insert("a", Value::list().push(Value::integer(7)).push(Value::string("x")))
            .insert("b", Value::string("spam"));
        let decoded = Value::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_binary_string() {
        let decoded = Value::decode(b"3:\x00\x01\x02").unwrap();
        assert_eq!(decoded, Value::Bytes(vec![0, 1, 2]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Value::decode(b"x").is_err());
        assert!(Value::decode(b"i42").is_err());
        assert!(Value::decode(b"5:spam").is_err());
        assert!(Value::decode(b"i42ee").is_err(), "trailing bytes");
        assert!(Value::decode(b"d3:key").is_err());
    }

    #[test]
    fn test_dict_accessors() {
        let dict = Value::dict()
            .insert("n", Value::integer(3))
            .insert("s", Value::string("abc"))
            .insert("l", Value::list());
        assert_eq!(dict.get("n").and_then(Value::as_integer), Some(3));
        assert_eq!(dict.get("s").and_then(Value::as_str), Some("abc"));
        assert!(dict.get("l").and_then(Value::as_list).is_some());
        assert!(dict.get("missing").is_none());
    }
}
