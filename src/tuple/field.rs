//! Field types and values.

use std::fmt;

use crate::common::config::STRING_LEN;

/// Type of a column. Every type has a fixed on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 32-bit signed integer, 4 bytes big-endian.
    Int,
    /// Text of at most [`STRING_LEN`] bytes, stored as a 4-byte big-endian
    /// length followed by `STRING_LEN` bytes of zero-padded payload.
    Text,
}

impl FieldType {
    /// Bytes this type occupies in a serialized tuple.
    pub const fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Text => 4 + STRING_LEN,
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Text(_) => FieldType::Text,
        }
    }

    /// Append this field's fixed-width encoding to `out`.
    ///
    /// Text longer than [`STRING_LEN`] bytes is truncated on a character
    /// boundary. [`Tuple::new`](super::Tuple::new) refuses such values, so
    /// fields stored in a tuple are always written whole.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Text(s) => {
                let bytes = truncated(s).as_bytes();
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
                out.resize(out.len() + STRING_LEN - bytes.len(), 0);
            }
        }
    }

    /// Decode a field of type `ty` from the front of `data`.
    ///
    /// Returns a description of the problem if the bytes are not a valid
    /// encoding; callers attach the page identity.
    pub fn read_from(ty: FieldType, data: &[u8]) -> std::result::Result<Field, String> {
        if data.len() < ty.byte_len() {
            return Err(format!(
                "field needs {} bytes, {} available",
                ty.byte_len(),
                data.len()
            ));
        }
        match ty {
            FieldType::Int => Ok(Field::Int(i32::from_be_bytes([
                data[0], data[1], data[2], data[3],
            ]))),
            FieldType::Text => {
                let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
                if len > STRING_LEN {
                    return Err(format!("text length {} exceeds {}", len, STRING_LEN));
                }
                let s = std::str::from_utf8(&data[4..4 + len])
                    .map_err(|e| format!("text is not UTF-8: {}", e))?;
                Ok(Field::Text(s.to_string()))
            }
        }
    }
}

fn truncated(s: &str) -> &str {
    if s.len() <= STRING_LEN {
        return s;
    }
    let mut end = STRING_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_encoding_is_big_endian() {
        let mut out = Vec::new();
        Field::Int(0x01020304).write_to(&mut out);
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert_eq!(Field::read_from(FieldType::Int, &out).unwrap(), Field::Int(0x01020304));
    }

    #[test]
    fn test_text_is_fixed_width() {
        let mut out = Vec::new();
        Field::from("hello").write_to(&mut out);
        assert_eq!(out.len(), FieldType::Text.byte_len());
        assert_eq!(&out[..4], &5u32.to_be_bytes());
        assert_eq!(
            Field::read_from(FieldType::Text, &out).unwrap(),
            Field::Text("hello".into())
        );
    }

    #[test]
    fn test_long_text_truncated_on_char_boundary() {
        let long = "é".repeat(STRING_LEN);
        let mut out = Vec::new();
        Field::Text(long).write_to(&mut out);
        assert_eq!(out.len(), FieldType::Text.byte_len());

        match Field::read_from(FieldType::Text, &out).unwrap() {
            Field::Text(s) => assert!(s.len() <= STRING_LEN),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_text_length_rejected() {
        let mut out = vec![0u8; FieldType::Text.byte_len()];
        out[..4].copy_from_slice(&(STRING_LEN as u32 + 1).to_be_bytes());
        assert!(Field::read_from(FieldType::Text, &out).is_err());
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(Field::read_from(FieldType::Int, &[0, 1]).is_err());
    }
}
