//! Best-effort decoding of serialized ("cacheable") values.
//!
//! Only the scalar types a trace reader can decode without the application's
//! type registry are handled. Anything else is reported by DS code with an
//! unreadable sentinel, and its bytes are skipped by the enclosing part.

use serde_json::{json, Value};

use super::codes::DsCode;
use super::mutf8;
use super::wire::{hex_encode, Result, WireReader};
use crate::error::DecodeError;

/// Reported in place of values that need the application's type registry.
pub const UNREADABLE: &str = "<<Unreadable - needs type registry>>";

/// Outcome of reading one tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cacheable {
    /// Fully decoded; the cursor sits after the value.
    Scalar(DsCode, Value),
    /// Type tag read but the payload was not; the cursor sits after the tag.
    Opaque(DsCode),
}

impl Cacheable {
    pub fn ds_code(&self) -> DsCode {
        match self {
            Cacheable::Scalar(code, _) | Cacheable::Opaque(code) => *code,
        }
    }

    /// Value for display, the unreadable sentinel for opaque types.
    pub fn into_value(self) -> Value {
        match self {
            Cacheable::Scalar(_, v) => v,
            Cacheable::Opaque(_) => Value::String(UNREADABLE.to_string()),
        }
    }
}

/// Read a DS code and, where possible, the value that follows it.
pub fn read_cacheable(r: &mut WireReader<'_>) -> Result<Cacheable> {
    let code = DsCode::lookup(r.read_u8()?)?;
    let value = match code {
        DsCode::NullObj | DsCode::CacheableNullString => Value::Null,
        DsCode::CacheableString | DsCode::CacheableASCIIString => {
            Value::String(read_modified_utf(r)?)
        }
        DsCode::CacheableStringHuge => {
            let chars = r.read_i32()?;
            let offset = r.position();
            let bytes = r.read_sized(i64::from(chars) * 2)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Value::String(
                String::from_utf16(&units).map_err(|_| DecodeError::InvalidString { offset })?,
            )
        }
        DsCode::CacheableASCIIStringHuge => {
            let len = r.read_i32()?;
            let offset = r.position();
            let bytes = r.read_sized(i64::from(len))?;
            Value::String(mutf8::decode_string(bytes, offset)?)
        }
        DsCode::CacheableBoolean => Value::String(bool_text(r.read_u8()?).to_string()),
        DsCode::CacheableByte => json!(r.read_i8()?),
        DsCode::CacheableInt16 => json!(r.read_i16()?),
        DsCode::CacheableInt32 => json!(r.read_i32()?),
        DsCode::CacheableInt64 => json!(r.read_i64()?),
        DsCode::CacheableFloat => json!(f32::from_bits(r.read_u32()?)),
        DsCode::CacheableDouble => json!(f64::from_bits(r.read_i64()? as u64)),
        DsCode::CacheableCharacter => {
            let unit = r.read_u16()?;
            Value::String(char::from_u32(u32::from(unit)).unwrap_or('\u{FFFD}').to_string())
        }
        DsCode::CacheableBytes => {
            let len = r.read_array_length()?;
            if len < 0 {
                Value::Null
            } else {
                Value::String(hex_encode(r.read_sized(i64::from(len))?))
            }
        }
        other => return Ok(Cacheable::Opaque(other)),
    };
    Ok(Cacheable::Scalar(code, value))
}

/// Read a tagged value that must be self-delimiting, for contexts where no
/// enclosing size lets an opaque payload be skipped.
pub fn read_delimited_cacheable(r: &mut WireReader<'_>) -> Result<Value> {
    let offset = r.position();
    match read_cacheable(r)? {
        Cacheable::Scalar(_, v) => Ok(v),
        Cacheable::Opaque(code) => Err(DecodeError::invariant(format!(
            "cannot size {} value at offset {} without a type registry",
            code, offset
        ))),
    }
}

/// Two-byte length followed by modified UTF-8.
pub fn read_modified_utf(r: &mut WireReader<'_>) -> Result<String> {
    let len = r.read_u16()?;
    let offset = r.position();
    let bytes = r.read_bytes(usize::from(len))?;
    mutf8::decode_string(bytes, offset)
}

/// Tagged string, as written for host names and member id fields.
///
/// Returns `None` without consuming anything when the next byte is not a
/// string DS code; a null string consumes its tag and yields `""`.
pub fn read_optional_string(r: &mut WireReader<'_>) -> Result<Option<String>> {
    let tag = r.peek_u8()?;
    match DsCode::from_repr(tag) {
        Some(DsCode::CacheableNullString) => {
            r.skip(1)?;
            Ok(Some(String::new()))
        }
        Some(code) if code.is_string() => match read_cacheable(r)? {
            Cacheable::Scalar(_, Value::String(s)) => Ok(Some(s)),
            _ => Ok(Some(String::new())),
        },
        _ => Ok(None),
    }
}

pub fn bool_text(b: u8) -> &'static str {
    if b == 0 {
        "False"
    } else {
        "True"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &[u8]) -> Cacheable {
        read_cacheable(&mut WireReader::new(data)).unwrap()
    }

    #[test]
    fn test_string() {
        let data = [42, 0, 3, b'k', b'e', b'y'];
        assert_eq!(
            read(&data),
            Cacheable::Scalar(DsCode::CacheableString, json!("key"))
        );
    }

    #[test]
    fn test_huge_string_is_utf16() {
        let data = [89, 0, 0, 0, 2, 0, b'h', 0, b'i'];
        assert_eq!(read(&data).into_value(), json!("hi"));
    }

    #[test]
    fn test_scalars() {
        assert_eq!(read(&[53, 1]).into_value(), json!("True"));
        assert_eq!(read(&[53, 0]).into_value(), json!("False"));
        assert_eq!(read(&[57, 0xff, 0xff, 0xff, 0xfe]).into_value(), json!(-2));
        assert_eq!(read(&[56, 0x01, 0x00]).into_value(), json!(256));
        assert_eq!(read(&[41]).into_value(), Value::Null);
        assert_eq!(read(&[69]).into_value(), Value::Null);
    }

    #[test]
    fn test_opaque_types_report_sentinel() {
        let c = read(&[93, 1, 2, 3]);
        assert_eq!(c, Cacheable::Opaque(DsCode::PDX));
        assert_eq!(c.into_value(), json!(UNREADABLE));
    }

    #[test]
    fn test_unknown_code_is_error() {
        let err = read_cacheable(&mut WireReader::new(&[250])).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownCode { code: 250, .. }));
    }

    #[test]
    fn test_delimited_rejects_opaque() {
        let mut r = WireReader::new(&[67, 0, 0]);
        assert!(read_delimited_cacheable(&mut r).is_err());
    }

    #[test]
    fn test_optional_string() {
        let mut r = WireReader::new(&[42, 0, 2, b'h', b'1', 0x07]);
        assert_eq!(read_optional_string(&mut r).unwrap(), Some("h1".to_string()));
        assert_eq!(read_optional_string(&mut r).unwrap(), None);
        assert_eq!(r.position(), 5);

        let mut r = WireReader::new(&[69]);
        assert_eq!(read_optional_string(&mut r).unwrap(), Some(String::new()));
        assert!(r.is_empty());
    }
}
