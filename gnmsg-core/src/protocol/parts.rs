//! Part shapes shared by the message grammars.
//!
//! Every part on the wire starts with the same header:
//!
//! ```text
//! ┌──────────────┬──────────┬─────────────── Size bytes ──────────────┐
//! │ Size (i32)   │ IsObject │ payload                                  │
//! └──────────────┴──────────┴──────────────────────────────────────────┘
//! ```
//!
//! Each function here reads one part at the cursor and returns its decoded
//! fields in wire order. A failed read leaves nothing half-written in the
//! caller's record; the caller decides how to report it.

use bitflags::bitflags;
use serde_json::{json, Map, Value};

use super::codes::{DsCode, InterestPolicy, InterestType};
use super::mutf8;
use super::values::{self, bool_text};
use super::wire::{hex_encode, Result, WireReader};
use crate::error::DecodeError;

/// Decoded fields of one part, in wire order.
pub type Fields = Map<String, Value>;

/// Sentinel for fields that lie past the logger's capture window.
pub const TOO_LONG: &str = "Unavailable - message is too long";

// =============================================================================
// Part header
// =============================================================================

/// Read `Size` and `IsObject`. Returns the fields and the payload size.
pub fn object_header(r: &mut WireReader<'_>) -> Result<(Fields, i32)> {
    let size = r.read_i32()?;
    let is_object = r.read_u8()?;
    let mut fields = Fields::new();
    fields.insert("Size".into(), json!(size));
    fields.insert("IsObject".into(), json!(is_object));
    Ok((fields, size))
}

fn is_object(fields: &Fields) -> bool {
    fields.get("IsObject").and_then(Value::as_u64).unwrap_or(0) != 0
}

fn string_payload(r: &mut WireReader<'_>, size: i32) -> Result<String> {
    let offset = r.position();
    let bytes = r.read_sized(i64::from(size))?;
    mutf8::decode_string(bytes, offset)
}

// =============================================================================
// Simple parts
// =============================================================================

/// Region name (also used for query strings and function names).
pub fn region_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    part.insert("Name".into(), Value::String(string_payload(r, size)?));
    Ok(part)
}

pub fn regex_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    part.insert("Expression".into(), Value::String(string_payload(r, size)?));
    Ok(part)
}

/// Serialized object whose payload is skipped.
pub fn object_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (part, size) = object_header(r)?;
    r.read_sized(i64::from(size))?;
    Ok(part)
}

/// Serialized object reported as a hex dump.
pub fn raw_bytes_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    let bytes = r.read_sized(i64::from(size))?;
    part.insert("Bytes".into(), Value::String(hex_encode(bytes)));
    Ok(part)
}

pub fn raw_string_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    part.insert("Value".into(), Value::String(string_payload(r, size)?));
    Ok(part)
}

pub fn raw_int_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("Value".into(), json!(r.read_i32()?));
    Ok(part)
}

pub fn raw_byte_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("Value".into(), json!(r.read_u8()?));
    Ok(part)
}

pub fn raw_boolean_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("Value".into(), json!(bool_text(r.read_u8()?)));
    Ok(part)
}

pub fn timeout_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("TimeoutMs".into(), json!(r.read_i32()?));
    Ok(part)
}

pub fn byte_and_timeout_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("Byte".into(), json!(r.read_u8()?));
    part.insert("TimeoutMs".into(), json!(r.read_i32()?));
    Ok(part)
}

/// Single-byte operation part; the native client always writes size 1.
pub fn operation_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    if size != 1 {
        return Err(DecodeError::invariant(format!(
            "operation part should always be size 1, got {}",
            size
        )));
    }
    part.insert("Data".into(), json!(r.read_u8()?));
    Ok(part)
}

/// Four-byte flags part; the native client always writes size 4.
pub fn flags_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    if size != 4 {
        return Err(DecodeError::invariant(format!(
            "flags part should always be size 4, got {}",
            size
        )));
    }
    part.insert("Data".into(), json!(r.read_i32()?));
    Ok(part)
}

/// Event id: thread id and sequence id, each behind a long marker byte.
pub fn event_id_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    part.insert("LongCode1".into(), json!(r.read_u8()?));
    part.insert("EventIdThread".into(), json!(r.read_i64()?));
    part.insert("LongCode2".into(), json!(r.read_u8()?));
    part.insert("EventIdSequence".into(), json!(r.read_i64()?));
    Ok(part)
}

pub fn too_long_part() -> Fields {
    let mut part = Fields::new();
    part.insert("Data".into(), json!(TOO_LONG));
    part
}

// =============================================================================
// Keys and values
// =============================================================================

/// Key or value part. Object payloads get a best-effort scalar decode;
/// the cursor always ends exactly `Size` bytes after the header.
pub fn key_or_value(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    let span = r.read_sized(i64::from(size))?;
    describe_payload(&mut part, span);
    Ok(part)
}

/// Like [`key_or_value`], but a payload cut off by the capture window is
/// reported with [`TOO_LONG`] instead of failing.
pub fn key_or_value_capped(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    let available = r.remaining();
    if usize::try_from(size).map_or(false, |s| s <= available) {
        let span = r.read_sized(i64::from(size))?;
        describe_payload(&mut part, span);
    } else {
        let span = r.read_rest();
        if let Some(code) = span.first().and_then(|b| DsCode::from_repr(*b)) {
            if is_object(&part) {
                part.insert("DSCode".into(), json!(code.as_ref()));
            }
        }
        part.insert("Data".into(), json!(TOO_LONG));
    }
    Ok(part)
}

fn describe_payload(part: &mut Fields, span: &[u8]) {
    if !is_object(part) {
        part.insert("Bytes".into(), Value::String(hex_encode(span)));
        return;
    }
    match values::read_cacheable(&mut WireReader::new(span)) {
        Ok(c) => {
            part.insert("DSCode".into(), json!(c.ds_code().as_ref()));
            part.insert("Data".into(), c.into_value());
        }
        Err(e) => {
            log::debug!("undecodable value payload: {}", e);
            part.insert("Bytes".into(), Value::String(hex_encode(span)));
        }
    }
}

/// Object part whose payload is a single tagged value, decoded in place.
pub fn cacheable_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    let span = r.read_sized(i64::from(size))?;
    let value = values::read_cacheable(&mut WireReader::new(span))?;
    part.insert("Data".into(), value.into_value());
    Ok(part)
}

/// Credentials: an array of key/value pairs of tagged values.
pub fn credentials_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    let count = r.read_array_length()?;
    for i in 0..count.max(0) {
        part.insert(format!("Key{}", i), values::read_delimited_cacheable(r)?);
        part.insert(format!("Value{}", i), values::read_delimited_cacheable(r)?);
    }
    Ok(part)
}

// =============================================================================
// Interest registration
// =============================================================================

pub fn interest_type_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    let interest = InterestType::lookup(r.read_i32()?)?;
    part.insert("InterestType".into(), json!(interest.as_ref()));
    Ok(part)
}

pub fn interest_result_policy_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, _) = object_header(r)?;
    let code1 = DsCode::lookup(r.read_u8()?)?;
    part.insert("DSCode1".into(), json!(code1.as_ref()));
    let code2 = DsCode::lookup(r.read_u8()?)?;
    part.insert("DSCode2".into(), json!(code2.as_ref()));
    let policy = InterestPolicy::lookup(r.read_u8()?)?;
    part.insert("Policy".into(), json!(policy.as_ref()));
    Ok(part)
}

// =============================================================================
// Version tag
// =============================================================================

bitflags! {
    /// Optional-field selector at the front of a serialized version tag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VersionTagFlags: u16 {
        const HAS_MEMBER_ID = 0x01;
        const HAS_PREVIOUS_MEMBER_ID = 0x02;
        const VERSION_TWO_BYTES = 0x04;
        const DUPLICATE_MEMBER_IDS = 0x08;
        const HAS_RVV_HIGH_BYTE = 0x10;
    }
}

/// `(A | B)` rendering of a flag set, known bits only.
pub fn flag_names<F: bitflags::Flags>(flags: &F) -> String {
    let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
    format!("({})", names.join(" | "))
}

/// Version tag part. The member id tail is not decodable without the
/// distributed member serializer and is reported as raw bytes.
pub fn version_tag_part(r: &mut WireReader<'_>) -> Result<Fields> {
    let (mut part, size) = object_header(r)?;
    let span = r.read_sized(i64::from(size))?;
    let mut tag = WireReader::new(span);

    let flags = VersionTagFlags::from_bits_truncate(tag.read_u16()?);
    part.insert("Flags".into(), json!(flag_names(&flags)));

    let entry_version = if flags.contains(VersionTagFlags::VERSION_TWO_BYTES) {
        i64::from(tag.read_i16()?)
    } else {
        i64::from(tag.read_i32()?)
    };
    part.insert("EntryVersion".into(), json!(format!("{:#x}", entry_version)));

    if flags.contains(VersionTagFlags::HAS_RVV_HIGH_BYTE) {
        part.insert(
            "RegionVersionHighBytes".into(),
            json!(format!("{:#x}", tag.read_i16()?)),
        );
    }
    let low_bytes = tag.read_i32()?;
    part.insert(
        "Timestamp".into(),
        json!(format!("{:#x}", tag.read_unsigned_vl()?)),
    );
    part.insert(
        "RegionVersionLowBytes".into(),
        json!(format!("{:#x}", low_bytes)),
    );
    part.insert(
        "Un-decodable part (member id, [previous member id])".into(),
        Value::String(hex_encode(tag.read_rest())),
    );
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a part: size, is-object flag, payload.
    fn part(is_object: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = (payload.len() as i32).to_be_bytes().to_vec();
        v.push(is_object);
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn test_region_part() {
        let data = part(0, b"/orders");
        let mut r = WireReader::new(&data);
        let p = region_part(&mut r).unwrap();
        assert_eq!(p["Size"], 7);
        assert_eq!(p["IsObject"], 0);
        assert_eq!(p["Name"], "/orders");
        assert!(r.is_empty());
    }

    #[test]
    fn test_key_or_value_string() {
        let data = part(1, &[42, 0, 2, b'k', b'1']);
        let mut r = WireReader::new(&data);
        let p = key_or_value(&mut r).unwrap();
        assert_eq!(p["DSCode"], "CacheableString");
        assert_eq!(p["Data"], "k1");
        assert!(r.is_empty());
    }

    #[test]
    fn test_key_or_value_skips_opaque_span() {
        let mut data = part(1, &[93, 0xde, 0xad, 0xbe, 0xef]);
        data.extend(part(0, &[1]));
        let mut r = WireReader::new(&data);
        let p = key_or_value(&mut r).unwrap();
        assert_eq!(p["DSCode"], "PDX");
        assert_eq!(p["Data"], values::UNREADABLE);
        // next part is still aligned
        let next = raw_byte_part(&mut r).unwrap();
        assert_eq!(next["Value"], 1);
    }

    #[test]
    fn test_key_or_value_bad_scalar_falls_back_to_bytes() {
        let data = part(1, &[57, 0x01]);
        let mut r = WireReader::new(&data);
        let p = key_or_value(&mut r).unwrap();
        assert_eq!(p["Bytes"], "39 01");
        assert!(r.is_empty());
    }

    #[test]
    fn test_key_or_value_non_object() {
        let data = part(0, &[0x00, 0x01]);
        let p = key_or_value(&mut WireReader::new(&data)).unwrap();
        assert_eq!(p["Bytes"], "00 01");
        assert!(p.get("DSCode").is_none());
    }

    #[test]
    fn test_key_or_value_truncated() {
        let mut data = 100i32.to_be_bytes().to_vec();
        data.extend_from_slice(&[1, 93, 0, 0]);
        assert!(key_or_value(&mut WireReader::new(&data)).is_err());

        let mut r = WireReader::new(&data);
        let p = key_or_value_capped(&mut r).unwrap();
        assert_eq!(p["DSCode"], "PDX");
        assert_eq!(p["Data"], TOO_LONG);
        assert!(r.is_empty());
    }

    #[test]
    fn test_operation_part_size_invariant() {
        let data = part(0, &[1, 2]);
        assert!(matches!(
            operation_part(&mut WireReader::new(&data)),
            Err(DecodeError::ProtocolInvariantViolation(_))
        ));
        let data = part(0, &[3]);
        assert_eq!(operation_part(&mut WireReader::new(&data)).unwrap()["Data"], 3);
    }

    #[test]
    fn test_flags_part_size_invariant() {
        let data = part(0, &[0, 0, 1]);
        assert!(flags_part(&mut WireReader::new(&data)).is_err());
    }

    #[test]
    fn test_event_id_part() {
        let mut payload = vec![0x03];
        payload.extend_from_slice(&7i64.to_be_bytes());
        payload.push(0x03);
        payload.extend_from_slice(&42i64.to_be_bytes());
        let data = part(0, &payload);
        let p = event_id_part(&mut WireReader::new(&data)).unwrap();
        assert_eq!(p["Size"], 18);
        assert_eq!(p["EventIdThread"], 7);
        assert_eq!(p["EventIdSequence"], 42);
    }

    #[test]
    fn test_credentials_part() {
        let payload = [
            2, // two pairs
            42, 0, 4, b'u', b's', b'e', b'r', 42, 0, 3, b'b', b'o', b'b', //
            42, 0, 2, b'p', b'w', 42, 0, 1, b'x',
        ];
        let data = part(0, &payload);
        let p = credentials_part(&mut WireReader::new(&data)).unwrap();
        assert_eq!(p["Key0"], "user");
        assert_eq!(p["Value0"], "bob");
        assert_eq!(p["Key1"], "pw");
        assert_eq!(p["Value1"], "x");
    }

    #[test]
    fn test_interest_parts() {
        let data = part(0, &1i32.to_be_bytes());
        let p = interest_type_part(&mut WireReader::new(&data)).unwrap();
        assert_eq!(p["InterestType"], "REGULAR_EXPRESSION");

        let data = part(1, &[1, 37, 2]);
        let p = interest_result_policy_part(&mut WireReader::new(&data)).unwrap();
        assert_eq!(p["DSCode1"], "FixedIDByte");
        assert_eq!(p["DSCode2"], "InterestResultPolicy");
        assert_eq!(p["Policy"], "KEYS_VALUES");
    }

    #[test]
    fn test_version_tag_part() {
        let payload = [
            0x00, 0x05, // HAS_MEMBER_ID | VERSION_TWO_BYTES
            0x00, 0x02, // entry version
            0x00, 0x00, 0x00, 0x09, // region version low bytes
            0xac, 0x02, // timestamp 300
            0xaa, 0xbb, // member id
        ];
        let mut data = part(1, &payload);
        data.push(0xff);
        let mut r = WireReader::new(&data);
        let p = version_tag_part(&mut r).unwrap();
        assert_eq!(p["Flags"], "(HAS_MEMBER_ID | VERSION_TWO_BYTES)");
        assert_eq!(p["EntryVersion"], "0x2");
        assert_eq!(p["RegionVersionLowBytes"], "0x9");
        assert_eq!(p["Timestamp"], "0x12c");
        assert_eq!(p["Un-decodable part (member id, [previous member id])"], "aa bb");
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_flag_names_empty() {
        assert_eq!(flag_names(&VersionTagFlags::empty()), "()");
    }
}
