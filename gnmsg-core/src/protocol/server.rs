//! Body grammars for server-to-client messages.
//!
//! Server bodies are traced separately from their headers, so readers start
//! at offset 0 of the body. Generic replies (`RESPONSE`, `REPLY`) have no
//! shape of their own; their grammar is picked from the request the same
//! thread sent last.

use bitflags::bitflags;
use serde_json::{json, Value};

use super::codes::MessageType;
use super::parts::{self, flag_names, Fields};
use super::wire::{Result, WireReader};
use crate::message::{Grammar, MessageHeader};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DestroyReplyFlags: u32 {
        const HAS_VERSION_TAG = 0x01;
        const HAS_ENTRY_NOT_FOUND_PART = 0x02;
    }
}

/// Grammar for an inbound message.
///
/// Types with a fixed shape are looked up directly; otherwise the
/// `<request>_<response>` pair decides.
pub fn grammar_for(response: MessageType, last_request: Option<MessageType>) -> Option<Grammar> {
    use MessageType::*;
    let direct: Option<Grammar> = match response {
        EXCEPTION => Some(exception),
        RESPONSE_CLIENT_PARTITION_ATTRIBUTES => Some(partition_attributes),
        RESPONSE_CLIENT_PR_METADATA => Some(pr_metadata),
        _ => None,
    };
    if direct.is_some() {
        return direct;
    }

    let grammar: Grammar = match (last_request?, response) {
        (PUT, REPLY) => put_reply,
        (DESTROY, REPLY) => destroy_reply,
        (CONTAINS_KEY, RESPONSE) => contains_key_response,
        (REQUEST, RESPONSE) => request_response,
        (SIZE, RESPONSE) => size_response,
        (GET_PDX_ID_FOR_TYPE, RESPONSE) => pdx_id_response,
        (ADD_PDX_TYPE, REPLY) | (PING, REPLY) => ok_bytes_reply,
        (GET_FUNCTION_ATTRIBUTES, RESPONSE) => function_attributes_response,
        (USER_CREDENTIAL_MESSAGE, RESPONSE) => user_credential_response,
        _ => return None,
    };
    Some(grammar)
}

/// Composite name of a request/response pair, as used in diagnostics.
pub fn composite_key(last_request: MessageType, response: MessageType) -> String {
    format!("{}_{}", last_request, response)
}

fn put_part(out: &mut Fields, name: &str, part: Fields) {
    out.insert(name.to_string(), Value::Object(part));
}

// =============================================================================
// Direct grammars
// =============================================================================

/// Serialized Java exception followed by its plain-text rendering.
fn exception(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "SerializedJavaObjectPart", parts::object_part(r)?);
    let (mut text, size) = parts::object_header(r)?;
    let bytes = r.read_sized(i64::from(size))?;
    let message = String::from_utf8_lossy(bytes);
    text.insert("ExceptionMessageAndCallstack".into(), json!(message));
    put_part(out, "StringRepresentationPart", text);
    Ok(())
}

fn partition_attributes(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "BucketCount", parts::cacheable_part(r)?);
    put_part(out, "ColocatedWith", parts::key_or_value(r)?);
    if header.part_count == 3 || header.part_count == 4 {
        // TODO: the fixed-partition attribute list that may follow is not decoded
        put_part(out, "PartitionResolverName", parts::key_or_value(r)?);
    }
    Ok(())
}

fn pr_metadata(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    for i in 0..header.part_count {
        put_part(out, &format!("ObjectPart{}", i), parts::raw_bytes_part(r)?);
    }
    Ok(())
}

// =============================================================================
// Replies that depend on the request
// =============================================================================

fn put_reply(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Bytes", parts::raw_bytes_part(r)?);
    put_part(out, "Flags", parts::raw_int_part(r)?);
    if header.part_count >= 3 {
        put_part(out, "OldValue", parts::raw_bytes_part(r)?);
        if header.part_count == 4 {
            put_part(out, "VersionTag", parts::object_part(r)?);
        }
    }
    Ok(())
}

fn destroy_reply(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    let (mut flags_part, _) = parts::object_header(r)?;
    let raw = r.read_i32()?;
    let flags = DestroyReplyFlags::from_bits_truncate(raw as u32);
    flags_part.insert(
        "Flags".into(),
        json!(format!("{:#010x} {}", raw, flag_names(&flags))),
    );
    put_part(out, "Flags", flags_part);

    if flags.contains(DestroyReplyFlags::HAS_VERSION_TAG) {
        put_part(out, "VersionTag", parts::version_tag_part(r)?);
    }
    put_part(out, "OkBytes", parts::raw_bytes_part(r)?);
    if flags.contains(DestroyReplyFlags::HAS_ENTRY_NOT_FOUND_PART) {
        let (mut part, _) = parts::object_header(r)?;
        let not_found = r.read_i32()? == 1;
        part.insert("EntryNotFound".into(), json!(not_found.to_string()));
        put_part(out, "EntryNotFoundPart", part);
    }
    Ok(())
}

fn contains_key_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Response", parts::key_or_value(r)?);
    Ok(())
}

fn request_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Value", parts::key_or_value(r)?);
    Ok(())
}

fn size_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "RegionSize", parts::key_or_value(r)?);
    Ok(())
}

fn pdx_id_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "TypeId", parts::raw_int_part(r)?);
    Ok(())
}

fn ok_bytes_reply(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "OkBytes", parts::raw_bytes_part(r)?);
    Ok(())
}

fn function_attributes_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "FunctionAttributes", parts::raw_bytes_part(r)?);
    Ok(())
}

fn user_credential_response(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "SecureBytes", parts::raw_bytes_part(r)?);
    Ok(())
}
