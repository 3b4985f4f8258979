//! Body grammars for client-to-server messages.
//!
//! The reader handed to each grammar is positioned just after the 17-byte
//! message header. Fields are written into the record as soon as they are
//! decoded so a failure part-way keeps the prefix.

use serde_json::{json, Value};

use super::codes::MessageType;
use super::parts::{self, Fields};
use super::wire::{Result, WireReader};
use crate::error::DecodeError;
use crate::message::{Grammar, MessageHeader};

/// Messages longer than this were cut off by the client logger.
pub const CAPTURE_LIMIT: i32 = 8192;

/// Grammar for an outbound message type, `None` for types reported with
/// header fields only.
pub fn grammar_for(message_type: MessageType) -> Option<Grammar> {
    use MessageType::*;
    let grammar: Grammar = match message_type {
        ADD_PDX_TYPE => add_pdx_type,
        CLOSECQ_MSG_TYPE | STOPCQ_MSG_TYPE => stop_or_close_cq,
        CLOSE_CONNECTION => close_connection,
        CONTAINS_KEY => contains_key,
        DESTROY => destroy,
        EXECUTECQ_MSG_TYPE => execute_cq,
        EXECUTECQ_WITH_IR_MSG_TYPE => execute_cq_with_ir,
        EXECUTE_FUNCTION => execute_function,
        GET_ALL_70 => get_all_70,
        GET_CLIENT_PARTITION_ATTRIBUTES | GET_CLIENT_PR_METADATA => region_and_objects,
        GET_FUNCTION_ATTRIBUTES => get_function_attributes,
        GET_PDX_ID_FOR_TYPE => get_pdx_id_for_type,
        GET_PDX_TYPE_BY_ID => get_pdx_type_by_id,
        KEY_SET | SIZE => region_only,
        PUT => put,
        QUERY => query,
        REGISTER_INTEREST => register_interest,
        REQUEST => request,
        USER_CREDENTIAL_MESSAGE => user_credential,

        INVALID | RESPONSE | EXCEPTION | REQUEST_DATA_ERROR | DATA_NOT_FOUND_ERROR | PING
        | REPLY | PUT_DATA_ERROR | DESTROY_DATA_ERROR | DESTROY_REGION
        | DESTROY_REGION_DATA_ERROR | CLIENT_NOTIFICATION | UPDATE_CLIENT_NOTIFICATION
        | LOCAL_INVALIDATE | LOCAL_DESTROY | LOCAL_DESTROY_REGION | PROCESS_BATCH
        | REGISTER_INTEREST_DATA_ERROR | UNREGISTER_INTEREST | UNREGISTER_INTEREST_DATA_ERROR
        | REGISTER_INTEREST_LIST | UNREGISTER_INTEREST_LIST | UNKNOWN_MESSAGE_TYPE_ERROR
        | LOCAL_CREATE | LOCAL_UPDATE | CREATE_REGION | CREATE_REGION_DATA_ERROR
        | MAKE_PRIMARY | RESPONSE_FROM_PRIMARY | RESPONSE_FROM_SECONDARY | QUERY_DATA_ERROR
        | CLEAR_REGION | CLEAR_REGION_DATA_ERROR | CONTAINS_KEY_DATA_ERROR
        | KEY_SET_DATA_ERROR | CLOSECLIENTCQS_MSG_TYPE | CQDATAERROR_MSG_TYPE
        | GETCQSTATS_MSG_TYPE | MONITORCQ_MSG_TYPE | CQ_EXCEPTION_TYPE
        | REGISTER_INSTANTIATORS | PERIODIC_ACK | CLIENT_READY | CLIENT_MARKER
        | INVALIDATE_REGION | PUTALL | GET_ALL_DATA_ERROR => return None,

        EXECUTE_REGION_FUNCTION | EXECUTE_REGION_FUNCTION_RESULT
        | EXECUTE_REGION_FUNCTION_ERROR | EXECUTE_FUNCTION_RESULT | EXECUTE_FUNCTION_ERROR
        | CLIENT_REGISTER_INTEREST | CLIENT_UNREGISTER_INTEREST | REGISTER_DATASERIALIZERS
        | REQUEST_EVENT_VALUE | REQUEST_EVENT_VALUE_ERROR | PUT_DELTA_ERROR
        | RESPONSE_CLIENT_PR_METADATA | RESPONSE_CLIENT_PARTITION_ATTRIBUTES
        | GET_CLIENT_PR_METADATA_ERROR | GET_CLIENT_PARTITION_ATTRIBUTES_ERROR
        | REMOVE_USER_AUTH | EXECUTE_REGION_FUNCTION_SINGLE_HOP => return None,

        QUERY_WITH_PARAMETERS | SIZE_ERROR | INVALIDATE | INVALIDATE_ERROR | COMMIT
        | COMMIT_ERROR | ROLLBACK | TX_FAILOVER | GET_ENTRY | TX_SYNCHRONIZATION
        | ADD_PDX_ENUM | GET_PDX_ID_FOR_ENUM | GET_PDX_ENUM_BY_ID | SERVER_TO_CLIENT_PING
        | TOMBSTONE_OPERATION | GETDURABLECQS_MSG_TYPE | GET_DURABLE_CQS_DATA_ERROR
        | GET_ALL_WITH_CALLBACK | PUT_ALL_WITH_CALLBACK | REMOVE_ALL => return None,
    };
    Some(grammar)
}

fn put_part(out: &mut Fields, name: &str, part: Fields) {
    out.insert(name.to_string(), Value::Object(part));
}

// =============================================================================
// Region operations
// =============================================================================

fn put(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "Operation", parts::operation_part(r)?);
    put_part(out, "Flags", parts::flags_part(r)?);
    put_part(out, "Key", parts::key_or_value(r)?);
    put_part(out, "IsDelta", parts::key_or_value(r)?);
    if header.length < CAPTURE_LIMIT {
        put_part(out, "Value", parts::key_or_value(r)?);
        put_part(out, "EventId", parts::event_id_part(r)?);
    } else {
        // The event id trails the value and never makes it into the log.
        put_part(out, "Value", parts::key_or_value_capped(r)?);
        put_part(out, "EventId", parts::too_long_part());
    }
    Ok(())
}

fn request(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "Key", parts::key_or_value(r)?);
    Ok(())
}

fn contains_key(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "RegionPart", parts::region_part(r)?);
    put_part(out, "Key", parts::key_or_value(r)?);
    let request_type = parts::raw_int_part(r)?;
    let name = if request_type.get("Value").and_then(Value::as_i64) == Some(1) {
        "ContainsValueForKey"
    } else {
        "ContainsKey"
    };
    out.insert("RequestType".into(), json!(name));
    Ok(())
}

fn destroy(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    if header.part_count > 5 {
        return Err(DecodeError::invariant(format!(
            "DESTROY with callback argument ({} parts) is not decodable",
            header.part_count
        )));
    }
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "Key", parts::key_or_value(r)?);
    put_part(out, "ExpectedOldValue", parts::key_or_value(r)?);
    put_part(out, "Operation", parts::operation_part(r)?);
    put_part(out, "EventId", parts::event_id_part(r)?);
    Ok(())
}

fn region_only(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    Ok(())
}

fn region_and_objects(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "RegionPart", parts::region_part(r)?);
    for i in 1..header.part_count {
        put_part(out, &format!("ObjectPart{}", i), parts::object_part(r)?);
    }
    Ok(())
}

fn get_all_70(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "KeyList", parts::key_or_value(r)?);

    // Callback argument is either a serialized object or a bare int.
    let mut probe = r.clone();
    let callback = parts::object_part(&mut probe)?;
    let callback = if callback.get("IsObject").and_then(Value::as_u64) == Some(0) {
        parts::raw_int_part(r)?
    } else {
        *r = probe;
        callback
    };
    put_part(out, "CallbackArguments", callback);
    Ok(())
}

fn close_connection(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    let (mut part, size) = parts::object_header(r)?;
    if size != 1 {
        return Err(DecodeError::invariant(format!(
            "CLOSE_CONNECTION part should be one byte long, got {}",
            size
        )));
    }
    part.insert("KeepAlive".into(), json!(r.read_u8()?));
    put_part(out, "ObjectPart", part);
    Ok(())
}

// =============================================================================
// Queries and continuous queries
// =============================================================================

fn query(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Query", parts::region_part(r)?);
    put_part(out, "EventId", parts::event_id_part(r)?);
    if header.part_count == 3 {
        put_part(out, "Timeout", parts::timeout_part(r)?);
    }
    Ok(())
}

fn execute_cq(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "CQName", parts::raw_string_part(r)?);
    put_part(out, "QueryString", parts::raw_string_part(r)?);
    put_part(out, "CqState", parts::raw_int_part(r)?);
    put_part(out, "Durable", parts::raw_boolean_part(r)?);
    put_part(out, "RegionDataPolicy", parts::raw_byte_part(r)?);
    Ok(())
}

fn execute_cq_with_ir(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    if header.part_count != 5 {
        return Err(DecodeError::invariant(format!(
            "EXECUTECQ_WITH_IR_MSG_TYPE should always have 5 parts, got {}",
            header.part_count
        )));
    }
    execute_cq(header, r, out)
}

fn stop_or_close_cq(header: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "EventId", parts::event_id_part(r)?);
    if header.part_count == 3 {
        put_part(out, "Timeout", parts::timeout_part(r)?);
    }
    Ok(())
}

fn register_interest(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Region", parts::region_part(r)?);
    put_part(out, "InterestType", parts::interest_type_part(r)?);
    put_part(out, "InterestResultPolicy", parts::interest_result_policy_part(r)?);
    put_part(out, "IsDurable", parts::raw_byte_part(r)?);
    put_part(out, "Regex", parts::regex_part(r)?);

    let (mut param1, size) = parts::object_header(r)?;
    let bytes = r.read_sized(i64::from(size))?;
    let receive_values = bytes.first().copied().ok_or_else(|| {
        DecodeError::invariant("REGISTER_INTEREST receive-values part is empty")
    })?;
    param1.insert("ReceiveValues".into(), json!(receive_values));
    put_part(out, "Param1", param1);

    let (mut param2, size) = parts::object_header(r)?;
    let bytes = r.read_sized(i64::from(size))?;
    match bytes {
        [caching, serialize, ..] => {
            param2.insert("CachingEnabled".into(), json!(caching));
            param2.insert("SerializeValues".into(), json!(serialize));
        }
        _ => {
            return Err(DecodeError::invariant(
                "REGISTER_INTEREST caching part should carry two bytes",
            ))
        }
    }
    put_part(out, "Param2", param2);
    Ok(())
}

// =============================================================================
// Functions, PDX, credentials
// =============================================================================

fn execute_function(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "ByteAndTimeout", parts::byte_and_timeout_part(r)?);
    put_part(out, "FunctionName", parts::region_part(r)?);
    put_part(out, "Arguments", parts::object_part(r)?);
    Ok(())
}

fn get_function_attributes(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "FunctionName", parts::region_part(r)?);
    Ok(())
}

fn get_pdx_id_for_type(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "PdxType", parts::object_part(r)?);
    Ok(())
}

fn get_pdx_type_by_id(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "TypeId", parts::raw_int_part(r)?);
    Ok(())
}

fn add_pdx_type(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "PdxType", parts::raw_bytes_part(r)?);
    put_part(out, "TypeId", parts::raw_int_part(r)?);
    Ok(())
}

fn user_credential(_: &MessageHeader, r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    put_part(out, "Credentials", parts::credentials_part(r)?);
    Ok(())
}
