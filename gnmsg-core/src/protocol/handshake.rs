//! Connection-setup grammars: the client/server handshake and the
//! locator request/response exchange.
//!
//! # Handshake layout
//!
//! ```text
//! conn type │ version │ REPLY_OK │ read timeout (or port list) │ FixedIDByte
//! └─ client proxy ─────────────────────────────────────────────────────────┐
//!    membership id │ ? │ FixedIDByte │ member id │ address │ sync counter  │
//!    hostname │ split brain │ dc port │ vpid │ vm kind │ roles │ ds name   │
//!    unique tag │ [durable id, timeout] │ version ordinal                  │
//! ─────────────────────────────────────────────────────────────────────────┘
//! 1 (int) │ overrides │ credentials type
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

use serde_json::{json, Value};

use super::codes::{ConnectionType, CredentialsType, DsCode, FixedId};
use super::parts::Fields;
use super::values::read_optional_string;
use super::wire::{hex_encode, Result, WireReader};
use crate::error::DecodeError;

// =============================================================================
// Server handshake
// =============================================================================

pub fn handshake(r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    let connection_type = ConnectionType::lookup(r.read_u8()?)?;
    out.insert("ConnectionType".into(), json!(connection_type.as_ref()));
    out.insert("VersionOrdinal".into(), json!(r.read_u8()?));
    out.insert("ReplyOK".into(), json!(r.read_u8()?));

    if connection_type.is_server_to_client() {
        let count = r.read_i32()?;
        let ports = (0..count.max(0))
            .map(|_| r.read_i32())
            .collect::<Result<Vec<_>>>()?;
        out.insert("Ports".into(), json!(ports));
    } else {
        out.insert("ReadTimeout".into(), json!(r.read_i32()?));
    }

    out.insert("FixedIDByte".into(), json!(r.read_u8()?));

    let mut proxy = Fields::new();
    let result = client_proxy(r, &mut proxy);
    out.insert("ClientProxy".into(), Value::Object(proxy));
    result?;

    out.insert("ThisValueisAlways1".into(), json!(r.read_i32()?));
    out.insert("Overrides".into(), json!(r.read_u8()?));
    let credentials = CredentialsType::lookup(r.read_u8()?)?;
    out.insert("CredentialsTypeFlag".into(), json!(credentials.as_ref()));
    Ok(())
}

fn client_proxy(r: &mut WireReader<'_>, proxy: &mut Fields) -> Result<()> {
    proxy.insert("MembershipIDByte".into(), json!(r.read_u8()?));
    proxy.insert("MysteryByte".into(), json!(r.read_u8()?));
    proxy.insert("FixedIDByte".into(), json!(r.read_u8()?));
    proxy.insert("InternalDistributedMemberID".into(), json!(r.read_u8()?));
    proxy.insert("Address".into(), json!(address(r)?));
    proxy.insert("SyncCounter".into(), json!(r.read_i32()?));
    proxy.insert("Hostname".into(), json!(read_optional_string(r)?.unwrap_or_default()));
    proxy.insert("SplitBrainFlag".into(), json!(r.read_u8()?));
    proxy.insert("DCPort".into(), json!(r.read_i32()?));
    proxy.insert("VPID".into(), json!(r.read_i32()?));
    proxy.insert("VMKind".into(), json!(r.read_u8()?));
    proxy.insert("RoleArrayLength".into(), json!(r.read_array_length()?));
    proxy.insert("DSName".into(), json!(read_optional_string(r)?.unwrap_or_default()));
    proxy.insert("UniqueTag".into(), json!(read_optional_string(r)?.unwrap_or_default()));

    // Durable id and timeout are only written for durable clients.
    if let Some(durable_id) = read_optional_string(r)? {
        proxy.insert("DurableClientID".into(), json!(durable_id));
        proxy.insert("DurableClientTimeout".into(), json!(r.read_i32()?));
    }

    let ordinal = match r.read_u8()? {
        0xFF => i32::from(r.read_i16()?),
        b => i32::from(b),
    };
    proxy.insert("Version".into(), json!(ordinal));
    Ok(())
}

/// Length-prefixed host address.
fn address(r: &mut WireReader<'_>) -> Result<String> {
    let len = r.read_u8()?;
    let bytes = r.read_bytes(usize::from(len))?;
    Ok(match bytes.len() {
        4 => Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string(),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ipv6Addr::from(octets).to_string()
        }
        _ => hex_encode(bytes),
    })
}

// =============================================================================
// Locator exchange
// =============================================================================

fn server_location(r: &mut WireReader<'_>) -> Result<Value> {
    let offset = r.position();
    let hostname = read_optional_string(r)?.ok_or(DecodeError::InvalidString { offset })?;
    let port = r.read_i32()?;
    Ok(json!({ "Hostname": hostname, "Port": port }))
}

fn server_locations(r: &mut WireReader<'_>) -> Result<Value> {
    let count = r.read_i32()?;
    let list = (0..count.max(0))
        .map(|_| server_location(r))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(list))
}

fn bool_field(r: &mut WireReader<'_>) -> Result<bool> {
    Ok(r.read_u8()? != 0)
}

/// DS code byte plus the fixed id naming the request or response class.
fn object_tag(r: &mut WireReader<'_>, out: &mut Fields, key: &str) -> Result<Option<FixedId>> {
    let ds_code = DsCode::lookup(r.read_u8()?)?;
    out.insert("DSCode".into(), json!(ds_code.as_ref()));
    if ds_code != DsCode::FixedIDByte {
        return Ok(None);
    }
    let id = FixedId::lookup(r.read_i8()?)?;
    out.insert(key.into(), json!(id.as_ref()));
    Ok(Some(id))
}

fn remaining(r: &mut WireReader<'_>, out: &mut Fields, key: &str) {
    if !r.is_empty() {
        out.insert(key.into(), json!(hex_encode(r.read_rest())));
    }
}

/// Request sent by a client to a locator.
pub fn locator_request(r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    out.insert("GossipVersion".into(), json!(r.read_i32()?));
    out.insert("ProtocolOrdinal".into(), json!(r.read_i32()?));
    match object_tag(r, out, "RequestType")? {
        Some(FixedId::LocatorListRequest) | Some(FixedId::GetAllServersRequest) => {
            out.insert("ServerGroup".into(), json!(read_optional_string(r)?));
        }
        Some(FixedId::ClientConnectionRequest) => {
            out.insert("ServerGroup".into(), json!(read_optional_string(r)?));
            out.insert("ExcludedServers".into(), server_locations(r)?);
        }
        Some(FixedId::ClientReplacementRequest) => {
            out.insert("ServerGroup".into(), json!(read_optional_string(r)?));
            out.insert("ExcludedServers".into(), server_locations(r)?);
            out.insert("CurrentServer".into(), server_location(r)?);
        }
        _ => {}
    }
    remaining(r, out, "Bytes");
    Ok(())
}

/// Locator reply to a [`locator_request`].
pub fn locator_response(r: &mut WireReader<'_>, out: &mut Fields) -> Result<()> {
    match object_tag(r, out, "ResponseType")? {
        Some(FixedId::ClientConnectionResponse) => {
            let found = bool_field(r)?;
            out.insert("ServerFound".into(), json!(found));
            if found {
                out.insert("Server".into(), server_location(r)?);
            }
        }
        Some(FixedId::LocatorListResponse) => {
            out.insert("Locators".into(), server_locations(r)?);
            out.insert("IsBalanced".into(), json!(bool_field(r)?));
        }
        Some(FixedId::QueueConnectionResponse) => {
            out.insert("DurableQueueFound".into(), json!(bool_field(r)?));
            out.insert("Servers".into(), server_locations(r)?);
        }
        Some(FixedId::GetAllServersResponse) => {
            out.insert("Servers".into(), server_locations(r)?);
        }
        _ => {}
    }
    remaining(r, out, "Bytes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Vec<u8> {
        let mut v = vec![42];
        v.extend_from_slice(&(s.len() as u16).to_be_bytes());
        v.extend_from_slice(s.as_bytes());
        v
    }

    fn location(host: &str, port: i32) -> Vec<u8> {
        let mut v = string(host);
        v.extend_from_slice(&port.to_be_bytes());
        v
    }

    fn client_handshake(durable: Option<(&str, i32)>) -> Vec<u8> {
        let mut v = vec![100, 125, 59];
        v.extend_from_slice(&(0x7fff_ffff - 10000i32).to_be_bytes());
        v.extend_from_slice(&[1, 38, 0x5a, 1, 92]);
        v.extend_from_slice(&[4, 10, 0, 0, 7]);
        v.extend_from_slice(&12i32.to_be_bytes());
        v.extend(string("client-host"));
        v.push(0);
        v.extend_from_slice(&0i32.to_be_bytes());
        v.extend_from_slice(&4242i32.to_be_bytes());
        v.push(13);
        v.push(0);
        v.extend(string(""));
        v.extend(string("tag"));
        if let Some((id, timeout)) = durable {
            v.extend(string(id));
            v.extend_from_slice(&timeout.to_be_bytes());
        }
        v.push(125);
        v.extend_from_slice(&1i32.to_be_bytes());
        v.push(1);
        v.push(0);
        v
    }

    #[test]
    fn test_client_to_server_handshake() {
        let data = client_handshake(None);
        let mut out = Fields::new();
        handshake(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["ConnectionType"], "CLIENT_TO_SERVER");
        assert_eq!(out["ReadTimeout"], 0x7fff_ffff - 10000);
        let proxy = &out["ClientProxy"];
        assert_eq!(proxy["Address"], "10.0.0.7");
        assert_eq!(proxy["Hostname"], "client-host");
        assert_eq!(proxy["VPID"], 4242);
        assert_eq!(proxy["UniqueTag"], "tag");
        assert!(proxy.get("DurableClientID").is_none());
        assert_eq!(proxy["Version"], 125);
        assert_eq!(out["ThisValueisAlways1"], 1);
        assert_eq!(out["CredentialsTypeFlag"], "SECURITY_CREDENTIALS_NONE");
    }

    #[test]
    fn test_durable_client_handshake() {
        let data = client_handshake(Some(("durable-1", 300)));
        let mut out = Fields::new();
        handshake(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["ClientProxy"]["DurableClientID"], "durable-1");
        assert_eq!(out["ClientProxy"]["DurableClientTimeout"], 300);
        assert_eq!(out["CredentialsTypeFlag"], "SECURITY_CREDENTIALS_NONE");
    }

    #[test]
    fn test_subscription_handshake_has_ports() {
        let mut data = vec![101, 125, 59];
        data.extend_from_slice(&2i32.to_be_bytes());
        data.extend_from_slice(&40404i32.to_be_bytes());
        data.extend_from_slice(&40405i32.to_be_bytes());
        let mut out = Fields::new();
        let result = handshake(&mut WireReader::new(&data), &mut out);
        assert!(result.is_err());
        assert_eq!(out["ConnectionType"], "PRIMARY_SERVER_TO_CLIENT");
        assert_eq!(out["Ports"], json!([40404, 40405]));
        assert!(out.get("ReadTimeout").is_none());
    }

    #[test]
    fn test_ipv6_address() {
        let mut data = vec![16];
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.push(0xee);
        let mut r = WireReader::new(&data);
        assert_eq!(address(&mut r).unwrap(), "::1");
        assert_eq!(r.read_u8().unwrap(), 0xee);
    }

    #[test]
    fn test_client_connection_request() {
        let mut data = 1002i32.to_be_bytes().to_vec();
        data.extend_from_slice(&125i32.to_be_bytes());
        data.extend_from_slice(&[1, (-53i8) as u8]);
        data.push(69);
        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend(location("server-a", 40404));
        let mut out = Fields::new();
        locator_request(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["GossipVersion"], 1002);
        assert_eq!(out["RequestType"], "ClientConnectionRequest");
        assert_eq!(out["ServerGroup"], "");
        assert_eq!(out["ExcludedServers"][0]["Hostname"], "server-a");
        assert_eq!(out["ExcludedServers"][0]["Port"], 40404);
        assert!(out.get("Bytes").is_none());
    }

    #[test]
    fn test_queue_connection_request_is_raw() {
        let mut data = 1002i32.to_be_bytes().to_vec();
        data.extend_from_slice(&125i32.to_be_bytes());
        data.extend_from_slice(&[1, (-52i8) as u8, 0xab, 0xcd]);
        let mut out = Fields::new();
        locator_request(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["RequestType"], "QueueConnectionRequest");
        assert_eq!(out["Bytes"], "ab cd");
    }

    #[test]
    fn test_locator_responses() {
        let mut data = vec![1, (-50i8) as u8, 1];
        data.extend(location("server-b", 40405));
        let mut out = Fields::new();
        locator_response(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["ResponseType"], "ClientConnectionResponse");
        assert_eq!(out["ServerFound"], true);
        assert_eq!(out["Server"]["Hostname"], "server-b");

        let mut data = vec![1, (-51i8) as u8];
        data.extend_from_slice(&2i32.to_be_bytes());
        data.extend(location("loc1", 10334));
        data.extend(location("loc2", 10335));
        data.push(1);
        let mut out = Fields::new();
        locator_response(&mut WireReader::new(&data), &mut out).unwrap();
        assert_eq!(out["Locators"][1]["Port"], 10335);
        assert_eq!(out["IsBalanced"], true);
    }
}
