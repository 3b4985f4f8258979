//! Code tables: integer protocol codes to symbolic names.
//!
//! Each table is a closed enum. `from_repr` (strum) does the integer lookup,
//! `as_ref()`/`Display` give the wire name, and the `lookup` helpers of the
//! tables read inside a body turn a miss into [`DecodeError::UnknownCode`].

use strum::{AsRefStr, Display, FromRepr};

use crate::error::DecodeError;

// =============================================================================
// Message types
// =============================================================================

/// Message type codes carried in the first int of every message header.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, AsRefStr, Display)]
#[repr(i32)]
pub enum MessageType {
    INVALID = -1,
    REQUEST = 0,
    RESPONSE = 1,
    EXCEPTION = 2,
    REQUEST_DATA_ERROR = 3,
    DATA_NOT_FOUND_ERROR = 4,
    PING = 5,
    REPLY = 6,
    PUT = 7,
    PUT_DATA_ERROR = 8,
    DESTROY = 9,
    DESTROY_DATA_ERROR = 10,
    DESTROY_REGION = 11,
    DESTROY_REGION_DATA_ERROR = 12,
    CLIENT_NOTIFICATION = 13,
    UPDATE_CLIENT_NOTIFICATION = 14,
    LOCAL_INVALIDATE = 15,
    LOCAL_DESTROY = 16,
    LOCAL_DESTROY_REGION = 17,
    CLOSE_CONNECTION = 18,
    PROCESS_BATCH = 19,
    REGISTER_INTEREST = 20,
    REGISTER_INTEREST_DATA_ERROR = 21,
    UNREGISTER_INTEREST = 22,
    UNREGISTER_INTEREST_DATA_ERROR = 23,
    REGISTER_INTEREST_LIST = 24,
    UNREGISTER_INTEREST_LIST = 25,
    UNKNOWN_MESSAGE_TYPE_ERROR = 26,
    LOCAL_CREATE = 27,
    LOCAL_UPDATE = 28,
    CREATE_REGION = 29,
    CREATE_REGION_DATA_ERROR = 30,
    MAKE_PRIMARY = 31,
    RESPONSE_FROM_PRIMARY = 32,
    RESPONSE_FROM_SECONDARY = 33,
    QUERY = 34,
    QUERY_DATA_ERROR = 35,
    CLEAR_REGION = 36,
    CLEAR_REGION_DATA_ERROR = 37,
    CONTAINS_KEY = 38,
    CONTAINS_KEY_DATA_ERROR = 39,
    KEY_SET = 40,
    KEY_SET_DATA_ERROR = 41,
    EXECUTECQ_MSG_TYPE = 42,
    EXECUTECQ_WITH_IR_MSG_TYPE = 43,
    STOPCQ_MSG_TYPE = 44,
    CLOSECQ_MSG_TYPE = 45,
    CLOSECLIENTCQS_MSG_TYPE = 46,
    CQDATAERROR_MSG_TYPE = 47,
    GETCQSTATS_MSG_TYPE = 48,
    MONITORCQ_MSG_TYPE = 49,
    CQ_EXCEPTION_TYPE = 50,
    REGISTER_INSTANTIATORS = 51,
    PERIODIC_ACK = 52,
    CLIENT_READY = 53,
    CLIENT_MARKER = 54,
    INVALIDATE_REGION = 55,
    PUTALL = 56,
    GET_ALL_DATA_ERROR = 58,
    EXECUTE_REGION_FUNCTION = 59,
    EXECUTE_REGION_FUNCTION_RESULT = 60,
    EXECUTE_REGION_FUNCTION_ERROR = 61,
    EXECUTE_FUNCTION = 62,
    EXECUTE_FUNCTION_RESULT = 63,
    EXECUTE_FUNCTION_ERROR = 64,
    CLIENT_REGISTER_INTEREST = 65,
    CLIENT_UNREGISTER_INTEREST = 66,
    REGISTER_DATASERIALIZERS = 67,
    REQUEST_EVENT_VALUE = 68,
    REQUEST_EVENT_VALUE_ERROR = 69,
    PUT_DELTA_ERROR = 70,
    GET_CLIENT_PR_METADATA = 71,
    RESPONSE_CLIENT_PR_METADATA = 72,
    GET_CLIENT_PARTITION_ATTRIBUTES = 73,
    RESPONSE_CLIENT_PARTITION_ATTRIBUTES = 74,
    GET_CLIENT_PR_METADATA_ERROR = 75,
    GET_CLIENT_PARTITION_ATTRIBUTES_ERROR = 76,
    USER_CREDENTIAL_MESSAGE = 77,
    REMOVE_USER_AUTH = 78,
    EXECUTE_REGION_FUNCTION_SINGLE_HOP = 79,
    QUERY_WITH_PARAMETERS = 80,
    SIZE = 81,
    SIZE_ERROR = 82,
    INVALIDATE = 83,
    INVALIDATE_ERROR = 84,
    COMMIT = 85,
    COMMIT_ERROR = 86,
    ROLLBACK = 87,
    TX_FAILOVER = 88,
    GET_ENTRY = 89,
    TX_SYNCHRONIZATION = 90,
    GET_FUNCTION_ATTRIBUTES = 91,
    GET_PDX_TYPE_BY_ID = 92,
    GET_PDX_ID_FOR_TYPE = 93,
    ADD_PDX_TYPE = 94,
    ADD_PDX_ENUM = 96,
    GET_PDX_ID_FOR_ENUM = 97,
    GET_PDX_ENUM_BY_ID = 98,
    SERVER_TO_CLIENT_PING = 99,
    GET_ALL_70 = 100,
    TOMBSTONE_OPERATION = 103,
    GETDURABLECQS_MSG_TYPE = 105,
    GET_DURABLE_CQS_DATA_ERROR = 106,
    GET_ALL_WITH_CALLBACK = 107,
    PUT_ALL_WITH_CALLBACK = 108,
    REMOVE_ALL = 109,
}

impl MessageType {
    /// Types the client tags with a security footer when security is on.
    pub fn requires_security_footer(self) -> bool {
        use MessageType::*;
        matches!(
            self,
            ADD_PDX_ENUM
                | ADD_PDX_TYPE
                | CLIENT_READY
                | CLOSE_CONNECTION
                | COMMIT
                | GETCQSTATS_MSG_TYPE
                | GET_CLIENT_PARTITION_ATTRIBUTES
                | GET_CLIENT_PR_METADATA
                | GET_ENTRY
                | GET_FUNCTION_ATTRIBUTES
                | GET_PDX_ENUM_BY_ID
                | GET_PDX_ID_FOR_ENUM
                | GET_PDX_ID_FOR_TYPE
                | GET_PDX_TYPE_BY_ID
                | INVALID
                | MAKE_PRIMARY
                | MONITORCQ_MSG_TYPE
                | PERIODIC_ACK
                | PING
                | REQUEST_EVENT_VALUE
                | ROLLBACK
                | SIZE
                | TX_FAILOVER
                | TX_SYNCHRONIZATION
                | USER_CREDENTIAL_MESSAGE
        )
    }
}

// =============================================================================
// Serialization type tags
// =============================================================================

/// Single-byte tag preceding a serialized value.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, AsRefStr, Display)]
#[repr(u8)]
pub enum DsCode {
    FixedIDDefault = 0,
    FixedIDByte = 1,
    FixedIDShort = 2,
    FixedIDInt = 3,
    FixedIDNone = 4,
    CacheableLinkedList = 10,
    Properties = 11,
    PdxType = 17,
    BooleanArray = 26,
    CharArray = 27,
    InterestResultPolicy = 37,
    ClientProxyMembershipId = 38,
    CacheableUserData = 39,
    NullObj = 41,
    CacheableString = 42,
    Class = 43,
    JavaSerializable = 44,
    DataSerializable = 45,
    CacheableBytes = 46,
    CacheableInt16Array = 47,
    CacheableInt32Array = 48,
    CacheableInt64Array = 49,
    CacheableFloatArray = 50,
    CacheableDoubleArray = 51,
    CacheableObjectArray = 52,
    CacheableBoolean = 53,
    CacheableCharacter = 54,
    CacheableByte = 55,
    CacheableInt16 = 56,
    CacheableInt32 = 57,
    CacheableInt64 = 58,
    CacheableFloat = 59,
    CacheableDouble = 60,
    CacheableDate = 61,
    CacheableFileName = 63,
    CacheableStringArray = 64,
    CacheableArrayList = 65,
    CacheableHashSet = 66,
    CacheableHashMap = 67,
    CacheableTimeUnit = 68,
    CacheableNullString = 69,
    CacheableHashTable = 70,
    CacheableVector = 71,
    CacheableIdentityHashMap = 72,
    CacheableLinkedHashSet = 73,
    CacheableStack = 74,
    CacheableASCIIString = 87,
    CacheableASCIIStringHuge = 88,
    CacheableStringHuge = 89,
    InternalDistributedMember = 92,
    PDX = 93,
    PDX_ENUM = 94,
}

impl DsCode {
    pub fn lookup(code: u8) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "DSCode",
            code: i64::from(code),
        })
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            DsCode::CacheableString
                | DsCode::CacheableStringHuge
                | DsCode::CacheableASCIIString
                | DsCode::CacheableASCIIStringHuge
        )
    }
}

// =============================================================================
// Fixed IDs (locator traffic)
// =============================================================================

/// Fixed-ID tags written after a `FixedIDByte` DS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, AsRefStr, Display)]
#[repr(i8)]
pub enum FixedId {
    LocatorListRequest = -54,
    ClientConnectionRequest = -53,
    QueueConnectionRequest = -52,
    LocatorListResponse = -51,
    ClientConnectionResponse = -50,
    QueueConnectionResponse = -49,
    ClientReplacementRequest = -48,
    GetAllServersRequest = -43,
    GetAllServersResponse = -42,
}

impl FixedId {
    pub fn lookup(code: i8) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "fixed id",
            code: i64::from(code),
        })
    }
}

// =============================================================================
// Interest registration
// =============================================================================

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, AsRefStr, Display)]
#[repr(u8)]
pub enum InterestPolicy {
    NONE = 0,
    KEYS = 1,
    KEYS_VALUES = 2,
}

impl InterestPolicy {
    pub fn lookup(code: u8) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "interest policy",
            code: i64::from(code),
        })
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, AsRefStr, Display)]
#[repr(i32)]
pub enum InterestType {
    KEY = 0,
    REGULAR_EXPRESSION = 1,
    FILTER_CLASS = 2,
    OQL_QUERY = 3,
    CQ = 4,
}

impl InterestType {
    pub fn lookup(code: i32) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "interest type",
            code: i64::from(code),
        })
    }
}

// =============================================================================
// Handshake
// =============================================================================

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, AsRefStr, Display)]
#[repr(u8)]
pub enum ConnectionType {
    CLIENT_TO_SERVER = 100,
    PRIMARY_SERVER_TO_CLIENT = 101,
    SECONDARY_SERVER_TO_CLIENT = 102,
    GATEWAY_TO_GATEWAY = 103,
    MONITOR_TO_SERVER = 104,
    SUCCESSFUL_SERVER_TO_CLIENT = 105,
    UNSUCCESSFUL_SERVER_TO_CLIENT = 106,
    CLIENT_TO_SERVER_FOR_QUEUE = 107,
}

impl ConnectionType {
    pub fn lookup(code: u8) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "connection type",
            code: i64::from(code),
        })
    }

    pub fn is_server_to_client(self) -> bool {
        matches!(
            self,
            ConnectionType::PRIMARY_SERVER_TO_CLIENT | ConnectionType::SECONDARY_SERVER_TO_CLIENT
        )
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, AsRefStr, Display)]
#[repr(u8)]
pub enum CredentialsType {
    SECURITY_CREDENTIALS_NONE = 0,
    SECURITY_CREDENTIALS_NORMAL = 1,
    SECURITY_CREDENTIALS_DHENCRYPT = 2,
    SECURITY_MULTIUSER_NOTIFICATIONCHANNEL = 3,
}

impl CredentialsType {
    pub fn lookup(code: u8) -> Result<Self, DecodeError> {
        Self::from_repr(code).ok_or(DecodeError::UnknownCode {
            table: "credentials type",
            code: i64::from(code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_names() {
        assert_eq!(MessageType::from_repr(7).unwrap().as_ref(), "PUT");
        assert_eq!(MessageType::from_repr(100).unwrap().to_string(), "GET_ALL_70");
        assert_eq!(MessageType::from_repr(-1), Some(MessageType::INVALID));
        assert_eq!(MessageType::EXECUTECQ_WITH_IR_MSG_TYPE as i32, 43);
    }

    #[test]
    fn test_message_type_gaps_are_unknown() {
        for code in [57, 95, 101, 102, 104, 110] {
            assert_eq!(MessageType::from_repr(code), None);
        }
    }

    #[test]
    fn test_rollback_and_size_both_need_footer() {
        assert!(MessageType::ROLLBACK.requires_security_footer());
        assert!(MessageType::SIZE.requires_security_footer());
        assert!(!MessageType::PUT.requires_security_footer());
    }

    #[test]
    fn test_ds_codes() {
        assert_eq!(DsCode::lookup(42).unwrap().as_ref(), "CacheableString");
        assert_eq!(DsCode::lookup(69).unwrap(), DsCode::CacheableNullString);
        assert!(DsCode::CacheableASCIIStringHuge.is_string());
        assert!(!DsCode::CacheableInt32.is_string());
        assert!(DsCode::lookup(200).is_err());
    }

    #[test]
    fn test_fixed_ids() {
        assert_eq!(FixedId::lookup(-53).unwrap(), FixedId::ClientConnectionRequest);
        assert_eq!(FixedId::lookup(-42).unwrap().as_ref(), "GetAllServersResponse");
        assert!(FixedId::lookup(0).is_err());
    }

    #[test]
    fn test_interest_tables() {
        assert_eq!(InterestPolicy::lookup(2).unwrap().as_ref(), "KEYS_VALUES");
        assert_eq!(InterestType::lookup(1).unwrap().as_ref(), "REGULAR_EXPRESSION");
        assert!(InterestType::lookup(5).is_err());
    }

    #[test]
    fn test_handshake_tables() {
        assert!(ConnectionType::lookup(101).unwrap().is_server_to_client());
        assert!(!ConnectionType::lookup(100).unwrap().is_server_to_client());
        assert_eq!(
            CredentialsType::lookup(3).unwrap().as_ref(),
            "SECURITY_MULTIUSER_NOTIFICATIONCHANNEL"
        );
    }
}
