//!
//! The typed request/response surface.
//!
//! Requests are plain structs internally tagged with the wire discriminator
//! through serde; each one ties itself to its reply type via the [`Command`]
//! trait so [`Client::call`](crate::Client::call) can decode without the
//! caller naming the reply type twice. This is a hand-written representative
//! set, not the full schema.
//!
//! When defining your own commands, use the [`Bytes`] type for binary fields
//! instead of `Vec<u8>`, otherwise the JSON serialization will not match the
//! wire contract (the native library expects base64 strings).

use std::fmt;

use base64::prelude::*;
use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::config::ClientOptions;
use crate::frame::SyncState;
use crate::JsonValue;


/// A serializable request tied to its typed reply.
pub trait Command: Serialize {
    type Reply: DeserializeOwned;
}


// -----------------------------------------------------------------------------
//     Bytes: binary payloads, base64 on the wire
// -----------------------------------------------------------------------------

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Bytes(data)
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", BASE64_STANDARD.encode(&self.0))
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BASE64_STANDARD.encode(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let data = BASE64_STANDARD.decode(&encoded).map_err(de::Error::custom)?;
        Ok(Bytes(data))
    }
}


// -----------------------------------------------------------------------------
//     Initialization
// -----------------------------------------------------------------------------

/// The very first request on a connection: network description + keystore.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "init")]
pub struct Init {
    pub options: TonOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "options")]
pub struct TonOptions {
    pub config: NetworkConfig,
    pub keystore_type: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "config")]
pub struct NetworkConfig {
    /// The network description document, passed through as an opaque compact string.
    pub config: String,
    pub blockchain_name: String,
    pub use_callbacks_for_network: bool,
    pub ignore_cache: bool,
}

impl Init {
    pub fn new(options: &ClientOptions) -> Self {
        Init {
            options: TonOptions {
                config: NetworkConfig {
                    config: options.config.to_request_string(),
                    blockchain_name: String::new(),
                    use_callbacks_for_network: false,
                    ignore_cache: false,
                },
                keystore_type: options.keystore.to_request(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsInfo {
    #[serde(default)]
    pub config_info: JsonValue,
}

impl Command for Init {
    type Reply = OptionsInfo;
}


// -----------------------------------------------------------------------------
//     Account state
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "raw.getAccountState")]
pub struct GetAccountState {
    pub account_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullAccountState {
    /// Balance in nanograms, as the node prints it.
    pub balance: String,
    #[serde(default)]
    pub code: Bytes,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub frozen_hash: Bytes,
    #[serde(default)]
    pub last_transaction_id: Option<InternalTransactionId>,
    #[serde(default)]
    pub sync_utime: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternalTransactionId {
    pub lt: String,
    pub hash: Bytes,
}

impl Command for GetAccountState {
    type Reply = FullAccountState;
}


// -----------------------------------------------------------------------------
//     Fees
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "query.estimateFees")]
pub struct EstimateFees {
    pub id: i64,
    pub ignore_chksig: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryFees {
    pub source_fees: Fees,
    #[serde(default)]
    pub destination_fees: Vec<Fees>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fees {
    #[serde(default)]
    pub in_fwd_fee: i64,
    #[serde(default)]
    pub storage_fee: i64,
    #[serde(default)]
    pub gas_fee: i64,
    #[serde(default)]
    pub fwd_fee: i64,
}

impl Fees {
    pub fn total(&self) -> i64 {
        self.in_fwd_fee + self.storage_fee + self.gas_fee + self.fwd_fee
    }
}

impl Command for EstimateFees {
    type Reply = QueryFees;
}


// -----------------------------------------------------------------------------
//     Raw message submission
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "raw.sendMessage")]
pub struct SendRawMessage {
    pub body: Bytes,
}

/// The bare "ok" frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OkReply {}

impl Command for SendRawMessage {
    type Reply = OkReply;
}


// -----------------------------------------------------------------------------
//     Push-protocol requests (relay acknowledgement, sync)
// -----------------------------------------------------------------------------

/// Acknowledgement for a relayed lite-server query, echoing its id and payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "onLiteServerQueryResult")]
pub struct LiteServerQueryAck {
    pub id: i64,
    pub bytes: Bytes,
}

impl Command for LiteServerQueryAck {
    type Reply = OkReply;
}

/// The sync handshake command, echoing the reported sync-state triple.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "sync")]
pub struct SyncCommand {
    pub sync_state: SyncState,
}

impl Command for SyncCommand {
    type Reply = OkReply;
}


// -----------------------------------------------------------------------------
//     Offline utilities (synchronous execute path)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "setLogVerbosityLevel")]
pub struct SetLogVerbosityLevel {
    pub new_verbosity_level: i32,
}

impl Command for SetLogVerbosityLevel {
    type Reply = OkReply;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "@type", rename = "unpackAccountAddress")]
pub struct UnpackAccountAddress {
    pub account_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnpackedAccountAddress {
    pub workchain_id: i32,
    pub bounceable: bool,
    pub testnet: bool,
    pub addr: Bytes,
}

impl Command for UnpackAccountAddress {
    type Reply = UnpackedAccountAddress;
}


// =============================================================================
//
//     Unittests
//
// =============================================================================

#[cfg(test)]
mod tests {
    use color_eyre::eyre::Result;
    use serde_json::json;
    use super::*;

    #[test]
    fn requests_carry_the_wire_tag() -> Result<()> {
        let request = GetAccountState { account_address: "EQBvW8Z5huBk".to_string() };
        assert_eq!(serde_json::to_value(&request)?, json!({
            "@type": "raw.getAccountState",
            "account_address": "EQBvW8Z5huBk",
        }));

        let request = EstimateFees { id: 42, ignore_chksig: true };
        assert_eq!(serde_json::to_value(&request)?, json!({
            "@type": "query.estimateFees",
            "id": 42,
            "ignore_chksig": true,
        }));

        let ack = LiteServerQueryAck { id: 7, bytes: Bytes(vec![1, 2, 3]) };
        assert_eq!(serde_json::to_value(&ack)?, json!({
            "@type": "onLiteServerQueryResult",
            "id": 7,
            "bytes": "AQID",
        }));

        Ok(())
    }

    #[test]
    fn decode_account_state() -> Result<()> {
        let state: FullAccountState = serde_json::from_str(r#"{
            "@type": "raw.accountState",
            "balance": "100000000",
            "code": "", "data": "", "frozen_hash": "",
            "last_transaction_id": { "@type": "internal.transactionId",
                                     "lt": "31000000003", "hash": "YeD/Wpk/VTdkVGtBDXJXEuu60t5g8cTzjgCzUYzOmLY=" },
            "sync_utime": 1689599710
        }"#)?;

        assert_eq!(state.balance, "100000000");
        assert!(state.code.is_empty());
        assert_eq!(state.last_transaction_id.as_ref().map(|id| id.lt.as_str()), Some("31000000003"));
        assert_eq!(state.sync_utime, 1689599710);
        Ok(())
    }

    #[test]
    fn decode_fees() -> Result<()> {
        let fees: QueryFees = serde_json::from_str(r#"{
            "@type": "query.fees",
            "source_fees": { "in_fwd_fee": 10, "storage_fee": 1, "gas_fee": 100, "fwd_fee": 5 },
            "destination_fees": []
        }"#)?;

        assert_eq!(fees.source_fees.total(), 116);
        assert!(fees.destination_fees.is_empty());
        Ok(())
    }

    #[test]
    fn bytes_are_base64_on_the_wire() -> Result<()> {
        let bytes: Bytes = serde_json::from_str(r#""aGVsbG8=""#)?;
        assert_eq!(bytes.0, b"hello");
        assert_eq!(serde_json::to_string(&bytes)?, r#""aGVsbG8=""#);

        assert!(serde_json::from_str::<Bytes>(r#""not base64!!""#).is_err());
        Ok(())
    }
}
