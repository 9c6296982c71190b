//!
//! Decoded reply frames and their classification.
//!
//! Every frame exchanged with the native library is a JSON object carrying a
//! `@type` discriminator. The correlator only needs to tell apart a handful of
//! frame kinds (the two push notifications, the generic ok/error frames, the
//! sync-metadata block reference) and treats every other tag as an ordinary
//! terminal reply. [`FrameKind`] is that closed set; an absent or non-string
//! discriminator is a protocol error, never a retry.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{ClientError, DecodeReplySnafu, ProtocolSnafu};
use crate::{JsonMap, JsonValue};


/// Discriminator field present on every frame.
pub const TAG_FIELD: &str = "@type";


// -----------------------------------------------------------------------------
//     Frame kinds
// -----------------------------------------------------------------------------

/// The closed set of frame kinds the correlator dispatches on.
///
/// The string values are fixed by the wire schema; anything not in this set is
/// a [`Reply`](FrameKind::Reply), the ordinary terminal response whose precise
/// tag only matters to the typed decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum FrameKind {
    #[strum(serialize = "ok")]
    Ok,
    #[strum(serialize = "error")]
    Error,
    /// Push: forward an embedded query to a lite server and report back.
    #[strum(serialize = "updateSendLiteServerQuery")]
    RelayQuery,
    /// Push: the local blockchain view is catching up to the network.
    #[strum(serialize = "updateSyncState")]
    SyncChanged,
    /// Sync metadata, not a caller-facing value.
    #[strum(serialize = "ton.blockIdExt")]
    BlockRef,
    /// Every other tag: an ordinary terminal reply.
    Reply,
}

impl FrameKind {
    pub fn classify(tag: &str) -> FrameKind {
        FrameKind::from_str(tag).unwrap_or(FrameKind::Reply)
    }
}


// -----------------------------------------------------------------------------
//     Response envelope
// -----------------------------------------------------------------------------

/// One decoded reply: the generic field map plus the raw bytes it came from.
///
/// The raw payload is kept alongside the decoded map so a later strongly-typed
/// decode (see [`Envelope::decode_typed`]) does not have to touch the FFI
/// layer again.
#[derive(Debug, Clone)]
pub struct Envelope {
    data: JsonMap<String, JsonValue>,
    raw: Vec<u8>,
}

impl Envelope {
    /// Decode one frame. Fails when the payload is not a JSON object or when
    /// the discriminator is missing or not a string; both are fatal for the
    /// call in flight (the framing contract is assumed reliable; only a fully
    /// absent reply is transient).
    pub fn decode(raw: Vec<u8>) -> Result<Self, ClientError> {
        let value: JsonValue = serde_json::from_slice(&raw).context(DecodeReplySnafu)?;
        let JsonValue::Object(data) = value else {
            return ProtocolSnafu { what: "reply frame is not a JSON object" }.fail();
        };
        match data.get(TAG_FIELD) {
            Some(JsonValue::String(_)) => Ok(Envelope { data, raw }),
            Some(_) => ProtocolSnafu { what: format!("frame discriminator '{TAG_FIELD}' is not a string") }.fail(),
            None => ProtocolSnafu { what: format!("frame is missing the '{TAG_FIELD}' discriminator") }.fail(),
        }
    }

    /// The frame's discriminator string.
    pub fn tag(&self) -> &str {
        // decode() guarantees presence
        self.data[TAG_FIELD].as_str().unwrap()
    }

    pub fn kind(&self) -> FrameKind {
        FrameKind::classify(self.tag())
    }

    pub fn fields(&self) -> &JsonMap<String, JsonValue> {
        &self.data
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Second, strongly-typed decode from the retained raw payload.
    pub fn decode_typed<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.raw).context(DecodeReplySnafu)
    }

    /// The embedded error payload of an [`Error`](FrameKind::Error) frame.
    pub fn error_frame(&self) -> ErrorFrame {
        self.decode_typed().unwrap_or_default()
    }

    /// The sync-state triple carried by a [`SyncChanged`](FrameKind::SyncChanged) frame.
    pub fn sync_state(&self) -> Result<SyncState, ClientError> {
        let Some(state) = self.data.get("sync_state") else {
            return ProtocolSnafu { what: "sync frame is missing the 'sync_state' field" }.fail();
        };
        serde_json::from_value(state.clone()).context(DecodeReplySnafu)
    }
}


// -----------------------------------------------------------------------------
//     Embedded payloads
// -----------------------------------------------------------------------------

/// Machine code and human message carried by an error frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorFrame {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Blockchain sync progress, as reported by the native library.
///
/// Mutated only by the native side; this crate reads it to decide whether to
/// keep polling, and echoes it back in the sync command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum SyncState {
    #[serde(rename = "syncStateInProgress")]
    InProgress {
        from_seqno: i32,
        current_seqno: i32,
        to_seqno: i32,
    },
    #[serde(rename = "syncStateDone")]
    Done,
}

impl SyncState {
    pub fn done(&self) -> bool {
        matches!(self, SyncState::Done)
    }
}


// =============================================================================
//
//     Unittests
//
// =============================================================================

#[cfg(test)]
mod tests {
    use color_eyre::eyre::Result;
    use super::*;

    #[test]
    fn classify_known_tags() {
        assert_eq!(FrameKind::classify("ok"), FrameKind::Ok);
        assert_eq!(FrameKind::classify("error"), FrameKind::Error);
        assert_eq!(FrameKind::classify("updateSendLiteServerQuery"), FrameKind::RelayQuery);
        assert_eq!(FrameKind::classify("updateSyncState"), FrameKind::SyncChanged);
        assert_eq!(FrameKind::classify("ton.blockIdExt"), FrameKind::BlockRef);

        // everything else is an ordinary terminal reply
        assert_eq!(FrameKind::classify("raw.accountState"), FrameKind::Reply);
        assert_eq!(FrameKind::classify("query.fees"), FrameKind::Reply);
        assert_eq!(FrameKind::classify(""), FrameKind::Reply);
    }

    #[test]
    fn decode_ordinary_frame() -> Result<()> {
        let raw = br#"{"@type":"raw.accountState","balance":"100000000"}"#.to_vec();
        let envelope = Envelope::decode(raw)?;

        assert_eq!(envelope.tag(), "raw.accountState");
        assert_eq!(envelope.kind(), FrameKind::Reply);
        assert_eq!(envelope.fields()["balance"], "100000000");
        Ok(())
    }

    #[test]
    fn reject_bad_framing() {
        // missing discriminator
        let err = Envelope::decode(br#"{"balance":"1"}"#.to_vec()).unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));

        // non-string discriminator
        let err = Envelope::decode(br#"{"@type":42}"#.to_vec()).unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));

        // not an object
        let err = Envelope::decode(br#"[1,2,3]"#.to_vec()).unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));

        // not JSON at all
        let err = Envelope::decode(b"garbage".to_vec()).unwrap_err();
        assert!(matches!(err, ClientError::DecodeReply { .. }));
    }

    #[test]
    fn sync_state_roundtrip() -> Result<()> {
        let raw = br#"{"@type":"updateSyncState",
                       "sync_state":{"@type":"syncStateInProgress",
                                     "from_seqno":1,"current_seqno":100,"to_seqno":200}}"#.to_vec();
        let envelope = Envelope::decode(raw)?;
        assert_eq!(envelope.kind(), FrameKind::SyncChanged);

        let state = envelope.sync_state()?;
        assert_eq!(state, SyncState::InProgress { from_seqno: 1, current_seqno: 100, to_seqno: 200 });
        assert!(!state.done());

        let done: SyncState = serde_json::from_str(r#"{"@type":"syncStateDone"}"#)?;
        assert!(done.done());
        Ok(())
    }

    #[test]
    fn error_frame_payload() -> Result<()> {
        let raw = br#"{"@type":"error","code":500,"message":"LITE_SERVER_NOTREADY"}"#.to_vec();
        let envelope = Envelope::decode(raw)?;
        assert_eq!(envelope.kind(), FrameKind::Error);

        let error = envelope.error_frame();
        assert_eq!(error.code, 500);
        assert_eq!(error.message, "LITE_SERVER_NOTREADY");
        Ok(())
    }
}
