use std::ffi::NulError;
use std::time::Duration;

use serde_json::Error as JsonError;
use snafu::Snafu;


/// Everything that can go wrong while exchanging requests with the native library.
///
/// The taxonomy is deliberately flat: each variant maps to exactly one failure
/// mode of the correlator, so callers can match on the variant without digging
/// through source chains.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("cannot serialize request to JSON"))]
    SerializeRequest { source: JsonError },

    #[snafu(display("command string contains an interior NUL byte"))]
    NulInCommand { source: NulError },

    #[snafu(display("cannot decode reply as JSON"))]
    DecodeReply { source: JsonError },

    #[snafu(display("protocol violation: {what}"))]
    Protocol { what: String },

    #[snafu(display("node replied with error {code}: {message}"))]
    Node { code: i32, message: String },

    #[snafu(display("no reply from the native library after {attempts} receive attempts"))]
    RetriesExhausted { attempts: u32 },

    #[snafu(display("blockchain sync failed with error {code}: {message}"))]
    SyncFailed { code: i32, message: String },

    #[snafu(display("sync kept restarting, gave up after {rounds} resend rounds"))]
    SyncResendLimit { rounds: u32 },

    #[snafu(display("fee estimation did not complete within {timeout:?}"))]
    EstimateTimedOut { timeout: Duration },
}


// =============================================================================
//
//     Unittests
//
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        let err = ClientError::Node { code: 500, message: "LITE_SERVER_NOTREADY".to_string() };
        assert_eq!(err.to_string(), "node replied with error 500: LITE_SERVER_NOTREADY");

        let err = ClientError::RetriesExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "no reply from the native library after 3 receive attempts");
    }
}
