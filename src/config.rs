use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Error as JsonError;
use snafu::{ensure, ResultExt, Snafu};

use crate::{json, JsonValue};


pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InvalidConfig {
    #[snafu(display("cannot read config file '{path}'"))]
    UnreadableFile { path: String, source: io::Error },

    #[snafu(display("config document is not valid JSON"))]
    MalformedJson { source: JsonError },

    #[snafu(display("config document must be a JSON object"))]
    NotAnObject,

    #[snafu(display("config document declares no lite servers"))]
    NoLiteServers,
}


// -----------------------------------------------------------------------------
//     Network configuration document
// -----------------------------------------------------------------------------

/// The global network configuration document: lite server endpoints (host,
/// port, server public key) and validator parameters (zero-state hashes,
/// init block, hardforks).
///
/// The native library consumes this document as an opaque string embedded in
/// the initialization request, so we keep the parsed JSON around untouched and
/// only validate the parts we rely on. Field-level typing here would buy
/// nothing and would break round-tripping whenever the network adds a key.
#[derive(Debug, Clone)]
pub struct TonConfig {
    document: JsonValue,
}

impl TonConfig {
    pub fn from_str(document: &str) -> Result<Self, InvalidConfig> {
        let document: JsonValue = serde_json::from_str(document).context(MalformedJsonSnafu)?;
        ensure!(document.is_object(), NotAnObjectSnafu);

        let liteservers = document.get("liteservers").and_then(JsonValue::as_array);
        ensure!(liteservers.is_some_and(|ls| !ls.is_empty()), NoLiteServersSnafu);

        Ok(TonConfig { document })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InvalidConfig> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .context(UnreadableFileSnafu { path: path.display().to_string() })?;
        TonConfig::from_str(&contents)
    }

    /// Number of lite servers the document declares. Guaranteed >= 1.
    pub fn liteserver_count(&self) -> usize {
        self.document["liteservers"].as_array().map_or(0, Vec::len)
    }

    /// The compact string form embedded in the initialization request.
    pub fn to_request_string(&self) -> String {
        self.document.to_string()
    }
}


// -----------------------------------------------------------------------------
//     Key storage
// -----------------------------------------------------------------------------

/// Where the native library keeps private keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStore {
    Directory(PathBuf),
    InMemory,
}

impl KeyStore {
    /// The tagged JSON object the initialization request expects.
    pub fn to_request(&self) -> JsonValue {
        match self {
            KeyStore::Directory(dir) => json!({
                "@type": "keyStoreTypeDirectory",
                "directory": dir.display().to_string(),
            }),
            KeyStore::InMemory => json!({ "@type": "keyStoreTypeInMemory" }),
        }
    }
}


// -----------------------------------------------------------------------------
//     Retry policy
// -----------------------------------------------------------------------------

/// Bounds for the correlator's polling loops.
///
/// Every receive attempt waits up to `receive_timeout` for the native library
/// to produce a frame; a null reply ("nothing yet") sleeps `retry_delay` and
/// tries again, up to `max_attempts` before failing with retry exhaustion.
/// `max_sync_resends` bounds how many times one logical call may be re-issued
/// after a completed sync handshake.
///
/// Both bounds exist to rule out livelock: a native library that never
/// replies, or that toggles sync state forever, turns into a typed error
/// instead of a hung caller.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-attempt receive timeout, in seconds (the unit the native API takes).
    pub receive_timeout: f64,
    /// Sleep between receive attempts after a "nothing yet" signal.
    pub retry_delay: Duration,
    /// Receive attempts per poll before giving up.
    pub max_attempts: u32,
    /// Resend rounds after completed syncs before giving up.
    pub max_sync_resends: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            receive_timeout: 10.0,
            retry_delay: Duration::from_millis(100),
            max_attempts: 10,
            max_sync_resends: 8,
        }
    }
}


// -----------------------------------------------------------------------------
//     Client options
// -----------------------------------------------------------------------------

/// Everything [`Client::connect`](crate::Client::connect) needs besides the
/// boundary itself.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub config: TonConfig,
    pub keystore: KeyStore,
    pub retry: RetryPolicy,
    /// Native library log verbosity, applied before initialization.
    /// `None` leaves the native default untouched.
    pub verbosity: Option<i32>,
}

impl ClientOptions {
    pub fn new(config: TonConfig, keystore: KeyStore) -> Self {
        ClientOptions {
            config,
            keystore,
            retry: RetryPolicy::default(),
            verbosity: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_verbosity(mut self, level: i32) -> Self {
        self.verbosity = Some(level);
        self
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

    static MINIMAL_CONFIG: &str = r#"{
        "liteservers": [
            { "ip": 1137658550, "port": 4924,
              "id": { "@type": "pub.ed25519", "key": "peJTw/arlRfssgTuf9BMypJzqOi7SXEqSPSWiEw2U1M=" } }
        ],
        "validator": { "@type": "validator.config.global", "zero_state": {} }
    }"#;

    #[test]
    fn parse_minimal_config() -> Result<()> {
        let config = TonConfig::from_str(MINIMAL_CONFIG)?;
        assert_eq!(config.liteserver_count(), 1);

        // the request string is the same document, compacted
        let round: JsonValue = serde_json::from_str(&config.to_request_string())?;
        let original: JsonValue = serde_json::from_str(MINIMAL_CONFIG)?;
        assert_eq!(round, original);

        Ok(())
    }

    #[test]
    fn reject_bad_configs() {
        assert!(matches!(TonConfig::from_str("not json"),
                         Err(InvalidConfig::MalformedJson { .. })));
        assert!(matches!(TonConfig::from_str("[1, 2]"),
                         Err(InvalidConfig::NotAnObject { .. })));
        assert!(matches!(TonConfig::from_str(r#"{"liteservers": []}"#),
                         Err(InvalidConfig::NoLiteServers { .. })));
        assert!(matches!(TonConfig::from_str(r#"{"validator": {}}"#),
                         Err(InvalidConfig::NoLiteServers { .. })));
    }

    #[test]
    fn keystore_request_shapes() {
        let dir = KeyStore::Directory(PathBuf::from("./keystore"));
        assert_eq!(dir.to_request(),
                   json!({"@type": "keyStoreTypeDirectory", "directory": "./keystore"}));

        assert_eq!(KeyStore::InMemory.to_request(),
                   json!({"@type": "keyStoreTypeInMemory"}));
    }
}
