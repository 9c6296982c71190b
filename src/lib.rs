//!
//! This library exposes the native TON node client library (`libtonlibjson`,
//! accessed over FFI) as an idiomatic, typed request/response API.
//!
//! All blockchain logic (account state resolution, transaction construction,
//! smart-contract execution, network synchronization) lives in the native
//! library. This crate's job is the plumbing around it: marshal request
//! structs to JSON, pass them across the FFI boundary, poll until a reply is
//! available, decode it into typed results, and transparently service the two
//! push notifications the native side emits unprompted (lite-server query
//! relay and blockchain sync).
//!
//! The interesting part is the request correlator in [`Client::exchange`]:
//! replies are multiplexed over one channel with no correlation id, so every
//! call has to classify incoming frames, acknowledge relay queries in passing,
//! drive a nested sync handshake when told to, and re-issue itself once sync
//! completes, all while guaranteeing the caller sees exactly one terminal
//! outcome.
//!
//! # Feature flags
//!
//! - `cli`: whether to compile the command-line tools alongside the library.
//!          This feature is enabled by default and currently installs the
//!          `tonquery` tool.
//!
//! # Quick tour
//!
//! ```
//! use tonbind::{Boundary, Client, RetryPolicy, ScriptedBoundary};
//!
//! // a scripted boundary stands in for the native library
//! let script = ScriptedBoundary::new();
//! script.push_reply(r#"{"@type":"raw.accountState","balance":"100000000"}"#);
//!
//! let client = Client::new(Boundary::Scripted(script), RetryPolicy::default());
//! let state = client.get_account_state("EQBvW8Z5huBkMJYdnfAEM5JqTNkuWX3diqYENkWsIL0Xggam")?;
//! assert_eq!(state.balance, "100000000");
//! # Ok::<(), tonbind::ClientError>(())
//! ```
//!
//! Against the real native library, build the boundary with
//! [`Boundary::native`] and connect with [`Client::connect`], which performs
//! the mandatory initialization handshake from a [`TonConfig`] document.
//!
//! <div class="warning">
//!
//! ## Warnings / pitfalls
//!
//!  - when defining your own [`Command`] structs, use the [`Bytes`] type for
//!    binary fields instead of `Vec<u8>`, otherwise the JSON serialization
//!    will not match the wire contract (bytes cross it base64-encoded).
//!  - a [`Client`] is `Clone` and shares its native handle; the native library
//!    is the only serialization point, so callers needing strict call-by-call
//!    ordering must serialize externally.
//!
//! </div>


// disable this lint so `TonConfig` can expose a `from_str` constructor without
// implementing the `std::str::FromStr` trait; if we didn't, that trait would
// have to be imported everywhere a config is built, which isn't very
// discoverable
#![allow(clippy::should_implement_trait)]

pub mod boundary;
pub mod client;
pub mod config;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod types;

// convenience typedefs, so downstream code doesn't need to depend on
// serde_json directly for the common cases
pub use serde_json::{
    Map as JsonMap,
    Value as JsonValue,
    Error as JsonError,
    json
};

pub use boundary::{Boundary, ScriptedBoundary};
pub use client::Client;
pub use config::{ClientOptions, InvalidConfig, KeyStore, RetryPolicy, TonConfig};
pub use error::ClientError;
pub use ffi::NativeHandle;
pub use frame::{Envelope, ErrorFrame, FrameKind, SyncState};
pub use types::*;
