//!
//! The client and its request correlator.
//!
//! The native library multiplexes every reply over one channel with no
//! per-request correlation id in the common path, so any caller-facing call
//! must be prepared to absorb push notifications (lite-server relay queries
//! and sync-state updates) before, or instead of, obtaining its own answer.
//! [`Client::exchange`] is the loop that does that absorption; everything else
//! in this module is a typed veneer over it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use snafu::{ensure, ResultExt};
use tracing::{debug, trace, warn};

use crate::boundary::Boundary;
use crate::config::{ClientOptions, RetryPolicy};
use crate::error::{
    ClientError, EstimateTimedOutSnafu, NodeSnafu, ProtocolSnafu, RetriesExhaustedSnafu,
    SerializeRequestSnafu, SyncFailedSnafu, SyncResendLimitSnafu,
};
use crate::frame::{Envelope, FrameKind, SyncState};
use crate::types::{
    Bytes, Command, EstimateFees, FullAccountState, GetAccountState, Init, LiteServerQueryAck,
    QueryFees, SetLogVerbosityLevel, SyncCommand, UnpackAccountAddress, UnpackedAccountAddress,
};


/// What one correlation round produced: either the caller's terminal envelope,
/// or an instruction to re-issue the original request after a completed sync.
enum Outcome {
    Terminal(Envelope),
    Resync,
}


/// One open connection to the native library.
///
/// Cloning is cheap and shares the underlying handle; the native library is
/// the serialization point for the wire protocol, and this crate adds no
/// locking of its own. Callers needing strict call-by-call ordering must
/// serialize externally (one client per worker, or a mutex around it).
#[derive(Clone)]
pub struct Client {
    boundary: Arc<Boundary>,
    retry: RetryPolicy,
}

impl Client {
    /// Wrap a boundary without performing the initialization handshake.
    ///
    /// Useful for the offline `execute` path and for tests; network-facing
    /// calls on an uninitialized native handle will be answered with error
    /// frames by the native side.
    pub fn new(boundary: Boundary, retry: RetryPolicy) -> Self {
        Client { boundary: Arc::new(boundary), retry }
    }

    /// The boundary this client talks through.
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Connect: apply the log verbosity, then send the `init` request built
    /// from the configuration. No other call may precede it.
    pub fn connect(boundary: Boundary, options: ClientOptions) -> Result<Self, ClientError> {
        let client = Client::new(boundary, options.retry.clone());

        if let Some(level) = options.verbosity {
            // offline call, answered synchronously
            client.execute_call(&SetLogVerbosityLevel { new_verbosity_level: level })?;
        }

        client.call(&Init::new(&options))?;
        debug!(liteservers = options.config.liteserver_count(), "client initialized");
        Ok(client)
    }

    // -----------------------------------------------------------------------------
    //     The request correlator
    // -----------------------------------------------------------------------------

    /// Send `request` and return its correlated terminal reply, transparently
    /// absorbing any relay/sync push frames interleaved before it.
    ///
    /// Exactly one terminal outcome reaches the caller per logical call: a
    /// decoded envelope or an error. A completed sync handshake re-issues the
    /// request from scratch, bounded by
    /// [`RetryPolicy::max_sync_resends`](crate::RetryPolicy).
    pub fn exchange<R: Serialize>(&self, request: &R) -> Result<Envelope, ClientError> {
        let command = serde_json::to_string(request).context(SerializeRequestSnafu)?;

        let mut rounds: u32 = 0;
        loop {
            self.boundary.send(&command)?;
            match self.correlate()? {
                Outcome::Terminal(envelope) => return Ok(envelope),
                Outcome::Resync => {
                    rounds += 1;
                    ensure!(rounds <= self.retry.max_sync_resends,
                            SyncResendLimitSnafu { rounds });
                    debug!(round = rounds, "sync complete, re-issuing the original request");
                },
            }
        }
    }

    /// Typed variant of [`exchange`](Client::exchange): decode the terminal
    /// envelope into the command's reply type.
    pub fn call<C: Command>(&self, command: &C) -> Result<C::Reply, ClientError> {
        self.exchange(command)?.decode_typed()
    }

    /// Poll for the terminal reply of the command just sent, servicing push
    /// frames along the way.
    fn correlate(&self) -> Result<Outcome, ClientError> {
        loop {
            let envelope = self.poll()?;
            match envelope.kind() {
                FrameKind::RelayQuery => {
                    self.acknowledge_relay(&envelope);
                    // the caller's reply is still pending
                    continue;
                },
                FrameKind::SyncChanged => {
                    let state = envelope.sync_state()?;
                    return match self.drain_sync(state)? {
                        Some(bypass) => Ok(Outcome::Terminal(bypass)),
                        None => Ok(Outcome::Resync),
                    };
                },
                FrameKind::Error => {
                    let error = envelope.error_frame();
                    return NodeSnafu { code: error.code, message: error.message }.fail();
                },
                _ => return Ok(Outcome::Terminal(envelope)),
            }
        }
    }

    /// One bounded-retry receive: a null reply sleeps and retries, anything
    /// else is decoded. Decode failures are fatal, never retried.
    fn poll(&self) -> Result<Envelope, ClientError> {
        for attempt in 1..=self.retry.max_attempts {
            if let Some(reply) = self.boundary.receive(self.retry.receive_timeout) {
                return Envelope::decode(reply.into_bytes());
            }
            trace!(attempt, "nothing yet, retrying");
            thread::sleep(self.retry.retry_delay);
        }
        RetriesExhaustedSnafu { attempts: self.retry.max_attempts }.fail()
    }

    /// Fire-and-forget acknowledgement of a relayed lite-server query.
    ///
    /// This must stay send-only: a full exchange here would consume the
    /// original call's pending reply as its own. A failure is logged and
    /// deliberately ignored: the relay is a side effect and must never fail
    /// the caller's request.
    fn acknowledge_relay(&self, envelope: &Envelope) {
        if let Err(err) = self.send_relay_ack(envelope) {
            warn!(%err, "ignoring failed lite-server relay acknowledgement");
        }
    }

    fn send_relay_ack(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let fields = envelope.fields();

        // the id comes back either as a number or as a string-wrapped int64
        let id = match fields.get("id") {
            Some(v) if v.is_i64() => v.as_i64().unwrap(),
            Some(v) => v.as_str().and_then(|s| s.parse().ok())
                .ok_or_else(|| ProtocolSnafu { what: "relay frame carries no usable 'id'" }.build())?,
            None => return ProtocolSnafu { what: "relay frame is missing the 'id' field" }.fail(),
        };
        let data: Bytes = match fields.get("data") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|_| ProtocolSnafu { what: "relay frame carries no usable 'data'" }.build())?,
            None => Bytes::default(),
        };

        debug!(id, "acknowledging relayed lite-server query");
        let ack = LiteServerQueryAck { id, bytes: data };
        let command = serde_json::to_string(&ack).context(SerializeRequestSnafu)?;
        self.boundary.send(&command)
    }

    // -----------------------------------------------------------------------------
    //     Sync sub-loop
    // -----------------------------------------------------------------------------

    /// Service a sync handshake until the native library reports completion.
    ///
    /// Returns `Some(envelope)` when an unrelated terminal frame shows up
    /// mid-handshake (the reply to some other in-flight request, delivered
    /// during the sync window), so the outer call can hand it to the caller
    /// instead of losing it. Returns `None` once sync is confirmed done and
    /// the original request should be re-issued.
    fn drain_sync(&self, state: SyncState) -> Result<Option<Envelope>, ClientError> {
        debug!(?state, "entering sync handshake");
        let command = serde_json::to_string(&SyncCommand { sync_state: state })
            .context(SerializeRequestSnafu)?;
        self.boundary.send(&command)?;

        loop {
            let envelope = self.poll()?;
            match envelope.kind() {
                FrameKind::Ok => {
                    self.peek_completion()?;
                    return Ok(None);
                },
                FrameKind::BlockRef => {
                    // sync metadata, not a caller-facing value
                    return Ok(None);
                },
                FrameKind::Error => {
                    let error = envelope.error_frame();
                    return SyncFailedSnafu { code: error.code, message: error.message }.fail();
                },
                FrameKind::SyncChanged => {
                    let state = envelope.sync_state()?;
                    if state.done() {
                        self.peek_completion()?;
                        return Ok(None);
                    }
                    debug!(?state, "sync still in progress");
                },
                _ => {
                    debug!(tag = envelope.tag(), "unrelated terminal frame during sync, bypassing");
                    return Ok(Some(envelope));
                },
            }
        }
    }

    /// The native library emits one extra completion frame after a finished
    /// sync. Drain it with a single receive, classifying only for the
    /// done/error distinction; never loop here.
    fn peek_completion(&self) -> Result<(), ClientError> {
        if let Some(reply) = self.boundary.receive(self.retry.receive_timeout) {
            let envelope = Envelope::decode(reply.into_bytes())?;
            if envelope.kind() == FrameKind::Error {
                let error = envelope.error_frame();
                return SyncFailedSnafu { code: error.code, message: error.message }.fail();
            }
            trace!(tag = envelope.tag(), "discarded extra sync completion frame");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------------
    //     Offline (synchronous) path
    // -----------------------------------------------------------------------------

    /// Synchronous variant for the narrow set of commands answerable without
    /// network round-trips.
    pub fn execute<R: Serialize>(&self, request: &R) -> Result<Envelope, ClientError> {
        let command = serde_json::to_string(request).context(SerializeRequestSnafu)?;
        let Some(reply) = self.boundary.execute(&command)? else {
            return ProtocolSnafu { what: "execute returned no reply" }.fail();
        };
        let envelope = Envelope::decode(reply.into_bytes())?;
        if envelope.kind() == FrameKind::Error {
            let error = envelope.error_frame();
            return NodeSnafu { code: error.code, message: error.message }.fail();
        }
        Ok(envelope)
    }

    /// Typed variant of [`execute`](Client::execute).
    pub fn execute_call<C: Command>(&self, command: &C) -> Result<C::Reply, ClientError> {
        self.execute(command)?.decode_typed()
    }

    // -----------------------------------------------------------------------------
    //     Bounded fee estimation
    // -----------------------------------------------------------------------------

    /// Estimate fees, racing the blocking call against a wall-clock deadline.
    ///
    /// The underlying native call cannot be interrupted; on deadline its
    /// result is abandoned instead. The worker checks the abandon flag before
    /// publishing, and a result that loses the race against the flag lands in
    /// a channel whose receiver is gone, which is swallowed, not a panic.
    /// Exactly one of {result, timeout error} reaches the caller.
    pub fn estimate_fees_with_timeout(
        &self,
        query: EstimateFees,
        timeout: Duration,
    ) -> Result<QueryFees, ClientError> {
        let (tx, rx) = mpsc::channel();
        let abandoned = Arc::new(AtomicBool::new(false));

        let worker = self.clone();
        let worker_abandoned = Arc::clone(&abandoned);
        thread::spawn(move || {
            let result = worker.call(&query);
            if !worker_abandoned.load(Ordering::Acquire) {
                let _ = tx.send(result);
            }
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                abandoned.store(true, Ordering::Release);
                warn!(?timeout, "abandoning fee estimation past its deadline");
                EstimateTimedOutSnafu { timeout }.fail()
            },
            // the worker exited without publishing, which only happens if it
            // panicked; surface that as a protocol failure rather than hanging
            Err(RecvTimeoutError::Disconnected) => {
                ProtocolSnafu { what: "fee estimation worker exited without a result" }.fail()
            },
        }
    }

    // -----------------------------------------------------------------------------
    //     Helper methods for common commands
    // -----------------------------------------------------------------------------

    pub fn get_account_state(&self, address: &str) -> Result<FullAccountState, ClientError> {
        self.call(&GetAccountState { account_address: address.to_owned() })
    }

    pub fn estimate_fees(&self, query_id: i64, ignore_chksig: bool) -> Result<QueryFees, ClientError> {
        self.call(&EstimateFees { id: query_id, ignore_chksig })
    }

    pub fn unpack_account_address(&self, address: &str) -> Result<UnpackedAccountAddress, ClientError> {
        self.execute_call(&UnpackAccountAddress { account_address: address.to_owned() })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("retry", &self.retry).finish_non_exhaustive()
    }
}
