//!
//! The seam between the request correlator and the native library.
//!
//! [`Boundary`] carries the three wire verbs (`send`, `receive`, `execute`)
//! over either a real [`NativeHandle`] or a [`ScriptedBoundary`], so the
//! correlator and its tests never care which side of the FFI line they are on.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::ClientError;
use crate::ffi::NativeHandle;


pub enum Boundary {
    Native(NativeHandle),
    Scripted(ScriptedBoundary),
}

impl Boundary {
    /// Open a fresh connection to the native library.
    pub fn native() -> Self {
        Boundary::Native(NativeHandle::create())
    }

    pub fn send(&self, command: &str) -> Result<(), ClientError> {
        match self {
            Boundary::Native(handle) => handle.send(command),
            Boundary::Scripted(script) => {
                script.sent.lock().unwrap().push(command.to_owned());
                Ok(())
            },
        }
    }

    pub fn receive(&self, timeout: f64) -> Option<String> {
        match self {
            Boundary::Native(handle) => handle.receive(timeout),
            Boundary::Scripted(script) => script.next_reply(),
        }
    }

    pub fn execute(&self, command: &str) -> Result<Option<String>, ClientError> {
        match self {
            Boundary::Native(handle) => handle.execute(command),
            Boundary::Scripted(script) => {
                script.sent.lock().unwrap().push(command.to_owned());
                Ok(script.execute_replies.lock().unwrap().pop_front())
            },
        }
    }
}


// -----------------------------------------------------------------------------
//     Scripted boundary for tests and examples
// -----------------------------------------------------------------------------

/// A boundary that replays a scripted list of replies instead of talking to
/// the native library.
///
/// Replies are played back in order, one per `receive` call; an exhausted
/// queue plays back as an endless "nothing yet" signal. Scripted silences
/// model the quiet windows where the native side has nothing to say, and
/// per-reply latencies model slow calls for the deadline-wrapper tests.
/// Every command crossing the boundary is recorded for later inspection.
#[derive(Default)]
pub struct ScriptedBoundary {
    replies: Mutex<VecDeque<ScriptedReply>>,
    execute_replies: Mutex<VecDeque<String>>,
    sent: Mutex<Vec<String>>,
}

struct ScriptedReply {
    body: Option<String>,
    latency: Duration,
}

impl ScriptedBoundary {
    pub fn new() -> Self {
        ScriptedBoundary::default()
    }

    /// Queue one reply frame.
    pub fn push_reply(&self, body: &str) {
        self.push(Some(body.to_owned()), Duration::ZERO);
    }

    /// Queue one reply frame delivered only after `latency` has elapsed.
    pub fn push_reply_after(&self, body: &str, latency: Duration) {
        self.push(Some(body.to_owned()), latency);
    }

    /// Queue one "nothing yet" signal.
    pub fn push_silence(&self) {
        self.push(None, Duration::ZERO);
    }

    /// Queue one reply for the synchronous `execute` path.
    pub fn push_execute_reply(&self, body: &str) {
        self.execute_replies.lock().unwrap().push_back(body.to_owned());
    }

    /// Every command sent or executed so far, in order.
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, body: Option<String>, latency: Duration) {
        self.replies.lock().unwrap().push_back(ScriptedReply { body, latency });
    }

    fn next_reply(&self) -> Option<String> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => {
                if !reply.latency.is_zero() {
                    thread::sleep(reply.latency);
                }
                reply.body
            },
            // exhausted scripts keep signalling "nothing yet"
            None => None,
        }
    }
}


// =============================================================================
//
//     Unittests
//
// =============================================================================
