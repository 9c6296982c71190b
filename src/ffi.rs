//!
//! Raw bindings to the native TON client library (`libtonlibjson`), plus the
//! [`NativeHandle`] wrapper that owns one connection for its whole lifetime.
//!
//! The native API is a JSON-in/JSON-out command pipe over an opaque pointer:
//! `send` queues a command, `receive` waits up to a timeout for the next frame
//! (returning null when nothing is available yet), and `execute` answers a
//! narrow set of offline commands synchronously. All blockchain logic lives on
//! the other side of this boundary.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_void};

use snafu::ResultExt;

use crate::error::{ClientError, NulInCommandSnafu};


extern "C" {
    fn tonlib_client_json_create() -> *mut c_void;
    fn tonlib_client_json_send(client: *mut c_void, request: *const c_char);
    fn tonlib_client_json_receive(client: *mut c_void, timeout: c_double) -> *const c_char;
    fn tonlib_client_json_execute(client: *mut c_void, request: *const c_char) -> *const c_char;
    fn tonlib_client_json_destroy(client: *mut c_void);
}


/// Exclusively-owned handle to one native client instance.
///
/// Created once, destroyed exactly once when dropped. The pointers returned by
/// `receive`/`execute` stay owned by the native side and are only valid until
/// the next call on the same handle, so replies are copied into owned `String`s
/// before returning.
pub struct NativeHandle {
    ptr: *mut c_void,
}

// The native library serializes calls on a handle internally; sharing a handle
// across threads is exactly as safe as that internal locking (callers needing
// strict call-by-call ordering must serialize externally).
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    pub fn create() -> Self {
        let ptr = unsafe { tonlib_client_json_create() };
        assert!(!ptr.is_null(), "native library returned a null client handle");
        NativeHandle { ptr }
    }

    /// Queue a command. Fire-and-forget: the native API has no separate
    /// acknowledgement for "sent".
    pub fn send(&self, command: &str) -> Result<(), ClientError> {
        let command = CString::new(command).context(NulInCommandSnafu)?;
        unsafe { tonlib_client_json_send(self.ptr, command.as_ptr()) };
        Ok(())
    }

    /// Wait up to `timeout` seconds for the next frame. `None` is the
    /// documented "nothing yet" signal.
    pub fn receive(&self, timeout: f64) -> Option<String> {
        let reply = unsafe { tonlib_client_json_receive(self.ptr, timeout) };
        copy_reply(reply)
    }

    /// Synchronous variant for offline commands.
    pub fn execute(&self, command: &str) -> Result<Option<String>, ClientError> {
        let command = CString::new(command).context(NulInCommandSnafu)?;
        let reply = unsafe { tonlib_client_json_execute(self.ptr, command.as_ptr()) };
        Ok(copy_reply(reply))
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        unsafe { tonlib_client_json_destroy(self.ptr) };
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle").field("ptr", &self.ptr).finish()
    }
}

fn copy_reply(reply: *const c_char) -> Option<String> {
    if reply.is_null() {
        return None;
    }
    // the native side always frames replies as UTF-8 JSON
    let reply = unsafe { CStr::from_ptr(reply) };
    Some(reply.to_string_lossy().into_owned())
}
