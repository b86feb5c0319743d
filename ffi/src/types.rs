//! Types and conversions for the FFI boundary.
//!
//! # Design
//! C callers hold two opaque handles: `FfiProjectApi` (a runtime plus the
//! callback facade) and `FfiPendingCall` (one in-flight operation). Results
//! come back through a plain C function pointer; `Completion` turns an
//! `ApiResult` into its `(ok, payload)` pair and owns the payload string for
//! exactly the duration of the callback. A `Completion` dropped without
//! completing (its task was torn down with the runtime) still reports
//! `(false, null)`, so the callback runs once no matter how the call ends.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use dream_api_core::{
    ApiError, ApiResult, CallbackApi, HttpResponse, PendingCall, ProjectList, ReqwestTransport,
};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Completion callback. `payload` may be null and is only valid until the
/// callback returns; `user_data` is passed through untouched.
pub type DreamCallback = extern "C" fn(ok: bool, payload: *const c_char, user_data: *mut c_void);

/// Opaque handle owning the runtime every call is spawned on.
pub struct FfiProjectApi {
    pub(crate) runtime: Runtime,
    pub(crate) inner: CallbackApi<ReqwestTransport>,
}

/// Opaque handle to one dispatched operation.
pub struct FfiPendingCall {
    pub(crate) inner: PendingCall,
}

/// `user_data` is opaque to us; the C caller guarantees it may be used from
/// the runtime's worker threads.
struct UserData(*mut c_void);

unsafe impl Send for UserData {}

/// A C callback waiting for its single invocation.
pub(crate) struct Completion {
    callback: Option<DreamCallback>,
    user_data: UserData,
}

impl Completion {
    pub(crate) fn new(callback: DreamCallback, user_data: *mut c_void) -> Self {
        Self {
            callback: Some(callback),
            user_data: UserData(user_data),
        }
    }

    /// Outcome of run, upload, create-directory and save-file: no payload.
    pub(crate) fn unit(self, outcome: ApiResult<()>) {
        self.complete(outcome.is_ok(), None);
    }

    /// Outcome of save-tarball: the response body on both paths, null when
    /// no response was received.
    pub(crate) fn response(self, outcome: ApiResult<HttpResponse>) {
        match outcome {
            Ok(response) => self.complete(true, Some(response.body)),
            Err(e) => {
                let body = e.response_body().map(str::to_string);
                self.complete(false, body);
            }
        }
    }

    /// Outcome of list: the response body exactly as received on success,
    /// null on any failure.
    pub(crate) fn projects(self, outcome: ApiResult<ProjectList>) {
        match outcome {
            Ok(list) => self.complete(true, Some(list.into_body())),
            Err(_) => self.complete(false, None),
        }
    }

    fn complete(mut self, ok: bool, payload: Option<String>) {
        if let Some(callback) = self.callback.take() {
            let payload = payload.and_then(|p| to_c_string(p, ok));
            let ptr = payload.as_ref().map_or(std::ptr::null(), |p| p.as_ptr());
            callback(ok, ptr, self.user_data.0);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            debug!("call abandoned before completing");
            callback(false, std::ptr::null(), self.user_data.0);
        }
    }
}

/// A body with an interior NUL cannot be handed to C; it is delivered as null.
fn to_c_string(payload: String, ok: bool) -> Option<CString> {
    match CString::new(payload) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(ok, nul_at = e.nul_position(), "payload contains a NUL byte, passing null");
            None
        }
    }
}

/// Read a required C string argument.
pub(crate) fn read_str(ptr: *const c_char, name: &str) -> ApiResult<String> {
    if ptr.is_null() {
        return Err(ApiError::InvalidInput(format!("null argument: {name}")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| ApiError::InvalidInput(format!("{name} is not valid UTF-8")))
}

/// Read a C string argument holding JSON.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    ptr: *const c_char,
    name: &str,
) -> ApiResult<T> {
    let raw = read_str(ptr, name)?;
    serde_json::from_str(&raw)
        .map_err(|e| ApiError::InvalidInput(format!("{name} is not valid JSON: {e}")))
}
