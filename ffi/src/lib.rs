//! C-ABI wrapper around `dream-api-core`.
//!
//! # Overview
//! Exposes the six project operations through `extern "C"` functions that
//! take a completion callback, so a front-end written in any language with a
//! C FFI can drive the project server without an async runtime of its own.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `dream_api_new` owns a multi-threaded tokio runtime; callbacks run on its
//!   worker threads, never on the calling thread.
//! - Once an operation is dispatched its callback runs exactly once. Bad
//!   arguments are reported through the callback too; only a null `api` or
//!   null callback makes a function return null without dispatching.
//! - Project objects and upload data cross the boundary as JSON strings.
//! - The caller owns returned handles and releases them with
//!   `dream_api_free` / `dream_call_free`.

pub mod types;

use std::ffi::c_void;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use dream_api_core::{
    ApiConfig, CallbackApi, PendingCall, ProjectApi, ProjectDescriptor, ReqwestTransport,
};
use serde_json::Value;
use tracing::{debug, warn};

use types::*;

// ---------------------------------------------------------------------------
// API lifecycle
// ---------------------------------------------------------------------------

/// Create a project API handle bound to `base_url`.
///
/// A null `base_url` falls back to `DREAM_API_URL` (or the default server
/// address). Returns null if `base_url` is not valid UTF-8 or the runtime
/// cannot be started. Free the handle with `dream_api_free`.
#[unsafe(no_mangle)]
pub extern "C" fn dream_api_new(base_url: *const c_char) -> *mut FfiProjectApi {
    catch_unwind(|| {
        let config = if base_url.is_null() {
            ApiConfig::from_env()
        } else {
            match read_str(base_url, "base_url") {
                Ok(base_url) => ApiConfig { base_url },
                Err(_) => return std::ptr::null_mut(),
            }
        };
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .thread_name("dream-api")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "failed to start runtime");
                return std::ptr::null_mut();
            }
        };
        let api = ProjectApi::from_config(&config, ReqwestTransport::new());
        let inner = CallbackApi::new(api, runtime.handle().clone());
        debug!(base_url = %config.base_url, "project api created");
        Box::into_raw(Box::new(FfiProjectApi { runtime, inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a handle created by `dream_api_new`. Safe to call with null.
///
/// Calls still in flight are abandoned: each of their callbacks runs once
/// with `ok = false` and a null payload, possibly after this returns and on a
/// runtime thread.
#[unsafe(no_mangle)]
pub extern "C" fn dream_api_free(api: *mut FfiProjectApi) {
    if !api.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let api = unsafe { Box::from_raw(api) };
            let FfiProjectApi { runtime, inner } = *api;
            drop(inner);
            runtime.shutdown_background();
        }));
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Shared prologue of every operation: check the handle and callback, then
/// let `start` dispatch the call.
fn dispatch<F>(
    api: *const FfiProjectApi,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
    operation: &str,
    start: F,
) -> *mut FfiPendingCall
where
    F: FnOnce(&CallbackApi<ReqwestTransport>, Completion) -> PendingCall,
{
    catch_unwind(AssertUnwindSafe(|| {
        let Some(callback) = callback else {
            return std::ptr::null_mut();
        };
        if api.is_null() {
            return std::ptr::null_mut();
        }
        let api = unsafe { &*api };
        let call = start(&api.inner, Completion::new(callback, user_data));
        Box::into_raw(Box::new(FfiPendingCall { inner: call }))
    }))
    .unwrap_or_else(|_| {
        warn!(operation, "panic while dispatching");
        std::ptr::null_mut()
    })
}

/// `POST /run` with `project_name` as the body. The callback gets no payload.
#[unsafe(no_mangle)]
pub extern "C" fn dream_run_project(
    api: *const FfiProjectApi,
    project_name: *const c_char,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "run_project", |api, done| {
        match read_str(project_name, "project_name") {
            Ok(name) => api.run_project(&name, move |outcome| done.unit(outcome)),
            Err(e) => api.reject(e, move |outcome| done.unit(outcome)),
        }
    })
}

/// `POST {path}` with `{"data": <data_json>}`. The callback gets no payload.
#[unsafe(no_mangle)]
pub extern "C" fn dream_upload_resource(
    api: *const FfiProjectApi,
    path: *const c_char,
    data_json: *const c_char,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "upload_resource", |api, done| {
        let args = read_str(path, "path")
            .and_then(|path| Ok((path, read_json::<Value>(data_json, "data_json")?)));
        match args {
            Ok((path, data)) => api.upload_resource(&path, &data, move |outcome| done.unit(outcome)),
            Err(e) => api.reject(e, move |outcome| done.unit(outcome)),
        }
    })
}

/// `POST /create` with `{"uuid": uuid}`. The callback gets no payload.
#[unsafe(no_mangle)]
pub extern "C" fn dream_create_project_directory(
    api: *const FfiProjectApi,
    uuid: *const c_char,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "create_project_directory", |api, done| {
        match read_str(uuid, "uuid") {
            Ok(uuid) => api.create_project_directory(&uuid, move |outcome| done.unit(outcome)),
            Err(e) => api.reject(e, move |outcome| done.unit(outcome)),
        }
    })
}

/// `POST /save/{uuid}` with `{"project": <project_json>}`. The callback gets
/// no payload.
#[unsafe(no_mangle)]
pub extern "C" fn dream_save_project_file(
    api: *const FfiProjectApi,
    project_json: *const c_char,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "save_project_file", |api, done| {
        match read_json::<ProjectDescriptor>(project_json, "project_json") {
            Ok(project) => api.save_project_file(&project, move |outcome| done.unit(outcome)),
            Err(e) => api.reject(e, move |outcome| done.unit(outcome)),
        }
    })
}

/// `GET /compress/{uuid}`. The callback gets the response body on success and
/// on HTTP failure; null when no response was received. A body containing a
/// NUL byte cannot be passed as a C string, so it also arrives as null (with
/// `ok` unchanged) and a warning is logged.
#[unsafe(no_mangle)]
pub extern "C" fn dream_save_project_tarball(
    api: *const FfiProjectApi,
    project_json: *const c_char,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "save_project_tarball", |api, done| {
        match read_json::<ProjectDescriptor>(project_json, "project_json") {
            Ok(project) => {
                api.save_project_tarball(&project, move |outcome| done.response(outcome))
            }
            Err(e) => api.reject(e, move |outcome| done.response(outcome)),
        }
    })
}

/// `GET /projectlist`. The callback gets the response body, unmodified, on
/// success and null on any failure. The body only has to be a JSON array.
#[unsafe(no_mangle)]
pub extern "C" fn dream_read_project_list(
    api: *const FfiProjectApi,
    callback: Option<DreamCallback>,
    user_data: *mut c_void,
) -> *mut FfiPendingCall {
    dispatch(api, callback, user_data, "read_project_list", |api, done| {
        api.read_project_list(move |outcome| done.projects(outcome))
    })
}

// ---------------------------------------------------------------------------
// Call handles
// ---------------------------------------------------------------------------

/// Cancel a dispatched call. Its callback still runs once, with `ok = false`,
/// unless the call already settled. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dream_call_cancel(call: *const FfiPendingCall) {
    if !call.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| unsafe { &*call }.inner.cancel()));
    }
}

/// True once the call's callback has returned. False for null.
#[unsafe(no_mangle)]
pub extern "C" fn dream_call_is_finished(call: *const FfiPendingCall) -> bool {
    if call.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*call }.inner.is_finished())).unwrap_or(false)
}

/// Free a call handle. Does not cancel the call. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dream_call_free(call: *mut FfiPendingCall) {
    if !call.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(call) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use dream_api_core::{HttpResponse, ProjectList};
    use std::ffi::{CStr, CString};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    type Outcome = (bool, Option<String>);

    /// Callback that reclaims the boxed `Sender` it was given, so a second
    /// invocation would be a use-after-free the test would trip over.
    extern "C" fn record(ok: bool, payload: *const c_char, user_data: *mut c_void) {
        let tx = unsafe { Box::from_raw(user_data as *mut Sender<Outcome>) };
        let payload = if payload.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(payload) }.to_str().unwrap().to_string())
        };
        let _ = tx.send((ok, payload));
    }

    fn channel() -> (*mut c_void, Receiver<Outcome>) {
        let (tx, rx) = mpsc::channel();
        (Box::into_raw(Box::new(tx)) as *mut c_void, rx)
    }

    fn wait(call: *mut FfiPendingCall, rx: &Receiver<Outcome>) -> Outcome {
        assert!(!call.is_null());
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        dream_call_free(call);
        outcome
    }

    fn spawn_mock_server() -> String {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        format!("http://{addr}")
    }

    fn api_for(base_url: &str) -> *mut FfiProjectApi {
        let url = CString::new(base_url).unwrap();
        let api = dream_api_new(url.as_ptr());
        assert!(!api.is_null());
        api
    }

    #[test]
    fn api_new_and_free() {
        let api = api_for("http://localhost:3000");
        dream_api_free(api);
    }

    #[test]
    fn api_new_null_url_uses_config() {
        let api = dream_api_new(std::ptr::null());
        assert!(!api.is_null());
        dream_api_free(api);
    }

    #[test]
    fn api_free_null_is_safe() {
        dream_api_free(std::ptr::null_mut());
    }

    #[test]
    fn null_callback_returns_null() {
        let api = api_for("http://localhost:3000");
        let call = dream_read_project_list(api, None, std::ptr::null_mut());
        assert!(call.is_null());
        dream_api_free(api);
    }

    #[test]
    fn null_api_returns_null() {
        let (user_data, _rx) = channel();
        let call = dream_read_project_list(std::ptr::null(), Some(record), user_data);
        assert!(call.is_null());
        // Never dispatched, so the sender is still ours to free.
        drop(unsafe { Box::from_raw(user_data as *mut Sender<Outcome>) });
    }

    #[test]
    fn null_argument_fails_through_callback() {
        let api = api_for("http://localhost:3000");

        let (user_data, rx) = channel();
        let call = dream_run_project(api, std::ptr::null(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_create_project_directory(api, std::ptr::null(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        dream_api_free(api);
    }

    #[test]
    fn malformed_project_json_fails_through_callback() {
        let api = api_for("http://localhost:3000");

        for json in [r#"{"name":"no uuid"}"#, "not json", r#"{"uuid":"a/b"}"#] {
            let project = CString::new(json).unwrap();
            let (user_data, rx) = channel();
            let call = dream_save_project_file(api, project.as_ptr(), Some(record), user_data);
            assert_eq!(wait(call, &rx), (false, None), "{json}");
        }

        let (user_data, rx) = channel();
        let path = CString::new("/upload/foo").unwrap();
        let data = CString::new("{not json").unwrap();
        let call = dream_upload_resource(api, path.as_ptr(), data.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        dream_api_free(api);
    }

    #[test]
    fn unreachable_server_fails_every_operation() {
        let api = api_for("http://127.0.0.1:9");
        let project = CString::new(r#"{"uuid":"abc123"}"#).unwrap();
        let name = CString::new("demo").unwrap();

        let uuid = CString::new("abc123").unwrap();
        let path = CString::new("/upload/foo").unwrap();
        let data = CString::new("1").unwrap();

        let (user_data, rx) = channel();
        let call = dream_run_project(api, name.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_upload_resource(api, path.as_ptr(), data.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_create_project_directory(api, uuid.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_save_project_file(api, project.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_save_project_tarball(api, project.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        let (user_data, rx) = channel();
        let call = dream_read_project_list(api, Some(record), user_data);
        assert_eq!(wait(call, &rx), (false, None));

        dream_api_free(api);
    }

    #[test]
    fn freeing_the_api_fails_calls_in_flight() {
        // Accepts connections and never answers them.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        let api = api_for(&format!("http://{addr}"));

        let (user_data, rx) = channel();
        let call = dream_read_project_list(api, Some(record), user_data);
        assert!(!call.is_null());
        std::thread::sleep(Duration::from_millis(300));
        assert!(rx.try_recv().is_err());

        dream_api_free(api);

        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), (false, None));
        // `record` dropped the sender, so nothing else can arrive.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        dream_call_free(call);
    }

    #[test]
    fn dropped_completion_reports_failure_once() {
        let (user_data, rx) = channel();
        drop(Completion::new(record, user_data));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), (false, None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn payload_with_nul_byte_arrives_as_null() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "tar\0ball".to_string(),
        };
        let (user_data, rx) = channel();
        Completion::new(record, user_data).response(Ok(response));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), (true, None));
    }

    #[test]
    fn project_list_body_is_forwarded_verbatim() {
        let body = r#"[{"name":"x","uuid":"a"},{"name":"no uuid"},{"uuid":7}]"#;
        let (user_data, rx) = channel();
        Completion::new(record, user_data).projects(ProjectList::from_body(body));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            (true, Some(body.to_string()))
        );

        let (user_data, rx) = channel();
        Completion::new(record, user_data).projects(ProjectList::from_body("{}"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), (false, None));
    }

    #[test]
    fn project_lifecycle_over_callbacks() {
        let api = api_for(&spawn_mock_server());
        let project = CString::new(r#"{"uuid":"abc123","name":"x"}"#).unwrap();

        // list — empty array
        let (user_data, rx) = channel();
        let call = dream_read_project_list(api, Some(record), user_data);
        assert_eq!(wait(call, &rx), (true, Some("[]".to_string())));

        // tarball before save — failed response body is forwarded
        let (user_data, rx) = channel();
        let call = dream_save_project_tarball(api, project.as_ptr(), Some(record), user_data);
        let (ok, _) = wait(call, &rx);
        assert!(!ok);

        // create + save
        let uuid = CString::new("abc123").unwrap();
        let (user_data, rx) = channel();
        let call = dream_create_project_directory(api, uuid.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (true, None));

        let (user_data, rx) = channel();
        let call = dream_save_project_file(api, project.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (true, None));

        // upload + run
        let path = CString::new("/upload/foo").unwrap();
        let data = CString::new(r#"{"bytes":[1,2,3]}"#).unwrap();
        let (user_data, rx) = channel();
        let call = dream_upload_resource(api, path.as_ptr(), data.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (true, None));

        let name = CString::new("x").unwrap();
        let (user_data, rx) = channel();
        let call = dream_run_project(api, name.as_ptr(), Some(record), user_data);
        assert_eq!(wait(call, &rx), (true, None));

        // tarball — archive description
        let (user_data, rx) = channel();
        let call = dream_save_project_tarball(api, project.as_ptr(), Some(record), user_data);
        let (ok, payload) = wait(call, &rx);
        assert!(ok);
        let archive: Value = serde_json::from_str(&payload.unwrap()).unwrap();
        assert_eq!(archive["archive"], "abc123.tar.gz");

        // list — the saved project
        let (user_data, rx) = channel();
        let call = dream_read_project_list(api, Some(record), user_data);
        let (ok, payload) = wait(call, &rx);
        assert!(ok);
        let projects: Value = serde_json::from_str(&payload.unwrap()).unwrap();
        assert_eq!(projects, serde_json::json!([{"uuid": "abc123", "name": "x"}]));

        dream_api_free(api);
    }

    #[test]
    fn call_handle_reports_completion() {
        let api = api_for("http://127.0.0.1:9");
        let (user_data, rx) = channel();
        let call = dream_read_project_list(api, Some(record), user_data);
        assert!(!call.is_null());

        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        while !dream_call_is_finished(call) {
            std::thread::yield_now();
        }
        // Cancelling a settled call is a no-op.
        dream_call_cancel(call);
        dream_call_free(call);

        assert!(!dream_call_is_finished(std::ptr::null()));
        dream_call_cancel(std::ptr::null());
        dream_call_free(std::ptr::null_mut());
        dream_api_free(api);
    }
}
