//! Completion-handler facade for front-end hosts.
//!
//! # Design
//! Each method spawns one `ProjectApi` call onto a tokio runtime and hands
//! its `ApiResult` to a caller-supplied `FnOnce` from inside the spawned task.
//! The handler therefore runs exactly once and never on the calling thread
//! before the method returns, even when the call fails validation.
//!
//! The returned `PendingCall` can be ignored. Cancelling it resolves the call
//! with `ApiError::Cancelled` unless the transport already settled.

use std::future::Future;

use futures::future::{AbortHandle, Abortable};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::api::ProjectApi;
use crate::error::{ApiError, ApiResult};
use crate::http::HttpResponse;
use crate::transport::Transport;
use crate::types::{ProjectDescriptor, ProjectList};

/// Handle to one in-flight call.
#[derive(Debug)]
pub struct PendingCall {
    abort: AbortHandle,
    task: JoinHandle<()>,
}

impl PendingCall {
    /// Stop waiting for the transport. The handler still runs, with
    /// `ApiError::Cancelled`, unless the call already settled.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// True once the handler has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the handler has returned.
    pub async fn join(self) {
        // A panicking handler is the caller's bug; there is nothing to report back to.
        let _ = self.task.await;
    }
}

pub struct CallbackApi<T> {
    api: ProjectApi<T>,
    runtime: Handle,
}

impl<T> Clone for CallbackApi<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: Transport + 'static> CallbackApi<T> {
    pub fn new(api: ProjectApi<T>, runtime: Handle) -> Self {
        Self { api, runtime }
    }

    /// Bind to the runtime the caller is currently running on.
    ///
    /// Panics outside a tokio runtime, like `Handle::current`.
    pub fn on_current_runtime(api: ProjectApi<T>) -> Self {
        Self::new(api, Handle::current())
    }

    pub fn api(&self) -> &ProjectApi<T> {
        &self.api
    }

    pub fn run_project<H>(&self, project_name: &str, handler: H) -> PendingCall
    where
        H: FnOnce(ApiResult<()>) + Send + 'static,
    {
        let api = self.api.clone();
        let project_name = project_name.to_string();
        self.dispatch(async move { api.run_project(&project_name).await }, handler)
    }

    pub fn upload_resource<D, H>(&self, path: &str, data: &D, handler: H) -> PendingCall
    where
        D: Serialize + ?Sized,
        H: FnOnce(ApiResult<()>) + Send + 'static,
    {
        let api = self.api.clone();
        let path = path.to_string();
        let data = serde_json::to_value(data)
            .map_err(|e| ApiError::SerializationError(e.to_string()));
        self.dispatch(
            async move { api.upload_resource(&path, &data?).await },
            handler,
        )
    }

    pub fn create_project_directory<H>(&self, uuid: &str, handler: H) -> PendingCall
    where
        H: FnOnce(ApiResult<()>) + Send + 'static,
    {
        let api = self.api.clone();
        let uuid = uuid.to_string();
        self.dispatch(
            async move { api.create_project_directory(&uuid).await },
            handler,
        )
    }

    pub fn save_project_file<H>(&self, project: &ProjectDescriptor, handler: H) -> PendingCall
    where
        H: FnOnce(ApiResult<()>) + Send + 'static,
    {
        let api = self.api.clone();
        let project = project.clone();
        self.dispatch(async move { api.save_project_file(&project).await }, handler)
    }

    pub fn save_project_tarball<H>(&self, project: &ProjectDescriptor, handler: H) -> PendingCall
    where
        H: FnOnce(ApiResult<HttpResponse>) + Send + 'static,
    {
        let api = self.api.clone();
        let project = project.clone();
        self.dispatch(
            async move { api.save_project_tarball(&project).await },
            handler,
        )
    }

    pub fn read_project_list<H>(&self, handler: H) -> PendingCall
    where
        H: FnOnce(ApiResult<ProjectList>) + Send + 'static,
    {
        let api = self.api.clone();
        self.dispatch(async move { api.read_project_list().await }, handler)
    }

    /// Deliver `error` through `handler` the same way a failed call would,
    /// for arguments the caller could not even turn into a call.
    pub fn reject<V, H>(&self, error: ApiError, handler: H) -> PendingCall
    where
        V: Send + 'static,
        H: FnOnce(ApiResult<V>) + Send + 'static,
    {
        self.dispatch(async move { Err(error) }, handler)
    }

    fn dispatch<V, F, H>(&self, call: F, handler: H) -> PendingCall
    where
        V: Send + 'static,
        F: Future<Output = ApiResult<V>> + Send + 'static,
        H: FnOnce(ApiResult<V>) + Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let task = self.runtime.spawn(async move {
            let outcome = Abortable::new(call, registration)
                .await
                .unwrap_or(Err(ApiError::Cancelled));
            handler(outcome);
        });
        PendingCall { abort, task }
    }
}
