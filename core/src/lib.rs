//! Client for the Dream editor's project server.
//!
//! # Overview
//! Six operations (run a project, upload a resource, create a project
//! directory, save a project file, save a project tarball, list projects),
//! each a single independent request/response cycle.
//!
//! # Design
//! - `ProjectClient` is stateless and sans-IO: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - `ProjectApi` injects a `Transport` and runs build, send, parse as one
//!   async call returning `ApiResult`.
//! - `CallbackApi` spawns those calls on a tokio runtime and delivers each
//!   result to a completion handler exactly once, for hosts that are not
//!   async themselves (see the `dream-api-ffi` crate).
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use api::ProjectApi;
pub use callback::{CallbackApi, PendingCall};
pub use client::ProjectClient;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::Transport;
pub use types::{ProjectDescriptor, ProjectList};
