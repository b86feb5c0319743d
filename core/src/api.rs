//! Async facade: build, send through the injected transport, parse.
//!
//! # Design
//! `ProjectApi` pairs a `ProjectClient` with a shared `Transport`. It owns no
//! mutable state, so clones are cheap and independent calls never coordinate.
//! Every operation resolves to exactly one `ApiResult`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::client::ProjectClient;
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{ProjectDescriptor, ProjectList};

pub struct ProjectApi<T> {
    client: ProjectClient,
    transport: Arc<T>,
}

impl<T> Clone for ProjectApi<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> ProjectApi<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            client: ProjectClient::new(base_url),
            transport: Arc::new(transport),
        }
    }

    pub fn from_config(config: &ApiConfig, transport: T) -> Self {
        Self::new(&config.base_url, transport)
    }

    pub fn client(&self) -> &ProjectClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn run_project(&self, project_name: &str) -> ApiResult<()> {
        let request = self.client.build_run_project(project_name)?;
        let response = self.send(request).await?;
        self.client.parse_run_project(response)
    }

    pub async fn upload_resource<D: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &D,
    ) -> ApiResult<()> {
        let request = self.client.build_upload_resource(path, data)?;
        let response = self.send(request).await?;
        self.client.parse_upload_resource(response)
    }

    pub async fn create_project_directory(&self, uuid: &str) -> ApiResult<()> {
        let request = self.client.build_create_project_directory(uuid)?;
        let response = self.send(request).await?;
        self.client.parse_create_project_directory(response)
    }

    pub async fn save_project_file(&self, project: &ProjectDescriptor) -> ApiResult<()> {
        let request = self.client.build_save_project_file(project)?;
        let response = self.send(request).await?;
        self.client.parse_save_project_file(response)
    }

    pub async fn save_project_tarball(&self, project: &ProjectDescriptor) -> ApiResult<HttpResponse> {
        info!(uuid = %project.uuid, "saving project as tarball");
        let request = self.client.build_save_project_tarball(project)?;
        let response = self.send(request).await?;
        self.client.parse_save_project_tarball(response)
    }

    pub async fn read_project_list(&self) -> ApiResult<ProjectList> {
        let request = self.client.build_read_project_list();
        let response = self.send(request).await?;
        self.client.parse_read_project_list(response)
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let method = request.method.as_str();
        let path = request.path.clone();
        debug!(method, path = %path, "sending request");
        match self.transport.send(request).await {
            Ok(response) => {
                debug!(method, path = %path, status = response.status, "response received");
                Ok(response)
            }
            Err(e) => {
                debug!(method, path = %path, error = %e, "request failed");
                Err(e)
            }
        }
    }
}
