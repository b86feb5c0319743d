//! Stateless HTTP request builder and response parser for the project API.
//!
//! # Design
//! `ProjectClient` holds only a `base_url` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. Arguments are validated in `build_*`, so a rejected call
//! never reaches the network.

use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, JSON, PLAIN_TEXT};
use crate::types::{
    validate_uuid, CreateDirectoryBody, ProjectDescriptor, ProjectList, SaveProjectBody,
    UploadBody,
};

/// Synchronous, stateless client for the project API.
#[derive(Debug, Clone)]
pub struct ProjectClient {
    base_url: String,
}

impl ProjectClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /run` with the project name as a raw text body.
    pub fn build_run_project(&self, project_name: &str) -> Result<HttpRequest, ApiError> {
        if project_name.is_empty() {
            return Err(ApiError::InvalidInput("project name is empty".to_string()));
        }
        Ok(HttpRequest::post(
            format!("{}/run", self.base_url),
            PLAIN_TEXT,
            project_name.to_string(),
        ))
    }

    /// `POST {path}` with `{"data": data}`.
    pub fn build_upload_resource<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<HttpRequest, ApiError> {
        if path.is_empty() {
            return Err(ApiError::InvalidInput("upload path is empty".to_string()));
        }
        let body = to_json(&UploadBody { data })?;
        let url = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        Ok(HttpRequest::post(url, JSON, body))
    }

    /// `POST /create` with `{"uuid": uuid}`.
    pub fn build_create_project_directory(&self, uuid: &str) -> Result<HttpRequest, ApiError> {
        validate_uuid(uuid)?;
        let body = to_json(&CreateDirectoryBody { uuid })?;
        Ok(HttpRequest::post(format!("{}/create", self.base_url), JSON, body))
    }

    /// `POST /save/{uuid}` with `{"project": project}`.
    pub fn build_save_project_file(
        &self,
        project: &ProjectDescriptor,
    ) -> Result<HttpRequest, ApiError> {
        validate_uuid(&project.uuid)?;
        let body = to_json(&SaveProjectBody { project })?;
        Ok(HttpRequest::post(
            format!("{}/save/{}", self.base_url, project.uuid),
            JSON,
            body,
        ))
    }

    /// `GET /compress/{uuid}`.
    pub fn build_save_project_tarball(
        &self,
        project: &ProjectDescriptor,
    ) -> Result<HttpRequest, ApiError> {
        validate_uuid(&project.uuid)?;
        Ok(HttpRequest::get(format!(
            "{}/compress/{}",
            self.base_url, project.uuid
        )))
    }

    /// `GET /projectlist`.
    pub fn build_read_project_list(&self) -> HttpRequest {
        HttpRequest::get(format!("{}/projectlist", self.base_url))
    }

    pub fn parse_run_project(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_upload_resource(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_create_project_directory(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_save_project_file(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    /// The whole response is handed back so callers can inspect the archive
    /// description and headers.
    pub fn parse_save_project_tarball(
        &self,
        response: HttpResponse,
    ) -> Result<HttpResponse, ApiError> {
        check_status(&response)?;
        Ok(response)
    }

    /// The body is kept as received; it only has to be a JSON array.
    pub fn parse_read_project_list(&self, response: HttpResponse) -> Result<ProjectList, ApiError> {
        check_status(&response)?;
        ProjectList::from_body(response.body)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))
}

/// Map any non-2xx status to `ApiError::HttpError`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
