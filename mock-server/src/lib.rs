use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub uuid: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct Upload {
    pub data: Value,
}

#[derive(Deserialize)]
pub struct CreateDirectory {
    pub uuid: String,
}

#[derive(Deserialize)]
pub struct SaveProject {
    pub project: Project,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStarted {
    pub run_id: Uuid,
    pub project: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Archive {
    pub uuid: String,
    pub archive: String,
    pub size: usize,
}

#[derive(Default)]
pub struct Store {
    pub directories: BTreeSet<String>,
    pub projects: BTreeMap<String, Project>,
    pub resources: HashMap<String, Value>,
    pub runs: Vec<String>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Db::default())
}

/// Build the router over a caller-owned store so tests can inspect it.
pub fn app_with_store(db: Db) -> Router {
    Router::new()
        .route("/run", post(run_project))
        .route("/upload/{*path}", post(upload_resource))
        .route("/create", post(create_directory))
        .route("/save/{uuid}", post(save_project))
        .route("/compress/{uuid}", get(compress_project))
        .route("/projectlist", get(list_projects))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn run_project(
    State(db): State<Db>,
    name: String,
) -> Result<Json<RunStarted>, StatusCode> {
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    info!(project = %name, "run requested");
    db.write().await.runs.push(name.clone());
    Ok(Json(RunStarted {
        run_id: Uuid::new_v4(),
        project: name,
    }))
}

async fn upload_resource(
    State(db): State<Db>,
    Path(path): Path<String>,
    Json(input): Json<Upload>,
) -> StatusCode {
    debug!(path = %path, "resource uploaded");
    db.write().await.resources.insert(path, input.data);
    StatusCode::OK
}

async fn create_directory(
    State(db): State<Db>,
    Json(input): Json<CreateDirectory>,
) -> StatusCode {
    if db.write().await.directories.insert(input.uuid) {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

async fn save_project(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    Json(input): Json<SaveProject>,
) -> StatusCode {
    if input.project.uuid != uuid {
        return StatusCode::BAD_REQUEST;
    }
    let mut store = db.write().await;
    store.directories.insert(uuid.clone());
    store.projects.insert(uuid, input.project);
    StatusCode::OK
}

async fn compress_project(
    State(db): State<Db>,
    Path(uuid): Path<String>,
) -> Result<Json<Archive>, StatusCode> {
    let store = db.read().await;
    let project = store.projects.get(&uuid).ok_or(StatusCode::NOT_FOUND)?;
    let size = serde_json::to_vec(project)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .len();
    Ok(Json(Archive {
        archive: format!("{uuid}.tar.gz"),
        uuid,
        size,
    }))
}

async fn list_projects(State(db): State<Db>) -> Json<Vec<Project>> {
    let store = db.read().await;
    Json(store.projects.values().cloned().collect())
}
