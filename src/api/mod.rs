//! HTTP surface over the depsolve pipeline.
//!
// Copyright (C) 2016
// Red Hat, Inc.  All rights reserved.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//
//! ## Overview
//!
//! Rebuilt on Rocket 0.5 (the teacher's Cargo.toml already named Rocket as
//! its web framework; the handlers themselves are new, since the teacher's
//! actual `mod.rs` handlers targeted Nickel, a leftover from before the
//! crate switched frameworks). Four routes (spec 6): `POST /api/v1/manifest`
//! submits a job, `GET /api/v1/manifest/<repo_id>` fetches the most recent
//! manifest touching a repo, `GET /api/v1/task/<task_id>` fetches one job's
//! result by id, `GET /api/v1/status` is a liveness probe.
//!
//! Every route other than `/status` requires the
//! `X-RhApiPlatform-CallContext` header (spec 6, "Auth"); this crate does
//! not validate its contents, only requires its presence, since the
//! identity it carries is verified upstream by the platform gateway.

use std::collections::HashMap;
use std::sync::Arc;

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ConfigResolver;
use crate::coordinator::{Coordinator, RepoRequest};
use crate::model::{ManifestEntry, RepoGroup, RequestedModule};
use crate::persistence::{InMemoryResultStore, ResultStore};
use crate::query::ContentStore;
use crate::WorkerConfig;

/// Presence-only guard for the platform call-context header.
pub struct CallContext;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallContext {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one("X-RhApiPlatform-CallContext") {
            Some(_) => Outcome::Success(CallContext),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Shared state every route handler reaches through Rocket's `State`.
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub result_store: Arc<dyn ResultStore>,
    pub worker_config: WorkerConfig,
    pub resolver: Mutex<ConfigResolver>,
    pub repo_index: Mutex<HashMap<String, String>>,
    pub log: slog::Logger,
}

impl AppState {
    pub fn new(store: Arc<dyn ContentStore>, resolver: ConfigResolver, worker_config: WorkerConfig, log: slog::Logger) -> AppState {
        AppState {
            store,
            result_store: Arc::new(InMemoryResultStore::new()),
            worker_config,
            resolver: Mutex::new(resolver),
            repo_index: Mutex::new(HashMap::new()),
            log,
        }
    }
}

#[derive(Deserialize)]
pub struct RepoRequestDto {
    pub binary_repo_id: String,
    pub debug_repo_id: String,
    pub source_repo_id: String,
    pub input_repos: Vec<String>,
    pub input_content_set: String,
    pub output_content_set: String,
    pub version: String,
    #[serde(default)]
    pub requested_modules: Vec<RequestedModuleDto>,
}

#[derive(Deserialize)]
pub struct RequestedModuleDto {
    pub name: String,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

#[derive(Deserialize)]
pub struct ManifestRequest {
    pub repos: Vec<RepoRequestDto>,
}

#[derive(Serialize)]
pub struct ManifestAccepted {
    pub task_id: String,
}

#[derive(Serialize)]
pub struct ManifestResponse {
    pub entries: HashMap<String, Vec<ManifestEntry>>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

fn to_repo_request(dto: RepoRequestDto) -> RepoRequest {
    RepoRequest {
        repos: RepoGroup {
            binary_repo_id: dto.binary_repo_id,
            debug_repo_id: dto.debug_repo_id,
            source_repo_id: dto.source_repo_id,
        },
        input_repos: dto.input_repos,
        input_content_set: dto.input_content_set,
        output_content_set: dto.output_content_set,
        version: dto.version,
        requested_modules: dto
            .requested_modules
            .into_iter()
            .map(|m| RequestedModule {
                name: m.name,
                stream: m.stream,
                profiles: m.profiles,
            })
            .collect(),
    }
}

#[rocket::post("/api/v1/manifest", data = "<body>")]
pub async fn submit_manifest(
    _ctx: CallContext,
    state: &State<AppState>,
    body: Json<ManifestRequest>,
) -> Result<Json<ManifestAccepted>, (Status, Json<ApiError>)> {
    let requests: Vec<RepoRequest> = body.into_inner().repos.into_iter().map(to_repo_request).collect();
    let output_repo_ids: Vec<String> = requests.iter().map(|r| r.repos.binary_repo_id.clone()).collect();

    let mut resolver = state.resolver.lock().await;
    let mut coordinator = Coordinator::new(state.store.as_ref(), &state.worker_config, &mut *resolver, state.log.clone());
    let merged = coordinator
        .run(requests)
        .await
        .map_err(|e| (Status::BadRequest, Json(ApiError { error: e.to_string() })))?;

    let task_id = Uuid::new_v4().to_string();
    coordinator
        .persist(state.result_store.as_ref(), &task_id, &merged)
        .await
        .map_err(|e| (Status::InternalServerError, Json(ApiError { error: e.to_string() })))?;

    let mut repo_index = state.repo_index.lock().await;
    for repo_id in output_repo_ids {
        repo_index.insert(repo_id, task_id.clone());
    }

    Ok(Json(ManifestAccepted { task_id }))
}

#[rocket::get("/api/v1/task/<task_id>")]
pub async fn get_task(
    _ctx: CallContext,
    state: &State<AppState>,
    task_id: &str,
) -> Result<Json<ManifestResponse>, Status> {
    match state.result_store.get(task_id).await.map_err(|_| Status::InternalServerError)? {
        Some(manifest) => Ok(Json(ManifestResponse { entries: manifest.entries })),
        None => Err(Status::NotFound),
    }
}

#[rocket::get("/api/v1/manifest/<repo_id>")]
pub async fn get_manifest(
    _ctx: CallContext,
    state: &State<AppState>,
    repo_id: &str,
) -> Result<Json<ManifestResponse>, Status> {
    let repo_index = state.repo_index.lock().await;
    let task_id = repo_index.get(repo_id).ok_or(Status::NotFound)?.clone();
    drop(repo_index);

    match state
        .result_store
        .get(&task_id)
        .await
        .map_err(|_| Status::InternalServerError)?
    {
        Some(manifest) => {
            let mut entries = HashMap::new();
            if let Some(repo_entries) = manifest.entries.get(repo_id) {
                entries.insert(repo_id.to_string(), repo_entries.clone());
            }
            Ok(Json(ManifestResponse { entries }))
        }
        None => Err(Status::NotFound),
    }
}

#[rocket::get("/api/v1/status")]
pub fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}
