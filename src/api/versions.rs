//! Version history and restore handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::resource::ResourceKind;
use crate::version::store::RestoreOutcome;
use crate::version::VersionRecord;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub project: Option<String>,
}

fn require_project(query: &ProjectQuery) -> Result<&str> {
    match query.project.as_deref() {
        Some(project) if !project.trim().is_empty() => Ok(project),
        _ => Err(AppError::InvalidRequest(
            "project query parameter is required".to_string(),
        )),
    }
}

fn parse_kind(resource_type: &str) -> Result<ResourceKind> {
    resource_type.parse().map_err(AppError::InvalidRequest)
}

#[derive(Debug, Serialize)]
pub struct VersionEntry {
    #[serde(flatten)]
    pub record: VersionRecord,
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub resource_type: ResourceKind,
    pub resource_id: String,
    pub current_version: u64,
    pub versions: Vec<VersionEntry>,
}

pub async fn get_versions(
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<VersionsResponse>> {
    let kind = parse_kind(&resource_type)?;
    let project = require_project(&query)?;

    let history = state.versions.get_versions(project, kind, &resource_id).await?;
    let current_version = history.current_version;
    let versions = history
        .versions
        .into_iter()
        .map(|record| VersionEntry {
            is_current: record.version == current_version,
            record,
        })
        .collect();

    Ok(Json(VersionsResponse {
        resource_type: kind,
        resource_id,
        current_version,
        versions,
    }))
}

pub async fn restore_version(
    State(state): State<AppState>,
    Path((resource_type, resource_id, version)): Path<(String, String, u64)>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<RestoreOutcome>> {
    let kind = parse_kind(&resource_type)?;
    let project = require_project(&query)?;

    let outcome = state
        .versions
        .restore_version(project, kind, &resource_id, version)
        .await?;
    Ok(Json(outcome))
}
