use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    extractors::CallerContext,
    models::{Project, ResourceAllocation, UpsertProjectInput},
    AppError, AppResult, AppState,
};

/// GET /api/projects/{id}/allocations
#[utoipa::path(
    get,
    path = "/api/projects/{id}/allocations",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Allocations of the project ordered by start date", body = Vec<ResourceAllocation>)
    ),
    tag = "projects"
)]
pub async fn get_project_allocations(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ResourceAllocation>>> {
    let mut allocations = state.aggregator.get_project_allocations(project_id).await?;
    allocations.retain(|a| a.organization_id == ctx.organization_id);
    Ok(Json(allocations))
}

/// PUT /api/projects/{id}
///
/// Registers or renames a project so allocations can report its name.
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = UpsertProjectInput,
    responses(
        (status = 200, description = "Project stored", body = Project),
        (status = 404, description = "Project belongs to another organization"),
        (status = 422, description = "Blank name")
    ),
    tag = "projects"
)]
pub async fn upsert_project(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(project_id): Path<Uuid>,
    Json(input): Json<UpsertProjectInput>,
) -> AppResult<Json<Project>> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Project name must not be blank".to_string()));
    }

    let project = Project {
        id: project_id,
        organization_id: ctx.organization_id,
        name: name.to_string(),
    };
    Ok(Json(state.repo.upsert_project(project).await?))
}
