use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::query::DateRangeQuery;
use crate::{
    extractors::CallerContext,
    models::{CrossProjectEntry, OverallocatedWindow, ResourceCapacity, ResourceUtilization},
    AppResult, AppState,
};

/// GET /api/utilization/resources/{id}?start=&end=
#[utoipa::path(
    get,
    path = "/api/utilization/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource id"), DateRangeQuery),
    responses(
        (status = 200, description = "Load of the resource, per project", body = ResourceUtilization),
        (status = 400, description = "Invalid or partial date range")
    ),
    tag = "utilization"
)]
pub async fn get_resource_utilization(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(resource_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<ResourceUtilization>> {
    let range = query.optional_range()?;
    let utilization = state
        .aggregator
        .get_resource_utilization(ctx.organization_id, resource_id, range)
        .await?;
    Ok(Json(utilization))
}

/// GET /api/utilization/capacity?start=&end=
#[utoipa::path(
    get,
    path = "/api/utilization/capacity",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Spare capacity per allocated resource", body = Vec<ResourceCapacity>),
        (status = 400, description = "Missing or invalid date range")
    ),
    tag = "utilization"
)]
pub async fn get_available_capacity(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<ResourceCapacity>>> {
    let range = query.required_range()?;
    let capacity = state
        .aggregator
        .get_available_capacity(ctx.organization_id, range)
        .await?;
    Ok(Json(capacity))
}

/// GET /api/utilization/cross-project
#[utoipa::path(
    get,
    path = "/api/utilization/cross-project",
    responses(
        (status = 200, description = "All allocations grouped by resource", body = Vec<CrossProjectEntry>)
    ),
    tag = "utilization"
)]
pub async fn get_cross_project_view(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
) -> AppResult<Json<Vec<CrossProjectEntry>>> {
    Ok(Json(
        state
            .aggregator
            .get_cross_project_view(ctx.organization_id)
            .await?,
    ))
}

/// GET /api/utilization/overallocations?start=&end=
#[utoipa::path(
    get,
    path = "/api/utilization/overallocations",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Windows where stored load exceeds 100%", body = Vec<OverallocatedWindow>),
        (status = 400, description = "Invalid or partial date range")
    ),
    tag = "utilization"
)]
pub async fn get_overallocations(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<OverallocatedWindow>>> {
    let range = query.optional_range()?;
    let windows = state
        .aggregator
        .find_overallocations(ctx.organization_id, range)
        .await?;
    Ok(Json(windows))
}
