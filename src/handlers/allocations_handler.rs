use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use super::query::parse_date;
use crate::{
    engine::DateRange,
    extractors::CallerContext,
    models::{
        AllocationMutationResponse, CreateAllocationInput, ResourceAllocation,
        UpdateAllocationInput, ValidateAllocationInput, ValidationResult,
    },
    AppResult, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConflictsQuery {
    #[serde(rename = "resourceId")]
    pub resource_id: Uuid,
    pub start: String,
    pub end: String,
}

/// POST /api/allocations
#[utoipa::path(
    post,
    path = "/api/allocations",
    request_body = CreateAllocationInput,
    responses(
        (status = 201, description = "Allocation created", body = ResourceAllocation),
        (status = 409, description = "Resource would exceed 100% capacity"),
        (status = 422, description = "Invalid percentage, hours or date range")
    ),
    tag = "allocations"
)]
pub async fn create_allocation(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Json(input): Json<CreateAllocationInput>,
) -> AppResult<(StatusCode, Json<ResourceAllocation>)> {
    let allocation = state.manager.allocate(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(allocation)))
}

/// GET /api/allocations/{id}
#[utoipa::path(
    get,
    path = "/api/allocations/{id}",
    params(("id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Allocation", body = ResourceAllocation),
        (status = 404, description = "Allocation not found")
    ),
    tag = "allocations"
)]
pub async fn get_allocation(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ResourceAllocation>> {
    Ok(Json(state.manager.get(&ctx, id).await?))
}

/// PUT /api/allocations/{id}
#[utoipa::path(
    put,
    path = "/api/allocations/{id}",
    params(("id" = Uuid, Path, description = "Allocation id")),
    request_body = UpdateAllocationInput,
    responses(
        (status = 200, description = "Allocation updated", body = ResourceAllocation),
        (status = 400, description = "Empty patch"),
        (status = 404, description = "Allocation not found"),
        (status = 409, description = "Resource would exceed 100% capacity"),
        (status = 422, description = "Invalid percentage, hours or date range")
    ),
    tag = "allocations"
)]
pub async fn update_allocation(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAllocationInput>,
) -> AppResult<Json<ResourceAllocation>> {
    Ok(Json(state.manager.update(&ctx, id, input).await?))
}

/// DELETE /api/allocations/{id}
#[utoipa::path(
    delete,
    path = "/api/allocations/{id}",
    params(("id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Allocation deleted", body = AllocationMutationResponse),
        (status = 404, description = "Allocation not found")
    ),
    tag = "allocations"
)]
pub async fn delete_allocation(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AllocationMutationResponse>> {
    state.manager.remove(&ctx, id).await?;

    Ok(Json(AllocationMutationResponse {
        success: true,
        allocation_id: Some(id),
        message: Some("Allocation deleted successfully".to_string()),
    }))
}

/// POST /api/allocations/validate
///
/// Dry run: reports whether the allocation would fit without storing it.
#[utoipa::path(
    post,
    path = "/api/allocations/validate",
    request_body = ValidateAllocationInput,
    responses(
        (status = 200, description = "Capacity check result", body = ValidationResult),
        (status = 422, description = "Invalid percentage or date range")
    ),
    tag = "allocations"
)]
pub async fn validate_allocation(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Json(input): Json<ValidateAllocationInput>,
) -> AppResult<Json<ValidationResult>> {
    let range = DateRange::try_new(input.start_date, input.end_date)?;
    let result = state
        .manager
        .validator()
        .validate(
            ctx.organization_id,
            input.resource_id,
            range,
            input.allocation_percentage,
        )
        .await?;
    Ok(Json(result))
}

/// GET /api/allocations/conflicts?resourceId=&start=&end=
#[utoipa::path(
    get,
    path = "/api/allocations/conflicts",
    params(ConflictsQuery),
    responses(
        (status = 200, description = "Load already committed over the range", body = ValidationResult),
        (status = 400, description = "Invalid date format"),
        (status = 422, description = "start is after end")
    ),
    tag = "allocations"
)]
pub async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    Query(query): Query<ConflictsQuery>,
) -> AppResult<Json<ValidationResult>> {
    let range = DateRange::try_new(
        parse_date(&query.start, "start")?,
        parse_date(&query.end, "end")?,
    )?;

    let result = state
        .manager
        .validator()
        .check_allocation_conflicts(ctx.organization_id, query.resource_id, range)
        .await?;
    Ok(Json(result))
}
