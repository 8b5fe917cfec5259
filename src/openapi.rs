use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::extractors::caller::{CALLER_HEADER, ORGANIZATION_HEADER};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Capacity API",
        version = "1.0.0",
        description = "Resource allocation conflict detection and capacity reporting"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // Allocations
        crate::handlers::allocations_handler::create_allocation,
        crate::handlers::allocations_handler::get_allocation,
        crate::handlers::allocations_handler::update_allocation,
        crate::handlers::allocations_handler::delete_allocation,
        crate::handlers::allocations_handler::validate_allocation,
        crate::handlers::allocations_handler::check_conflicts,

        // Projects
        crate::handlers::projects_handler::get_project_allocations,
        crate::handlers::projects_handler::upsert_project,

        // Utilization
        crate::handlers::utilization_handler::get_resource_utilization,
        crate::handlers::utilization_handler::get_available_capacity,
        crate::handlers::utilization_handler::get_cross_project_view,
        crate::handlers::utilization_handler::get_overallocations,
    ),
    components(
        schemas(
            // Core models
            crate::models::ResourceAllocation,
            crate::models::Project,
            crate::models::ConflictType,
            crate::models::ResourceConflict,
            crate::models::ValidationResult,
            crate::models::ConflictDetails,
            crate::models::ProjectContribution,
            crate::models::ResourceUtilization,
            crate::models::ResourceCapacity,
            crate::models::CrossProjectEntry,
            crate::models::OverallocatedWindow,

            // Input models
            crate::models::CreateAllocationInput,
            crate::models::UpdateAllocationInput,
            crate::models::ValidateAllocationInput,
            crate::models::UpsertProjectInput,
            crate::models::AllocationMutationResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "allocations", description = "Allocation lifecycle and capacity checks"),
        (name = "projects", description = "Project registry and per-project allocations"),
        (name = "utilization", description = "Utilization, spare capacity and over-allocation audit"),
    ),
    modifiers(&CallerHeaders)
)]
pub struct ApiDoc;

struct CallerHeaders;

impl Modify for CallerHeaders {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "organization",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ORGANIZATION_HEADER))),
            );
            components.add_security_scheme(
                "caller",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(CALLER_HEADER))),
            );
        }
    }
}
