//! Storage seam for allocation records.
//!
//! Every range query uses the inclusive predicate
//! `existing.start <= range.end AND existing.end >= range.start` so that an
//! allocation starting before the window but running into it is returned.
//! Results are ordered `start_date ASC, id ASC`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::engine::overlap::DateRange;
use crate::models::{Project, ResourceAllocation};
use crate::AppResult;

pub use memory::InMemoryAllocationRepository;
pub use postgres::PgAllocationRepository;

#[async_trait]
pub trait AllocationRepository: Send + Sync {
    async fn find_overlapping(
        &self,
        resource_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ResourceAllocation>>;

    async fn find_by_resource(&self, resource_id: Uuid) -> AppResult<Vec<ResourceAllocation>>;

    async fn find_by_project(&self, project_id: Uuid) -> AppResult<Vec<ResourceAllocation>>;

    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Vec<ResourceAllocation>>;

    async fn find_by_organization_overlapping(
        &self,
        organization_id: Uuid,
        range: &DateRange,
    ) -> AppResult<Vec<ResourceAllocation>>;

    /// Insert or replace by id. The returned record carries the joined project name.
    async fn save(&self, allocation: ResourceAllocation) -> AppResult<ResourceAllocation>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    async fn upsert_project(&self, project: Project) -> AppResult<Project>;
}
