use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use uuid::Uuid;

use crate::extractors::CallerContext;
use crate::models::{
    ConflictDetails, CreateAllocationInput, ResourceAllocation, UpdateAllocationInput,
    ValidationResult, DEFAULT_HOURS_PER_DAY,
};
use crate::observability::{ALLOCATIONS_TOTAL, CONFLICTS_TOTAL};
use crate::repository::AllocationRepository;
use crate::{AppError, AppResult};

use super::locks::ResourceLocks;
use super::overlap::DateRange;
use super::validator::AllocationValidator;

/// Write path for allocations. `allocate` and `update` hold the resource's
/// lock from validation until the row is saved.
pub struct AllocationManager {
    repo: Arc<dyn AllocationRepository>,
    validator: AllocationValidator,
    locks: ResourceLocks,
}

impl AllocationManager {
    pub fn new(repo: Arc<dyn AllocationRepository>) -> Self {
        Self {
            validator: AllocationValidator::new(repo.clone()),
            repo,
            locks: ResourceLocks::new(),
        }
    }

    pub fn validator(&self) -> &AllocationValidator {
        &self.validator
    }

    pub async fn allocate(
        &self,
        ctx: &CallerContext,
        input: CreateAllocationInput,
    ) -> AppResult<ResourceAllocation> {
        let range = input.validate()?;

        let _guard = self.locks.lock(input.resource_id).await;
        let result = self
            .validator
            .evaluate(
                ctx.organization_id,
                input.resource_id,
                range,
                input.allocation_percentage,
                None,
            )
            .await?;
        if !result.is_valid {
            return Err(reject(
                "allocate",
                input.resource_id,
                input.allocation_percentage,
                result,
            ));
        }

        let now = Utc::now();
        let allocation = ResourceAllocation {
            id: Uuid::new_v4(),
            resource_id: input.resource_id,
            project_id: input.project_id,
            project_name: None,
            task_id: input.task_id,
            organization_id: ctx.organization_id,
            start_date: range.start,
            end_date: range.end,
            allocation_percentage: input.allocation_percentage,
            hours_per_day: input.hours_per_day.unwrap_or(DEFAULT_HOURS_PER_DAY),
            created_at: now,
            updated_at: now,
        };
        let saved = self.repo.save(allocation).await?;

        counter!(ALLOCATIONS_TOTAL, "operation" => "allocate", "outcome" => "accepted").increment(1);
        tracing::info!(
            allocation_id = %saved.id,
            resource_id = %saved.resource_id,
            project_id = %saved.project_id,
            caller_id = %ctx.caller_id,
            percentage = saved.allocation_percentage,
            "Allocation created"
        );
        Ok(saved)
    }

    pub async fn get(&self, ctx: &CallerContext, id: Uuid) -> AppResult<ResourceAllocation> {
        self.load_owned(ctx, id).await
    }

    pub async fn update(
        &self,
        ctx: &CallerContext,
        id: Uuid,
        patch: UpdateAllocationInput,
    ) -> AppResult<ResourceAllocation> {
        patch.validate()?;

        let current = self.load_owned(ctx, id).await?;
        let _guard = self.locks.lock(current.resource_id).await;
        // Re-read under the guard: another writer may have changed or removed it.
        let current = self.load_owned(ctx, id).await?;

        let range = DateRange::try_new(
            patch.start_date.unwrap_or(current.start_date),
            patch.end_date.unwrap_or(current.end_date),
        )?;
        let percentage = patch
            .allocation_percentage
            .unwrap_or(current.allocation_percentage);

        if patch.touches_capacity() {
            let result = self
                .validator
                .evaluate(
                    ctx.organization_id,
                    current.resource_id,
                    range,
                    percentage,
                    Some(current.id),
                )
                .await?;
            if !result.is_valid {
                return Err(reject("update", current.resource_id, percentage, result));
            }
        }

        let updated = ResourceAllocation {
            project_id: patch.project_id.unwrap_or(current.project_id),
            task_id: patch.task_id.unwrap_or(current.task_id),
            start_date: range.start,
            end_date: range.end,
            allocation_percentage: percentage,
            hours_per_day: patch.hours_per_day.unwrap_or(current.hours_per_day),
            updated_at: Utc::now(),
            ..current
        };
        let saved = self.repo.save(updated).await?;

        counter!(ALLOCATIONS_TOTAL, "operation" => "update", "outcome" => "accepted").increment(1);
        tracing::info!(
            allocation_id = %saved.id,
            resource_id = %saved.resource_id,
            caller_id = %ctx.caller_id,
            revalidated = patch.touches_capacity(),
            "Allocation updated"
        );
        Ok(saved)
    }

    /// Permanently delete an allocation. Removal only lowers load, so nothing
    /// is re-validated.
    pub async fn remove(&self, ctx: &CallerContext, id: Uuid) -> AppResult<()> {
        let current = self.load_owned(ctx, id).await?;
        // Keeps a concurrent update from re-saving the row after it is gone.
        let _guard = self.locks.lock(current.resource_id).await;
        self.repo.delete(current.id).await?;

        counter!(ALLOCATIONS_TOTAL, "operation" => "remove", "outcome" => "accepted").increment(1);
        tracing::info!(
            allocation_id = %current.id,
            resource_id = %current.resource_id,
            caller_id = %ctx.caller_id,
            "Allocation removed"
        );
        Ok(())
    }

    /// Allocations owned by another organization are reported as missing.
    async fn load_owned(&self, ctx: &CallerContext, id: Uuid) -> AppResult<ResourceAllocation> {
        match self.repo.find_by_id(id).await? {
            Some(allocation) if allocation.organization_id == ctx.organization_id => Ok(allocation),
            _ => Err(AppError::NotFound(format!("Allocation {} not found", id))),
        }
    }
}

fn reject(
    operation: &'static str,
    resource_id: Uuid,
    percentage: f64,
    result: ValidationResult,
) -> AppError {
    counter!(ALLOCATIONS_TOTAL, "operation" => operation, "outcome" => "conflict").increment(1);
    counter!(CONFLICTS_TOTAL).increment(result.conflicts.len() as u64);
    tracing::warn!(
        %resource_id,
        operation,
        percentage,
        total_allocation = result.total_allocation,
        conflicts = result.conflicts.len(),
        "Allocation rejected: resource would be over-committed"
    );
    AppError::Conflict(Box::new(ConflictDetails::new(resource_id, percentage, result)))
}
