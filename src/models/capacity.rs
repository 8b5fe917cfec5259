use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ResourceAllocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// The existing allocation plus the candidate exceed 100%.
    Overallocation,
    /// The existing allocation shares an already over-committed window.
    ScheduleOverlap,
}

/// One existing allocation implicated in a capacity violation. Allocations of
/// other organizations appear with nil ids and no project name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflict {
    pub allocation_id: Uuid,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocation_percentage: f64,
    pub conflict_type: ConflictType,
}

impl ResourceConflict {
    pub fn from_allocation(allocation: &ResourceAllocation, conflict_type: ConflictType) -> Self {
        Self {
            allocation_id: allocation.id,
            project_id: allocation.project_id,
            project_name: allocation.project_name.clone(),
            start_date: allocation.start_date,
            end_date: allocation.end_date,
            allocation_percentage: allocation.allocation_percentage,
            conflict_type,
        }
    }

    /// Strip everything identifying an allocation owned by another
    /// organization, keeping only its dates and load.
    pub fn redacted(self) -> Self {
        Self {
            allocation_id: Uuid::nil(),
            project_id: Uuid::nil(),
            project_name: None,
            ..self
        }
    }
}

/// Admission decision for a candidate allocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub conflicts: Vec<ResourceConflict>,
    /// Overlapping load already committed, excluding the candidate.
    pub total_allocation: f64,
    pub available_capacity: f64,
}

/// Diagnostics attached to a rejected write so the caller can self-correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetails {
    pub resource_id: Uuid,
    pub requested_percentage: f64,
    pub conflict_count: usize,
    pub total_allocation: f64,
    pub available_capacity: f64,
    pub conflicts: Vec<ResourceConflict>,
}

impl ConflictDetails {
    pub fn new(resource_id: Uuid, requested_percentage: f64, result: ValidationResult) -> Self {
        Self {
            resource_id,
            requested_percentage,
            conflict_count: result.conflicts.len(),
            total_allocation: result.total_allocation,
            available_capacity: result.available_capacity,
            conflicts: result.conflicts,
        }
    }
}

pub fn available_capacity(total_allocation: f64) -> f64 {
    (100.0 - total_allocation).max(0.0)
}
