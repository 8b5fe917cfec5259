use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ResourceAllocation, ResourceConflict};

/// One project's share of a resource's load. Load booked by other
/// organizations is folded into a single entry with a nil `project_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContribution {
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub allocation_percentage: f64,
    pub allocation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUtilization {
    pub resource_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_allocation: f64,
    pub available_capacity: f64,
    pub allocated_hours_per_day: f64,
    pub projects: Vec<ProjectContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapacity {
    pub resource_id: Uuid,
    pub total_allocation: f64,
    pub available_capacity: f64,
    pub allocation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossProjectEntry {
    pub resource_id: Uuid,
    /// Sum over every allocation of the resource, regardless of dates.
    pub total_allocation: f64,
    pub allocated_hours_per_day: f64,
    pub projects: Vec<ProjectContribution>,
    pub allocations: Vec<ResourceAllocation>,
}

/// A maximal window in which a resource's stored load exceeds 100%. The bounds
/// compare like allocation ranges: adjacent windows share a boundary day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverallocatedWindow {
    pub resource_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub peak_allocation: f64,
    pub allocations: Vec<ResourceConflict>,
}
