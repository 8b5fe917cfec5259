use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::overlap::DateRange;

pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

/// A percentage-of-time commitment of one resource to a project over an
/// inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocation {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub project_id: Uuid,
    /// Joined from the projects table; absent when the project was never registered.
    #[sqlx(default)]
    pub project_name: Option<String>,
    pub task_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocation_percentage: f64,
    pub hours_per_day: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceAllocation {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// Hours per day actually consumed by this commitment.
    pub fn allocated_hours(&self) -> f64 {
        self.hours_per_day * self.allocation_percentage / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
}
