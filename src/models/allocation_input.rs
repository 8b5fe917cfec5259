use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::overlap::DateRange;
use crate::{AppError, AppResult};

/// Input DTO for creating a new allocation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocationInput {
    pub resource_id: Uuid,
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocation_percentage: f64,
    pub hours_per_day: Option<f64>, // Defaults to 8 when omitted
}

impl CreateAllocationInput {
    pub fn validate(&self) -> AppResult<DateRange> {
        check_percentage(self.allocation_percentage)?;
        if let Some(hours) = self.hours_per_day {
            check_hours_per_day(hours)?;
        }
        DateRange::try_new(self.start_date, self.end_date)
    }
}

/// Input DTO for updating an existing allocation
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllocationInput {
    pub project_id: Option<Uuid>,
    /// Absent keeps the task, `null` clears it.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub task_id: Option<Option<Uuid>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub allocation_percentage: Option<f64>,
    pub hours_per_day: Option<f64>,
}

impl UpdateAllocationInput {
    /// True when the patch changes a field the capacity check depends on.
    pub fn touches_capacity(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some() || self.allocation_percentage.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.task_id.is_none()
            && self.hours_per_day.is_none()
            && !self.touches_capacity()
    }

    /// Field-level checks that need no stored state. The merged date range is
    /// checked once the current record is known.
    pub fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }
        if let Some(percentage) = self.allocation_percentage {
            check_percentage(percentage)?;
        }
        if let Some(hours) = self.hours_per_day {
            check_hours_per_day(hours)?;
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            DateRange::try_new(start, end)?;
        }
        Ok(())
    }
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Input DTO for a dry-run capacity check
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAllocationInput {
    pub resource_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub allocation_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsertProjectInput {
    pub name: String,
}

/// Response after successful mutation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationMutationResponse {
    pub success: bool,
    pub allocation_id: Option<Uuid>,
    pub message: Option<String>,
}

pub fn check_percentage(percentage: f64) -> AppResult<()> {
    if !percentage.is_finite() || percentage <= 0.0 || percentage > 100.0 {
        return Err(AppError::Validation(format!(
            "allocationPercentage must be greater than 0 and at most 100, got {}",
            percentage
        )));
    }
    Ok(())
}

fn check_hours_per_day(hours: f64) -> AppResult<()> {
    if !hours.is_finite() || hours <= 0.0 || hours > 24.0 {
        return Err(AppError::Validation(format!(
            "hoursPerDay must be greater than 0 and at most 24, got {}",
            hours
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn create_input(percentage: f64) -> CreateAllocationInput {
        CreateAllocationInput {
            resource_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            task_id: None,
            start_date: date("2025-01-01"),
            end_date: date("2025-01-10"),
            allocation_percentage: percentage,
            hours_per_day: None,
        }
    }

    #[test]
    fn percentage_bounds() {
        assert!(create_input(100.0).validate().is_ok());
        assert!(create_input(0.5).validate().is_ok());
        assert!(matches!(create_input(0.0).validate(), Err(AppError::Validation(_))));
        assert!(matches!(create_input(-10.0).validate(), Err(AppError::Validation(_))));
        assert!(matches!(create_input(100.5).validate(), Err(AppError::Validation(_))));
        assert!(matches!(create_input(f64::NAN).validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn reversed_dates_rejected() {
        let mut input = create_input(50.0);
        input.start_date = date("2025-02-01");
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn single_day_range_accepted() {
        let mut input = create_input(50.0);
        input.end_date = input.start_date;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn hours_per_day_checked() {
        let mut input = create_input(50.0);
        input.hours_per_day = Some(25.0);
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_patch_rejected() {
        let patch = UpdateAllocationInput::default();
        assert!(matches!(patch.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn patch_touching_capacity() {
        let patch = UpdateAllocationInput {
            task_id: Some(Some(Uuid::new_v4())),
            ..Default::default()
        };
        assert!(!patch.touches_capacity());

        let patch = UpdateAllocationInput {
            end_date: Some(date("2025-03-01")),
            ..Default::default()
        };
        assert!(patch.touches_capacity());
    }

    #[test]
    fn task_id_null_is_distinct_from_absent() {
        let absent: UpdateAllocationInput =
            serde_json::from_str(r#"{"hoursPerDay": 6}"#).unwrap();
        assert_eq!(absent.task_id, None);

        let cleared: UpdateAllocationInput = serde_json::from_str(r#"{"taskId": null}"#).unwrap();
        assert_eq!(cleared.task_id, Some(None));
        assert!(!cleared.is_empty());
        assert!(cleared.validate().is_ok());

        let task = Uuid::new_v4();
        let set: UpdateAllocationInput =
            serde_json::from_str(&format!(r#"{{"taskId": "{}"}}"#, task)).unwrap();
        assert_eq!(set.task_id, Some(Some(task)));
    }
}
