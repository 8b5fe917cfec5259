use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{AppError, AppResult};

/// Inclusive calendar range `[start, end]`.
///
/// Overlap between two ranges is strict: ranges that only share a boundary day
/// do not overlap, so a booking ending on the day another starts is not a
/// conflict. A consequence is that a single-day range never overlaps anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if start > end {
            return Err(AppError::Validation(format!(
                "startDate {} must not be after endDate {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    /// The intersecting sub-range, if the two ranges overlap.
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(DateRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Inclusive predicate used to fetch candidates from storage. Wider than
    /// `overlaps`; callers narrow the result with `overlaps`.
    pub fn touches(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
