use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::engine::DateRange;
use crate::{AppError, AppResult};

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD`, both optional but only together.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DateRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRangeQuery {
    pub fn optional_range(&self) -> AppResult<Option<DateRange>> {
        match (&self.start, &self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                Ok(Some(DateRange::try_new(parse_date(start, "start")?, parse_date(end, "end")?)?))
            }
            _ => Err(AppError::BadRequest(
                "start and end must be given together".to_string(),
            )),
        }
    }

    pub fn required_range(&self) -> AppResult<DateRange> {
        self.optional_range()?
            .ok_or_else(|| AppError::BadRequest("start and end are required".to_string()))
    }
}

pub fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("Invalid {} date: {}", field, e)))
}
