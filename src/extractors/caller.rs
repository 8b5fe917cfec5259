use axum::{extract::FromRequestParts, http::request::Parts};
use std::future::Future;
use uuid::Uuid;

use crate::AppError;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const CALLER_HEADER: &str = "x-user-id";

/// Who is calling and on behalf of which organization. Supplied by the
/// identity layer in front of this service and trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    pub organization_id: Uuid,
    pub caller_id: Uuid,
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?;

    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Malformed {} header", name)))
}

impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let context = header_uuid(parts, ORGANIZATION_HEADER).and_then(|organization_id| {
            Ok(CallerContext {
                organization_id,
                caller_id: header_uuid(parts, CALLER_HEADER)?,
            })
        });

        async move {
            let context = context?;
            tracing::debug!(
                organization_id = %context.organization_id,
                caller_id = %context.caller_id,
                "Caller context resolved"
            );
            Ok(context)
        }
    }
}
