use axum::http::HeaderMap;
use tracing::warn;

use crate::error::AppError;

pub const EDIT_TOKEN_HEADER: &str = "x-edit-token";

/// Gate in front of every mutating route. Without a configured token the gate
/// is open.
pub fn require_edit_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = headers
        .get(EDIT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided == Some(expected) {
        Ok(())
    } else {
        warn!("Rejected edit: missing or wrong {EDIT_TOKEN_HEADER}");
        Err(AppError::Unauthorized)
    }
}
