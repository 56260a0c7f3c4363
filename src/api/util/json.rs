use anyhow::Result;
use axum::Json;

use crate::api::dto::ApiResponse;
use crate::errors::{internal_error, AppError};

pub fn to_json<T: serde::Serialize>(
    result: Result<T>
) -> Result<Json<ApiResponse<T>>, AppError> {
    match result {
        Ok(value) => Ok(Json(ApiResponse::ok(value))),
        Err(err) => Err(internal_error(format!("{err:#}"))),
    }
}

/// Like [`to_json`], but a missing value is a 404 naming `what`.
pub fn to_json_found<T: serde::Serialize>(
    result: Result<Option<T>>,
    what: &str,
) -> Result<Json<ApiResponse<T>>, AppError> {
    match result {
        Ok(Some(value)) => Ok(Json(ApiResponse::ok(value))),
        Ok(None) => Err(AppError::NotFound(what.to_string())),
        Err(err) => Err(internal_error(format!("{err:#}"))),
    }
}
