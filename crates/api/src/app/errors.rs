use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use vigil_infra::ServiceError;

/// Map a service error to a JSON response. Storage causes are logged and
/// never rendered.
pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        ServiceError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::Store { operation, source } => {
            error!(operation, error = %source, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
        ServiceError::Annotate { entity, id, source } => {
            error!(entity, id = %id, error = %source, "annotation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "annotate_error",
                format!("failed to annotate {entity} {id}"),
            )
        }
        ServiceError::Reconcile(source) => {
            error!(error = %source, "relevance reconciliation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "reconcile_error",
                "annotations were applied but task relevance could not be updated",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
