use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use vigil_core::TargetId;

use crate::app::errors;
use crate::app::dto::{ListSystemsQuery, PatchSystemRequest, PatchSystemResponse};
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Unparseable ids are reported as unknown systems.
fn parse_system_id(raw: &str) -> Result<TargetId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("system {raw} not found"),
        )
    })
}

pub async fn list_systems(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListSystemsQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.views.list_systems(&filter).await {
        Ok(systems) => Json(systems).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_system(
    Extension(services): Extension<Arc<AppServices>>,
    Path(uuid): Path<String>,
) -> axum::response::Response {
    let target_id = match parse_system_id(&uuid) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.views.build_system_view(target_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn patch_system(
    Extension(services): Extension<Arc<AppServices>>,
    Path(uuid): Path<String>,
    body: Result<Json<PatchSystemRequest>, JsonRejection>,
) -> axum::response::Response {
    let target_id = match parse_system_id(&uuid) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text());
        }
    };

    match services.annotations.apply_raw(target_id, body.annotations).await {
        Ok(outcome) => {
            // Scoped pass is done; the global one runs off the request path.
            services.trigger_sweep();
            Json(PatchSystemResponse::from(outcome)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

