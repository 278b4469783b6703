use axum::{Router, routing::get};

pub mod system;

/// Router for the system view endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/v2/systems", get(system::list_systems))
        .route(
            "/v2/system/:uuid",
            get(system::get_system).patch(system::patch_system),
        )
}
