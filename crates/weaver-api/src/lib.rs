//! HTTP surface for the workflow execution management service: the OGC
//! API — Processes deploy/describe/job endpoints and the legacy WPS
//! 1.0/2.0 `/ows/wps` endpoint, all sharing one `AppState`.

pub mod error;
pub mod jobs;
pub mod ows;
pub mod processes;
pub mod state;

use axum::Router;

pub use state::AppState;

/// Assembles the full router (processes + jobs + legacy WPS), without the
/// Swagger UI mount or tracing layers the binary adds on top.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(processes::routes(state.clone()))
        .merge(jobs::routes(state.clone()))
        .merge(ows::routes(state))
}
