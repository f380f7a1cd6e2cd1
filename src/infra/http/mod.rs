//! HTTP surface over the form engine.

mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

pub use handlers::{REDIRECT_FIELD, ValidateRequest, WidgetsRequest};
pub use middleware::RequestContext;

use crate::application::{dispenser::Dispenser, error::ErrorReport};

#[derive(Clone)]
pub struct HttpState {
    pub dispenser: Arc<Dispenser>,
}

impl HttpState {
    pub fn new(dispenser: Arc<Dispenser>) -> Self {
        Self { dispenser }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/form/widgets/{form_id}", post(handlers::form_widgets))
        .route("/form/validate/{form_id}", post(handlers::form_validate))
        .route("/form/submit/{form_id}", post(handlers::form_submit))
        .route("/_health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health(State(state): State<HttpState>) -> Response {
    if state.dispenser.registry().is_empty() {
        let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
        ErrorReport::from_message(
            "infra::http::health",
            StatusCode::SERVICE_UNAVAILABLE,
            "no form classes are registered",
        )
        .attach(&mut response);
        return response;
    }
    StatusCode::NO_CONTENT.into_response()
}
