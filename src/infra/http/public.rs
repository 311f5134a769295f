use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{error::HttpError, orchestrator::ContentOrchestrator},
    domain::types::ServiceCategory,
    infra::db::PostgresRepositories,
};

use super::db_health_response;
use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentOrchestrator>,
    /// Absent when the cache lives in process memory.
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/content/{locality}", get(default_service_content))
        .route("/content/{locality}/{service}", get(service_content))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.db.as_ref() {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn default_service_content(
    State(state): State<HttpState>,
    Path(locality): Path<String>,
) -> Response {
    serve_content(&state, &locality, ServiceCategory::DEFAULT).await
}

async fn service_content(
    State(state): State<HttpState>,
    Path((locality, service)): Path<(String, String)>,
) -> Response {
    let service = match service.parse::<ServiceCategory>() {
        Ok(service) => service,
        Err(err) => {
            return HttpError::new(
                "infra::http::service_content",
                StatusCode::NOT_FOUND,
                "Unknown service",
                err.to_string(),
            )
            .into_response();
        }
    };

    serve_content(&state, &locality, service).await
}

async fn serve_content(state: &HttpState, locality: &str, service: ServiceCategory) -> Response {
    match state.content.content_for(locality, service).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}
