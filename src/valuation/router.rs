use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::domain::{GeoScope, TenantId};
use super::repository::TransactionStore;
use super::rollup::RollupStore;
use super::service::{ValuationError, ValuationService};
use super::settings::TenantSettingsStore;
use super::subject::SubjectForm;

/// Shared state for the valuation endpoints.
pub struct ValuationState<S, C, R> {
    pub service: Arc<ValuationService<S, C>>,
    pub rollups: Arc<R>,
}

impl<S, C, R> Clone for ValuationState<S, C, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            rollups: Arc::clone(&self.rollups),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub tenant_id: String,
    pub subject: SubjectForm,
    #[serde(default)]
    pub include_narrative: bool,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub tenant_id: String,
    pub subject: SubjectForm,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Router builder exposing the estimate, diagnostics, and rollup
/// disclosure endpoints.
pub fn valuation_router<S, C, R>(
    service: Arc<ValuationService<S, C>>,
    rollups: Arc<R>,
) -> Router
where
    S: TransactionStore + 'static,
    C: TenantSettingsStore + 'static,
    R: RollupStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/valuations/estimate",
            post(estimate_handler::<S, C, R>),
        )
        .route(
            "/api/v1/valuations/comparables",
            post(comparables_handler::<S, C, R>),
        )
        .route("/api/v1/rollups/:scope/:key", get(rollup_handler::<S, C, R>))
        .with_state(ValuationState { service, rollups })
}

pub(crate) async fn estimate_handler<S, C, R>(
    State(state): State<ValuationState<S, C, R>>,
    axum::Json(request): axum::Json<EstimateRequest>,
) -> Response
where
    S: TransactionStore + 'static,
    C: TenantSettingsStore + 'static,
    R: RollupStore + 'static,
{
    let tenant = TenantId(request.tenant_id);
    let as_of = request.as_of.unwrap_or_else(|| Local::now().date_naive());

    match state
        .service
        .estimate(request.subject, &tenant, request.include_narrative, as_of)
        .await
    {
        Ok(estimate) => (StatusCode::OK, axum::Json(estimate)).into_response(),
        Err(error) => valuation_error_response(error),
    }
}

pub(crate) async fn comparables_handler<S, C, R>(
    State(state): State<ValuationState<S, C, R>>,
    axum::Json(request): axum::Json<MatchRequest>,
) -> Response
where
    S: TransactionStore + 'static,
    C: TenantSettingsStore + 'static,
    R: RollupStore + 'static,
{
    let tenant = TenantId(request.tenant_id);
    let as_of = request.as_of.unwrap_or_else(|| Local::now().date_naive());

    match state
        .service
        .match_comparables(request.subject, &tenant, as_of)
    {
        Ok(matched) => (StatusCode::OK, axum::Json(matched)).into_response(),
        Err(error) => valuation_error_response(error),
    }
}

pub(crate) async fn rollup_handler<S, C, R>(
    State(state): State<ValuationState<S, C, R>>,
    Path((scope, key)): Path<(String, String)>,
) -> Response
where
    S: TransactionStore + 'static,
    C: TenantSettingsStore + 'static,
    R: RollupStore + 'static,
{
    let Some(scope) = GeoScope::parse(&scope) else {
        let payload = json!({
            "error": format!("unknown geography scope '{scope}'"),
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match state.rollups.latest(scope, &key) {
        Ok(Some(summary)) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Ok(None) => {
            let payload = json!({
                "scope": scope.label(),
                "scope_key": key,
                "error": "no rollup snapshot for this geography",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
    }
}

fn valuation_error_response(error: ValuationError) -> Response {
    match error {
        ValuationError::Subject(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ValuationError::Store(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
    }
}
