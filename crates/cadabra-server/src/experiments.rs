//! Staff dashboard endpoints

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use cadabra_core::{Experiment, ExperimentId, ExperimentStatus, SinceSelector};
use cadabra_experiments::BucketReport;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub active: Vec<Experiment>,
    pub inactive: Vec<Experiment>,
    pub active_count: usize,
    pub inactive_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    since: Option<String>,
    include_all: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub experiment: Experiment,
    pub since: SinceView,
    pub buckets: Vec<BucketReport>,
    /// When the latest assignment was made
    pub last_ran: Option<Timestamp>,
    pub selectors: Vec<SelectorView>,
}

#[derive(Debug, Serialize)]
pub struct SinceView {
    pub selector: SinceSelector,
    pub description: &'static str,
    /// Join-date bound actually applied
    pub effective: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct SelectorView {
    pub selector: SinceSelector,
    pub description: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: ExperimentStatus,
}

/// Handle `GET /experiments`
pub async fn list(State(state): State<AppState>) -> Result<Json<ListResponse>, ApiError> {
    let listing = state.experiments.registry().list().await?;

    Ok(Json(ListResponse {
        total_count: listing.total(),
        active_count: listing.active.len(),
        inactive_count: listing.inactive.len(),
        active: listing.active,
        inactive: listing.inactive,
    }))
}

/// Handle `GET /experiments/{id}`
pub async fn detail(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> Result<Json<DetailResponse>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let selector = match query.since.as_deref() {
        None => state.reporting.default_since,
        Some(name) => SinceSelector::from_str(name)
            .map_err(|_| ApiError::BadRequest(format!("unknown since selector '{name}'")))?,
    };

    let experiment = state.experiments.registry().get(ExperimentId(id)).await?;

    let bound = selector
        .resolve(&state.reporting.now())
        .map_err(|e| ApiError::Internal(format!("cannot resolve since selector {selector}: {e}")))?;

    let (buckets, effective) = state
        .experiments
        .reports()
        .compute_buckets(&experiment, bound, query.include_all.unwrap_or(true))
        .await?;

    let last_ran = state
        .experiments
        .assignments()
        .latest_assignment(experiment.id)
        .await?
        .map(|a| a.created_at);

    Ok(Json(DetailResponse {
        experiment,
        since: SinceView {
            selector,
            description: selector.description(),
            effective,
        },
        buckets,
        last_ran,
        selectors: SinceSelector::ALL
            .into_iter()
            .map(|selector| SelectorView {
                selector,
                description: selector.description(),
            })
            .collect(),
    }))
}

/// Handle `PUT /experiments/{id}/status`
pub async fn set_status(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Experiment>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let experiment = state
        .experiments
        .registry()
        .set_status(ExperimentId(id), body.status)
        .await?;

    Ok(Json(experiment))
}
