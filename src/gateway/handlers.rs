use crate::command::types::{CommandRequest, LifecycleOp};
use crate::dispatch::aggregator;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::transport::PeerTransport;
use crate::dispatch::types::{
    FullUpdateOutcome, FullUpdateStatus, LifecycleOutcome, WorkerListing,
};

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ENDPOINT_WORKERS: &str = "/admin/workers";
pub const ENDPOINT_STOP: &str = "/admin/workers/:name/stop";
pub const ENDPOINT_RESTART: &str = "/admin/workers/:name/restart";
pub const ENDPOINT_FULL_UPDATE: &str = "/admin/workers/:name/full-update";

#[derive(Debug, Deserialize)]
pub struct FullUpdateParams {
    pub partition: Option<String>,
}

/// Outcome plus a one-line confirmation for humans.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminResponse<T> {
    pub message: String,
    pub result: T,
}

pub fn admin_routes<T: PeerTransport>(dispatcher: Arc<Dispatcher<T>>) -> Router {
    Router::new()
        .route(ENDPOINT_WORKERS, get(handle_list_workers::<T>))
        .route(ENDPOINT_STOP, post(handle_stop::<T>))
        .route(ENDPOINT_RESTART, post(handle_restart::<T>))
        .route(ENDPOINT_FULL_UPDATE, post(handle_full_update::<T>))
        .layer(Extension(dispatcher))
}

pub async fn handle_list_workers<T: PeerTransport>(
    Extension(dispatcher): Extension<Arc<Dispatcher<T>>>,
) -> (StatusCode, Json<AdminResponse<WorkerListing>>) {
    let result = dispatcher.dispatch(CommandRequest::list_workers()).await;
    let listing = aggregator::list_workers(&result);

    let message = format!(
        "{} worker(s) running, {}/{} node(s) answered",
        listing.workers.len(),
        listing.coverage.answered,
        listing.coverage.queried
    );

    (
        listing_status(&listing),
        Json(AdminResponse {
            message,
            result: listing,
        }),
    )
}

pub async fn handle_stop<T: PeerTransport>(
    Extension(dispatcher): Extension<Arc<Dispatcher<T>>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<AdminResponse<LifecycleOutcome>>) {
    run_lifecycle(&dispatcher, LifecycleOp::Stop, name).await
}

pub async fn handle_restart<T: PeerTransport>(
    Extension(dispatcher): Extension<Arc<Dispatcher<T>>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<AdminResponse<LifecycleOutcome>>) {
    run_lifecycle(&dispatcher, LifecycleOp::Restart, name).await
}

async fn run_lifecycle<T: PeerTransport>(
    dispatcher: &Dispatcher<T>,
    op: LifecycleOp,
    name: String,
) -> (StatusCode, Json<AdminResponse<LifecycleOutcome>>) {
    let result = dispatcher
        .dispatch(CommandRequest::lifecycle(op, name.clone()))
        .await;
    let outcome = aggregator::lifecycle(&result);

    let message = if outcome.found {
        format!("{} requested for worker '{}'", op, name)
    } else {
        format!("worker '{}' is not known to the cluster", name)
    };

    (
        lifecycle_status(&outcome),
        Json(AdminResponse {
            message,
            result: outcome,
        }),
    )
}

pub async fn handle_full_update<T: PeerTransport>(
    Extension(dispatcher): Extension<Arc<Dispatcher<T>>>,
    Path(name): Path<String>,
    Query(params): Query<FullUpdateParams>,
) -> (StatusCode, Json<AdminResponse<FullUpdateOutcome>>) {
    let result = dispatcher
        .dispatch(CommandRequest::full_update(name.clone(), params.partition))
        .await;
    let outcome = aggregator::full_update(&result);

    let message = match outcome.status {
        FullUpdateStatus::Scheduled => format!(
            "full re-index scheduled for worker '{}': {}",
            name,
            outcome.scheduled_partitions.join(", ")
        ),
        FullUpdateStatus::PartitionNotOwned => format!(
            "worker '{}' does not own partition '{}'",
            name,
            outcome.partition_key.as_deref().unwrap_or_default()
        ),
        FullUpdateStatus::WorkerUnknown => {
            format!("worker '{}' is not known to the cluster", name)
        }
    };

    (
        full_update_status(&outcome),
        Json(AdminResponse {
            message,
            result: outcome,
        }),
    )
}

pub fn listing_status(listing: &WorkerListing) -> StatusCode {
    if listing.coverage.nobody_answered() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

pub fn lifecycle_status(outcome: &LifecycleOutcome) -> StatusCode {
    if outcome.found {
        StatusCode::OK
    } else if outcome.coverage.nobody_answered() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::NOT_FOUND
    }
}

pub fn full_update_status(outcome: &FullUpdateOutcome) -> StatusCode {
    match outcome.status {
        FullUpdateStatus::Scheduled => StatusCode::OK,
        _ if outcome.coverage.nobody_answered() => StatusCode::SERVICE_UNAVAILABLE,
        FullUpdateStatus::PartitionNotOwned => StatusCode::BAD_REQUEST,
        FullUpdateStatus::WorkerUnknown => StatusCode::NOT_FOUND,
    }
}
