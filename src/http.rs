use crate::{JobId, ReservationService};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailableSeatsResponse {
    #[serde(rename = "numberOfAvailableSeats")]
    pub number_of_available_seats: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

pub fn router(service: ReservationService) -> Router {
    Router::new()
        .route("/available_seats", get(available_seats))
        .route("/reserve_seat", get(reserve_seat))
        .route("/process", get(process))
        .route("/jobs/:job_id", get(get_job))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn available_seats(State(service): State<ReservationService>) -> Response {
    match service.available_seats().await {
        Ok(seats) => Json(AvailableSeatsResponse {
            number_of_available_seats: seats.to_string(),
        })
        .into_response(),
        Err(e) => {
            error!("Error reading available seats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse::new("Seat count unavailable")),
            )
                .into_response()
        }
    }
}

async fn reserve_seat(State(service): State<ReservationService>) -> Json<StatusResponse> {
    let status = service.reserve().await;
    Json(StatusResponse::new(status.message()))
}

async fn process(State(service): State<ReservationService>) -> Json<StatusResponse> {
    if let Err(e) = service.start_processing() {
        error!("Error starting queue processing: {}", e);
    }
    Json(StatusResponse::new("Queue processing"))
}

async fn get_job(State(service): State<ReservationService>, Path(job_id): Path<u64>) -> Response {
    match service.queue().job(JobId::new(job_id)) {
        Ok(Some(job)) => Json(ApiResponse::success(job)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error("Job not found".to_string())),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting job {}: {}", job_id, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::error(e.to_string())),
            )
                .into_response()
        }
    }
}

async fn health_check(State(service): State<ReservationService>) -> Response {
    match service.queue().counts() {
        Ok(counts) => Json(ApiResponse::success(serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "reservations_open": service.gate().is_open(),
            "jobs": counts,
        })))
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::error(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Metrics endpoint for Prometheus scraping
async fn metrics_endpoint(State(service): State<ReservationService>) -> Response {
    match service.metrics().export() {
        Ok(metrics_data) => metrics_data.into_response(),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export metrics").into_response()
        }
    }
}
