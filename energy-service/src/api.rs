//! JSON API over the management service. Responses use the
//! `{success, message, data}` envelope the original frontend expects.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use energy_core::domain::{
    AnomalyRecord, EnergyType, Meter, MeterStatus, QualityGrade, Reading, Report,
};
use energy_core::EnergyError;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::service::{EnergyService, NewMeter, NewReading};
use crate::stores::{MeterUpdate, ReadingFilter};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EnergyService>,
    pub default_anomaly_threshold_pct: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/meters", get(list_meters).post(add_meter))
        .route("/api/meters/:id", put(update_meter).delete(delete_meter))
        .route("/api/readings", get(find_readings).post(add_reading))
        .route("/api/readings/:id/verify", post(verify_reading))
        .route("/api/reports/generate", post(generate_report))
        .route("/api/reports", get(daily_reports))
        .route("/api/anomalies", get(locate_anomalies))
        .with_state(state)
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(message: &str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.to_string(),
        data: Some(data),
    })
}

pub struct ApiError(EnergyError);

impl From<EnergyError> for ApiError {
    fn from(e: EnergyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EnergyError::Validation(_) => StatusCode::BAD_REQUEST,
            EnergyError::NotFound(_) | EnergyError::NoData { .. } => StatusCode::NOT_FOUND,
            EnergyError::Duplicate(_) => StatusCode::CONFLICT,
            EnergyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ApiResponse::<()> {
            success: false,
            message: self.0.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct MeterQuery {
    energy_type: Option<EnergyType>,
    status: Option<MeterStatus>,
}

async fn list_meters(
    State(state): State<AppState>,
    Query(q): Query<MeterQuery>,
) -> Result<Json<ApiResponse<Vec<Meter>>>, ApiError> {
    let meters = state.service.list_meters(q.energy_type, q.status).await?;
    Ok(ok("查询成功", meters))
}

async fn add_meter(
    State(state): State<AppState>,
    Json(body): Json<NewMeter>,
) -> Result<Json<ApiResponse<Meter>>, ApiError> {
    let meter = state.service.add_meter(body).await?;
    Ok(ok("设备新增成功", meter))
}

async fn update_meter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MeterUpdate>,
) -> Result<Json<ApiResponse<Meter>>, ApiError> {
    let meter = state.service.update_meter(&id, body).await?;
    Ok(ok("设备更新成功", meter))
}

async fn delete_meter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.service.delete_meter(&id).await?;
    Ok(ok("设备删除成功", ()))
}

#[derive(Deserialize)]
struct ReadingQuery {
    meter_id: Option<String>,
    factory_id: Option<String>,
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
    quality_grade: Option<QualityGrade>,
}

async fn find_readings(
    State(state): State<AppState>,
    Query(q): Query<ReadingQuery>,
) -> Result<Json<ApiResponse<Vec<Reading>>>, ApiError> {
    let filter = ReadingFilter {
        meter_id: q.meter_id,
        factory_id: q.factory_id,
        start: q.start,
        end: q.end,
        quality_grade: q.quality_grade,
    };
    let readings = state.service.find_readings(&filter).await?;
    Ok(ok("查询成功", readings))
}

async fn add_reading(
    State(state): State<AppState>,
    Json(body): Json<NewReading>,
) -> Result<Json<ApiResponse<Reading>>, ApiError> {
    let reading = state.service.add_reading(body).await?;
    Ok(ok("监测数据新增成功", reading))
}

async fn verify_reading(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.service.verify_reading(&id).await?;
    Ok(ok("数据审核通过", ()))
}

#[derive(Deserialize)]
struct GenerateReportRequest {
    energy_type: EnergyType,
    factory_id: String,
    stat_date: Date,
}

async fn generate_report(
    State(state): State<AppState>,
    Json(body): Json<GenerateReportRequest>,
) -> Result<Json<ApiResponse<Report>>, ApiError> {
    let report = state
        .service
        .generate_daily_report(body.energy_type, &body.factory_id, body.stat_date)
        .await?;
    Ok(ok("峰谷报表生成成功", report))
}

#[derive(Deserialize)]
struct ReportQuery {
    factory_id: String,
    stat_date: Date,
    energy_type: Option<EnergyType>,
}

async fn daily_reports(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Vec<Report>>>, ApiError> {
    let reports = state
        .service
        .daily_reports(&q.factory_id, q.stat_date, q.energy_type)
        .await?;
    Ok(ok("查询成功", reports))
}

#[derive(Deserialize)]
struct AnomalyQuery {
    stat_date: Date,
    threshold: Option<f64>,
}

async fn locate_anomalies(
    State(state): State<AppState>,
    Query(q): Query<AnomalyQuery>,
) -> Result<Json<ApiResponse<Vec<AnomalyRecord>>>, ApiError> {
    let threshold = q.threshold.unwrap_or(state.default_anomaly_threshold_pct);
    let anomalies = state.service.locate_anomalies(q.stat_date, threshold).await?;
    Ok(ok("查询成功", anomalies))
}
