use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::error::AppError;
use crate::models::api::ReportQuery;
use crate::normalize::normalize;
use crate::report::assemble;
use crate::AppState;

/// The usage-counter endpoint wraps its payload in a `data` envelope; accept
/// either the envelope or the bare report.
fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if data.is_object() && body.get("months").is_none() => data,
        _ => body,
    }
}

/// POST /api/v1/activity/report
pub async fn report(
    State(state): State<AppState>,
    params: Result<Query<ReportQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    tracing::info!(
        handler = "report",
        start = ?params.start,
        end = ?params.end,
        field = ?params.field,
        top = ?params.top,
        "Handler: POST /api/v1/activity/report"
    );

    let range = params.range().map_err(AppError::BadRequest)?;
    let top = params
        .top_config(state.default_top_n)
        .map_err(AppError::BadRequest)?;
    let raw = unwrap_envelope(&body);

    tracing::debug!(handler = "report", "Dispatching to normalize");
    let result = normalize(raw, &state.engine).and_then(|normalized| {
        tracing::debug!(
            handler = "report",
            months = normalized.months.len(),
            "Normalized; dispatching to assemble"
        );
        assemble(&normalized, &range, &top)
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            state.counters.record_rejected();
            tracing::warn!(handler = "report", error = %e, "Activity report rejected");
            return Err(e.into());
        }
    };
    state.counters.record_assembled();

    tracing::info!(
        handler = "report",
        months = report.range.by_month.len(),
        namespaces = report.range.by_namespace.len(),
        total_clients = report.range.totals.clients,
        status = 200,
        "Responding: report assembled"
    );

    Ok(Json(report))
}
