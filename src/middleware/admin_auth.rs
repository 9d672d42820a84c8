use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;

/// Guards the admin routes with `Authorization: Bearer <ADMIN_TOKEN>`.
///
/// - No admin token configured: 404, as if the route did not exist.
/// - Missing or wrong bearer token: 401.
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let uri = req.uri().path().to_string();
    let matches = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == expected);

    match matches {
        Some(true) => next.run(req).await,
        Some(false) => {
            tracing::warn!(uri = %uri, "Admin middleware: rejected, wrong bearer token");
            StatusCode::UNAUTHORIZED.into_response()
        }
        None => {
            tracing::warn!(uri = %uri, "Admin middleware: rejected, missing bearer token");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
