//! HTTP route handlers for the spreadsheet assistant API.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::RequestError;
use crate::session::analysis::{DebugResult, ExplanationResult, ValidationResult};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/excel-assistant/query/", post(query))
        .route("/api/excel-assistant/validate_formula/", post(validate_formula))
        .route("/api/excel-assistant/explain_formula/", post(explain_formula))
        .route("/api/excel-assistant/debug_formula/", post(debug_formula))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sheetmate-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
    }))
}

/// Error body returned by every route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        warn!(%err, "assistant request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Free-text query request.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    /// The user's question.
    #[serde(default)]
    pub query: Option<String>,
}

/// Free-text query response.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// The assistant's answer.
    pub response: String,
}

/// Formula analysis request.
#[derive(Debug, Default, Deserialize)]
pub struct FormulaRequest {
    /// The formula to analyse.
    #[serde(default)]
    pub formula: Option<String>,
    /// Error the formula produced. Only used by the debug route.
    #[serde(default)]
    pub error_message: Option<String>,
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

fn formula_payload(
    payload: Result<Json<FormulaRequest>, JsonRejection>,
) -> Result<(String, Option<String>), ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let formula = required(request.formula, "Formula is required")?;
    Ok((formula, request.error_message))
}

/// Handle free-text queries.
async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let text = required(request.query, "Query is required")?;
    let response = state.assistant.query(&text).await?;
    Ok(Json(QueryResponse { response }))
}

/// Handle formula validation.
async fn validate_formula(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormulaRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>, ApiError> {
    let (formula, _) = formula_payload(payload)?;
    Ok(Json(state.assistant.validate_formula(&formula).await?))
}

/// Handle formula explanation.
async fn explain_formula(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormulaRequest>, JsonRejection>,
) -> Result<Json<ExplanationResult>, ApiError> {
    let (formula, _) = formula_payload(payload)?;
    Ok(Json(state.assistant.explain_formula(&formula).await?))
}

/// Handle formula debugging.
async fn debug_formula(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FormulaRequest>, JsonRejection>,
) -> Result<Json<DebugResult>, ApiError> {
    let (formula, error_message) = formula_payload(payload)?;
    Ok(Json(
        state
            .assistant
            .debug_formula(&formula, error_message.as_deref())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::assistant::testing::{Call, ScriptedClient};

    fn router_with(client: Arc<ScriptedClient>) -> Router {
        create_router(AppState::with_assistant(client, "test-model".to_string()))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_default()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let Ok(response) = router.oneshot(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let router = router_with(Arc::new(ScriptedClient::answering("")));
        let request = Request::get("/health").body(Body::empty()).unwrap_or_default();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "sheetmate-agent");
        assert_eq!(body["model"], "test-model");
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let client = Arc::new(ScriptedClient::answering("Use a pivot table."));
        let router = router_with(client.clone());
        let (status, body) = send(
            router,
            post_json("/api/excel-assistant/query/", r#"{"query":"Summarise sales"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Use a pivot table.");
        assert_eq!(client.calls(), [Call::Query("Summarise sales".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_inputs_are_bad_requests() {
        let client = Arc::new(ScriptedClient::answering(""));
        let cases = [
            ("/api/excel-assistant/query/", "{}", "Query is required"),
            ("/api/excel-assistant/query/", r#"{"query":"  "}"#, "Query is required"),
            ("/api/excel-assistant/query/", "not json", "Query is required"),
            ("/api/excel-assistant/validate_formula/", "{}", "Formula is required"),
            ("/api/excel-assistant/explain_formula/", r#"{"formula":""}"#, "Formula is required"),
            (
                "/api/excel-assistant/debug_formula/",
                r##"{"error_message":"#N/A"}"##,
                "Formula is required",
            ),
        ];
        for (uri, body, expected) in cases {
            let (status, json) = send(router_with(client.clone()), post_json(uri, body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
            assert_eq!(json["error"], expected);
        }
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_debug_passes_error_message() {
        let client = Arc::new(ScriptedClient::answering(""));
        let (status, body) = send(
            router_with(client.clone()),
            post_json(
                "/api/excel-assistant/debug_formula/",
                r##"{"formula":"=VLOOKUP(A1,B:C,2,FALSE)","error_message":"#N/A"}"##,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["fixes"].is_array());
        assert_eq!(
            client.calls(),
            [Call::Debug(
                "=VLOOKUP(A1,B:C,2,FALSE)".to_string(),
                Some("#N/A".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_backend_failure_is_500() {
        let client = Arc::new(ScriptedClient::failing(&RequestError::Backend(
            "model crashed".to_string(),
        )));
        let (status, body) = send(
            router_with(client),
            post_json("/api/excel-assistant/explain_formula/", r#"{"formula":"=A1"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "backend failure: model crashed");
    }
}
