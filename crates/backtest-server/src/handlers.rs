//! HTTP Handlers

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use fund_backtest::{
    BacktestError, BacktestRequest, BacktestResponse, DateRange, FundCode, MultiBacktestRequest,
    PricePoint, request::FundInput,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundQuery {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct FundDataResponse {
    pub success: bool,
    pub code: String,
    pub data: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsRequest {
    pub codes: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct FundsResponse {
    pub success: bool,
    pub funds: Vec<FundInput>,
}

// ============================================================================
// Errors
// ============================================================================

/// `{ success: false, error, details? }` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                success: false,
                error: error.into(),
                details: None,
            },
        }
    }

    fn internal(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                success: false,
                error: error.into(),
                details,
            },
        }
    }
}

impl From<BacktestError> for ApiError {
    fn from(err: BacktestError) -> Self {
        if err.is_validation() {
            tracing::warn!("Rejected request: {}", err);
            return Self::bad_request(err.to_string());
        }
        tracing::error!("Backtest error: {}", err);
        Self::internal(err.user_message(), Some(err.to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("Malformed request body: {}", rejection.body_text());
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn fetch_series(
    state: &AppState,
    code: &FundCode,
    range: DateRange,
) -> Result<Vec<PricePoint>, ApiError> {
    tokio::time::timeout(state.request_timeout, state.provider.fetch(code, range))
        .await
        .map_err(|_| {
            tracing::error!("Fetching {} timed out", code);
            ApiError::internal(
                "Fund data request timed out",
                Some(format!("no response within {}s", state.request_timeout.as_secs())),
            )
        })?
        .map_err(ApiError::from)
}

/// Run a simulation off the async workers, bounded by the request timeout
async fn simulate<F>(state: &AppState, job: F) -> Result<BacktestResponse, ApiError>
where
    F: FnOnce() -> fund_backtest::Result<BacktestResponse> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map_err(ApiError::from),
        Ok(Err(join_error)) => {
            tracing::error!("Backtest task failed: {}", join_error);
            Err(ApiError::internal("Backtest failed", Some(join_error.to_string())))
        }
        Err(_) => {
            tracing::error!("Backtest timed out");
            Err(ApiError::internal(
                "Backtest timed out",
                Some(format!("no result within {}s", state.request_timeout.as_secs())),
            ))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.name().to_string(),
        provider_available: state.provider.health_check().await,
    })
}

/// Historical net values of one fund
pub async fn fund_data(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<FundQuery>, QueryRejection>,
) -> Result<Json<FundDataResponse>, ApiError> {
    let Query(query) = query?;
    let code = FundCode::parse(&code)?;
    let data = fetch_series(&state, &code, DateRange::new(query.start_date, query.end_date)).await?;

    Ok(Json(FundDataResponse {
        success: true,
        code: code.to_string(),
        data,
    }))
}

/// Historical net values of several funds, fetched concurrently
pub async fn fund_batch(
    State(state): State<AppState>,
    payload: Result<Json<FundsRequest>, JsonRejection>,
) -> Result<Json<FundsResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.codes.is_empty() {
        return Err(ApiError::bad_request("At least one fund code is required"));
    }

    let codes = payload
        .codes
        .iter()
        .map(|c| FundCode::parse(c))
        .collect::<fund_backtest::Result<Vec<_>>>()?;
    let range = DateRange::new(payload.start_date, payload.end_date);

    let series = futures::future::try_join_all(
        codes.iter().map(|code| fetch_series(&state, code, range)),
    )
    .await?;

    let funds = codes
        .into_iter()
        .zip(series)
        .map(|(code, data)| FundInput {
            code: code.into(),
            data,
        })
        .collect();

    Ok(Json(FundsResponse {
        success: true,
        funds,
    }))
}

/// Single-fund backtest
pub async fn run_backtest(
    State(state): State<AppState>,
    payload: Result<Json<BacktestRequest>, JsonRejection>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(
        points = request.fund_data.len(),
        frequency = %request.frequency,
        "Single-fund backtest requested"
    );
    simulate(&state, move || request.run()).await.map(Json)
}

/// Multi-fund backtest
pub async fn run_multi_backtest(
    State(state): State<AppState>,
    payload: Result<Json<MultiBacktestRequest>, JsonRejection>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(
        funds = request.funds.len(),
        mode = request.mode.as_deref().unwrap_or("auto"),
        "Multi-fund backtest requested"
    );
    simulate(&state, move || request.run()).await.map(Json)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        Router,
        body::Body,
        http::{Request, header},
    };
    use fund_backtest::provider::MockPriceProvider;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        let state = AppState {
            provider: Arc::new(MockPriceProvider::new()),
            request_timeout: Duration::from_secs(10),
        };
        crate::app(state, "/nonexistent-static")
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn points(values: &[f64]) -> Value {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| json!({ "date": format!("2024-01-{:02}", i + 1), "unitNetValue": v, "cumulativeNetValue": v }))
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], json!("mock"));
        assert_eq!(body["providerAvailable"], json!(true));
    }

    #[tokio::test]
    async fn test_single_backtest() {
        let request = json!({
            "fundData": points(&[10.0, 10.0, 12.0, 12.0, 15.0]),
            "investmentAmount": 100,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-05",
        });
        let (status, body) = send(post("/api/backtest", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["stats"]["totalInvestment"].as_f64(), Some(400.0));
        assert_eq!(body["investmentRecords"].as_array().unwrap().len(), 4);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_bad_request() {
        let request = json!({
            "funds": [
                { "code": "000001", "data": points(&[1.0, 1.1]) },
                { "code": "000002", "data": points(&[1.0, 1.2]) },
            ],
            "investmentAmount": 100,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-02",
            "mode": "single",
        });
        let (status, body) = send(post("/api/backtest/multi", &request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("exactly one fund"));

        let request = json!({
            "funds": [{ "code": "000001", "data": points(&[1.0, 1.1]) }],
            "investmentAmount": 100,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-02",
            "mode": "multi-dca",
        });
        let (status, _) = send(post("/api/backtest/multi", &request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_multi_backtest() {
        let request = json!({
            "funds": [
                { "code": "000001", "data": points(&[1.0, 1.1, 1.2]) },
                { "code": "000002", "data": points(&[1.0, 0.9, 0.8]) },
            ],
            "investmentAmount": 100,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-03",
            "mode": "multi-dca",
        });
        let (status, body) = send(post("/api/backtest/multi", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], json!("multi-dca"));
        assert_eq!(body["stats"]["bestFundId"], json!("000001"));
        assert_eq!(body["stats"]["worstFundId"], json!("000002"));
        assert_eq!(body["data"][0]["funds"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_amount_is_bad_request() {
        let request = json!({
            "fundData": points(&[1.0, 1.0, 1.0, 1.0]),
            "investmentAmount": 3.0e28,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-04",
        });
        let (status, body) = send(post("/api/backtest", &request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("numeric range"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (status, body) = send(post("/api/backtest", &json!({ "frequency": "daily" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_fund_data() {
        let (status, body) =
            send(get("/api/fund/000001?startDate=2023-01-01&endDate=2023-01-31")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], json!("000001"));
        assert!(!body["data"].as_array().unwrap().is_empty());

        let (status, _) = send(get("/api/fund/12ab")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(get("/api/fund/999999")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_fund_batch_feeds_multi_request() {
        let (status, body) = send(post(
            "/api/funds",
            &json!({ "codes": ["000001", "110022"], "startDate": "2023-01-01", "endDate": "2023-06-30" }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        let funds = body["funds"].clone();
        assert_eq!(funds.as_array().unwrap().len(), 2);

        let request = json!({
            "funds": funds,
            "investmentAmount": 500,
            "frequency": "weekly",
            "weeklyDayOfWeek": 1,
            "startDate": "2023-01-01",
            "endDate": "2023-06-30",
            "mode": "multi-lumpsum",
        });
        let (status, body) = send(post("/api/backtest/multi", &request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["totalInvestment"].as_f64(), Some(2.0));
        assert!(body["investmentRecords"].as_array().unwrap().is_empty());
    }
}
