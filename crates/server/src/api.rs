use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use steward_common::auth::AuthenticatedUser;
use steward_common::models::{QueryRecord, QueryStatus, Submission, TableDescriptor};
use steward_error::{ErrorCategory, ErrorCode, StewardError};
use steward_targets::Target;
use uuid::Uuid;

use crate::AppState;

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(create_query_router(state.clone()))
        .merge(create_approval_router(state.clone()))
        .merge(create_target_router(state))
}

pub fn create_query_router(state: AppState) -> Router {
    Router::new()
        .route("/queries", post(create_query).get(list_queries))
        .route("/queries/{id}", get(get_query))
        .route("/queries/{id}/submit", post(submit_query))
        .route("/queries/{id}/dry-run", post(dry_run_query))
        .route("/queries/{id}/execute", post(execute_query))
        .route("/queries/{id}/rollback", post(rollback_query))
        .with_state(state)
}

pub fn create_approval_router(state: AppState) -> Router {
    Router::new()
        .route("/approvals", get(list_approvals))
        .route("/approvals/{id}/decision", post(decide_approval))
        .with_state(state)
}

pub fn create_target_router(state: AppState) -> Router {
    Router::new()
        .route("/targets", get(list_targets).post(register_target))
        .route("/targets/{id}/test", post(test_target))
        .route("/targets/{id}/tables", get(discover_tables))
        .with_state(state)
}

/// Error envelope for every endpoint: the coded error as JSON plus an
/// HTTP status derived from its code.
#[derive(Debug)]
pub struct ApiError(pub StewardError);

impl From<StewardError> for ApiError {
    fn from(err: StewardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        (status, Json(json!({ "error": self.0 }))).into_response()
    }
}

fn status_for(err: &StewardError) -> StatusCode {
    match err.code {
        ErrorCode::RecordNotFound | ErrorCode::ApprovalNotFound | ErrorCode::TargetNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorCode::InvalidState | ErrorCode::AlreadyDecided => StatusCode::CONFLICT,
        _ => match err.code.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Auth => StatusCode::FORBIDDEN,
            ErrorCategory::Connection => StatusCode::BAD_GATEWAY,
            ErrorCategory::Workflow | ErrorCategory::Execution => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            // `ErrorCategory` is #[non_exhaustive] in steward-error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Caller identity from request headers. Authentication itself happens
/// upstream (gateway or sidecar); these headers carry its verdict.
fn caller(headers: &HeaderMap) -> Result<AuthenticatedUser, ApiError> {
    let id = headers
        .get("x-steward-user")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ApiError(
                StewardError::permission("Request carries no caller identity")
                    .with_hint("Set the x-steward-user header"),
            )
        })?;
    let team = headers
        .get("x-steward-team")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let permissions = headers
        .get("x-steward-permissions")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Ok(AuthenticatedUser {
        id: id.to_string(),
        team,
        permissions,
    })
}

async fn create_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<Submission>,
) -> Result<Json<QueryRecord>, ApiError> {
    let user = caller(&headers)?;
    let record = state.workflow.create(&user, submission).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct QueryFilter {
    submitter: Option<String>,
    status: Option<QueryStatus>,
}

async fn list_queries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<QueryFilter>,
) -> Result<Json<Vec<QueryRecord>>, ApiError> {
    let user = caller(&headers)?;
    let records = match (filter.submitter, filter.status) {
        (Some(submitter), None) => state.store.queries_by_submitter(&submitter).await?,
        (None, Some(status)) => state.store.queries_by_status(status).await?,
        (Some(submitter), Some(status)) => {
            let mut records = state.store.queries_by_submitter(&submitter).await?;
            records.retain(|r| r.status == status);
            records
        }
        (None, None) => state.store.queries_by_submitter(&user.id).await?,
    };
    Ok(Json(records))
}

async fn get_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryRecord>, ApiError> {
    caller(&headers)?;
    Ok(Json(state.store.get_query(id).await?))
}

async fn submit_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryRecord>, ApiError> {
    let user = caller(&headers)?;
    Ok(Json(state.workflow.submit(&user, id).await?))
}

async fn dry_run_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryRecord>, ApiError> {
    caller(&headers)?;
    let mut record = state.store.get_query(id).await?;
    let result = state.estimator.estimate(&record).await?;
    record.dry_run_result = Some(result);
    state.store.update_query(record.clone()).await?;
    Ok(Json(record))
}

async fn execute_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryRecord>, ApiError> {
    let user = caller(&headers)?;
    Ok(Json(state.executor.execute(&user, id).await?))
}

async fn rollback_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryRecord>, ApiError> {
    let user = caller(&headers)?;
    Ok(Json(state.rollback.rollback(&user, id).await?))
}

#[derive(Deserialize)]
struct ApprovalFilter {
    approver: Option<String>,
}

async fn list_approvals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<ApprovalFilter>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = caller(&headers)?;
    let approver = filter.approver.unwrap_or(user.id);
    let pending = state.workflow.pending_for(&approver).await?;
    Ok(Json(json!({ "approver": approver, "pending": pending })))
}

#[derive(Deserialize)]
struct DecisionRequest {
    approve: bool,
    #[serde(default)]
    comment: Option<String>,
}

async fn decide_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(decision): Json<DecisionRequest>,
) -> Result<Json<QueryRecord>, ApiError> {
    let user = caller(&headers)?;
    let record = state
        .workflow
        .decide(&user, id, decision.approve, decision.comment)
        .await?;
    Ok(Json(record))
}

async fn list_targets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Target>>, ApiError> {
    caller(&headers)?;
    Ok(Json(state.registry.list()))
}

async fn register_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(target): Json<Target>,
) -> Result<Json<serde_json::Value>, ApiError> {
    caller(&headers)?;
    let id = target.id.clone();
    state.registry.register(target)?;
    Ok(Json(json!({ "registered": id })))
}

async fn test_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    caller(&headers)?;
    let alive = state.pools.test_connection(&id).await?;
    Ok(Json(json!({ "target": id, "alive": alive })))
}

#[derive(Deserialize)]
struct DiscoverFilter {
    schema: Option<String>,
}

async fn discover_tables(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(filter): Query<DiscoverFilter>,
) -> Result<Json<Vec<TableDescriptor>>, ApiError> {
    caller(&headers)?;
    let tables = state
        .discovery
        .discover_tables(&id, filter.schema.as_deref())
        .await?;
    Ok(Json(tables))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&StewardError::not_found("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StewardError::invalid_state("x")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&StewardError::permission("x")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&StewardError::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StewardError::connectivity("x")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&StewardError::rollback("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-steward-user", "carol".parse().unwrap());
        headers.insert("x-steward-team", "data-eng".parse().unwrap());
        headers.insert(
            "x-steward-permissions",
            "query:submit, approve:team".parse().unwrap(),
        );
        let user = caller(&headers).unwrap();
        assert_eq!(user.id, "carol");
        assert_eq!(user.team.as_deref(), Some("data-eng"));
        assert_eq!(user.permissions, vec!["query:submit", "approve:team"]);

        assert!(caller(&HeaderMap::new()).is_err());
    }
}
