use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use approvo_core::domain::reference::ReferenceEntry;
use approvo_core::service::{
    DecisionRequest, NewProposal, ProposalEdits, ProposalFilters, ReturnRequest,
};
use approvo_core::views::{ProposalDetail, ProposalSummary, UserView};
use approvo_core::{ApplicationError, InterfaceError, ProposalId, ProposalService, WorkflowStore};

const INVALID_PARAMETER: &str = "Invalid query parameter";
const INVALID_BODY: &str = "Invalid request body";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<T, ApiFailure>;

pub fn router<S: WorkflowStore + 'static>(
    service: ProposalService<S>,
    cors_origins: &[String],
) -> Router {
    Router::new()
        .route("/api/Project", get(list_projects::<S>).post(create_project::<S>))
        .route("/api/Project/{id}", get(get_project::<S>).patch(update_project::<S>))
        .route("/api/Project/{id}/decision", patch(decide_step::<S>))
        .route("/api/Project/{id}/return", patch(return_project::<S>))
        .route("/api/Area", get(list_areas::<S>))
        .route("/api/ProjectType", get(list_project_types::<S>))
        .route("/api/Role", get(list_roles::<S>))
        .route("/api/ApprovalStatus", get(list_statuses::<S>))
        .route("/api/User", get(list_users::<S>))
        .layer(cors_layer(cors_origins))
        .with_state(service)
}

/// No configured origins means any origin may call the API.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn list_projects<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    query: Result<Query<ProposalFilters>, QueryRejection>,
) -> ApiResult<Json<Vec<ProposalSummary>>> {
    let correlation_id = correlation_id();
    let Query(filters) = query.map_err(|_| invalid_input(INVALID_PARAMETER))?;

    let summaries = service
        .list_proposals(filters, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(summaries))
}

async fn create_project<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    body: Result<Json<NewProposal>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProposalDetail>)> {
    let correlation_id = correlation_id();
    let Json(input) = body.map_err(|_| invalid_input(INVALID_BODY))?;

    let detail = service
        .create_proposal(input, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_project<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    id: Result<Path<ProposalId>, PathRejection>,
) -> ApiResult<Json<ProposalDetail>> {
    let correlation_id = correlation_id();
    let Path(id) = id.map_err(|_| invalid_input(INVALID_PARAMETER))?;

    let detail = service
        .get_proposal(id, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(detail))
}

async fn update_project<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    id: Result<Path<ProposalId>, PathRejection>,
    body: Result<Json<ProposalEdits>, JsonRejection>,
) -> ApiResult<Json<ProposalDetail>> {
    let correlation_id = correlation_id();
    let Path(id) = id.map_err(|_| invalid_input(INVALID_PARAMETER))?;
    let Json(edits) = body.map_err(|_| invalid_input(INVALID_BODY))?;

    let detail = service
        .update_proposal(id, edits, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(detail))
}

async fn decide_step<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    id: Result<Path<ProposalId>, PathRejection>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Json<ProposalDetail>> {
    let correlation_id = correlation_id();
    let Path(id) = id.map_err(|_| invalid_input(INVALID_PARAMETER))?;
    let Json(request) = body.map_err(|_| invalid_input(INVALID_BODY))?;

    let detail = service
        .decide_step(id, request, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(detail))
}

async fn return_project<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
    id: Result<Path<ProposalId>, PathRejection>,
    body: Result<Json<ReturnRequest>, JsonRejection>,
) -> ApiResult<Json<ProposalDetail>> {
    let correlation_id = correlation_id();
    let Path(id) = id.map_err(|_| invalid_input(INVALID_PARAMETER))?;
    let Json(request) = body.map_err(|_| invalid_input(INVALID_BODY))?;

    let detail = service
        .return_for_revision(id, request, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(detail))
}

async fn list_areas<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
) -> ApiResult<Json<Vec<ReferenceEntry>>> {
    reference_list(&service, |directory| directory.area_list()).await
}

async fn list_project_types<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
) -> ApiResult<Json<Vec<ReferenceEntry>>> {
    reference_list(&service, |directory| directory.project_type_list()).await
}

async fn list_roles<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
) -> ApiResult<Json<Vec<ReferenceEntry>>> {
    reference_list(&service, |directory| directory.role_list()).await
}

async fn list_statuses<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
) -> ApiResult<Json<Vec<ReferenceEntry>>> {
    reference_list(&service, |directory| directory.status_list()).await
}

async fn list_users<S: WorkflowStore + 'static>(
    State(service): State<ProposalService<S>>,
) -> ApiResult<Json<Vec<UserView>>> {
    reference_list(&service, |directory| directory.user_list()).await
}

async fn reference_list<S, T>(
    service: &ProposalService<S>,
    select: impl FnOnce(&approvo_core::views::ReferenceDirectory) -> Vec<T>,
) -> ApiResult<Json<Vec<T>>>
where
    S: WorkflowStore + 'static,
{
    let correlation_id = correlation_id();
    let directory =
        service.reference_directory().await.map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(select(&directory)))
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn invalid_input(message: &str) -> ApiFailure {
    (StatusCode::BAD_REQUEST, Json(ApiError { message: message.to_string() }))
}

fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { message, .. } => {
            error!(
                event_name = "api.request.failed",
                correlation_id = %interface.correlation_id(),
                error = %message,
                "request failed on storage"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    if status != StatusCode::SERVICE_UNAVAILABLE {
        info!(
            event_name = "api.request.rejected",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            reason = %interface.user_message(),
            "request rejected"
        );
    }

    (status, Json(ApiError { message: interface.user_message().to_string() }))
}
