//! Volunteering endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        user::Capability,
        volunteer::{
            ApplicationDetail, ApplicationQuery, CreateApplication, LogHours, OpportunitySummary,
            ReviewApplication, SyncReport, VolunteerApplication, VolunteerStats,
        },
    },
    AppState,
};
use validator::Validate;

use super::{AuthenticatedUser, OptionalJson, PaginatedResponse};

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct PendingCount {
    pub pending: i64,
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// Active volunteer opportunities
#[utoipa::path(
    get,
    path = "/volunteering/opportunities",
    tag = "volunteering",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active opportunities", body = Vec<OpportunitySummary>)
    )
)]
pub async fn list_opportunities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<OpportunitySummary>>> {
    let opportunities = state.services.volunteering.opportunities(claims.user_id).await?;
    Ok(Json(opportunities))
}

/// Opportunity of a volunteering activity
#[utoipa::path(
    get,
    path = "/volunteering/opportunities/by-activity/{id}",
    tag = "volunteering",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Opportunity", body = OpportunitySummary),
        (status = 404, description = "No opportunity for this activity")
    )
)]
pub async fn opportunity_by_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<OpportunitySummary>> {
    let opportunity = state.services.volunteering.by_activity(id, claims.user_id).await?;
    Ok(Json(opportunity))
}

/// Create or refresh opportunities from volunteering activities
#[utoipa::path(
    post,
    path = "/coordinator/volunteering/sync",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sync report", body = SyncReport),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn sync_opportunities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SyncReport>> {
    claims.require(Capability::ManageActivities)?;

    let report = state.services.volunteering.sync(&claims).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Student applications
// ---------------------------------------------------------------------------

/// Applications of the caller
#[utoipa::path(
    get,
    path = "/student/volunteering/applications",
    tag = "student",
    security(("bearer_auth" = [])),
    params(ApplicationQuery),
    responses(
        (status = 200, description = "Applications", body = PaginatedResponse<ApplicationDetail>)
    )
)]
pub async fn my_applications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<Json<PaginatedResponse<ApplicationDetail>>> {
    claims.require(Capability::ApplyForVolunteering)?;

    let (applications, total) = state.services.volunteering.my_applications(claims.user_id, &query).await?;
    Ok(Json(PaginatedResponse::new(applications, total, query.page, query.per_page, 50)))
}

/// Apply for a volunteer opportunity
#[utoipa::path(
    post,
    path = "/student/volunteering/applications",
    tag = "student",
    security(("bearer_auth" = [])),
    request_body = CreateApplication,
    responses(
        (status = 201, description = "Application submitted", body = VolunteerApplication),
        (status = 400, description = "Invalid input, duplicate application or no spots left", body = crate::error::ErrorResponse),
        (status = 404, description = "Opportunity not found")
    )
)]
pub async fn apply(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateApplication>,
) -> AppResult<(StatusCode, Json<VolunteerApplication>)> {
    claims.require(Capability::ApplyForVolunteering)?;

    let application = state.services.volunteering.apply(claims.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// Withdraw an application
#[utoipa::path(
    post,
    path = "/student/volunteering/applications/{id}/withdraw",
    tag = "student",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application withdrawn", body = VolunteerApplication),
        (status = 400, description = "Application can no longer be withdrawn"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn withdraw_application(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<VolunteerApplication>> {
    claims.require(Capability::ApplyForVolunteering)?;

    let application = state.services.volunteering.withdraw(claims.user_id, id).await?;
    Ok(Json(application))
}

/// Volunteering figures of the caller
#[utoipa::path(
    get,
    path = "/student/volunteering/stats",
    tag = "student",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Volunteering stats", body = VolunteerStats)
    )
)]
pub async fn my_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<VolunteerStats>> {
    claims.require(Capability::ApplyForVolunteering)?;

    let stats = state.services.volunteering.stats(claims.user_id).await?;
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// All applications, filterable by status and opportunity
#[utoipa::path(
    get,
    path = "/instructor/volunteering/applications",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(ApplicationQuery),
    responses(
        (status = 200, description = "Applications", body = PaginatedResponse<ApplicationDetail>),
        (status = 403, description = "Reviewer privileges required")
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ApplicationQuery>,
) -> AppResult<Json<PaginatedResponse<ApplicationDetail>>> {
    claims.require(Capability::ReviewVolunteerApplications)?;

    let (applications, total) = state.services.volunteering.applications(&query).await?;
    Ok(Json(PaginatedResponse::new(applications, total, query.page, query.per_page, 50)))
}

/// Number of applications awaiting review
#[utoipa::path(
    get,
    path = "/instructor/volunteering/applications/pending-count",
    tag = "instructor",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending applications", body = PendingCount)
    )
)]
pub async fn pending_count(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<PendingCount>> {
    claims.require(Capability::ReviewVolunteerApplications)?;

    let pending = state.services.volunteering.pending_count().await?;
    Ok(Json(PendingCount { pending }))
}

/// Approve a pending application
#[utoipa::path(
    post,
    path = "/instructor/volunteering/applications/{id}/approve",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ReviewApplication,
    responses(
        (status = 200, description = "Application approved", body = VolunteerApplication),
        (status = 400, description = "Malformed body or application is not pending"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn approve_application(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    OptionalJson(request): OptionalJson<ReviewApplication>,
) -> AppResult<Json<VolunteerApplication>> {
    claims.require(Capability::ReviewVolunteerApplications)?;

    request.validate()?;
    let application = state.services.volunteering.review(&claims, id, true, &request.notes).await?;
    Ok(Json(application))
}

/// Reject a pending application
#[utoipa::path(
    post,
    path = "/instructor/volunteering/applications/{id}/reject",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ReviewApplication,
    responses(
        (status = 200, description = "Application rejected", body = VolunteerApplication),
        (status = 400, description = "Malformed body or application is not pending"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn reject_application(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    OptionalJson(request): OptionalJson<ReviewApplication>,
) -> AppResult<Json<VolunteerApplication>> {
    claims.require(Capability::ReviewVolunteerApplications)?;

    request.validate()?;
    let application = state.services.volunteering.review(&claims, id, false, &request.notes).await?;
    Ok(Json(application))
}

/// Log volunteer hours on an approved or active application
#[utoipa::path(
    post,
    path = "/instructor/volunteering/applications/{id}/hours",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    request_body = LogHours,
    responses(
        (status = 200, description = "Hours logged", body = VolunteerApplication),
        (status = 400, description = "Invalid hours or application state"),
        (status = 404, description = "Application not found")
    )
)]
pub async fn log_hours(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<LogHours>,
) -> AppResult<Json<VolunteerApplication>> {
    claims.require(Capability::ReviewVolunteerApplications)?;

    request.validate()?;
    let application = state.services.volunteering.log_hours(&claims, id, request.hours).await?;
    Ok(Json(application))
}
