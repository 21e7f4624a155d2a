//! Enrollment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        enrollment::{EnrollResponse, EnrollmentDetail, Participant},
        user::Capability,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Enroll in an activity
#[utoipa::path(
    post,
    path = "/student/activities/{id}/enroll",
    tag = "student",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 201, description = "Enrolled", body = EnrollResponse),
        (status = 400, description = "Enrollment refused (full, closed, past or duplicate)", body = crate::error::ErrorResponse),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn enroll(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<EnrollResponse>)> {
    claims.require(Capability::EnrollInActivities)?;

    let enrollment = state.services.enrollments.enroll(claims.user_id, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            enrollment,
            message: "Successfully enrolled in activity".to_string(),
        }),
    ))
}

/// Withdraw from an activity
#[utoipa::path(
    delete,
    path = "/student/activities/{id}/enroll",
    tag = "student",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Withdrawn", body = EnrollResponse),
        (status = 400, description = "Enrollment is not active"),
        (status = 404, description = "Not enrolled")
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EnrollResponse>> {
    claims.require(Capability::EnrollInActivities)?;

    let enrollment = state.services.enrollments.withdraw(claims.user_id, id).await?;
    Ok(Json(EnrollResponse {
        enrollment,
        message: "Successfully withdrawn from activity".to_string(),
    }))
}

/// Current enrollments of the caller
#[utoipa::path(
    get,
    path = "/student/enrollments",
    tag = "student",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Enrolled and completed activities", body = Vec<EnrollmentDetail>)
    )
)]
pub async fn my_enrollments(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EnrollmentDetail>>> {
    claims.require(Capability::EnrollInActivities)?;

    let enrollments = state.services.enrollments.enrolled(claims.user_id).await?;
    Ok(Json(enrollments))
}

/// Activities the caller took part in that have ended
#[utoipa::path(
    get,
    path = "/student/recent-activities",
    tag = "student",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recently ended activities", body = Vec<EnrollmentDetail>)
    )
)]
pub async fn recent_activities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EnrollmentDetail>>> {
    claims.require(Capability::EnrollInActivities)?;

    let enrollments = state.services.enrollments.recent(claims.user_id).await?;
    Ok(Json(enrollments))
}

/// Participants of an activity
#[utoipa::path(
    get,
    path = "/instructor/activities/{id}/participants",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Enrolled students", body = Vec<Participant>),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn participants(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Participant>>> {
    claims.require(Capability::ViewAttendance)?;

    let participants = state.services.enrollments.participants(id).await?;
    Ok(Json(participants))
}
