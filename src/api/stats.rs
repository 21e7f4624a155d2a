//! Dashboard and statistics endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        stats::{
            AdminDashboard, CoordinatorReport, CoordinatorStats, InstructorStats, StudentDashboard, StudentOverview,
            StudentParticipation,
        },
        user::Capability,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Query parameters for the instructor's student list
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StudentsQuery {
    /// Exact department match
    pub department: Option<String>,
    /// Matches username, name or email
    pub search: Option<String>,
}

/// Dashboard of the calling student
#[utoipa::path(
    get,
    path = "/student/dashboard",
    tag = "student",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student dashboard", body = StudentDashboard),
        (status = 403, description = "Student privileges required")
    )
)]
pub async fn student_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StudentDashboard>> {
    claims.require(Capability::EnrollInActivities)?;

    let dashboard = state.services.stats.student_dashboard(claims.user_id).await?;
    Ok(Json(dashboard))
}

/// Instructor overview figures
#[utoipa::path(
    get,
    path = "/instructor/stats",
    tag = "instructor",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Instructor statistics", body = InstructorStats),
        (status = 403, description = "Instructor privileges required")
    )
)]
pub async fn instructor_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<InstructorStats>> {
    claims.require(Capability::ViewInstructorDashboard)?;

    let stats = state.services.stats.instructor().await?;
    Ok(Json(stats))
}

/// Students with their participation totals
#[utoipa::path(
    get,
    path = "/instructor/students",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(StudentsQuery),
    responses(
        (status = 200, description = "Students", body = Vec<StudentOverview>),
        (status = 403, description = "Instructor privileges required")
    )
)]
pub async fn list_students(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StudentsQuery>,
) -> AppResult<Json<Vec<StudentOverview>>> {
    claims.require(Capability::ViewInstructorDashboard)?;

    let students = state
        .services
        .stats
        .students(query.department.as_deref(), query.search.as_deref())
        .await?;
    Ok(Json(students))
}

/// Participation detail of one student
#[utoipa::path(
    get,
    path = "/instructor/students/{id}/participation",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student participation", body = StudentParticipation),
        (status = 404, description = "Student not found")
    )
)]
pub async fn student_participation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<StudentParticipation>> {
    claims.require(Capability::ViewInstructorDashboard)?;

    let participation = state.services.stats.participation(id).await?;
    Ok(Json(participation))
}

/// Coordinator overview figures
#[utoipa::path(
    get,
    path = "/coordinator/stats",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coordinator statistics", body = CoordinatorStats),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn coordinator_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<CoordinatorStats>> {
    claims.require(Capability::ViewCoordinatorDashboard)?;

    let stats = state.services.stats.coordinator(&claims).await?;
    Ok(Json(stats))
}

/// Report with status breakdown and six-month trend
#[utoipa::path(
    get,
    path = "/coordinator/reports",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coordinator report", body = CoordinatorReport),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn coordinator_report(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<CoordinatorReport>> {
    claims.require(Capability::ViewCoordinatorDashboard)?;

    let report = state.services.stats.coordinator_report(&claims).await?;
    Ok(Json(report))
}

/// System-wide totals
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Admin dashboard", body = AdminDashboard),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AdminDashboard>> {
    claims.require(Capability::ManageUsers)?;

    let dashboard = state.services.stats.admin_dashboard().await?;
    Ok(Json(dashboard))
}
