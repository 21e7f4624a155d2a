//! Activity and category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        activity::{Activity, ActivityCategory, ActivityQuery, ActivitySummary, CreateActivity, CreateCategory, UpdateActivity},
        user::Capability,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List published activities with the caller's enrollment status
#[utoipa::path(
    get,
    path = "/activities",
    tag = "activities",
    security(("bearer_auth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "List of activities", body = PaginatedResponse<ActivitySummary>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_activities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<PaginatedResponse<ActivitySummary>>> {
    let (activities, total) = state.services.activities.list(&claims, &query).await?;
    Ok(Json(PaginatedResponse::new(activities, total, query.page, query.per_page, 20)))
}

/// Get activity details
#[utoipa::path(
    get,
    path = "/activities/{id}",
    tag = "activities",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity details", body = ActivitySummary),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn get_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ActivitySummary>> {
    let activity = state.services.activities.get(&claims, id).await?;
    Ok(Json(activity))
}

/// List activity categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "activities",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories with activity counts", body = Vec<ActivityCategory>)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ActivityCategory>>> {
    let categories = state.services.activities.categories().await?;
    Ok(Json(categories))
}

/// Activities monitored by instructors
#[utoipa::path(
    get,
    path = "/instructor/activities",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "List of activities", body = PaginatedResponse<ActivitySummary>),
        (status = 403, description = "Instructor privileges required")
    )
)]
pub async fn instructor_activities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<PaginatedResponse<ActivitySummary>>> {
    claims.require(Capability::ViewInstructorDashboard)?;

    let (activities, total) = state.services.activities.list(&claims, &query).await?;
    Ok(Json(PaginatedResponse::new(activities, total, query.page, query.per_page, 20)))
}

/// Activities created by the calling coordinator, drafts included.
/// Admins see every activity unless `created_by` is given.
#[utoipa::path(
    get,
    path = "/coordinator/activities",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "List of activities", body = PaginatedResponse<ActivitySummary>),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn coordinator_activities(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<ActivityQuery>,
) -> AppResult<Json<PaginatedResponse<ActivitySummary>>> {
    claims.require(Capability::ViewCoordinatorDashboard)?;

    if !claims.is_admin() {
        query.created_by = Some(claims.user_id);
    }
    let (activities, total) = state.services.activities.list(&claims, &query).await?;
    Ok(Json(PaginatedResponse::new(activities, total, query.page, query.per_page, 20)))
}

/// Create an activity (draft)
#[utoipa::path(
    post,
    path = "/coordinator/activities",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    request_body = CreateActivity,
    responses(
        (status = 201, description = "Activity created", body = Activity),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn create_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateActivity>,
) -> AppResult<(StatusCode, Json<Activity>)> {
    claims.require(Capability::ManageActivities)?;

    let activity = state.services.activities.create(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// Update an activity
#[utoipa::path(
    put,
    path = "/coordinator/activities/{id}",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    request_body = UpdateActivity,
    responses(
        (status = 200, description = "Activity updated", body = Activity),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn update_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateActivity>,
) -> AppResult<Json<Activity>> {
    claims.require(Capability::ManageActivities)?;

    let activity = state.services.activities.update(&claims, id, &request).await?;
    Ok(Json(activity))
}

/// Delete an activity without participants
#[utoipa::path(
    delete,
    path = "/coordinator/activities/{id}",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 204, description = "Activity deleted"),
        (status = 400, description = "Activity has enrolled participants"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require(Capability::ManageActivities)?;

    state.services.activities.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publish a draft activity
#[utoipa::path(
    post,
    path = "/coordinator/activities/{id}/publish",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity published", body = Activity),
        (status = 400, description = "Activity is not a draft"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn publish_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Activity>> {
    claims.require(Capability::ManageActivities)?;

    let activity = state.services.activities.publish(&claims, id).await?;
    Ok(Json(activity))
}

/// Cancel an activity
#[utoipa::path(
    post,
    path = "/coordinator/activities/{id}/cancel",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity cancelled", body = Activity),
        (status = 400, description = "Activity already cancelled or completed"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn cancel_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Activity>> {
    claims.require(Capability::ManageActivities)?;

    let activity = state.services.activities.cancel(&claims, id).await?;
    Ok(Json(activity))
}

/// Create an activity category
#[utoipa::path(
    post,
    path = "/coordinator/categories",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = ActivityCategory),
        (status = 400, description = "Invalid input or duplicate name")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<ActivityCategory>)> {
    claims.require(Capability::ManageActivities)?;

    let category = state.services.activities.create_category(&request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}
