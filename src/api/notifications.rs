//! Notification endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        notification::{Notification, NotificationQuery, NotifyParticipants, SendNotification, SendReport, UnreadCount},
        user::Capability,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Notifications of the caller, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.services.notifications.list(claims.user_id, &query).await?;
    Ok(Json(notifications))
}

/// Number of unread notifications
#[utoipa::path(
    get,
    path = "/notifications/count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread count", body = UnreadCount)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = state.services.notifications.unread_count(claims.user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

/// Mark one notification read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.mark_read(id, claims.user_id).await?;
    Ok(Json(notification))
}

/// Send a notification to chosen users, or to every active user
#[utoipa::path(
    post,
    path = "/coordinator/notifications",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    request_body = SendNotification,
    responses(
        (status = 200, description = "Notification sent", body = SendReport),
        (status = 400, description = "Invalid input or no recipients", body = crate::error::ErrorResponse),
        (status = 403, description = "Coordinator privileges required")
    )
)]
pub async fn send_notification(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<SendNotification>,
) -> AppResult<Json<SendReport>> {
    claims.require(Capability::SendNotifications)?;

    request.validate()?;
    let report = state.services.notifications.send(&claims, &request).await?;
    Ok(Json(report))
}

/// Notify everyone enrolled in an activity
#[utoipa::path(
    post,
    path = "/coordinator/activities/{id}/notify",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    request_body = NotifyParticipants,
    responses(
        (status = 200, description = "Participants notified", body = SendReport),
        (status = 400, description = "Invalid input or no participants", body = crate::error::ErrorResponse),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn notify_participants(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<NotifyParticipants>,
) -> AppResult<Json<SendReport>> {
    claims.require(Capability::SendNotifications)?;

    request.validate()?;
    let report = state.services.notifications.notify_participants(&claims, id, &request).await?;
    Ok(Json(report))
}
