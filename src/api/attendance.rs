//! QR check-in and attendance endpoints

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        attendance::{
            AttendanceDetail, AttendanceRecord, AttendanceSheet, IssueQrToken, ManualAttendance, QrTokenResponse,
            ScanAudit, ScanLog, ScanRequest, ScanResponse,
        },
        user::Capability,
    },
    AppState,
};

use super::{client_ip, AuthenticatedUser, OptionalJson};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ScanLogQuery {
    /// Maximum number of entries (default 100)
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct DeactivateResponse {
    /// Number of tokens that were active
    pub deactivated: u64,
}

/// Check in by scanning an activity QR code
#[utoipa::path(
    post,
    path = "/student/attendance/scan",
    tag = "student",
    security(("bearer_auth" = [])),
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = ScanResponse),
        (status = 400, description = "Invalid or expired code, not enrolled, or already checked in", body = crate::error::ErrorResponse)
    )
)]
pub async fn scan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    claims.require(Capability::ScanAttendance)?;

    let audit = ScanAudit {
        user_id: claims.user_id,
        ip_address: Some(client_ip(&headers, peer)),
        user_agent: user_agent.map(|TypedHeader(ua)| ua.as_str().to_string()),
        ..Default::default()
    };

    let response = state.services.attendance.scan(&request, audit).await?;
    Ok(Json(response))
}

/// Attendance history of the caller
#[utoipa::path(
    get,
    path = "/student/attendance",
    tag = "student",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendance records", body = Vec<AttendanceDetail>)
    )
)]
pub async fn my_attendance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<AttendanceDetail>>> {
    claims.require(Capability::ViewOwnAttendance)?;

    let records = state.services.attendance.my_attendance(claims.user_id).await?;
    Ok(Json(records))
}

/// Mark a student present without a QR code
#[utoipa::path(
    post,
    path = "/instructor/activities/{id}/attendance",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    request_body = ManualAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceRecord),
        (status = 400, description = "Student not enrolled or already checked in", body = crate::error::ErrorResponse),
        (status = 404, description = "Activity or student not found")
    )
)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ManualAttendance>,
) -> AppResult<(StatusCode, Json<AttendanceRecord>)> {
    claims.require(Capability::MarkAttendance)?;

    let record = state.services.attendance.mark_manual(&claims, id, &request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Attendance sheet of an activity with statistics
#[utoipa::path(
    get,
    path = "/instructor/activities/{id}/attendance",
    tag = "instructor",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Attendance sheet", body = AttendanceSheet),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn attendance_sheet(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<AttendanceSheet>> {
    claims.require(Capability::ViewAttendance)?;

    let sheet = state.services.attendance.sheet(id).await?;
    Ok(Json(sheet))
}

/// Issue a new QR code, replacing the activity's current one
#[utoipa::path(
    post,
    path = "/coordinator/activities/{id}/qr-token",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    request_body(content = IssueQrToken, description = "Expiry window and use cap, both optional"),
    responses(
        (status = 201, description = "QR code issued", body = QrTokenResponse),
        (status = 400, description = "Malformed body or cancelled activity", body = crate::error::ErrorResponse),
        (status = 403, description = "Coordinator privileges required"),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn issue_qr_token(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    OptionalJson(request): OptionalJson<IssueQrToken>,
) -> AppResult<(StatusCode, Json<QrTokenResponse>)> {
    claims.require(Capability::IssueQrTokens)?;

    let token = state.services.attendance.issue(&claims, id, &request).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// Current active QR code of an activity
#[utoipa::path(
    get,
    path = "/coordinator/activities/{id}/qr-token",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Active QR code", body = QrTokenResponse),
        (status = 404, description = "Activity not found or no active code")
    )
)]
pub async fn current_qr_token(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<QrTokenResponse>> {
    claims.require(Capability::IssueQrTokens)?;

    let token = state.services.attendance.current(id).await?;
    Ok(Json(token))
}

/// Deactivate the activity's QR codes
#[utoipa::path(
    delete,
    path = "/coordinator/activities/{id}/qr-token",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "QR codes deactivated", body = DeactivateResponse),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn deactivate_qr_tokens(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<DeactivateResponse>> {
    claims.require(Capability::IssueQrTokens)?;

    let deactivated = state.services.attendance.deactivate(&claims, id).await?;
    Ok(Json(DeactivateResponse { deactivated }))
}

/// Scan attempts for an activity, newest first
#[utoipa::path(
    get,
    path = "/coordinator/activities/{id}/scan-logs",
    tag = "coordinator",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Activity ID"), ScanLogQuery),
    responses(
        (status = 200, description = "Scan log entries", body = Vec<ScanLog>),
        (status = 404, description = "Activity not found")
    )
)]
pub async fn scan_logs(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<ScanLogQuery>,
) -> AppResult<Json<Vec<ScanLog>>> {
    claims.require(Capability::IssueQrTokens)?;

    let logs = state.services.attendance.scan_logs(id, query.limit).await?;
    Ok(Json(logs))
}
