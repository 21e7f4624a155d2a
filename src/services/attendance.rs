//! QR check-in and attendance service

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult, ScanRejection},
    models::{
        activity::Activity,
        attendance::{
            AttendanceDetail, AttendanceRecord, AttendanceSheet, AttendanceStats, IssueQrToken, ManualAttendance,
            QrPayload, QrToken, QrTokenResponse, ScanAudit, ScanLog, ScanRequest, ScanResponse,
        },
        enums::{ActivityStatus, NotificationType},
        notification::NewNotification,
        user::UserClaims,
    },
    repository::{attendance::ScanOutcome, Repository},
    services::notifications::NotificationsService,
};

const MAX_SCAN_LOGS: i64 = 500;

#[derive(Clone)]
pub struct AttendanceService {
    repository: Repository,
    notifications: NotificationsService,
    config: AuthConfig,
}

impl AttendanceService {
    pub fn new(repository: Repository, notifications: NotificationsService, config: AuthConfig) -> Self {
        Self { repository, notifications, config }
    }

    // -----------------------------------------------------------------------
    // Tokens
    // -----------------------------------------------------------------------

    /// Issue a new QR token, deactivating the activity's previous ones
    pub async fn issue(&self, issuer: &UserClaims, activity_id: i32, data: &IssueQrToken) -> AppResult<QrTokenResponse> {
        data.validate()?;

        let activity = self.repository.activities.get_by_id(activity_id).await?;
        if activity.status == ActivityStatus::Cancelled {
            return Err(AppError::BadRequest("Cannot issue a QR code for a cancelled activity".to_string()));
        }

        let now = Utc::now();
        let hours = data.expires_in_hours.unwrap_or(self.config.qr_default_expiry_hours);
        let expires_at = now + Duration::hours(hours);

        let token = self
            .repository
            .attendance
            .issue_token(activity.id, issuer.user_id, Some(expires_at), data.max_uses)
            .await?;

        tracing::info!(
            activity_id,
            token_id = token.id,
            by = issuer.user_id,
            expires_at = %expires_at,
            max_uses = ?data.max_uses,
            "QR token issued"
        );
        token_response(&activity, token, now)
    }

    /// Currently active token of an activity
    pub async fn current(&self, activity_id: i32) -> AppResult<QrTokenResponse> {
        let activity = self.repository.activities.get_by_id(activity_id).await?;
        let token = self
            .repository
            .attendance
            .active_token(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active QR code for this activity".to_string()))?;
        token_response(&activity, token, Utc::now())
    }

    /// Returns the number of tokens deactivated
    pub async fn deactivate(&self, actor: &UserClaims, activity_id: i32) -> AppResult<u64> {
        self.repository.activities.get_by_id(activity_id).await?;
        let count = self.repository.attendance.deactivate_tokens(activity_id).await?;
        tracing::info!(activity_id, count, by = actor.user_id, "QR tokens deactivated");
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Check-in
    // -----------------------------------------------------------------------

    /// Check in by scanning a QR payload. Every attempt is written to the
    /// scan log. `audit` carries the caller and client details.
    pub async fn scan(&self, data: &ScanRequest, mut audit: ScanAudit) -> AppResult<ScanResponse> {
        data.validate()?;
        let (latitude, longitude) = data.coordinates();
        audit.latitude = latitude;
        audit.longitude = longitude;

        let payload = match QrPayload::decode(&data.qr_data) {
            Ok(payload) => payload,
            Err(reason) => return Err(self.reject(&audit, reason).await),
        };
        audit.activity_id = Some(payload.activity_id);

        match self.repository.attendance.scan(&payload, audit.user_id, Utc::now()).await? {
            ScanOutcome::Rejected { token_id, reason } => {
                audit.qr_token_id = token_id;
                Err(self.reject(&audit, reason).await)
            }
            ScanOutcome::Recorded { token_id, check_in } => {
                audit.qr_token_id = Some(token_id);
                if let Err(e) = self.repository.attendance.log_scan(&audit, None, Some(check_in.record.id)).await {
                    tracing::error!(error = %e, "Failed to write scan log");
                }

                let activity = self.repository.activities.get_by_id(payload.activity_id).await?;
                tracing::info!(
                    user_id = audit.user_id,
                    activity_id = activity.id,
                    token_id,
                    points = check_in.points_awarded,
                    "QR check-in recorded"
                );

                Ok(ScanResponse {
                    message: check_in_message(&activity.title, check_in.points_awarded),
                    activity_title: activity.title,
                    points_awarded: check_in.points_awarded,
                    attendance: check_in.record,
                })
            }
        }
    }

    async fn reject(&self, audit: &ScanAudit, reason: ScanRejection) -> AppError {
        tracing::info!(
            user_id = audit.user_id,
            activity_id = ?audit.activity_id,
            token_id = ?audit.qr_token_id,
            reason = ?reason,
            "QR scan rejected"
        );
        if let Err(e) = self.repository.attendance.log_scan(audit, Some(reason), None).await {
            tracing::error!(error = %e, "Failed to write scan log");
        }
        AppError::Scan(reason)
    }

    /// Mark a student present without a QR code
    pub async fn mark_manual(
        &self,
        marker: &UserClaims,
        activity_id: i32,
        data: &ManualAttendance,
    ) -> AppResult<AttendanceRecord> {
        data.validate()?;

        let activity = self.repository.activities.get_by_id(activity_id).await?;
        let check_in = self
            .repository
            .attendance
            .mark_manual(activity.id, data.student_id, marker.user_id, data.notes.trim())
            .await?;

        tracing::info!(
            activity_id,
            student_id = data.student_id,
            by = marker.user_id,
            points = check_in.points_awarded,
            "Attendance marked manually"
        );

        self.notifications
            .notify(
                NewNotification::new(
                    data.student_id,
                    NotificationType::Activity,
                    "Attendance recorded",
                    &check_in_message(&activity.title, check_in.points_awarded),
                )
                .about(activity.id),
            )
            .await;

        Ok(check_in.record)
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    pub async fn sheet(&self, activity_id: i32) -> AppResult<AttendanceSheet> {
        let activity = self.repository.activities.get_by_id(activity_id).await?;
        let records = self.repository.attendance.for_activity(activity_id).await?;
        let enrolled = self.repository.activities.participating_count(activity_id).await?;
        let (qr, manual) = self.repository.attendance.method_counts(activity_id).await?;

        Ok(AttendanceSheet {
            activity_id: activity.id,
            activity_title: activity.title,
            records,
            stats: AttendanceStats::new(enrolled, qr, manual),
        })
    }

    pub async fn my_attendance(&self, user_id: i32) -> AppResult<Vec<AttendanceDetail>> {
        self.repository.attendance.for_user(user_id).await
    }

    pub async fn scan_logs(&self, activity_id: i32, limit: Option<i64>) -> AppResult<Vec<ScanLog>> {
        self.repository.activities.get_by_id(activity_id).await?;
        let limit = limit.unwrap_or(100).clamp(1, MAX_SCAN_LOGS);
        self.repository.attendance.scan_logs(activity_id, limit).await
    }
}

fn token_response(activity: &Activity, token: QrToken, now: DateTime<Utc>) -> AppResult<QrTokenResponse> {
    let payload = QrPayload::for_token(&token, &activity.title, &activity.location);
    let encoded = payload.encode()?;
    let (checkin_opens_at, checkin_closes_at) = activity.checkin_window();

    Ok(QrTokenResponse {
        state: token.state(now),
        remaining_uses: token.remaining_uses(),
        checkin_window_open: activity.is_checkin_window_open(now),
        checkin_opens_at,
        checkin_closes_at,
        payload,
        encoded,
        token,
    })
}

fn check_in_message(activity_title: &str, points: i32) -> String {
    if points > 0 {
        format!("Attendance recorded for \"{}\". You earned {} points.", activity_title, points)
    } else {
        format!("Attendance recorded for \"{}\".", activity_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance::TokenState;
    use crate::models::enums::Difficulty;
    use uuid::Uuid;

    fn activity(start: DateTime<Utc>) -> Activity {
        Activity {
            id: 7,
            title: "Campus clean-up".to_string(),
            description: String::new(),
            location: "Main quad".to_string(),
            category_id: None,
            difficulty: Difficulty::Beginner,
            max_participants: 30,
            requirements: String::new(),
            is_virtual: false,
            virtual_link: None,
            start_time: start,
            end_time: start + Duration::hours(3),
            registration_deadline: None,
            is_volunteering: true,
            is_featured: false,
            certificate_available: false,
            points_reward: 15,
            status: ActivityStatus::Upcoming,
            created_by: Some(1),
            created_at: start - Duration::days(7),
            updated_at: start - Duration::days(7),
        }
    }

    #[test]
    fn test_token_response_payload() {
        let now = Utc::now();
        let activity = activity(now + Duration::minutes(10));
        let token = QrToken {
            id: 3,
            activity_id: 7,
            session_id: Uuid::new_v4(),
            created_by: Some(1),
            created_at: now,
            expires_at: Some(now + Duration::hours(2)),
            is_active: true,
            max_uses: Some(5),
            current_uses: 1,
        };
        let session_id = token.session_id;

        let response = token_response(&activity, token, now).unwrap();
        assert_eq!(response.state, TokenState::Valid);
        assert_eq!(response.remaining_uses, Some(4));
        assert!(response.checkin_window_open);
        assert_eq!(response.payload.location, "Main quad");

        let decoded = QrPayload::decode(&response.encoded).unwrap();
        assert_eq!(decoded.session_id, session_id);
        assert_eq!(decoded.activity_id, 7);
    }

    #[test]
    fn test_check_in_message() {
        assert_eq!(
            check_in_message("Blood drive", 20),
            "Attendance recorded for \"Blood drive\". You earned 20 points."
        );
        assert_eq!(check_in_message("Blood drive", 0), "Attendance recorded for \"Blood drive\".");
    }
}
