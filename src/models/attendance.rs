//! QR tokens, check-in payloads, attendance records and scan audit logs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{AttendanceStatus, EnrollmentStatus, VerificationMethod};
use crate::error::{AppError, ScanRejection};

/// Fixed `type` field of every check-in payload
pub const CHECKIN_PAYLOAD_TYPE: &str = "activity_checkin";

/// QR token row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct QrToken {
    pub id: i32,
    pub activity_id: i32,
    /// Unique code embedded in the payload
    pub session_id: Uuid,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
}

/// Validity of a token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Inactive,
    Expired,
    Exhausted,
}

impl QrToken {
    /// Inactive wins over expired, which wins over exhausted
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if !self.is_active {
            TokenState::Inactive
        } else if self.expires_at.map(|exp| now > exp).unwrap_or(false) {
            TokenState::Expired
        } else if self.max_uses.map(|max| self.current_uses >= max).unwrap_or(false) {
            TokenState::Exhausted
        } else {
            TokenState::Valid
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == TokenState::Valid
    }

    /// Uses left before the cap, `None` when uncapped
    pub fn remaining_uses(&self) -> Option<i32> {
        self.max_uses.map(|max| (max - self.current_uses).max(0))
    }
}

impl TokenState {
    fn rejection(&self) -> Option<ScanRejection> {
        match self {
            TokenState::Valid => None,
            TokenState::Inactive => Some(ScanRejection::InactiveToken),
            TokenState::Expired => Some(ScanRejection::ExpiredToken),
            TokenState::Exhausted => Some(ScanRejection::ExhaustedToken),
        }
    }
}

/// Content of the QR image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub activity_id: i32,
    #[serde(default)]
    pub activity_title: String,
    pub session_id: Uuid,
    /// Issue time, milliseconds since the epoch
    pub timestamp: i64,
    #[serde(default)]
    pub location: String,
    /// Expiry, milliseconds since the epoch
    pub expires_at: Option<i64>,
}

impl QrPayload {
    pub fn for_token(token: &QrToken, activity_title: &str, location: &str) -> Self {
        Self {
            kind: CHECKIN_PAYLOAD_TYPE.to_string(),
            activity_id: token.activity_id,
            activity_title: activity_title.to_string(),
            session_id: token.session_id,
            timestamp: token.created_at.timestamp_millis(),
            location: location.to_string(),
            expires_at: token.expires_at.map(|e| e.timestamp_millis()),
        }
    }

    /// Base64url form, suitable for links and compact QR images
    pub fn encode(&self) -> Result<String, AppError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode QR payload: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Accepts the raw JSON text or its base64url encoding
    pub fn decode(raw: &str) -> Result<Self, ScanRejection> {
        let raw = raw.trim();
        let payload: QrPayload = if raw.starts_with('{') {
            serde_json::from_str(raw).map_err(|_| ScanRejection::InvalidToken)?
        } else {
            let bytes = URL_SAFE_NO_PAD
                .decode(raw.trim_end_matches('='))
                .map_err(|_| ScanRejection::InvalidToken)?;
            serde_json::from_slice(&bytes).map_err(|_| ScanRejection::InvalidToken)?
        };
        if payload.kind != CHECKIN_PAYLOAD_TYPE {
            return Err(ScanRejection::InvalidToken);
        }
        Ok(payload)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// Everything the scan decision needs, read inside the scan transaction
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Activity the scanned payload claims to belong to
    pub claimed_activity_id: i32,
    pub token: Option<&'a QrToken>,
    pub enrollment: Option<EnrollmentStatus>,
    pub already_recorded: bool,
}

/// Applies the check-in rules in order: token belongs to the activity,
/// token is valid, user is enrolled, no attendance yet.
pub fn validate_scan(ctx: &ScanContext<'_>, now: DateTime<Utc>) -> Result<(), ScanRejection> {
    let token = match ctx.token {
        Some(t) if t.activity_id == ctx.claimed_activity_id => t,
        _ => return Err(ScanRejection::InvalidToken),
    };
    if let Some(rejection) = token.state(now).rejection() {
        return Err(rejection);
    }
    if !ctx.enrollment.map(|s| s.is_participating()).unwrap_or(false) {
        return Err(ScanRejection::NotEnrolled);
    }
    if ctx.already_recorded {
        return Err(ScanRejection::AlreadyCheckedIn);
    }
    Ok(())
}

/// Attendance record row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: i32,
    pub user_id: i32,
    pub activity_id: i32,
    pub qr_token_id: Option<i32>,
    pub status: AttendanceStatus,
    pub verification_method: VerificationMethod,
    pub marked_by: Option<i32>,
    pub notes: String,
    pub marked_at: DateTime<Utc>,
}

/// Attendance record joined with student and activity names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendanceDetail {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub student_name: String,
    pub activity_id: i32,
    pub activity_title: String,
    pub status: AttendanceStatus,
    pub verification_method: VerificationMethod,
    pub marked_by_name: Option<String>,
    pub notes: String,
    pub marked_at: DateTime<Utc>,
}

/// Scan audit row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScanLog {
    pub id: i64,
    pub qr_token_id: Option<i32>,
    pub activity_id: Option<i32>,
    pub user_id: i32,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub attendance_id: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scanned_at: DateTime<Utc>,
}

/// Data recorded for one scan attempt
#[derive(Debug, Clone, Default)]
pub struct ScanAudit {
    pub qr_token_id: Option<i32>,
    pub activity_id: Option<i32>,
    pub user_id: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Issue token request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct IssueQrToken {
    /// Hours until expiry, server default when omitted
    #[validate(range(min = 1, max = 168))]
    pub expires_in_hours: Option<i64>,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
}

/// Issued or current token with its payload
#[derive(Debug, Serialize, ToSchema)]
pub struct QrTokenResponse {
    pub token: QrToken,
    pub state: TokenState,
    pub payload: QrPayload,
    /// `payload` as base64url JSON
    pub encoded: String,
    pub remaining_uses: Option<i32>,
    pub checkin_opens_at: DateTime<Utc>,
    pub checkin_closes_at: DateTime<Utc>,
    pub checkin_window_open: bool,
}

/// Student scan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ScanRequest {
    /// Raw JSON payload or its base64url encoding
    #[validate(length(min = 1))]
    pub qr_data: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ScanRequest {
    /// Coordinates are kept only when both are present and in range
    pub fn coordinates(&self) -> (Option<f64>, Option<f64>) {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                (Some(lat), Some(lon))
            }
            _ => (None, None),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScanResponse {
    pub attendance: AttendanceRecord,
    pub activity_title: String,
    pub points_awarded: i32,
    pub message: String,
}

/// Manual attendance request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ManualAttendance {
    pub student_id: i32,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: String,
}

/// Attendance sheet figures for one activity
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceStats {
    pub enrolled: i64,
    pub attended: i64,
    /// Percentage of enrolled students that attended, 2 decimals
    pub attendance_rate: f64,
    pub qr_checkins: i64,
    pub manual_checkins: i64,
}

impl AttendanceStats {
    pub fn new(enrolled: i64, qr_checkins: i64, manual_checkins: i64) -> Self {
        let attended = qr_checkins + manual_checkins;
        Self {
            enrolled,
            attended,
            attendance_rate: percentage(attended, enrolled),
            qr_checkins,
            manual_checkins,
        }
    }
}

/// `part / whole` as a percentage rounded to 2 decimals, 0 for an empty whole
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 10000.0 / whole as f64).round() / 100.0
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceSheet {
    pub activity_id: i32,
    pub activity_title: String,
    pub records: Vec<AttendanceDetail>,
    pub stats: AttendanceStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(max_uses: Option<i32>, current_uses: i32) -> QrToken {
        let now = Utc::now();
        QrToken {
            id: 1,
            activity_id: 42,
            session_id: Uuid::new_v4(),
            created_by: Some(2),
            created_at: now,
            expires_at: Some(now + Duration::hours(2)),
            is_active: true,
            max_uses,
            current_uses,
        }
    }

    fn ctx(token: &QrToken) -> ScanContext<'_> {
        ScanContext {
            claimed_activity_id: 42,
            token: Some(token),
            enrollment: Some(EnrollmentStatus::Enrolled),
            already_recorded: false,
        }
    }

    #[test]
    fn test_single_use_token() {
        let now = Utc::now();
        let mut t = token(Some(1), 0);
        assert_eq!(validate_scan(&ctx(&t), now), Ok(()));
        t.current_uses = 1;
        assert_eq!(t.state(now), TokenState::Exhausted);
        assert_eq!(validate_scan(&ctx(&t), now), Err(ScanRejection::ExhaustedToken));
    }

    #[test]
    fn test_expired_token_invalid_regardless_of_uses() {
        let mut t = token(None, 0);
        t.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert_eq!(t.state(Utc::now()), TokenState::Expired);

        t.max_uses = Some(100);
        assert!(!t.is_valid(Utc::now()));
    }

    #[test]
    fn test_token_without_expiry_or_cap() {
        let mut t = token(None, 500);
        t.expires_at = None;
        assert!(t.is_valid(Utc::now() + Duration::days(365)));
        assert_eq!(t.remaining_uses(), None);
    }

    #[test]
    fn test_inactive_reported_first() {
        let mut t = token(Some(1), 1);
        t.is_active = false;
        t.expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(t.state(Utc::now()), TokenState::Inactive);
    }

    #[test]
    fn test_validation_order() {
        let now = Utc::now();
        let t = token(Some(5), 0);

        let mut c = ctx(&t);
        c.claimed_activity_id = 7;
        c.enrollment = None;
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::InvalidToken));

        let c = ScanContext { token: None, ..ctx(&t) };
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::InvalidToken));

        let c = ScanContext { enrollment: None, already_recorded: true, ..ctx(&t) };
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::NotEnrolled));

        let c = ScanContext {
            enrollment: Some(EnrollmentStatus::Withdrawn),
            ..ctx(&t)
        };
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::NotEnrolled));

        let c = ScanContext { already_recorded: true, ..ctx(&t) };
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::AlreadyCheckedIn));
    }

    #[test]
    fn test_second_scan_after_completion_is_already_checked_in() {
        let now = Utc::now();
        let t = token(Some(5), 1);
        let c = ScanContext {
            enrollment: Some(EnrollmentStatus::Completed),
            already_recorded: true,
            ..ctx(&t)
        };
        assert_eq!(validate_scan(&c, now), Err(ScanRejection::AlreadyCheckedIn));
    }

    #[test]
    fn test_payload_accepts_json_and_base64() {
        let t = token(Some(5), 0);
        let payload = QrPayload::for_token(&t, "Blood drive", "Gym");

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"activity_checkin\""));
        assert_eq!(QrPayload::decode(&json).unwrap(), payload);

        let encoded = payload.encode().unwrap();
        assert_eq!(QrPayload::decode(&encoded).unwrap(), payload);
        assert_eq!(
            payload.expires_at_utc().map(|e| e.timestamp()),
            t.expires_at.map(|e| e.timestamp())
        );
    }

    #[test]
    fn test_payload_rejects_garbage_and_wrong_type() {
        assert_eq!(QrPayload::decode("not a qr code"), Err(ScanRejection::InvalidToken));
        let other = format!(
            r#"{{"type":"wifi","activity_id":1,"session_id":"{}","timestamp":0}}"#,
            Uuid::new_v4()
        );
        assert_eq!(QrPayload::decode(&other), Err(ScanRejection::InvalidToken));
    }

    #[test]
    fn test_scan_coordinates_dropped_when_out_of_range() {
        let mut req = ScanRequest {
            qr_data: "{}".to_string(),
            latitude: Some(-1.29),
            longitude: Some(36.82),
        };
        assert_eq!(req.coordinates(), (Some(-1.29), Some(36.82)));
        req.latitude = Some(120.0);
        assert_eq!(req.coordinates(), (None, None));
        req.latitude = None;
        assert_eq!(req.coordinates(), (None, None));
    }

    #[test]
    fn test_attendance_rate() {
        let stats = AttendanceStats::new(3, 1, 1);
        assert_eq!(stats.attended, 2);
        assert_eq!(stats.attendance_rate, 66.67);
        assert_eq!(AttendanceStats::new(0, 0, 0).attendance_rate, 0.0);
    }
}
