//! Enrollment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::{ActivityStatus, EnrollmentStatus};

/// Enrollment row, unique per (user, activity)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub id: i32,
    pub user_id: i32,
    pub activity_id: i32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Activity points credited on completion, 0 until then
    pub points_awarded: i32,
}

/// Enrollment joined with its activity, for student views
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EnrollmentDetail {
    pub id: i32,
    pub activity_id: i32,
    pub activity_title: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub activity_status: ActivityStatus,
    pub is_volunteering: bool,
    pub points_reward: i32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub points_awarded: i32,
    /// Whether an attendance record exists
    pub attended: bool,
}

/// Enrolled student, for participant lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Participant {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub attended: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollResponse {
    pub enrollment: Enrollment,
    pub message: String,
}
