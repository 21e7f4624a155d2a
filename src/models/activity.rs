//! Activity and category models
//!
//! Derived values (time based status, capacity, registration window) are
//! computed by pure functions taking `now` explicitly.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::enums::{ActivityStatus, Difficulty, EnrollmentStatus};
use crate::error::{AppError, ErrorCode};

/// QR check-in opens this long before the start time
pub const CHECKIN_OPENS_BEFORE_MINUTES: i64 = 30;
/// QR check-in closes this long after the start time
pub const CHECKIN_CLOSES_AFTER_HOURS: i64 = 2;

pub const MIN_POINTS_REWARD: i32 = 5;
pub const MAX_POINTS_REWARD: i32 = 50;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid colour regex"));

fn validate_color(color: &str) -> Result<(), ValidationError> {
    if HEX_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        let mut err = ValidationError::new("color");
        err.message = Some("Colour must be a #rrggbb hex value".into());
        Err(err)
    }
}

/// Activity category
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ActivityCategory {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    /// Number of activities in this category
    pub activity_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "validate_color"))]
    pub color: Option<String>,
}

/// Activity record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Activity {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category_id: Option<i32>,
    pub difficulty: Difficulty,
    pub max_participants: i32,
    pub requirements: String,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_volunteering: bool,
    pub is_featured: bool,
    pub certificate_available: bool,
    /// Points awarded on completion
    pub points_reward: i32,
    pub status: ActivityStatus,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Status derived from the clock. Draft and cancelled activities keep
    /// their stored status; everything else follows start/end times.
    pub fn dynamic_status(&self, now: DateTime<Utc>) -> ActivityStatus {
        match self.status {
            ActivityStatus::Draft | ActivityStatus::Cancelled => self.status,
            _ if self.start_time > now => ActivityStatus::Upcoming,
            _ if now <= self.end_time => ActivityStatus::Ongoing,
            _ => ActivityStatus::Completed,
        }
    }

    /// Published and not cancelled
    pub fn is_active(&self) -> bool {
        matches!(self.status, ActivityStatus::Upcoming | ActivityStatus::Ongoing)
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.start_time < now
    }

    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        match self.registration_deadline {
            Some(deadline) => now <= deadline,
            None => !self.is_past(now) && self.is_active(),
        }
    }

    pub fn available_spots(&self, participating: i64) -> i64 {
        (self.max_participants as i64 - participating).max(0)
    }

    pub fn is_full(&self, participating: i64) -> bool {
        participating >= self.max_participants as i64
    }

    /// Whole days until the start date, 0 once started
    pub fn days_until(&self, now: DateTime<Utc>) -> i64 {
        if self.is_past(now) {
            return 0;
        }
        (self.start_time.date_naive() - now.date_naive()).num_days()
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_seconds() as f64 / 3600.0
    }

    /// Check that a user may enroll given the current participant count.
    /// `existing` is the user's enrollment status for this activity, if any.
    pub fn check_can_enroll(
        &self,
        now: DateTime<Utc>,
        participating: i64,
        existing: Option<EnrollmentStatus>,
    ) -> Result<(), EnrollRefusal> {
        if existing.map(|s| s.is_participating()).unwrap_or(false) {
            return Err(EnrollRefusal::AlreadyEnrolled);
        }
        if self.is_past(now) {
            return Err(EnrollRefusal::Past);
        }
        if !self.is_active() {
            return Err(EnrollRefusal::NotOpen);
        }
        if !self.is_registration_open(now) {
            return Err(EnrollRefusal::RegistrationClosed);
        }
        if self.is_full(participating) {
            return Err(EnrollRefusal::Full);
        }
        Ok(())
    }

    /// Window in which QR check-in is expected to happen
    pub fn checkin_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start_time - Duration::minutes(CHECKIN_OPENS_BEFORE_MINUTES),
            self.start_time + Duration::hours(CHECKIN_CLOSES_AFTER_HOURS),
        )
    }

    pub fn is_checkin_window_open(&self, now: DateTime<Utc>) -> bool {
        let (opens, closes) = self.checkin_window();
        opens <= now && now <= closes
    }
}

/// Why an enrollment attempt is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollRefusal {
    AlreadyEnrolled,
    Past,
    NotOpen,
    RegistrationClosed,
    Full,
}

impl EnrollRefusal {
    pub fn message(&self) -> &'static str {
        match self {
            EnrollRefusal::AlreadyEnrolled => "Already enrolled in this activity",
            EnrollRefusal::Past => "Cannot enroll in past activity",
            EnrollRefusal::NotOpen => "Activity is not open for enrollment",
            EnrollRefusal::RegistrationClosed => "Registration deadline has passed",
            EnrollRefusal::Full => "Activity is full",
        }
    }
}

impl From<EnrollRefusal> for AppError {
    fn from(refusal: EnrollRefusal) -> Self {
        let message = refusal.message().to_string();
        match refusal {
            EnrollRefusal::AlreadyEnrolled => AppError::Conflict(message),
            EnrollRefusal::Full => AppError::BusinessRule(ErrorCode::ActivityFull, message),
            _ => AppError::BusinessRule(ErrorCode::EnrollmentClosed, message),
        }
    }
}

/// Activity with participation figures and the caller's enrollment, for listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivitySummary {
    #[serde(flatten)]
    pub activity: Activity,
    pub category_name: Option<String>,
    pub created_by_name: Option<String>,
    /// Status derived from the clock
    pub current_status: ActivityStatus,
    pub enrolled_count: i64,
    pub available_spots: i64,
    pub is_full: bool,
    pub is_past: bool,
    pub is_registration_open: bool,
    pub days_until: i64,
    pub duration_hours: f64,
    pub enrollment_status: Option<EnrollmentStatus>,
    pub can_enroll: bool,
}

impl ActivitySummary {
    pub fn build(
        activity: Activity,
        category_name: Option<String>,
        created_by_name: Option<String>,
        enrolled_count: i64,
        enrollment_status: Option<EnrollmentStatus>,
        now: DateTime<Utc>,
    ) -> Self {
        let can_enroll = activity
            .check_can_enroll(now, enrolled_count, enrollment_status)
            .is_ok();
        Self {
            category_name,
            created_by_name,
            current_status: activity.dynamic_status(now),
            available_spots: activity.available_spots(enrolled_count),
            is_full: activity.is_full(enrolled_count),
            is_past: activity.is_past(now),
            is_registration_open: activity.is_registration_open(now),
            days_until: activity.days_until(now),
            duration_hours: activity.duration_hours(),
            enrolled_count,
            enrollment_status,
            can_enroll,
            activity,
        }
    }
}

/// Create activity request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateActivity {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub location: String,
    pub category_id: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1))]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[validate(url)]
    pub virtual_link: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_volunteering: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub certificate_available: bool,
    #[validate(range(min = 5, max = 50))]
    pub points_reward: Option<i32>,
}

/// Update activity request (all fields optional)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateActivity {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub category_id: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1))]
    pub max_participants: Option<i32>,
    pub requirements: Option<String>,
    pub is_virtual: Option<bool>,
    #[validate(url)]
    pub virtual_link: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub is_volunteering: Option<bool>,
    pub is_featured: Option<bool>,
    pub certificate_available: Option<bool>,
    #[validate(range(min = 5, max = 50))]
    pub points_reward: Option<i32>,
}

impl UpdateActivity {
    /// Apply the provided fields on top of an existing activity
    pub fn apply_to(&self, activity: &mut Activity) {
        if let Some(ref v) = self.title {
            activity.title = v.clone();
        }
        if let Some(ref v) = self.description {
            activity.description = v.clone();
        }
        if let Some(ref v) = self.location {
            activity.location = v.clone();
        }
        if self.category_id.is_some() {
            activity.category_id = self.category_id;
        }
        if let Some(v) = self.difficulty {
            activity.difficulty = v;
        }
        if let Some(v) = self.max_participants {
            activity.max_participants = v;
        }
        if let Some(ref v) = self.requirements {
            activity.requirements = v.clone();
        }
        if let Some(v) = self.is_virtual {
            activity.is_virtual = v;
        }
        if self.virtual_link.is_some() {
            activity.virtual_link = self.virtual_link.clone();
        }
        if let Some(v) = self.start_time {
            activity.start_time = v;
        }
        if let Some(v) = self.end_time {
            activity.end_time = v;
        }
        if self.registration_deadline.is_some() {
            activity.registration_deadline = self.registration_deadline;
        }
        if let Some(v) = self.is_volunteering {
            activity.is_volunteering = v;
        }
        if let Some(v) = self.is_featured {
            activity.is_featured = v;
        }
        if let Some(v) = self.certificate_available {
            activity.certificate_available = v;
        }
        if let Some(v) = self.points_reward {
            activity.points_reward = v;
        }
    }
}

/// Cross-field rules shared by create and update
pub fn check_schedule(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    registration_deadline: Option<DateTime<Utc>>,
    is_virtual: bool,
    virtual_link: Option<&str>,
) -> Result<(), AppError> {
    if end_time <= start_time {
        return Err(AppError::Validation("End time must be after start time".to_string()));
    }
    if let Some(deadline) = registration_deadline {
        if deadline >= start_time {
            return Err(AppError::Validation(
                "Registration deadline must be before activity start time".to_string(),
            ));
        }
    }
    if is_virtual && virtual_link.map(str::is_empty).unwrap_or(true) {
        return Err(AppError::Validation(
            "Virtual link is required for virtual activities".to_string(),
        ));
    }
    Ok(())
}

/// Query parameters for activity listings
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ActivityQuery {
    /// Filter by stored status
    pub status: Option<ActivityStatus>,
    pub is_volunteering: Option<bool>,
    pub category_id: Option<i32>,
    /// Search in title, description and location
    pub search: Option<String>,
    /// Only activities starting after now
    pub upcoming_only: Option<bool>,
    /// Restrict to activities created by this user
    pub created_by: Option<i32>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, 0, 0).unwrap()
    }

    fn activity(status: ActivityStatus) -> Activity {
        Activity {
            id: 1,
            title: "Campus clean-up".to_string(),
            description: String::new(),
            location: "Main quad".to_string(),
            category_id: None,
            difficulty: Difficulty::Beginner,
            max_participants: 2,
            requirements: String::new(),
            is_virtual: false,
            virtual_link: None,
            start_time: at(10),
            end_time: at(12),
            registration_deadline: None,
            is_volunteering: true,
            is_featured: false,
            certificate_available: false,
            points_reward: 10,
            status,
            created_by: Some(3),
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn test_dynamic_status_follows_clock() {
        let a = activity(ActivityStatus::Upcoming);
        assert_eq!(a.dynamic_status(at(9)), ActivityStatus::Upcoming);
        assert_eq!(a.dynamic_status(at(10)), ActivityStatus::Ongoing);
        assert_eq!(a.dynamic_status(at(12)), ActivityStatus::Ongoing);
        assert_eq!(a.dynamic_status(at(13)), ActivityStatus::Completed);
    }

    #[test]
    fn test_draft_and_cancelled_are_sticky() {
        assert_eq!(activity(ActivityStatus::Draft).dynamic_status(at(13)), ActivityStatus::Draft);
        assert_eq!(
            activity(ActivityStatus::Cancelled).dynamic_status(at(9)),
            ActivityStatus::Cancelled
        );
    }

    #[test]
    fn test_capacity() {
        let a = activity(ActivityStatus::Upcoming);
        assert_eq!(a.available_spots(0), 2);
        assert_eq!(a.available_spots(5), 0);
        assert!(!a.is_full(1));
        assert!(a.is_full(2));
    }

    #[test]
    fn test_enroll_checks() {
        let a = activity(ActivityStatus::Upcoming);
        assert_eq!(a.check_can_enroll(at(8), 0, None), Ok(()));
        assert_eq!(
            a.check_can_enroll(at(8), 0, Some(EnrollmentStatus::Withdrawn)),
            Ok(())
        );
        assert_eq!(
            a.check_can_enroll(at(8), 0, Some(EnrollmentStatus::Completed)),
            Err(EnrollRefusal::AlreadyEnrolled)
        );
        assert_eq!(a.check_can_enroll(at(11), 0, None), Err(EnrollRefusal::Past));
        assert_eq!(a.check_can_enroll(at(8), 2, None), Err(EnrollRefusal::Full));
        assert_eq!(
            activity(ActivityStatus::Draft).check_can_enroll(at(8), 0, None),
            Err(EnrollRefusal::NotOpen)
        );
    }

    #[test]
    fn test_registration_deadline() {
        let mut a = activity(ActivityStatus::Upcoming);
        a.registration_deadline = Some(at(6));
        assert!(a.is_registration_open(at(6)));
        assert!(!a.is_registration_open(at(7)));
        assert_eq!(
            a.check_can_enroll(at(7), 0, None),
            Err(EnrollRefusal::RegistrationClosed)
        );
    }

    #[test]
    fn test_days_and_duration() {
        let a = activity(ActivityStatus::Upcoming);
        let two_days_before = at(10) - Duration::days(2);
        assert_eq!(a.days_until(two_days_before), 2);
        assert_eq!(a.days_until(at(11)), 0);
        assert!((a.duration_hours() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_checkin_window() {
        let a = activity(ActivityStatus::Upcoming);
        assert!(!a.is_checkin_window_open(at(9)));
        assert!(a.is_checkin_window_open(at(10) - Duration::minutes(30)));
        assert!(a.is_checkin_window_open(at(12)));
        assert!(!a.is_checkin_window_open(at(12) + Duration::seconds(1)));
    }

    #[test]
    fn test_schedule_rules() {
        assert!(check_schedule(at(10), at(12), Some(at(9)), false, None).is_ok());
        assert!(check_schedule(at(12), at(10), None, false, None).is_err());
        assert!(check_schedule(at(10), at(12), Some(at(10)), false, None).is_err());
        assert!(check_schedule(at(10), at(12), None, true, None).is_err());
        assert!(check_schedule(at(10), at(12), None, true, Some("https://meet.example/x")).is_ok());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let mut a = activity(ActivityStatus::Upcoming);
        let update = UpdateActivity {
            title: Some("River clean-up".to_string()),
            points_reward: Some(20),
            ..Default::default()
        };
        update.apply_to(&mut a);
        assert_eq!(a.title, "River clean-up");
        assert_eq!(a.points_reward, 20);
        assert_eq!(a.location, "Main quad");
    }

    #[test]
    fn test_summary_flags() {
        let summary = ActivitySummary::build(
            activity(ActivityStatus::Upcoming),
            None,
            Some("Coordinator".to_string()),
            1,
            None,
            at(8),
        );
        assert!(summary.can_enroll);
        assert_eq!(summary.available_spots, 1);
        assert_eq!(summary.current_status, ActivityStatus::Upcoming);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["title"], "Campus clean-up");
        assert_eq!(json["enrolled_count"], 1);
    }
}
