//! Volunteer opportunities and applications

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::activity::Activity;
use super::enums::ApplicationStatus;

/// Opportunity derived from a volunteering activity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct VolunteerOpportunity {
    pub id: i32,
    pub activity_id: i32,
    pub title: String,
    pub description: String,
    pub requirements: String,
    /// Human readable, e.g. "3 hours"
    pub time_commitment: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_volunteers: i32,
    pub coordinator_id: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Opportunity fields computed from its activity
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityDraft {
    pub activity_id: i32,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub time_commitment: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_volunteers: i32,
    pub coordinator_id: Option<i32>,
}

impl OpportunityDraft {
    /// `coordinator_id` is the activity creator when staff, else the syncing user
    pub fn from_activity(activity: &Activity, coordinator_id: Option<i32>) -> Self {
        Self {
            activity_id: activity.id,
            title: activity.title.clone(),
            description: activity.description.clone(),
            requirements: activity.requirements.clone(),
            time_commitment: format!("{:.0} hours", activity.duration_hours()),
            start_date: activity.start_time.date_naive(),
            end_date: Some(activity.end_time.date_naive()),
            max_volunteers: activity.max_participants,
            coordinator_id,
        }
    }
}

/// Opportunity with spot counts and the caller's application
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OpportunitySummary {
    #[serde(flatten)]
    pub opportunity: VolunteerOpportunity,
    pub coordinator_name: Option<String>,
    pub applications_count: i64,
    pub spots_remaining: i64,
    pub application_status: Option<ApplicationStatus>,
    pub can_apply: bool,
}

impl OpportunitySummary {
    pub fn build(
        opportunity: VolunteerOpportunity,
        coordinator_name: Option<String>,
        holding_spots: i64,
        application_status: Option<ApplicationStatus>,
    ) -> Self {
        let spots_remaining = spots_remaining(opportunity.max_volunteers, holding_spots);
        let can_apply =
            opportunity.is_active && spots_remaining > 0 && application_status.is_none();
        Self {
            opportunity,
            coordinator_name,
            applications_count: holding_spots,
            spots_remaining,
            application_status,
            can_apply,
        }
    }
}

pub fn spots_remaining(max_volunteers: i32, holding_spots: i64) -> i64 {
    (max_volunteers as i64 - holding_spots).max(0)
}

/// Application row, unique per (user, opportunity)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct VolunteerApplication {
    pub id: i32,
    pub user_id: i32,
    pub opportunity_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_number: String,
    pub phone_primary: String,
    pub phone_secondary: String,
    pub department: String,
    pub academic_year: String,
    pub motivation: String,
    pub skills_experience: String,
    pub availability: String,
    pub status: ApplicationStatus,
    pub hours_completed: f64,
    pub reviewed_by: Option<i32>,
    pub review_notes: String,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application joined with opportunity and activity, for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ApplicationDetail {
    pub id: i32,
    pub user_id: i32,
    pub applicant_username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_number: String,
    pub department: String,
    pub academic_year: String,
    pub motivation: String,
    pub status: ApplicationStatus,
    pub hours_completed: f64,
    pub review_notes: String,
    pub submitted_at: DateTime<Utc>,
    pub opportunity_id: i32,
    pub opportunity_title: String,
    pub activity_id: i32,
    pub activity_start: DateTime<Utc>,
}

/// Application form
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApplication {
    pub opportunity_id: i32,
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 20))]
    pub student_number: String,
    #[validate(length(min = 7, max = 15))]
    pub phone_primary: String,
    #[serde(default)]
    #[validate(length(max = 15))]
    pub phone_secondary: String,
    #[validate(length(min = 1, max = 100))]
    pub department: String,
    #[validate(length(min = 1, max = 50))]
    pub academic_year: String,
    #[validate(length(min = 1))]
    pub motivation: String,
    #[serde(default)]
    pub skills_experience: String,
    #[validate(length(min = 1))]
    pub availability: String,
}

/// Approve or reject
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ReviewApplication {
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogHours {
    /// Hours to add to the application's total
    #[validate(range(min = 0.25, max = 24.0))]
    pub hours: f64,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub opportunity_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncReport {
    pub created: i64,
    pub updated: i64,
    pub opportunities: Vec<VolunteerOpportunity>,
}

/// Student volunteering figures
#[derive(Debug, Clone, Default, Serialize, FromRow, ToSchema)]
pub struct VolunteerStats {
    pub total_applications: i64,
    pub pending: i64,
    pub approved: i64,
    pub active: i64,
    pub completed: i64,
    pub rejected: i64,
    pub total_hours: f64,
}

/// Hours can be logged only on approved or active applications
pub fn can_log_hours(status: ApplicationStatus) -> bool {
    matches!(status, ApplicationStatus::Approved | ApplicationStatus::Active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ActivityStatus, Difficulty};
    use chrono::TimeZone;

    fn opportunity(max: i32, active: bool) -> VolunteerOpportunity {
        let now = Utc::now();
        VolunteerOpportunity {
            id: 1,
            activity_id: 9,
            title: "Food bank".to_string(),
            description: String::new(),
            requirements: String::new(),
            time_commitment: "3 hours".to_string(),
            start_date: now.date_naive(),
            end_date: None,
            max_volunteers: max,
            coordinator_id: Some(2),
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_draft_from_activity() {
        let start = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let activity = Activity {
            id: 9,
            title: "Food bank".to_string(),
            description: "Sort donations".to_string(),
            location: "Hall B".to_string(),
            category_id: None,
            difficulty: Difficulty::Beginner,
            max_participants: 12,
            requirements: "Closed shoes".to_string(),
            is_virtual: false,
            virtual_link: None,
            start_time: start,
            end_time: start + chrono::Duration::minutes(180),
            registration_deadline: None,
            is_volunteering: true,
            is_featured: false,
            certificate_available: true,
            points_reward: 15,
            status: ActivityStatus::Upcoming,
            created_by: Some(4),
            created_at: start,
            updated_at: start,
        };
        let draft = OpportunityDraft::from_activity(&activity, Some(4));
        assert_eq!(draft.time_commitment, "3 hours");
        assert_eq!(draft.max_volunteers, 12);
        assert_eq!(draft.start_date, start.date_naive());
        assert_eq!(draft.coordinator_id, Some(4));
    }

    #[test]
    fn test_can_apply() {
        assert!(OpportunitySummary::build(opportunity(2, true), None, 1, None).can_apply);

        let full = OpportunitySummary::build(opportunity(2, true), None, 3, None);
        assert!(!full.can_apply);
        assert_eq!(full.spots_remaining, 0);

        let applied =
            OpportunitySummary::build(opportunity(2, true), None, 0, Some(ApplicationStatus::Pending));
        assert!(!applied.can_apply);

        assert!(!OpportunitySummary::build(opportunity(2, false), None, 0, None).can_apply);
    }

    #[test]
    fn test_hours_only_on_running_applications() {
        assert!(can_log_hours(ApplicationStatus::Approved));
        assert!(can_log_hours(ApplicationStatus::Active));
        assert!(!can_log_hours(ApplicationStatus::Pending));
        assert!(!can_log_hours(ApplicationStatus::Completed));
    }
}
