//! Dashboard and report figures

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::activity::ActivitySummary;
use super::enrollment::EnrollmentDetail;
use super::user::UserShort;
use super::volunteer::VolunteerStats;

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentDashboard {
    pub user: UserShort,
    pub activities_joined: i64,
    pub activities_completed: i64,
    pub total_points: i64,
    pub volunteer_hours: f64,
    pub volunteer: VolunteerStats,
    pub enrolled_activities: Vec<EnrollmentDetail>,
    pub recent_activities: Vec<EnrollmentDetail>,
    pub upcoming_activities: Vec<ActivitySummary>,
}

#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
pub struct InstructorStats {
    pub activities_monitored: i64,
    pub students_tracked: i64,
    pub pending_applications: i64,
    pub verified_hours: f64,
    pub attendance_marked: i64,
}

/// Student row in instructor listings
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct StudentOverview {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
    pub enrollments: i64,
    pub completed: i64,
    pub total_points: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentParticipation {
    pub student: UserShort,
    pub enrollments: Vec<EnrollmentDetail>,
    pub total_points: i64,
    pub attendance_count: i64,
    pub volunteer: VolunteerStats,
}

#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
pub struct CoordinatorStats {
    pub my_activities: i64,
    pub total_enrollments: i64,
    pub activities_this_month: i64,
    pub active_volunteers: i64,
    pub draft_activities: i64,
    pub pending_applications: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyCount {
    /// `YYYY-MM`
    pub month: String,
    pub activities: i64,
    pub enrollments: i64,
}

#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
pub struct ReportOverview {
    pub total_activities: i64,
    pub total_enrollments: i64,
    pub total_attendance: i64,
    pub total_points_awarded: i64,
    pub volunteer_hours: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoordinatorReport {
    pub overview: ReportOverview,
    pub attendance_rate: f64,
    /// Counts by status derived from the clock
    pub by_status: Vec<StatusCount>,
    /// Last six months, oldest first
    pub monthly_trend: Vec<MonthlyCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

#[derive(Debug, Default, Serialize, FromRow, ToSchema)]
pub struct AdminTotals {
    pub total_users: i64,
    pub active_users: i64,
    pub new_users_this_month: i64,
    pub total_activities: i64,
    pub published_activities: i64,
    pub total_enrollments: i64,
    pub total_attendance: i64,
    pub pending_applications: i64,
    pub total_notifications: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    #[serde(flatten)]
    pub totals: AdminTotals,
    pub users_by_role: Vec<RoleCount>,
}

/// First instant of the month containing `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    month_floor(now.year(), now.month())
}

fn month_floor(year: i32, month: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// `[start, end)` bounds of the `count` months ending with the month of `now`,
/// oldest first
pub fn month_ranges(now: DateTime<Utc>, count: u32) -> Vec<(String, DateTime<Utc>, DateTime<Utc>)> {
    let current = now.year() * 12 + now.month0() as i32;
    (0..count as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            let (year, month0) = (index.div_euclid(12), index.rem_euclid(12) as u32);
            let next = index + 1;
            let start = month_floor(year, month0 + 1);
            let end = month_floor(next.div_euclid(12), next.rem_euclid(12) as u32 + 1);
            (format!("{:04}-{:02}", year, month0 + 1), start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_ranges_cross_year() {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 8, 30, 0).unwrap();
        let ranges = month_ranges(now, 6);
        let labels: Vec<&str> = ranges.iter().map(|(l, _, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            ["2025-09", "2025-10", "2025-11", "2025-12", "2026-01", "2026-02"]
        );
        let (_, start, end) = &ranges[3];
        assert_eq!(*start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(*end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 59).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap());
    }
}
