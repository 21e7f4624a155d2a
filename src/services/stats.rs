//! Dashboards and reports

use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        activity::Activity,
        attendance::percentage,
        enums::{ActivityStatus, EnrollmentStatus},
        stats::{
            month_ranges, month_start, AdminDashboard, CoordinatorReport, CoordinatorStats, InstructorStats,
            MonthlyCount, StatusCount, StudentDashboard, StudentOverview, StudentParticipation,
        },
        user::UserClaims,
    },
    repository::Repository,
};

/// Length of the monthly trend in coordinator reports
const TREND_MONTHS: u32 = 6;
const DASHBOARD_LIST_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn student_dashboard(&self, user_id: i32) -> AppResult<StudentDashboard> {
        let now = Utc::now();
        let user = self.repository.users.get_short(user_id).await?;
        let (joined, completed, points) = self.repository.enrollments.totals_for_user(user_id).await?;
        let volunteer = self.repository.volunteering.stats_for_user(user_id).await?;
        let enrolled = self
            .repository
            .enrollments
            .for_user(user_id, &[EnrollmentStatus::Enrolled])
            .await?;
        let recent = self
            .repository
            .enrollments
            .recent_for_user(user_id, now, DASHBOARD_LIST_LIMIT)
            .await?;
        let upcoming = self
            .repository
            .activities
            .upcoming(user_id, now, DASHBOARD_LIST_LIMIT)
            .await?;

        Ok(StudentDashboard {
            user,
            activities_joined: joined,
            activities_completed: completed,
            total_points: points,
            volunteer_hours: volunteer.total_hours,
            volunteer,
            enrolled_activities: enrolled,
            recent_activities: recent,
            upcoming_activities: upcoming,
        })
    }

    pub async fn instructor(&self) -> AppResult<InstructorStats> {
        self.repository.stats.instructor().await
    }

    pub async fn students(&self, department: Option<&str>, search: Option<&str>) -> AppResult<Vec<StudentOverview>> {
        self.repository.stats.students(department, search).await
    }

    /// Everything a student has taken part in
    pub async fn participation(&self, student_id: i32) -> AppResult<StudentParticipation> {
        self.repository.stats.ensure_student(student_id).await?;

        let student = self.repository.users.get_short(student_id).await?;
        let enrollments = self.repository.enrollments.for_user(student_id, &[]).await?;
        let (_, _, total_points) = self.repository.enrollments.totals_for_user(student_id).await?;
        let attendance_count = self.repository.attendance.count_for_user(student_id).await?;
        let volunteer = self.repository.volunteering.stats_for_user(student_id).await?;

        Ok(StudentParticipation {
            student,
            enrollments,
            total_points,
            attendance_count,
            volunteer,
        })
    }

    pub async fn coordinator(&self, coordinator: &UserClaims) -> AppResult<CoordinatorStats> {
        self.repository
            .stats
            .coordinator(coordinator.user_id, month_start(Utc::now()))
            .await
    }

    /// Report over the coordinator's own activities; admins see every activity
    pub async fn coordinator_report(&self, caller: &UserClaims) -> AppResult<CoordinatorReport> {
        let now = Utc::now();
        let scope = if caller.is_admin() { None } else { Some(caller.user_id) };

        let overview = self.repository.stats.report_overview(scope).await?;
        let activities = self.repository.activities.all_created_by(scope).await?;

        let mut monthly_trend = Vec::with_capacity(TREND_MONTHS as usize);
        for (month, start, end) in month_ranges(now, TREND_MONTHS) {
            let (activities, enrollments) = self.repository.stats.month_counts(scope, start, end).await?;
            monthly_trend.push(MonthlyCount {
                month,
                activities,
                enrollments,
            });
        }

        Ok(CoordinatorReport {
            attendance_rate: percentage(overview.total_attendance, overview.total_enrollments),
            by_status: status_breakdown(&activities, now),
            monthly_trend,
            overview,
        })
    }

    pub async fn admin_dashboard(&self) -> AppResult<AdminDashboard> {
        let totals = self.repository.stats.admin_totals(month_start(Utc::now())).await?;
        let users_by_role = self.repository.stats.users_by_role().await?;
        Ok(AdminDashboard { totals, users_by_role })
    }
}

/// Activity counts per status derived from the clock, every status listed
fn status_breakdown(activities: &[Activity], now: DateTime<Utc>) -> Vec<StatusCount> {
    ActivityStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: status.to_string(),
            count: activities
                .iter()
                .filter(|a| a.dynamic_status(now) == *status)
                .count() as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Difficulty;
    use chrono::{Duration, TimeZone};

    fn activity(id: i32, status: ActivityStatus, start: DateTime<Utc>) -> Activity {
        Activity {
            id,
            title: format!("Activity {}", id),
            description: String::new(),
            location: String::new(),
            category_id: None,
            difficulty: Difficulty::Beginner,
            max_participants: 10,
            requirements: String::new(),
            is_virtual: false,
            virtual_link: None,
            start_time: start,
            end_time: start + Duration::hours(2),
            registration_deadline: None,
            is_volunteering: false,
            is_featured: false,
            certificate_available: false,
            points_reward: 10,
            status,
            created_by: Some(2),
            created_at: start - Duration::days(30),
            updated_at: start - Duration::days(30),
        }
    }

    #[test]
    fn test_status_breakdown_uses_clock() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let activities = vec![
            // Stored as upcoming but already over
            activity(1, ActivityStatus::Upcoming, now - Duration::days(3)),
            activity(2, ActivityStatus::Upcoming, now + Duration::days(3)),
            activity(3, ActivityStatus::Upcoming, now - Duration::hours(1)),
            activity(4, ActivityStatus::Draft, now - Duration::days(3)),
            activity(5, ActivityStatus::Cancelled, now + Duration::days(1)),
        ];

        let counts: Vec<(String, i64)> = status_breakdown(&activities, now)
            .into_iter()
            .map(|c| (c.status, c.count))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("draft".to_string(), 1),
                ("upcoming".to_string(), 1),
                ("ongoing".to_string(), 1),
                ("completed".to_string(), 1),
                ("cancelled".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_status_breakdown_empty() {
        let counts = status_breakdown(&[], Utc::now());
        assert_eq!(counts.len(), ActivityStatus::ALL.len());
        assert!(counts.iter().all(|c| c.count == 0));
    }
}
