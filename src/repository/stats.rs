//! Aggregate queries for dashboards and reports

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::stats::{AdminTotals, CoordinatorStats, InstructorStats, ReportOverview, RoleCount, StudentOverview},
};

#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn instructor(&self) -> AppResult<InstructorStats> {
        let stats = sqlx::query_as::<_, InstructorStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM activities WHERE status <> 'draft') AS activities_monitored,
                (SELECT COUNT(DISTINCT user_id) FROM enrollments
                  WHERE status IN ('enrolled', 'completed')) AS students_tracked,
                (SELECT COUNT(*) FROM volunteer_applications WHERE status = 'pending') AS pending_applications,
                (SELECT COALESCE(SUM(hours_completed), 0)::FLOAT8 FROM volunteer_applications
                  WHERE status IN ('active', 'completed')) AS verified_hours,
                (SELECT COUNT(*) FROM attendance_records) AS attendance_marked
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Students with participation totals, optionally filtered by department or name
    pub async fn students(&self, department: Option<&str>, search: Option<&str>) -> AppResult<Vec<StudentOverview>> {
        let search = search
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim().to_lowercase()));
        let rows = sqlx::query_as::<_, StudentOverview>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.department,
                   COUNT(e.id) FILTER (WHERE e.status IN ('enrolled', 'completed')) AS enrollments,
                   COUNT(e.id) FILTER (WHERE e.status = 'completed') AS completed,
                   COALESCE(SUM(e.points_awarded), 0)::BIGINT AS total_points
            FROM users u
            LEFT JOIN enrollments e ON e.user_id = u.id
            WHERE u.role = 'student' AND u.is_active
              AND ($1::TEXT IS NULL OR u.department = $1)
              AND ($2::TEXT IS NULL OR LOWER(u.username) LIKE $2
                   OR LOWER(u.first_name) LIKE $2 OR LOWER(u.last_name) LIKE $2)
            GROUP BY u.id
            ORDER BY u.last_name, u.first_name, u.username
            "#,
        )
        .bind(department)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn ensure_student(&self, id: i32) -> AppResult<()> {
        let is_student: Option<bool> = sqlx::query_scalar("SELECT role = 'student' FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if is_student.unwrap_or(false) {
            Ok(())
        } else {
            Err(AppError::NotFound("Student not found".to_string()))
        }
    }

    pub async fn coordinator(&self, coordinator_id: i32, month_start: DateTime<Utc>) -> AppResult<CoordinatorStats> {
        let stats = sqlx::query_as::<_, CoordinatorStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM activities WHERE created_by = $1) AS my_activities,
                (SELECT COUNT(*) FROM enrollments e JOIN activities a ON a.id = e.activity_id
                  WHERE a.created_by = $1 AND e.status IN ('enrolled', 'completed')) AS total_enrollments,
                (SELECT COUNT(*) FROM activities
                  WHERE created_by = $1 AND created_at >= $2) AS activities_this_month,
                (SELECT COUNT(DISTINCT va.user_id) FROM volunteer_applications va
                  JOIN volunteer_opportunities o ON o.id = va.opportunity_id
                  JOIN activities a ON a.id = o.activity_id
                  WHERE a.created_by = $1 AND va.status IN ('approved', 'active')) AS active_volunteers,
                (SELECT COUNT(*) FROM activities
                  WHERE created_by = $1 AND status = 'draft') AS draft_activities,
                (SELECT COUNT(*) FROM volunteer_applications va
                  JOIN volunteer_opportunities o ON o.id = va.opportunity_id
                  JOIN activities a ON a.id = o.activity_id
                  WHERE a.created_by = $1 AND va.status = 'pending') AS pending_applications
            "#,
        )
        .bind(coordinator_id)
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Totals over activities created by `created_by`, or all when `None`
    pub async fn report_overview(&self, created_by: Option<i32>) -> AppResult<ReportOverview> {
        let overview = sqlx::query_as::<_, ReportOverview>(
            r#"
            WITH scope AS (
                SELECT id FROM activities WHERE ($1::INT IS NULL OR created_by = $1)
            )
            SELECT
                (SELECT COUNT(*) FROM scope) AS total_activities,
                (SELECT COUNT(*) FROM enrollments
                  WHERE activity_id IN (SELECT id FROM scope)
                    AND status IN ('enrolled', 'completed')) AS total_enrollments,
                (SELECT COUNT(*) FROM attendance_records
                  WHERE activity_id IN (SELECT id FROM scope)) AS total_attendance,
                (SELECT COALESCE(SUM(points_awarded), 0)::BIGINT FROM enrollments
                  WHERE activity_id IN (SELECT id FROM scope)) AS total_points_awarded,
                (SELECT COALESCE(SUM(va.hours_completed), 0)::FLOAT8 FROM volunteer_applications va
                  JOIN volunteer_opportunities o ON o.id = va.opportunity_id
                  WHERE o.activity_id IN (SELECT id FROM scope)) AS volunteer_hours
            "#,
        )
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(overview)
    }

    /// (activities created, enrollments made) in `[start, end)`
    pub async fn month_counts(
        &self,
        created_by: Option<i32>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM activities
                  WHERE ($1::INT IS NULL OR created_by = $1) AND created_at >= $2 AND created_at < $3),
                (SELECT COUNT(*) FROM enrollments e JOIN activities a ON a.id = e.activity_id
                  WHERE ($1::INT IS NULL OR a.created_by = $1) AND e.enrolled_at >= $2 AND e.enrolled_at < $3)
            "#,
        )
        .bind(created_by)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn admin_totals(&self, month_start: DateTime<Utc>) -> AppResult<AdminTotals> {
        let totals = sqlx::query_as::<_, AdminTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM users WHERE date_joined >= $1) AS new_users_this_month,
                (SELECT COUNT(*) FROM activities) AS total_activities,
                (SELECT COUNT(*) FROM activities WHERE status <> 'draft') AS published_activities,
                (SELECT COUNT(*) FROM enrollments) AS total_enrollments,
                (SELECT COUNT(*) FROM attendance_records) AS total_attendance,
                (SELECT COUNT(*) FROM volunteer_applications WHERE status = 'pending') AS pending_applications,
                (SELECT COUNT(*) FROM notifications) AS total_notifications
            "#,
        )
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn users_by_role(&self) -> AppResult<Vec<RoleCount>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(role, count)| RoleCount { role, count })
            .collect())
    }
}
