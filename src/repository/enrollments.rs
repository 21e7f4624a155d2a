//! Enrollments repository

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{Activity, EnrollRefusal},
        enrollment::{Enrollment, EnrollmentDetail, Participant},
        enums::EnrollmentStatus,
    },
};

const DETAIL_SELECT: &str = r#"
    SELECT e.id, e.activity_id, a.title AS activity_title, a.location,
           a.start_time, a.end_time, a.status AS activity_status,
           a.is_volunteering, a.points_reward,
           e.status, e.enrolled_at, e.completed_at, e.points_awarded,
           EXISTS(SELECT 1 FROM attendance_records r
                   WHERE r.user_id = e.user_id AND r.activity_id = e.activity_id) AS attended
    FROM enrollments e
    JOIN activities a ON a.id = e.activity_id
"#;

#[derive(Clone)]
pub struct EnrollmentsRepository {
    pool: Pool<Postgres>,
}

impl EnrollmentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i32, activity_id: i32) -> AppResult<Option<Enrollment>> {
        let row = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = $1 AND activity_id = $2",
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Enroll a user. The activity row is locked so that the capacity
    /// check and the insert cannot interleave with another enrollment.
    pub async fn enroll(&self, user_id: i32, activity_id: i32, now: DateTime<Utc>) -> AppResult<(Activity, Enrollment)> {
        let mut tx = self.pool.begin().await?;

        let activity = sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1 FOR UPDATE")
            .bind(activity_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;

        let participating: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments WHERE activity_id = $1 AND status IN ('enrolled', 'completed')",
        )
        .bind(activity_id)
        .fetch_one(&mut *tx)
        .await?;

        let existing: Option<EnrollmentStatus> = sqlx::query_scalar(
            "SELECT status FROM enrollments WHERE user_id = $1 AND activity_id = $2",
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&mut *tx)
        .await?;

        activity.check_can_enroll(now, participating, existing)?;

        // A withdrawn or cancelled row is reused
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (user_id, activity_id, status)
            VALUES ($1, $2, 'enrolled')
            ON CONFLICT (user_id, activity_id) DO UPDATE
                SET status = 'enrolled', enrolled_at = NOW(), completed_at = NULL, points_awarded = 0
                WHERE enrollments.status NOT IN ('enrolled', 'completed')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EnrollRefusal::AlreadyEnrolled)?;

        tx.commit().await?;
        Ok((activity, enrollment))
    }

    /// Withdraw; only possible while `enrolled`
    pub async fn withdraw(&self, user_id: i32, activity_id: i32) -> AppResult<Enrollment> {
        let current = self
            .find(user_id, activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Not enrolled in this activity".to_string()))?;

        if current.status != EnrollmentStatus::Enrolled {
            return Err(AppError::BadRequest(format!(
                "Cannot withdraw from an enrollment that is {}",
                current.status
            )));
        }

        sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE enrollments SET status = 'withdrawn'
            WHERE id = $1 AND status = 'enrolled'
            RETURNING *
            "#,
        )
        .bind(current.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("Enrollment changed, please retry".to_string()))
    }

    /// A user's enrollments, optionally restricted to statuses
    pub async fn for_user(&self, user_id: i32, statuses: &[EnrollmentStatus]) -> AppResult<Vec<EnrollmentDetail>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let query = format!(
            "{} WHERE e.user_id = $1 AND (CARDINALITY($2::TEXT[]) = 0 OR e.status = ANY($2)) ORDER BY a.start_time DESC",
            DETAIL_SELECT
        );
        let rows = sqlx::query_as::<_, EnrollmentDetail>(&query)
            .bind(user_id)
            .bind(&statuses)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Participating enrollments of activities that already ended, most recent first
    pub async fn recent_for_user(&self, user_id: i32, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<EnrollmentDetail>> {
        let query = format!(
            "{} WHERE e.user_id = $1 AND e.status IN ('enrolled', 'completed') AND a.end_time < $2 \
             ORDER BY a.end_time DESC LIMIT $3",
            DETAIL_SELECT
        );
        let rows = sqlx::query_as::<_, EnrollmentDetail>(&query)
            .bind(user_id)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Participating students of an activity
    pub async fn participants(&self, activity_id: i32) -> AppResult<Vec<Participant>> {
        let rows = sqlx::query_as::<_, Participant>(
            r#"
            SELECT u.id AS user_id, u.username, u.email, u.first_name, u.last_name, u.department,
                   e.status, e.enrolled_at,
                   EXISTS(SELECT 1 FROM attendance_records r
                           WHERE r.user_id = e.user_id AND r.activity_id = e.activity_id) AS attended
            FROM enrollments e
            JOIN users u ON u.id = e.user_id
            WHERE e.activity_id = $1 AND e.status IN ('enrolled', 'completed')
            ORDER BY u.last_name, u.first_name, u.username
            "#,
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Ids of participating users, for activity notifications
    pub async fn participant_ids(&self, activity_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM enrollments WHERE activity_id = $1 AND status IN ('enrolled', 'completed')",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Totals for a user: (joined, completed, points)
    pub async fn totals_for_user(&self, user_id: i32) -> AppResult<(i64, i64, i64)> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE status IN ('enrolled', 'completed')),
                   COUNT(*) FILTER (WHERE status = 'completed'),
                   COALESCE(SUM(points_awarded), 0)::BIGINT
            FROM enrollments WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
