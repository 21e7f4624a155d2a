//! QR tokens, attendance records and scan logs
//!
//! Check-in (QR or manual) runs in one transaction: the token row is
//! locked, the record insert relies on the (user, activity) unique key,
//! and the enrollment is completed with its points in the same commit.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, ErrorCode, ScanRejection},
    models::{
        attendance::{
            validate_scan, AttendanceDetail, AttendanceRecord, QrPayload, QrToken, ScanAudit,
            ScanContext, ScanLog,
        },
        enums::{EnrollmentStatus, VerificationMethod},
    },
};

/// Outcome of a committed check-in
#[derive(Debug)]
pub struct CheckIn {
    pub record: AttendanceRecord,
    /// Points credited by this check-in, 0 if already credited
    pub points_awarded: i32,
}

/// Result of a scan attempt. Rejections carry the token id for the audit log.
pub enum ScanOutcome {
    Recorded { token_id: i32, check_in: CheckIn },
    Rejected { token_id: Option<i32>, reason: ScanRejection },
}

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: Pool<Postgres>,
}

impl AttendanceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Tokens
    // -----------------------------------------------------------------------

    /// Deactivate every active token of the activity and create a new one
    pub async fn issue_token(
        &self,
        activity_id: i32,
        issued_by: i32,
        expires_at: Option<DateTime<Utc>>,
        max_uses: Option<i32>,
    ) -> AppResult<QrToken> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent issues for the same activity
        sqlx::query("SELECT id FROM activities WHERE id = $1 FOR UPDATE")
            .bind(activity_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;

        let deactivated = sqlx::query(
            "UPDATE qr_tokens SET is_active = FALSE WHERE activity_id = $1 AND is_active",
        )
        .bind(activity_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let token = sqlx::query_as::<_, QrToken>(
            r#"
            INSERT INTO qr_tokens (activity_id, session_id, created_by, expires_at, max_uses)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(activity_id)
        .bind(Uuid::new_v4())
        .bind(issued_by)
        .bind(expires_at)
        .bind(max_uses)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(activity_id, deactivated, token_id = token.id, "Rotated QR token");
        Ok(token)
    }

    /// Current active token of an activity
    pub async fn active_token(&self, activity_id: i32) -> AppResult<Option<QrToken>> {
        let token = sqlx::query_as::<_, QrToken>(
            "SELECT * FROM qr_tokens WHERE activity_id = $1 AND is_active ORDER BY created_at DESC LIMIT 1",
        )
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    /// Returns the number of tokens deactivated
    pub async fn deactivate_tokens(&self, activity_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE qr_tokens SET is_active = FALSE WHERE activity_id = $1 AND is_active",
        )
        .bind(activity_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Check-in
    // -----------------------------------------------------------------------

    /// Validate and record a QR scan. Rejections roll the transaction back.
    pub async fn scan(&self, payload: &QrPayload, user_id: i32, now: DateTime<Utc>) -> AppResult<ScanOutcome> {
        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, QrToken>(
            "SELECT * FROM qr_tokens WHERE session_id = $1 FOR UPDATE",
        )
        .bind(payload.session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let enrollment = enrollment_status(&mut tx, user_id, payload.activity_id).await?;
        let already_recorded = record_exists(&mut tx, user_id, payload.activity_id).await?;

        let ctx = ScanContext {
            claimed_activity_id: payload.activity_id,
            token: token.as_ref(),
            enrollment,
            already_recorded,
        };
        let token_id = token.as_ref().map(|t| t.id);

        if let Err(reason) = validate_scan(&ctx, now) {
            tx.rollback().await?;
            return Ok(ScanOutcome::Rejected { token_id, reason });
        }
        // validate_scan only passes with a token
        let token_id = token_id.ok_or_else(|| AppError::Internal("Scan accepted without token".to_string()))?;

        let check_in = match record_check_in(
            &mut tx,
            user_id,
            payload.activity_id,
            Some(token_id),
            VerificationMethod::QrCode,
            None,
            "",
        )
        .await?
        {
            Some(check_in) => check_in,
            // Lost a race with a concurrent scan for the same pair
            None => {
                tx.rollback().await?;
                return Ok(ScanOutcome::Rejected {
                    token_id: Some(token_id),
                    reason: ScanRejection::AlreadyCheckedIn,
                });
            }
        };

        sqlx::query("UPDATE qr_tokens SET current_uses = current_uses + 1 WHERE id = $1")
            .bind(token_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ScanOutcome::Recorded { token_id, check_in })
    }

    /// Record attendance without a token; the student must be enrolled
    pub async fn mark_manual(
        &self,
        activity_id: i32,
        student_id: i32,
        marked_by: i32,
        notes: &str,
    ) -> AppResult<CheckIn> {
        let mut tx = self.pool.begin().await?;

        let is_student: Option<bool> = sqlx::query_scalar("SELECT role = 'student' FROM users WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await?;
        if !is_student.unwrap_or(false) {
            return Err(AppError::NotFound("Student not found".to_string()));
        }

        let enrolled = enrollment_status(&mut tx, student_id, activity_id)
            .await?
            .map(|s| s.is_participating())
            .unwrap_or(false);
        if !enrolled {
            return Err(AppError::BusinessRule(
                ErrorCode::NotEnrolled,
                "Student is not enrolled in this activity".to_string(),
            ));
        }

        let check_in = record_check_in(
            &mut tx,
            student_id,
            activity_id,
            None,
            VerificationMethod::Manual,
            Some(marked_by),
            notes,
        )
        .await?
        .ok_or(AppError::Scan(ScanRejection::AlreadyCheckedIn))?;

        tx.commit().await?;
        Ok(check_in)
    }

    // -----------------------------------------------------------------------
    // Audit and listings
    // -----------------------------------------------------------------------

    /// Write a scan audit row. Failed attempts are logged outside the
    /// rolled back transaction.
    pub async fn log_scan(
        &self,
        audit: &ScanAudit,
        rejection: Option<ScanRejection>,
        attendance_id: Option<i32>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO qr_scan_logs (
                qr_token_id, activity_id, user_id, success, error_code, error_message,
                attendance_id, ip_address, user_agent, latitude, longitude
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(audit.qr_token_id)
        .bind(audit.activity_id)
        .bind(audit.user_id)
        .bind(rejection.is_none())
        .bind(rejection.map(|r| format!("{:?}", r.code())))
        .bind(rejection.map(|r| r.message()))
        .bind(attendance_id)
        .bind(&audit.ip_address)
        .bind(&audit.user_agent)
        .bind(audit.latitude)
        .bind(audit.longitude)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn scan_logs(&self, activity_id: i32, limit: i64) -> AppResult<Vec<ScanLog>> {
        let rows = sqlx::query_as::<_, ScanLog>(
            "SELECT * FROM qr_scan_logs WHERE activity_id = $1 ORDER BY scanned_at DESC LIMIT $2",
        )
        .bind(activity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn for_activity(&self, activity_id: i32) -> AppResult<Vec<AttendanceDetail>> {
        self.details("r.activity_id = $1", activity_id).await
    }

    pub async fn for_user(&self, user_id: i32) -> AppResult<Vec<AttendanceDetail>> {
        self.details("r.user_id = $1", user_id).await
    }

    async fn details(&self, condition: &str, id: i32) -> AppResult<Vec<AttendanceDetail>> {
        let query = format!(
            r#"
            SELECT r.id, r.user_id, u.username,
                   COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS student_name,
                   r.activity_id, a.title AS activity_title,
                   r.status, r.verification_method,
                   COALESCE(NULLIF(TRIM(m.first_name || ' ' || m.last_name), ''), m.username) AS marked_by_name,
                   r.notes, r.marked_at
            FROM attendance_records r
            JOIN users u ON u.id = r.user_id
            JOIN activities a ON a.id = r.activity_id
            LEFT JOIN users m ON m.id = r.marked_by
            WHERE {}
            ORDER BY r.marked_at DESC
            "#,
            condition
        );
        let rows = sqlx::query_as::<_, AttendanceDetail>(&query)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// (qr check-ins, manual check-ins) of an activity
    pub async fn method_counts(&self, activity_id: i32) -> AppResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE verification_method = 'qr_code'),
                   COUNT(*) FILTER (WHERE verification_method = 'manual')
            FROM attendance_records WHERE activity_id = $1
            "#,
        )
        .bind(activity_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn count_for_user(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn enrollment_status(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i32,
    activity_id: i32,
) -> AppResult<Option<EnrollmentStatus>> {
    let status = sqlx::query_scalar::<_, EnrollmentStatus>(
        "SELECT status FROM enrollments WHERE user_id = $1 AND activity_id = $2",
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(status)
}

async fn record_exists(tx: &mut Transaction<'_, Postgres>, user_id: i32, activity_id: i32) -> AppResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM attendance_records WHERE user_id = $1 AND activity_id = $2)",
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(exists)
}

/// Insert the attendance record and complete the enrollment.
/// Returns `None` when a record already exists for the pair.
async fn record_check_in(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i32,
    activity_id: i32,
    qr_token_id: Option<i32>,
    method: VerificationMethod,
    marked_by: Option<i32>,
    notes: &str,
) -> AppResult<Option<CheckIn>> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        INSERT INTO attendance_records (user_id, activity_id, qr_token_id, status, verification_method, marked_by, notes)
        VALUES ($1, $2, $3, 'present', $4, $5, $6)
        ON CONFLICT (user_id, activity_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .bind(qr_token_id)
    .bind(method)
    .bind(marked_by)
    .bind(notes)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(record) = record else {
        return Ok(None);
    };

    // Only an `enrolled` row transitions, so points are credited once
    let points_awarded: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE enrollments e
        SET status = 'completed', completed_at = NOW(), points_awarded = a.points_reward
        FROM activities a
        WHERE a.id = e.activity_id AND e.user_id = $1 AND e.activity_id = $2 AND e.status = 'enrolled'
        RETURNING e.points_awarded
        "#,
    )
    .bind(user_id)
    .bind(activity_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(Some(CheckIn {
        record,
        points_awarded: points_awarded.unwrap_or(0),
    }))
}
