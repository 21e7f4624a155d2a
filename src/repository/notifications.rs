//! Notifications and email log repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::{NewNotification, Notification, NotificationQuery},
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, data: &NewNotification) -> AppResult<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, title, message, notification_type, priority, related_activity_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.recipient_id)
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.notification_type)
        .bind(data.priority)
        .bind(data.related_activity_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Same notification for many recipients in one statement
    pub async fn create_many(&self, recipients: &[i32], template: &NewNotification) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, title, message, notification_type, priority, related_activity_id)
            SELECT r, $2, $3, $4, $5, $6 FROM UNNEST($1::INT[]) AS r
            RETURNING *
            "#,
        )
        .bind(recipients)
        .bind(&template.title)
        .bind(&template.message)
        .bind(template.notification_type)
        .bind(template.priority)
        .bind(template.related_activity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_for_user(&self, user_id: i32, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(query.unread_only.unwrap_or(false))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one of the user's notifications read
    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_email_sent(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE notifications SET email_sent = TRUE, email_sent_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn log_email(
        &self,
        recipient_email: &str,
        subject: &str,
        message: &str,
        error: Option<&str>,
        notification_id: Option<i32>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_logs (recipient_email, subject, message, sent_successfully, error_message, notification_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(recipient_email)
        .bind(subject)
        .bind(message)
        .bind(error.is_none())
        .bind(error.unwrap_or(""))
        .bind(notification_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
