//! Notification and email log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{NotificationType, Priority};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub recipient_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub is_read: bool,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub related_activity_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Notification to be stored for one recipient
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i32,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub related_activity_id: Option<i32>,
}

impl NewNotification {
    pub fn new(recipient_id: i32, notification_type: NotificationType, title: &str, message: &str) -> Self {
        Self {
            recipient_id,
            title: title.to_string(),
            message: message.to_string(),
            notification_type,
            priority: Priority::Normal,
            related_activity_id: None,
        }
    }

    pub fn about(mut self, activity_id: i32) -> Self {
        self.related_activity_id = Some(activity_id);
        self
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    /// Mark everything read after listing
    pub mark_read: Option<bool>,
    pub limit: Option<i64>,
}

/// Broadcast request; sent to every active user when `recipient_ids` is empty
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendNotification {
    #[serde(default)]
    pub recipient_ids: Vec<i32>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: Priority,
    pub related_activity_id: Option<i32>,
    #[serde(default)]
    pub send_email: bool,
}

/// Message to everyone enrolled in an activity
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NotifyParticipants {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendReport {
    pub recipients: i64,
    pub emails_sent: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Email delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EmailLog {
    pub id: i32,
    pub recipient_email: String,
    pub subject: String,
    pub message: String,
    pub sent_successfully: bool,
    pub error_message: String,
    pub notification_id: Option<i32>,
    pub sent_at: DateTime<Utc>,
}

/// Subject and body of the email sent for a notification
pub fn email_content(notification: &Notification, recipient_name: &str) -> (String, String) {
    let subject = format!("[Beyond EAMS] {}", notification.title);
    let body = format!(
        "Dear {},\n\n{}\n\n---\nThis is an automated message from Beyond EAMS.\nPlease do not reply to this email.\n",
        recipient_name, notification.message
    );
    (subject, body)
}
