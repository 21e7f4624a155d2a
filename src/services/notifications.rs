//! Notifications service

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::NotificationType,
        notification::{
            email_content, NewNotification, Notification, NotificationQuery, NotifyParticipants, SendNotification,
            SendReport,
        },
        user::UserClaims,
    },
    repository::Repository,
    services::email::{Delivery, Mailer},
};

/// One email attempt for a notification, ready to be logged
#[derive(Debug)]
pub struct EmailAttempt {
    pub subject: String,
    pub body: String,
    /// `None` on success
    pub error: Option<String>,
    pub sent: bool,
}

/// Send the email for `notification`. Never fails: errors are reported
/// in the returned attempt so the caller can log them.
pub async fn email_notification(
    mailer: &dyn Mailer,
    notification: &Notification,
    to: &str,
    recipient_name: &str,
) -> EmailAttempt {
    let (subject, body) = email_content(notification, recipient_name);

    if to.trim().is_empty() {
        return EmailAttempt {
            subject,
            body,
            error: Some("Recipient has no email address".to_string()),
            sent: false,
        };
    }

    match mailer.send(to, &subject, &body).await {
        Ok(Delivery::Sent) => EmailAttempt { subject, body, error: None, sent: true },
        Ok(Delivery::Skipped) => EmailAttempt {
            subject,
            body,
            error: Some("Email delivery disabled".to_string()),
            sent: false,
        },
        Err(e) => {
            tracing::warn!(to, notification_id = notification.id, error = %e, "Notification email failed");
            EmailAttempt { subject, body, error: Some(e.to_string()), sent: false }
        }
    }
}

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    mailer: Arc<dyn Mailer>,
}

impl NotificationsService {
    pub fn new(repository: Repository, mailer: Arc<dyn Mailer>) -> Self {
        Self { repository, mailer }
    }

    /// List own notifications, optionally marking them all read afterwards
    pub async fn list(&self, user_id: i32, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        let rows = self.repository.notifications.list_for_user(user_id, query).await?;
        if query.mark_read.unwrap_or(false) {
            self.repository.notifications.mark_all_read(user_id).await?;
        }
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        self.repository.notifications.unread_count(user_id).await
    }

    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id, user_id).await
    }

    /// Store a single notification; failures are logged, not propagated
    pub async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.repository.notifications.create(&notification).await {
            tracing::error!(recipient_id = notification.recipient_id, error = %e, "Failed to store notification");
        }
    }

    /// Send to explicit recipients, or every active user when none are given
    pub async fn send(&self, sender: &UserClaims, data: &SendNotification) -> AppResult<SendReport> {
        let recipients = if data.recipient_ids.is_empty() {
            self.repository.users.active_ids().await?
        } else {
            self.repository.users.filter_active(&data.recipient_ids).await?
        };
        if recipients.is_empty() {
            return Err(AppError::Validation("No active recipients".to_string()));
        }

        if let Some(activity_id) = data.related_activity_id {
            self.repository.activities.get_by_id(activity_id).await?;
        }

        let template = NewNotification {
            recipient_id: 0,
            title: data.title.trim().to_string(),
            message: data.message.clone(),
            notification_type: data.notification_type,
            priority: data.priority,
            related_activity_id: data.related_activity_id,
        };

        let report = self.fan_out(&recipients, &template, data.send_email).await?;
        tracing::info!(
            sender = sender.user_id,
            recipients = report.recipients,
            emails = report.emails_sent,
            "Notification sent"
        );
        Ok(report)
    }

    /// Send to everyone enrolled in an activity
    pub async fn notify_participants(
        &self,
        sender: &UserClaims,
        activity_id: i32,
        data: &NotifyParticipants,
    ) -> AppResult<SendReport> {
        let activity = self.repository.activities.get_by_id(activity_id).await?;
        let recipients = self.repository.enrollments.participant_ids(activity_id).await?;
        if recipients.is_empty() {
            return Err(AppError::Validation("No participants enrolled in this activity".to_string()));
        }

        let mut template = NewNotification::new(0, NotificationType::Activity, data.title.trim(), &data.message)
            .about(activity.id);
        template.priority = data.priority;

        let report = self.fan_out(&recipients, &template, data.send_email).await?;
        tracing::info!(sender = sender.user_id, activity_id, recipients = report.recipients, "Participants notified");
        Ok(report)
    }

    async fn fan_out(&self, recipients: &[i32], template: &NewNotification, send_email: bool) -> AppResult<SendReport> {
        let created = self.repository.notifications.create_many(recipients, template).await?;

        let mut emails_sent = 0;
        if send_email {
            let contacts: HashMap<i32, _> = self
                .repository
                .users
                .contacts(recipients)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect();

            for notification in &created {
                let Some(contact) = contacts.get(&notification.recipient_id) else {
                    continue;
                };
                let attempt =
                    email_notification(self.mailer.as_ref(), notification, &contact.email, &contact.display_name())
                        .await;
                self.record_attempt(notification, &contact.email, &attempt).await?;
                if attempt.sent {
                    emails_sent += 1;
                }
            }
        }

        Ok(SendReport {
            recipients: created.len() as i64,
            emails_sent,
        })
    }

    async fn record_attempt(&self, notification: &Notification, to: &str, attempt: &EmailAttempt) -> AppResult<()> {
        self.repository
            .notifications
            .log_email(to, &attempt.subject, &attempt.body, attempt.error.as_deref(), Some(notification.id))
            .await?;
        if attempt.sent {
            self.repository.notifications.mark_email_sent(notification.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Priority;
    use crate::services::email::MockMailer;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn notification() -> Notification {
        Notification {
            id: 11,
            recipient_id: 3,
            title: "Application approved".to_string(),
            message: "See you on Saturday.".to_string(),
            notification_type: NotificationType::Approval,
            priority: Priority::High,
            is_read: false,
            email_sent: false,
            email_sent_at: None,
            related_activity_id: Some(5),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_email_sent() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .with(
                eq("ada@example.edu"),
                eq("[Beyond EAMS] Application approved"),
                mockall::predicate::function(|body: &str| {
                    body.starts_with("Dear Ada Lovelace,") && body.contains("See you on Saturday.")
                }),
            )
            .times(1)
            .returning(|_, _, _| Ok(Delivery::Sent));

        let attempt = email_notification(&mailer, &notification(), "ada@example.edu", "Ada Lovelace").await;
        assert!(attempt.sent);
        assert!(attempt.error.is_none());
    }

    #[tokio::test]
    async fn test_email_failure_is_reported() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(AppError::Internal("connection refused".to_string())));

        let attempt = email_notification(&mailer, &notification(), "ada@example.edu", "Ada").await;
        assert!(!attempt.sent);
        assert!(attempt.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_disabled_delivery_not_counted() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().returning(|_, _, _| Ok(Delivery::Skipped));

        let attempt = email_notification(&mailer, &notification(), "ada@example.edu", "Ada").await;
        assert!(!attempt.sent);
        assert_eq!(attempt.error.as_deref(), Some("Email delivery disabled"));
    }

    #[tokio::test]
    async fn test_missing_address_skips_mailer() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();

        let attempt = email_notification(&mailer, &notification(), "  ", "Ada").await;
        assert!(!attempt.sent);
    }
}
