//! Enrollment service

use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        enrollment::{Enrollment, EnrollmentDetail, Participant},
        enums::{EnrollmentStatus, NotificationType},
        notification::NewNotification,
    },
    repository::Repository,
    services::notifications::NotificationsService,
};

/// Number of ended activities shown as "recent"
const RECENT_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct EnrollmentsService {
    repository: Repository,
    notifications: NotificationsService,
}

impl EnrollmentsService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self { repository, notifications }
    }

    /// Enroll the user and send a confirmation notification
    pub async fn enroll(&self, user_id: i32, activity_id: i32) -> AppResult<Enrollment> {
        let (activity, enrollment) = self.repository.enrollments.enroll(user_id, activity_id, Utc::now()).await?;
        tracing::info!(user_id, activity_id, "Enrolled in activity");

        self.notifications
            .notify(
                NewNotification::new(
                    user_id,
                    NotificationType::Activity,
                    "Enrollment confirmed",
                    &format!(
                        "You are enrolled in \"{}\" on {}{}.",
                        activity.title,
                        activity.start_time.format("%Y-%m-%d %H:%M UTC"),
                        if activity.location.is_empty() {
                            String::new()
                        } else {
                            format!(" at {}", activity.location)
                        }
                    ),
                )
                .about(activity.id),
            )
            .await;

        Ok(enrollment)
    }

    pub async fn withdraw(&self, user_id: i32, activity_id: i32) -> AppResult<Enrollment> {
        let enrollment = self.repository.enrollments.withdraw(user_id, activity_id).await?;
        tracing::info!(user_id, activity_id, "Withdrew from activity");
        Ok(enrollment)
    }

    /// Enrolled and completed activities
    pub async fn enrolled(&self, user_id: i32) -> AppResult<Vec<EnrollmentDetail>> {
        self.repository
            .enrollments
            .for_user(user_id, &[EnrollmentStatus::Enrolled, EnrollmentStatus::Completed])
            .await
    }

    pub async fn recent(&self, user_id: i32) -> AppResult<Vec<EnrollmentDetail>> {
        self.repository
            .enrollments
            .recent_for_user(user_id, Utc::now(), RECENT_LIMIT)
            .await
    }

    pub async fn participants(&self, activity_id: i32) -> AppResult<Vec<Participant>> {
        self.repository.activities.get_by_id(activity_id).await?;
        self.repository.enrollments.participants(activity_id).await
    }
}
