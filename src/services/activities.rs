//! Activities and categories service

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{
            check_schedule, Activity, ActivityCategory, ActivityQuery, ActivitySummary, CreateActivity,
            CreateCategory, UpdateActivity,
        },
        enums::{ActivityStatus, NotificationType, Priority},
        notification::NewNotification,
        user::{Capability, UserClaims},
    },
    repository::Repository,
    services::{notifications::NotificationsService, volunteering::sync_activity},
};

#[derive(Clone)]
pub struct ActivitiesService {
    repository: Repository,
    notifications: NotificationsService,
}

impl ActivitiesService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self { repository, notifications }
    }

    pub async fn categories(&self) -> AppResult<Vec<ActivityCategory>> {
        self.repository.activities.list_categories().await
    }

    pub async fn create_category(&self, data: &CreateCategory) -> AppResult<ActivityCategory> {
        data.validate()?;
        let category = self.repository.activities.create_category(data).await?;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// List activities; drafts are only visible to activity managers
    pub async fn list(&self, viewer: &UserClaims, query: &ActivityQuery) -> AppResult<(Vec<ActivitySummary>, i64)> {
        let include_drafts = viewer.role.has(Capability::ManageActivities);
        self.repository
            .activities
            .list(query, viewer.user_id, include_drafts, Utc::now())
            .await
    }

    pub async fn get(&self, viewer: &UserClaims, id: i32) -> AppResult<ActivitySummary> {
        let summary = self.repository.activities.get_summary(id, viewer.user_id, Utc::now()).await?;
        if summary.activity.status == ActivityStatus::Draft && !viewer.role.has(Capability::ManageActivities) {
            return Err(AppError::NotFound(format!("Activity {} not found", id)));
        }
        Ok(summary)
    }

    /// Create an activity in draft status
    pub async fn create(&self, creator: &UserClaims, data: &CreateActivity) -> AppResult<Activity> {
        data.validate()?;
        check_schedule(
            data.start_time,
            data.end_time,
            data.registration_deadline,
            data.is_virtual,
            data.virtual_link.as_deref(),
        )?;
        self.check_category(data.category_id).await?;

        let activity = self.repository.activities.create(data, creator.user_id).await?;
        tracing::info!(activity_id = activity.id, by = creator.user_id, "Activity created");
        Ok(activity)
    }

    pub async fn update(&self, editor: &UserClaims, id: i32, data: &UpdateActivity) -> AppResult<Activity> {
        data.validate()?;

        let mut activity = self.repository.activities.get_by_id(id).await?;
        if activity.status == ActivityStatus::Cancelled {
            return Err(AppError::BadRequest("Cancelled activities cannot be edited".to_string()));
        }
        data.apply_to(&mut activity);
        check_schedule(
            activity.start_time,
            activity.end_time,
            activity.registration_deadline,
            activity.is_virtual,
            activity.virtual_link.as_deref(),
        )?;
        self.check_category(data.category_id).await?;

        let activity = self.repository.activities.save(&activity).await?;
        if activity.is_volunteering && activity.status != ActivityStatus::Draft {
            sync_activity(&self.repository, &activity, editor.user_id).await?;
        }

        tracing::info!(activity_id = id, by = editor.user_id, "Activity updated");
        Ok(activity)
    }

    /// Delete an activity nobody is enrolled in
    pub async fn delete(&self, actor: &UserClaims, id: i32) -> AppResult<()> {
        self.repository.activities.get_by_id(id).await?;
        let participants = self.repository.activities.participating_count(id).await?;
        if participants > 0 {
            return Err(AppError::BadRequest(format!(
                "Cannot delete an activity with {} enrolled participant(s); cancel it instead",
                participants
            )));
        }

        self.repository.activities.delete(id).await?;
        tracing::info!(activity_id = id, by = actor.user_id, "Activity deleted");
        Ok(())
    }

    /// Draft -> upcoming. Volunteering activities get their opportunity.
    pub async fn publish(&self, actor: &UserClaims, id: i32) -> AppResult<Activity> {
        let activity = self.repository.activities.get_by_id(id).await?;
        if activity.status != ActivityStatus::Draft {
            return Err(AppError::BadRequest(format!(
                "Only draft activities can be published (current status: {})",
                activity.status
            )));
        }

        let activity = self.repository.activities.set_status(id, ActivityStatus::Upcoming).await?;
        if activity.is_volunteering {
            let (opportunity, _) = sync_activity(&self.repository, &activity, actor.user_id).await?;
            tracing::debug!(activity_id = id, opportunity_id = opportunity.id, "Volunteer opportunity synced");
        }

        tracing::info!(activity_id = id, by = actor.user_id, "Activity published");
        Ok(activity)
    }

    /// Cancel an activity, close its volunteering and QR check-in and
    /// notify participants
    pub async fn cancel(&self, actor: &UserClaims, id: i32) -> AppResult<Activity> {
        let activity = self.repository.activities.get_by_id(id).await?;
        let now = Utc::now();
        if activity.status == ActivityStatus::Cancelled {
            return Err(AppError::BadRequest("Activity is already cancelled".to_string()));
        }
        if activity.dynamic_status(now) == ActivityStatus::Completed {
            return Err(AppError::BadRequest("Completed activities cannot be cancelled".to_string()));
        }

        let activity = self.repository.activities.set_status(id, ActivityStatus::Cancelled).await?;
        self.repository.volunteering.deactivate_for_activity(id).await?;
        self.repository.attendance.deactivate_tokens(id).await?;

        for user_id in self.repository.enrollments.participant_ids(id).await? {
            let mut notification = NewNotification::new(
                user_id,
                NotificationType::Activity,
                "Activity cancelled",
                &format!("\"{}\" scheduled for {} has been cancelled.", activity.title, activity.start_time.format("%Y-%m-%d %H:%M UTC")),
            )
            .about(id);
            notification.priority = Priority::High;
            self.notifications.notify(notification).await;
        }

        tracing::info!(activity_id = id, by = actor.user_id, "Activity cancelled");
        Ok(activity)
    }

    async fn check_category(&self, category_id: Option<i32>) -> AppResult<()> {
        if let Some(category_id) = category_id {
            if !self.repository.activities.category_exists(category_id).await? {
                return Err(AppError::Validation(format!("Category {} does not exist", category_id)));
            }
        }
        Ok(())
    }
}
