//! Volunteer opportunities and applications service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::Activity,
        enums::{ActivityStatus, ApplicationStatus, NotificationType, Priority},
        notification::NewNotification,
        user::UserClaims,
        volunteer::{
            can_log_hours, ApplicationDetail, ApplicationQuery, CreateApplication, OpportunityDraft,
            OpportunitySummary, SyncReport, VolunteerApplication, VolunteerOpportunity, VolunteerStats,
        },
    },
    repository::Repository,
    services::notifications::NotificationsService,
};

#[derive(Clone)]
pub struct VolunteeringService {
    repository: Repository,
    notifications: NotificationsService,
}

impl VolunteeringService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self { repository, notifications }
    }

    /// Create or refresh an opportunity for every published volunteering
    /// activity. Cancelled activities have theirs deactivated.
    pub async fn sync(&self, caller: &UserClaims) -> AppResult<SyncReport> {
        let mut report = SyncReport {
            created: 0,
            updated: 0,
            opportunities: Vec::new(),
        };

        for activity in self.repository.activities.volunteering().await? {
            if activity.status == ActivityStatus::Cancelled {
                self.repository.volunteering.deactivate_for_activity(activity.id).await?;
                continue;
            }
            let (opportunity, created) = sync_activity(&self.repository, &activity, caller.user_id).await?;
            if created {
                report.created += 1;
            } else {
                report.updated += 1;
            }
            report.opportunities.push(opportunity);
        }

        tracing::info!(
            by = caller.user_id,
            created = report.created,
            updated = report.updated,
            "Volunteer opportunities synced"
        );
        Ok(report)
    }

    pub async fn opportunities(&self, viewer_id: i32) -> AppResult<Vec<OpportunitySummary>> {
        self.repository.volunteering.list_active(viewer_id).await
    }

    pub async fn by_activity(&self, activity_id: i32, viewer_id: i32) -> AppResult<OpportunitySummary> {
        self.repository.volunteering.by_activity(activity_id, viewer_id).await
    }

    /// Submit an application for an opportunity
    pub async fn apply(&self, user_id: i32, data: &CreateApplication) -> AppResult<VolunteerApplication> {
        data.validate()?;

        let (opportunity, application) = self.repository.volunteering.apply(user_id, data).await?;
        tracing::info!(user_id, opportunity_id = opportunity.id, application_id = application.id, "Volunteer application submitted");

        self.notifications
            .notify(
                NewNotification::new(
                    user_id,
                    NotificationType::Volunteer,
                    "Application submitted",
                    &format!(
                        "Your application for \"{}\" was received and is awaiting review.",
                        opportunity.title
                    ),
                )
                .about(opportunity.activity_id),
            )
            .await;

        Ok(application)
    }

    pub async fn my_applications(
        &self,
        user_id: i32,
        query: &ApplicationQuery,
    ) -> AppResult<(Vec<ApplicationDetail>, i64)> {
        self.repository.volunteering.list_applications(query, Some(user_id)).await
    }

    /// Withdraw one of the caller's own applications
    pub async fn withdraw(&self, user_id: i32, id: i32) -> AppResult<VolunteerApplication> {
        let application = self.repository.volunteering.get_application(id).await?;
        if application.user_id != user_id {
            return Err(AppError::NotFound(format!("Application {} not found", id)));
        }
        if !application.status.can_transition_to(ApplicationStatus::Withdrawn) {
            return Err(AppError::BadRequest(format!(
                "Cannot withdraw an application that is {}",
                application.status
            )));
        }

        self.repository
            .volunteering
            .transition(id, application.status, ApplicationStatus::Withdrawn, None, None)
            .await
    }

    pub async fn applications(&self, query: &ApplicationQuery) -> AppResult<(Vec<ApplicationDetail>, i64)> {
        self.repository.volunteering.list_applications(query, None).await
    }

    /// Approve or reject a pending application and notify the applicant
    pub async fn review(
        &self,
        reviewer: &UserClaims,
        id: i32,
        approve: bool,
        notes: &str,
    ) -> AppResult<VolunteerApplication> {
        let application = self.repository.volunteering.get_application(id).await?;
        let next = if approve {
            ApplicationStatus::Approved
        } else {
            ApplicationStatus::Rejected
        };
        if !application.status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot change an application from {} to {}",
                application.status, next
            )));
        }

        let updated = self
            .repository
            .volunteering
            .transition(id, application.status, next, Some(reviewer.user_id), Some(notes))
            .await?;
        let opportunity = self.repository.volunteering.get_opportunity(updated.opportunity_id).await?;

        tracing::info!(application_id = id, status = %next, by = reviewer.user_id, "Volunteer application reviewed");

        let (title, mut message) = if approve {
            (
                "Volunteer application approved",
                format!("Your application for \"{}\" has been approved.", opportunity.title),
            )
        } else {
            (
                "Volunteer application not accepted",
                format!("Your application for \"{}\" was not accepted.", opportunity.title),
            )
        };
        if !notes.trim().is_empty() {
            message.push_str(&format!("\n\nReviewer notes: {}", notes.trim()));
        }

        let mut notification = NewNotification::new(updated.user_id, NotificationType::Approval, title, &message)
            .about(opportunity.activity_id);
        if approve {
            notification.priority = Priority::High;
        }
        self.notifications.notify(notification).await;

        Ok(updated)
    }

    pub async fn log_hours(&self, reviewer: &UserClaims, id: i32, hours: f64) -> AppResult<VolunteerApplication> {
        let application = self.repository.volunteering.get_application(id).await?;
        if !can_log_hours(application.status) {
            return Err(AppError::BadRequest(format!(
                "Hours cannot be logged on an application that is {}",
                application.status
            )));
        }

        let updated = self.repository.volunteering.add_hours(id, hours).await?;
        tracing::info!(application_id = id, hours, total = updated.hours_completed, by = reviewer.user_id, "Volunteer hours logged");
        Ok(updated)
    }

    pub async fn pending_count(&self) -> AppResult<i64> {
        self.repository.volunteering.pending_count().await
    }

    pub async fn stats(&self, user_id: i32) -> AppResult<VolunteerStats> {
        self.repository.volunteering.stats_for_user(user_id).await
    }
}

/// Upsert the opportunity of one volunteering activity. The coordinator is
/// the activity's creator when that user is active staff, else `caller_id`.
pub(crate) async fn sync_activity(
    repository: &Repository,
    activity: &Activity,
    caller_id: i32,
) -> AppResult<(VolunteerOpportunity, bool)> {
    let creator = match activity.created_by {
        Some(id) => match repository.users.get_short(id).await {
            Ok(user) => Some(user),
            Err(AppError::NotFound(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };
    let coordinator_id = creator
        .filter(|u| u.is_active && u.role.is_staff())
        .map(|u| u.id)
        .unwrap_or(caller_id);

    let draft = OpportunityDraft::from_activity(activity, Some(coordinator_id));
    repository.volunteering.upsert_opportunity(&draft).await
}
