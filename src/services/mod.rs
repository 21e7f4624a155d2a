//! Business logic services

pub mod activities;
pub mod attendance;
pub mod email;
pub mod enrollments;
pub mod notifications;
pub mod stats;
pub mod users;
pub mod volunteering;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub activities: activities::ActivitiesService,
    pub enrollments: enrollments::EnrollmentsService,
    pub attendance: attendance::AttendanceService,
    pub volunteering: volunteering::VolunteeringService,
    pub notifications: notifications::NotificationsService,
    pub stats: stats::StatsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let mailer = Arc::new(email::EmailService::new(config.email.clone()));
        let notifications = notifications::NotificationsService::new(repository.clone(), mailer);

        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            activities: activities::ActivitiesService::new(repository.clone(), notifications.clone()),
            enrollments: enrollments::EnrollmentsService::new(repository.clone(), notifications.clone()),
            attendance: attendance::AttendanceService::new(
                repository.clone(),
                notifications.clone(),
                config.auth.clone(),
            ),
            volunteering: volunteering::VolunteeringService::new(repository.clone(), notifications.clone()),
            stats: stats::StatsService::new(repository.clone()),
            notifications,
            repository,
        }
    }

    /// Database round-trip for the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
