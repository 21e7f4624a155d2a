//! Repository layer for database operations

pub mod activities;
pub mod attendance;
pub mod enrollments;
pub mod notifications;
pub mod stats;
pub mod users;
pub mod volunteering;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub activities: activities::ActivitiesRepository,
    pub enrollments: enrollments::EnrollmentsRepository,
    pub attendance: attendance::AttendanceRepository,
    pub volunteering: volunteering::VolunteeringRepository,
    pub notifications: notifications::NotificationsRepository,
    pub stats: stats::StatsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            activities: activities::ActivitiesRepository::new(pool.clone()),
            enrollments: enrollments::EnrollmentsRepository::new(pool.clone()),
            attendance: attendance::AttendanceRepository::new(pool.clone()),
            volunteering: volunteering::VolunteeringRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            stats: stats::StatsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database, used by the readiness probe
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
