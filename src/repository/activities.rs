//! Activities and categories repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        activity::{Activity, ActivityCategory, ActivityQuery, ActivitySummary, CreateActivity, CreateCategory},
        enums::{ActivityStatus, EnrollmentStatus},
    },
};

/// Activity joined with the figures needed to build an `ActivitySummary`
#[derive(Debug, FromRow)]
struct ActivityRow {
    #[sqlx(flatten)]
    activity: Activity,
    category_name: Option<String>,
    created_by_name: Option<String>,
    enrolled_count: i64,
    my_status: Option<EnrollmentStatus>,
}

impl ActivityRow {
    fn into_summary(self, now: DateTime<Utc>) -> ActivitySummary {
        ActivitySummary::build(
            self.activity,
            self.category_name,
            self.created_by_name,
            self.enrolled_count,
            self.my_status,
            now,
        )
    }
}

/// `$1` is the viewing user
const SUMMARY_SELECT: &str = r#"
    SELECT a.*,
           c.name AS category_name,
           COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS created_by_name,
           (SELECT COUNT(*) FROM enrollments e
             WHERE e.activity_id = a.id AND e.status IN ('enrolled', 'completed')) AS enrolled_count,
           (SELECT e.status FROM enrollments e
             WHERE e.activity_id = a.id AND e.user_id = $1) AS my_status
    FROM activities a
    LEFT JOIN activity_categories c ON c.id = a.category_id
    LEFT JOIN users u ON u.id = a.created_by
"#;

#[derive(Clone)]
pub struct ActivitiesRepository {
    pool: Pool<Postgres>,
}

impl ActivitiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub async fn list_categories(&self) -> AppResult<Vec<ActivityCategory>> {
        let rows = sqlx::query_as::<_, ActivityCategory>(
            r#"
            SELECT c.*, (SELECT COUNT(*) FROM activities a WHERE a.category_id = c.id) AS activity_count
            FROM activity_categories c
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_category(&self, data: &CreateCategory) -> AppResult<ActivityCategory> {
        sqlx::query_as::<_, ActivityCategory>(
            r#"
            INSERT INTO activity_categories (name, description, color)
            VALUES ($1, $2, COALESCE($3, '#007bff'))
            RETURNING *, 0::BIGINT AS activity_count
            "#,
        )
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(&data.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Category '{}' already exists", data.name.trim()))
            } else {
                e.into()
            }
        })
    }

    pub async fn category_exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM activity_categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // -----------------------------------------------------------------------
    // Activities
    // -----------------------------------------------------------------------

    /// Get activity by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Activity> {
        sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    /// Activity with counts and the viewer's enrollment
    pub async fn get_summary(&self, id: i32, viewer_id: i32, now: DateTime<Utc>) -> AppResult<ActivitySummary> {
        let query = format!("{} WHERE a.id = $2", SUMMARY_SELECT);
        let row = sqlx::query_as::<_, ActivityRow>(&query)
            .bind(viewer_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;
        Ok(row.into_summary(now))
    }

    /// List activities with optional filters and pagination.
    /// Drafts are only listed when `include_drafts` is set.
    pub async fn list(
        &self,
        query: &ActivityQuery,
        viewer_id: i32,
        include_drafts: bool,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<ActivitySummary>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        // $1 is always the viewer
        let mut conditions = Vec::new();
        let mut idx = 2;

        if !include_drafts {
            conditions.push("a.status <> 'draft'".to_string());
        }
        if query.status.is_some() {
            conditions.push(format!("a.status = ${}", idx));
            idx += 1;
        }
        if query.is_volunteering.is_some() {
            conditions.push(format!("a.is_volunteering = ${}", idx));
            idx += 1;
        }
        if query.category_id.is_some() {
            conditions.push(format!("a.category_id = ${}", idx));
            idx += 1;
        }
        if query.created_by.is_some() {
            conditions.push(format!("a.created_by = ${}", idx));
            idx += 1;
        }
        if query.upcoming_only.unwrap_or(false) {
            conditions.push(format!("a.start_time > ${}", idx));
            idx += 1;
        }
        let search = query
            .search
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim().to_lowercase()));
        if search.is_some() {
            conditions.push(format!(
                "(LOWER(a.title) LIKE ${i} OR LOWER(a.description) LIKE ${i} OR LOWER(a.location) LIKE ${i})",
                i = idx
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        macro_rules! bind_filters {
            ($builder:expr) => {{
                let mut b = $builder.bind(viewer_id);
                if let Some(status) = query.status { b = b.bind(status); }
                if let Some(v) = query.is_volunteering { b = b.bind(v); }
                if let Some(c) = query.category_id { b = b.bind(c); }
                if let Some(u) = query.created_by { b = b.bind(u); }
                if query.upcoming_only.unwrap_or(false) { b = b.bind(now); }
                if let Some(ref s) = search { b = b.bind(s.clone()); }
                b
            }};
        }

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM ({} {}) AS filtered", SUMMARY_SELECT, where_clause);
        let total = bind_filters!(sqlx::query_scalar::<_, i64>(&count_q))
            .fetch_one(&self.pool)
            .await?;

        let select_q = format!(
            "{} {} ORDER BY a.start_time ASC, a.id ASC LIMIT {} OFFSET {}",
            SUMMARY_SELECT, where_clause, per_page, offset
        );
        let rows = bind_filters!(sqlx::query_as::<_, ActivityRow>(&select_q))
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(|r| r.into_summary(now)).collect(), total))
    }

    /// Published activities starting after `now`, soonest first
    pub async fn upcoming(&self, viewer_id: i32, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<ActivitySummary>> {
        let query = format!(
            "{} WHERE a.status IN ('upcoming', 'ongoing') AND a.start_time > $2 ORDER BY a.start_time LIMIT $3",
            SUMMARY_SELECT
        );
        let rows = sqlx::query_as::<_, ActivityRow>(&query)
            .bind(viewer_id)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.into_summary(now)).collect())
    }

    /// Create an activity in draft status
    pub async fn create(&self, data: &CreateActivity, created_by: i32) -> AppResult<Activity> {
        let row = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (
                title, description, location, category_id, difficulty,
                max_participants, requirements, is_virtual, virtual_link,
                start_time, end_time, registration_deadline,
                is_volunteering, is_featured, certificate_available,
                points_reward, status, created_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(&data.location)
        .bind(data.category_id)
        .bind(data.difficulty.unwrap_or_default())
        .bind(data.max_participants.unwrap_or(50))
        .bind(&data.requirements)
        .bind(data.is_virtual)
        .bind(&data.virtual_link)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.registration_deadline)
        .bind(data.is_volunteering)
        .bind(data.is_featured)
        .bind(data.certificate_available)
        .bind(data.points_reward.unwrap_or(10))
        .bind(ActivityStatus::Draft)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Persist every editable field of `activity`
    pub async fn save(&self, activity: &Activity) -> AppResult<Activity> {
        sqlx::query_as::<_, Activity>(
            r#"
            UPDATE activities SET
                title = $1, description = $2, location = $3, category_id = $4,
                difficulty = $5, max_participants = $6, requirements = $7,
                is_virtual = $8, virtual_link = $9, start_time = $10, end_time = $11,
                registration_deadline = $12, is_volunteering = $13, is_featured = $14,
                certificate_available = $15, points_reward = $16, updated_at = NOW()
            WHERE id = $17
            RETURNING *
            "#,
        )
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.location)
        .bind(activity.category_id)
        .bind(activity.difficulty)
        .bind(activity.max_participants)
        .bind(&activity.requirements)
        .bind(activity.is_virtual)
        .bind(&activity.virtual_link)
        .bind(activity.start_time)
        .bind(activity.end_time)
        .bind(activity.registration_deadline)
        .bind(activity.is_volunteering)
        .bind(activity.is_featured)
        .bind(activity.certificate_available)
        .bind(activity.points_reward)
        .bind(activity.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity.id)))
    }

    pub async fn set_status(&self, id: i32, status: ActivityStatus) -> AppResult<Activity> {
        sqlx::query_as::<_, Activity>(
            "UPDATE activities SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    /// Delete an activity
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Activity {} not found", id)));
        }
        Ok(())
    }

    /// Enrollments that count against capacity
    pub async fn participating_count(&self, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM enrollments WHERE activity_id = $1 AND status IN ('enrolled', 'completed')",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Published volunteering activities, for opportunity sync
    pub async fn volunteering(&self) -> AppResult<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities WHERE is_volunteering AND status <> 'draft' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All activities created by a user, or every activity when `None`
    pub async fn all_created_by(&self, created_by: Option<i32>) -> AppResult<Vec<Activity>> {
        let rows = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities WHERE ($1::INT IS NULL OR created_by = $1) ORDER BY start_time",
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
