//! Volunteer opportunities and applications repository

use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        enums::ApplicationStatus,
        volunteer::{
            spots_remaining, ApplicationDetail, ApplicationQuery, CreateApplication, OpportunityDraft,
            OpportunitySummary, VolunteerApplication, VolunteerOpportunity, VolunteerStats,
        },
    },
};

#[derive(Debug, FromRow)]
struct OpportunityRow {
    #[sqlx(flatten)]
    opportunity: VolunteerOpportunity,
    coordinator_name: Option<String>,
    holding_spots: i64,
    my_status: Option<ApplicationStatus>,
}

impl From<OpportunityRow> for OpportunitySummary {
    fn from(row: OpportunityRow) -> Self {
        OpportunitySummary::build(row.opportunity, row.coordinator_name, row.holding_spots, row.my_status)
    }
}

/// `$1` is the viewing user
const OPPORTUNITY_SELECT: &str = r#"
    SELECT o.*,
           COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS coordinator_name,
           (SELECT COUNT(*) FROM volunteer_applications va
             WHERE va.opportunity_id = o.id
               AND va.status IN ('pending', 'approved', 'active', 'completed')) AS holding_spots,
           (SELECT va.status FROM volunteer_applications va
             WHERE va.opportunity_id = o.id AND va.user_id = $1) AS my_status
    FROM volunteer_opportunities o
    LEFT JOIN users u ON u.id = o.coordinator_id
"#;

const APPLICATION_DETAIL_SELECT: &str = r#"
    SELECT va.id, va.user_id, u.username AS applicant_username,
           va.first_name, va.last_name, va.email, va.student_number,
           va.department, va.academic_year, va.motivation,
           va.status, va.hours_completed, va.review_notes, va.submitted_at,
           o.id AS opportunity_id, o.title AS opportunity_title,
           a.id AS activity_id, a.start_time AS activity_start
    FROM volunteer_applications va
    JOIN users u ON u.id = va.user_id
    JOIN volunteer_opportunities o ON o.id = va.opportunity_id
    JOIN activities a ON a.id = o.activity_id
"#;

#[derive(Clone)]
pub struct VolunteeringRepository {
    pool: Pool<Postgres>,
}

impl VolunteeringRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Opportunities
    // -----------------------------------------------------------------------

    /// Insert or refresh the opportunity of an activity.
    /// Returns the row and whether it was created.
    pub async fn upsert_opportunity(&self, draft: &OpportunityDraft) -> AppResult<(VolunteerOpportunity, bool)> {
        let row: (bool,) = sqlx::query_as(
            r#"
            INSERT INTO volunteer_opportunities (
                activity_id, title, description, requirements, time_commitment,
                start_date, end_date, max_volunteers, coordinator_id, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
            ON CONFLICT (activity_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                requirements = EXCLUDED.requirements,
                time_commitment = EXCLUDED.time_commitment,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                max_volunteers = EXCLUDED.max_volunteers,
                coordinator_id = EXCLUDED.coordinator_id,
                is_active = TRUE,
                updated_at = NOW()
            RETURNING (xmax = 0) AS created
            "#,
        )
        .bind(draft.activity_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.requirements)
        .bind(&draft.time_commitment)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(draft.max_volunteers)
        .bind(draft.coordinator_id)
        .fetch_one(&self.pool)
        .await?;

        let opportunity = sqlx::query_as::<_, VolunteerOpportunity>(
            "SELECT * FROM volunteer_opportunities WHERE activity_id = $1",
        )
        .bind(draft.activity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((opportunity, row.0))
    }

    /// Opportunities stay but stop accepting applications
    pub async fn deactivate_for_activity(&self, activity_id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE volunteer_opportunities SET is_active = FALSE, updated_at = NOW() WHERE activity_id = $1",
        )
        .bind(activity_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_opportunity(&self, id: i32) -> AppResult<VolunteerOpportunity> {
        sqlx::query_as::<_, VolunteerOpportunity>("SELECT * FROM volunteer_opportunities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", id)))
    }

    /// Active opportunities, soonest first
    pub async fn list_active(&self, viewer_id: i32) -> AppResult<Vec<OpportunitySummary>> {
        let query = format!("{} WHERE o.is_active ORDER BY o.start_date, o.id", OPPORTUNITY_SELECT);
        let rows = sqlx::query_as::<_, OpportunityRow>(&query)
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn by_activity(&self, activity_id: i32, viewer_id: i32) -> AppResult<OpportunitySummary> {
        let query = format!("{} WHERE o.activity_id = $2", OPPORTUNITY_SELECT);
        sqlx::query_as::<_, OpportunityRow>(&query)
            .bind(viewer_id)
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Into::into)
            .ok_or_else(|| {
                AppError::NotFound(format!("No volunteer opportunity for activity {}", activity_id))
            })
    }

    // -----------------------------------------------------------------------
    // Applications
    // -----------------------------------------------------------------------

    /// Create an application. The opportunity row is locked while spots are counted.
    pub async fn apply(&self, user_id: i32, data: &CreateApplication) -> AppResult<(VolunteerOpportunity, VolunteerApplication)> {
        let mut tx = self.pool.begin().await?;

        let opportunity = sqlx::query_as::<_, VolunteerOpportunity>(
            "SELECT * FROM volunteer_opportunities WHERE id = $1 FOR UPDATE",
        )
        .bind(data.opportunity_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", data.opportunity_id)))?;

        if !opportunity.is_active {
            return Err(AppError::BadRequest("This opportunity is no longer accepting applications".to_string()));
        }

        let holding: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM volunteer_applications
            WHERE opportunity_id = $1 AND status IN ('pending', 'approved', 'active', 'completed')
            "#,
        )
        .bind(opportunity.id)
        .fetch_one(&mut *tx)
        .await?;
        if spots_remaining(opportunity.max_volunteers, holding) == 0 {
            return Err(AppError::BadRequest("No volunteer spots left for this opportunity".to_string()));
        }

        let application = sqlx::query_as::<_, VolunteerApplication>(
            r#"
            INSERT INTO volunteer_applications (
                user_id, opportunity_id, first_name, last_name, email, student_number,
                phone_primary, phone_secondary, department, academic_year,
                motivation, skills_experience, availability
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(opportunity.id)
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.email.trim())
        .bind(data.student_number.trim())
        .bind(data.phone_primary.trim())
        .bind(data.phone_secondary.trim())
        .bind(&data.department)
        .bind(&data.academic_year)
        .bind(&data.motivation)
        .bind(&data.skills_experience)
        .bind(&data.availability)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("You have already applied for this opportunity".to_string())
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok((opportunity, application))
    }

    pub async fn get_application(&self, id: i32) -> AppResult<VolunteerApplication> {
        sqlx::query_as::<_, VolunteerApplication>("SELECT * FROM volunteer_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", id)))
    }

    /// Move an application from `from` to `to`; fails if it changed meanwhile
    pub async fn transition(
        &self,
        id: i32,
        from: ApplicationStatus,
        to: ApplicationStatus,
        reviewer: Option<i32>,
        notes: Option<&str>,
    ) -> AppResult<VolunteerApplication> {
        sqlx::query_as::<_, VolunteerApplication>(
            r#"
            UPDATE volunteer_applications SET
                status = $1,
                reviewed_by = COALESCE($2, reviewed_by),
                reviewed_at = CASE WHEN $2::INT IS NULL THEN reviewed_at ELSE NOW() END,
                review_notes = COALESCE($3, review_notes),
                updated_at = NOW()
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(reviewer)
        .bind(notes)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("Application status changed, please retry".to_string()))
    }

    /// Add hours; an approved application becomes active
    pub async fn add_hours(&self, id: i32, hours: f64) -> AppResult<VolunteerApplication> {
        sqlx::query_as::<_, VolunteerApplication>(
            r#"
            UPDATE volunteer_applications SET
                hours_completed = hours_completed + $1,
                status = CASE WHEN status = 'approved' THEN 'active' ELSE status END,
                updated_at = NOW()
            WHERE id = $2 AND status IN ('approved', 'active')
            RETURNING *
            "#,
        )
        .bind(hours)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BadRequest("Hours can only be logged on approved or active applications".to_string()))
    }

    /// Applications with filters; `user_id` restricts to one applicant
    pub async fn list_applications(
        &self,
        query: &ApplicationQuery,
        user_id: Option<i32>,
    ) -> AppResult<(Vec<ApplicationDetail>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let where_clause = r#"
            WHERE ($1::INT IS NULL OR va.user_id = $1)
              AND ($2::TEXT IS NULL OR va.status = $2)
              AND ($3::INT IS NULL OR va.opportunity_id = $3)
        "#;

        let count_q = format!("SELECT COUNT(*) FROM volunteer_applications va {}", where_clause);
        let total = sqlx::query_scalar::<_, i64>(&count_q)
            .bind(user_id)
            .bind(query.status)
            .bind(query.opportunity_id)
            .fetch_one(&self.pool)
            .await?;

        let select_q = format!(
            "{} {} ORDER BY va.submitted_at DESC LIMIT {} OFFSET {}",
            APPLICATION_DETAIL_SELECT, where_clause, per_page, offset
        );
        let rows = sqlx::query_as::<_, ApplicationDetail>(&select_q)
            .bind(user_id)
            .bind(query.status)
            .bind(query.opportunity_id)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    pub async fn pending_count(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM volunteer_applications WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn stats_for_user(&self, user_id: i32) -> AppResult<VolunteerStats> {
        let stats = sqlx::query_as::<_, VolunteerStats>(
            r#"
            SELECT COUNT(*) AS total_applications,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                   COUNT(*) FILTER (WHERE status = 'active') AS active,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                   COALESCE(SUM(hours_completed), 0)::FLOAT8 AS total_hours
            FROM volunteer_applications WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
