//! Users repository for database operations

use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Role,
        user::{display_name, User, UserQuery, UserShort},
    },
};

/// Columns selected into `UserShort`
const SHORT_COLUMNS: &str =
    "id, username, email, first_name, last_name, role, department, is_active";

/// Fields of a new account, password already hashed
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub department: Option<&'a str>,
}

/// Email address and display name of a user
#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl Contact {
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn get_short(&self, id: i32) -> AppResult<UserShort> {
        let query = format!("SELECT {} FROM users WHERE id = $1", SHORT_COLUMNS);
        sqlx::query_as::<_, UserShort>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username or email, case-insensitive
    pub async fn get_by_identifier(&self, identifier: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
            ORDER BY (LOWER(username) = LOWER($1)) DESC
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn username_exists(&self, username: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Create a user
    pub async fn create(&self, user: &NewUser<'_>) -> AppResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, first_name, last_name, role, department)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.role)
        .bind(user.department)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Username or email already registered".to_string())
            } else {
                e.into()
            }
        })?;
        Ok(row)
    }

    pub async fn touch_last_login(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.role.is_some() {
            conditions.push(format!("role = ${}", idx));
            idx += 1;
        }
        if query.department.is_some() {
            conditions.push(format!("department = ${}", idx));
            idx += 1;
        }
        if query.is_active.is_some() {
            conditions.push(format!("is_active = ${}", idx));
            idx += 1;
        }
        let search = query
            .search
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim().to_lowercase()));
        if search.is_some() {
            conditions.push(format!(
                "(LOWER(username) LIKE ${i} OR LOWER(email) LIKE ${i} \
                 OR LOWER(first_name) LIKE ${i} OR LOWER(last_name) LIKE ${i})",
                i = idx
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(role) = query.role { count_builder = count_builder.bind(role); }
        if let Some(ref dep) = query.department { count_builder = count_builder.bind(dep); }
        if let Some(active) = query.is_active { count_builder = count_builder.bind(active); }
        if let Some(ref s) = search { count_builder = count_builder.bind(s); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT {} FROM users {} ORDER BY date_joined DESC, id DESC LIMIT {} OFFSET {}",
            SHORT_COLUMNS, where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, UserShort>(&select_q);
        if let Some(role) = query.role { builder = builder.bind(role); }
        if let Some(ref dep) = query.department { builder = builder.bind(dep); }
        if let Some(active) = query.is_active { builder = builder.bind(active); }
        if let Some(ref s) = search { builder = builder.bind(s); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    pub async fn update_role(&self, id: i32, role: Role) -> AppResult<UserShort> {
        let query = format!(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING {}",
            SHORT_COLUMNS
        );
        sqlx::query_as::<_, UserShort>(&query)
            .bind(role)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn update_status(&self, id: i32, is_active: bool) -> AppResult<UserShort> {
        let query = format!(
            "UPDATE users SET is_active = $1 WHERE id = $2 RETURNING {}",
            SHORT_COLUMNS
        );
        sqlx::query_as::<_, UserShort>(&query)
            .bind(is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Ids of every active user, for broadcasts
    pub async fn active_ids(&self) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE is_active ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Keep only ids of existing active users
    pub async fn filter_active(&self, ids: &[i32]) -> AppResult<Vec<i32>> {
        let rows = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM users WHERE id = ANY($1) AND is_active ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn contacts(&self, ids: &[i32]) -> AppResult<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            "SELECT id, email, username, first_name, last_name FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
