//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::{AuthConfig, BootstrapConfig},
    error::{AppError, AppResult},
    models::{
        enums::Role,
        user::{RegisterUser, User, UserClaims, UserQuery, UserShort},
    },
    repository::{users::NewUser, Repository},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by username or email and return a JWT token
    pub async fn authenticate(&self, identifier: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_identifier(identifier.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(&user.password, password)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        if !user.is_active {
            return Err(AppError::Authentication("Account is disabled".to_string()));
        }

        self.repository.users.touch_last_login(user.id).await?;
        let token = self.create_token_for_user(&user)?;

        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        Ok((token, user))
    }

    /// Self-registration; new accounts are students
    pub async fn register(&self, data: &RegisterUser) -> AppResult<(String, User)> {
        if self.repository.users.username_exists(&data.username).await? {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        if self.repository.users.email_exists(&data.email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&data.password)?;
        let user = self
            .repository
            .users
            .create(&NewUser {
                username: data.username.trim(),
                email: data.email.trim(),
                password_hash: &password_hash,
                first_name: data.first_name.trim(),
                last_name: data.last_name.trim(),
                role: Role::Student,
                department: data.department.as_deref(),
            })
            .await?;

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok((token, user))
    }

    /// Create the configured administrator when no admin account exists
    pub async fn bootstrap_admin(&self, bootstrap: &BootstrapConfig) -> AppResult<Option<User>> {
        let (Some(username), Some(email), Some(password)) = (
            bootstrap.admin_username.as_deref(),
            bootstrap.admin_email.as_deref(),
            bootstrap.admin_password.as_deref(),
        ) else {
            return Ok(None);
        };

        if self.repository.users.admin_exists().await? {
            return Ok(None);
        }

        let password_hash = hash_password(password)?;
        let user = self
            .repository
            .users
            .create(&NewUser {
                username,
                email,
                password_hash: &password_hash,
                first_name: "",
                last_name: "",
                role: Role::Admin,
                department: None,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Created bootstrap administrator");
        Ok(Some(user))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query).await
    }

    /// Change a user's role; admins cannot demote themselves
    pub async fn update_role(&self, actor: &UserClaims, id: i32, role: Role) -> AppResult<UserShort> {
        if actor.user_id == id && role != Role::Admin {
            return Err(AppError::BadRequest("You cannot change your own role".to_string()));
        }
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!(user_id = id, role = %role, by = actor.user_id, "User role changed");
        Ok(user)
    }

    pub async fn update_status(&self, actor: &UserClaims, id: i32, is_active: bool) -> AppResult<UserShort> {
        if actor.user_id == id && !is_active {
            return Err(AppError::BadRequest("You cannot deactivate your own account".to_string()));
        }
        let user = self.repository.users.update_status(id, is_active).await?;
        tracing::info!(user_id = id, is_active, by = actor.user_id, "User status changed");
        Ok(user)
    }
}

/// Verify a password against an argon2 hash
fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "s3cret-pass").unwrap());
        assert!(!verify_password(&hash, "wrong").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_internal_error() {
        assert!(matches!(verify_password("plain", "plain"), Err(AppError::Internal(_))));
    }
}
