//! User model, JWT claims and role capabilities

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::enums::{is_known_department, Role};
use crate::error::AppError;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.@+-]{3,150}$").expect("valid username regex"));

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        let mut err = ValidationError::new("username");
        err.message = Some("Username may only contain letters, digits and @.+-_".into());
        Err(err)
    }
}

fn validate_department(department: &str) -> Result<(), ValidationError> {
    if is_known_department(department) {
        Ok(())
    } else {
        let mut err = ValidationError::new("department");
        err.message = Some("Unknown department".into());
        Err(err)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", or the username when both names are blank
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{} {}", first_name, last_name);
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

/// Short user representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
}

/// Admin user search parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub department: Option<String>,
    /// Matches username, email, first or last name
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub last_name: String,
    #[validate(custom(function = "validate_department"))]
    pub department: Option<String>,
}

/// Admin role change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: Role,
}

/// Admin activation toggle
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserStatus {
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    EnrollInActivities,
    ScanAttendance,
    ViewOwnAttendance,
    ApplyForVolunteering,
    ViewInstructorDashboard,
    MarkAttendance,
    ViewAttendance,
    ReviewVolunteerApplications,
    SendNotifications,
    ViewCoordinatorDashboard,
    ManageActivities,
    IssueQrTokens,
    ManageUsers,
}

impl Capability {
    fn describe(&self) -> &'static str {
        match self {
            Capability::EnrollInActivities => "enroll in activities",
            Capability::ScanAttendance => "check in via QR code",
            Capability::ViewOwnAttendance => "view own attendance",
            Capability::ApplyForVolunteering => "apply for volunteering",
            Capability::ViewInstructorDashboard => "view the instructor dashboard",
            Capability::MarkAttendance => "mark attendance manually",
            Capability::ViewAttendance => "view activity attendance",
            Capability::ReviewVolunteerApplications => "review volunteer applications",
            Capability::SendNotifications => "send notifications",
            Capability::ViewCoordinatorDashboard => "view the coordinator dashboard",
            Capability::ManageActivities => "manage activities",
            Capability::IssueQrTokens => "issue QR codes",
            Capability::ManageUsers => "manage users",
        }
    }
}

const STUDENT_CAPABILITIES: &[Capability] = &[
    Capability::EnrollInActivities,
    Capability::ScanAttendance,
    Capability::ViewOwnAttendance,
    Capability::ApplyForVolunteering,
];

const INSTRUCTOR_CAPABILITIES: &[Capability] = &[
    Capability::ViewInstructorDashboard,
    Capability::MarkAttendance,
    Capability::ViewAttendance,
    Capability::ReviewVolunteerApplications,
    Capability::SendNotifications,
];

const COORDINATOR_CAPABILITIES: &[Capability] = &[
    Capability::ViewInstructorDashboard,
    Capability::MarkAttendance,
    Capability::ViewAttendance,
    Capability::ReviewVolunteerApplications,
    Capability::SendNotifications,
    Capability::ViewCoordinatorDashboard,
    Capability::ManageActivities,
    Capability::IssueQrTokens,
];

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Student => STUDENT_CAPABILITIES,
            Role::Instructor => INSTRUCTOR_CAPABILITIES,
            Role::Coordinator => COORDINATOR_CAPABILITIES,
            Role::Admin => &[],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        *self == Role::Admin || self.capabilities().contains(&capability)
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// First capability the role is missing
    Deny(Capability),
}

/// Checks that `role` holds every capability in `required`
pub fn authorize(role: Role, required: &[Capability]) -> Access {
    match required.iter().find(|c| !role.has(**c)) {
        Some(missing) => Access::Deny(*missing),
        None => Access::Allow,
    }
}

// ---------------------------------------------------------------------------
// JWT
// ---------------------------------------------------------------------------

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Require a single capability
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        self.require_all(&[capability])
    }

    pub fn require_all(&self, required: &[Capability]) -> Result<(), AppError> {
        match authorize(self.role, required) {
            Access::Allow => Ok(()),
            Access::Deny(missing) => Err(AppError::Authorization(format!(
                "Role '{}' is not allowed to {}",
                self.role,
                missing.describe()
            ))),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> UserClaims {
        UserClaims {
            sub: "someone".to_string(),
            user_id: 7,
            role,
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        }
    }

    #[test]
    fn test_only_coordinator_and_admin_issue_qr() {
        assert_eq!(authorize(Role::Coordinator, &[Capability::IssueQrTokens]), Access::Allow);
        assert_eq!(authorize(Role::Admin, &[Capability::IssueQrTokens]), Access::Allow);
        assert_eq!(
            authorize(Role::Instructor, &[Capability::IssueQrTokens]),
            Access::Deny(Capability::IssueQrTokens)
        );
        assert_eq!(
            authorize(Role::Student, &[Capability::IssueQrTokens]),
            Access::Deny(Capability::IssueQrTokens)
        );
    }

    #[test]
    fn test_manual_marking_roles() {
        for role in [Role::Instructor, Role::Coordinator, Role::Admin] {
            assert!(role.has(Capability::MarkAttendance), "{role} should mark attendance");
        }
        assert!(!Role::Student.has(Capability::MarkAttendance));
    }

    #[test]
    fn test_deny_reports_first_missing_capability() {
        let access = authorize(
            Role::Instructor,
            &[Capability::ViewAttendance, Capability::ManageUsers, Capability::IssueQrTokens],
        );
        assert_eq!(access, Access::Deny(Capability::ManageUsers));
        assert_eq!(authorize(Role::Student, &[]), Access::Allow);
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let err = claims(Role::Student).require(Capability::ManageUsers).unwrap_err();
        assert!(matches!(err, AppError::Authorization(msg) if msg.contains("manage users")));
        assert!(claims(Role::Admin).require(Capability::ManageUsers).is_ok());
    }

    #[test]
    fn test_token_round_trip() {
        let original = claims(Role::Coordinator);
        let token = original.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, 7);
        assert_eq!(decoded.role, Role::Coordinator);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(display_name("Ada", "Lovelace", "ada"), "Ada Lovelace");
        assert_eq!(display_name("", "", "ada"), "ada");
        assert_eq!(display_name("Ada", "", "ada"), "Ada");
    }

    #[test]
    fn test_register_validation() {
        let mut req = RegisterUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.edu".to_string(),
            password: "correct horse".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            department: Some("Nursing".to_string()),
        };
        assert!(req.validate().is_ok());

        req.department = Some("Astrology".to_string());
        assert!(req.validate().is_err());

        req.department = None;
        req.username = "no spaces allowed".to_string();
        assert!(req.validate().is_err());
    }
}
