//! Shared domain enums, stored as TEXT columns

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, Postgres,
};
use utoipa::ToSchema;

/// Declares a string-backed enum with serde, OpenAPI and sqlx (TEXT) support.
/// Each variant's text must be the snake_case form of its name.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let s = <&str as Decode<Postgres>>::decode(value)?;
                s.parse().map_err(Into::into)
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

text_enum! {
    /// User role
    Role {
        Student => "student",
        Instructor => "instructor",
        Coordinator => "coordinator",
        Admin => "admin",
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl Role {
    /// Staff roles may coordinate volunteer opportunities
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

/// University departments a user may belong to
pub const DEPARTMENTS: &[&str] = &[
    "Accounting",
    "Biological Sciences and Agriculture",
    "Education",
    "Foods, Nutrition and Dietetics",
    "Humanities and Social Sciences",
    "Information Systems and Computing",
    "Management",
    "Mathematics, Chemistry and Physics",
    "Medical Laboratory Science",
    "Nursing",
    "Public Health",
    "Technology and Applied Sciences",
    "Theology and Religious Studies",
];

pub fn is_known_department(name: &str) -> bool {
    DEPARTMENTS.contains(&name)
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

text_enum! {
    /// Stored activity status
    ActivityStatus {
        Draft => "draft",
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    Difficulty {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

text_enum! {
    /// Participation state of a user in an activity
    EnrollmentStatus {
        Enrolled => "enrolled",
        Completed => "completed",
        Withdrawn => "withdrawn",
        Cancelled => "cancelled",
    }
}

impl EnrollmentStatus {
    /// Enrolled or completed enrollments count against capacity
    pub fn is_participating(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled | EnrollmentStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

text_enum! {
    AttendanceStatus {
        Present => "present",
        Absent => "absent",
        Excused => "excused",
    }
}

text_enum! {
    VerificationMethod {
        QrCode => "qr_code",
        Manual => "manual",
    }
}

// ---------------------------------------------------------------------------
// Volunteering
// ---------------------------------------------------------------------------

text_enum! {
    /// Volunteer application workflow state
    ApplicationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Active => "active",
        Completed => "completed",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    /// Statuses that hold one of the opportunity's volunteer spots
    pub const HOLDING_SPOT: &'static [ApplicationStatus] = &[
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Active,
        ApplicationStatus::Completed,
    ];

    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Withdrawn)
                | (Approved, Active)
                | (Approved, Withdrawn)
                | (Active, Completed)
        )
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

text_enum! {
    NotificationType {
        General => "general",
        Activity => "activity",
        Volunteer => "volunteer",
        Approval => "approval",
        Reminder => "reminder",
        System => "system",
    }
}

impl Default for NotificationType {
    fn default() -> Self {
        NotificationType::General
    }
}

text_enum! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_round_trip_matches_serde() {
        for role in Role::ALL {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        let json = serde_json::to_string(&VerificationMethod::QrCode).unwrap();
        assert_eq!(json, "\"qr_code\"");
    }

    #[test]
    fn test_unknown_text_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("Enrolled".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn test_application_transitions() {
        use ApplicationStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Withdrawn));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_departments() {
        assert_eq!(DEPARTMENTS.len(), 13);
        assert!(is_known_department("Nursing"));
        assert!(!is_known_department("nursing"));
    }
}
