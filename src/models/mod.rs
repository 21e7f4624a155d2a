//! Data models for the activity management server

pub mod activity;
pub mod attendance;
pub mod enrollment;
pub mod enums;
pub mod notification;
pub mod stats;
pub mod user;
pub mod volunteer;

// Re-export commonly used types
pub use activity::{Activity, ActivityCategory, ActivitySummary};
pub use attendance::{AttendanceRecord, QrPayload, QrToken};
pub use enrollment::Enrollment;
pub use enums::{ActivityStatus, ApplicationStatus, EnrollmentStatus, Role};
pub use notification::Notification;
pub use user::{User, UserClaims, UserShort};
pub use volunteer::{VolunteerApplication, VolunteerOpportunity};
