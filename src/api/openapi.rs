//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{activities, attendance, auth, enrollments, health, notifications, stats, users, volunteering};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Beyond EAMS API",
        version = "1.0.0",
        description = "Extracurricular Activity Management System REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Activities
        activities::list_activities,
        activities::get_activity,
        activities::list_categories,
        activities::instructor_activities,
        activities::coordinator_activities,
        activities::create_activity,
        activities::update_activity,
        activities::delete_activity,
        activities::publish_activity,
        activities::cancel_activity,
        activities::create_category,
        // Enrollments
        enrollments::enroll,
        enrollments::withdraw,
        enrollments::my_enrollments,
        enrollments::recent_activities,
        enrollments::participants,
        // Attendance
        attendance::scan,
        attendance::my_attendance,
        attendance::mark_attendance,
        attendance::attendance_sheet,
        attendance::issue_qr_token,
        attendance::current_qr_token,
        attendance::deactivate_qr_tokens,
        attendance::scan_logs,
        // Volunteering
        volunteering::list_opportunities,
        volunteering::opportunity_by_activity,
        volunteering::sync_opportunities,
        volunteering::my_applications,
        volunteering::apply,
        volunteering::withdraw_application,
        volunteering::my_stats,
        volunteering::list_applications,
        volunteering::pending_count,
        volunteering::approve_application,
        volunteering::reject_application,
        volunteering::log_hours,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::send_notification,
        notifications::notify_participants,
        // Dashboards
        stats::student_dashboard,
        stats::instructor_stats,
        stats::list_students,
        stats::student_participation,
        stats::coordinator_stats,
        stats::coordinator_report,
        stats::admin_dashboard,
        // Admin
        users::list_users,
        users::update_role,
        users::update_status,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::Role,
            crate::models::enums::ActivityStatus,
            crate::models::enums::Difficulty,
            crate::models::enums::EnrollmentStatus,
            crate::models::enums::AttendanceStatus,
            crate::models::enums::VerificationMethod,
            crate::models::enums::ApplicationStatus,
            crate::models::enums::NotificationType,
            crate::models::enums::Priority,
            // Auth and users
            auth::LoginRequest,
            auth::LoginResponse,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateRole,
            crate::models::user::UpdateUserStatus,
            // Activities
            crate::models::activity::Activity,
            crate::models::activity::ActivitySummary,
            crate::models::activity::ActivityCategory,
            crate::models::activity::CreateActivity,
            crate::models::activity::UpdateActivity,
            crate::models::activity::CreateCategory,
            // Enrollments
            crate::models::enrollment::Enrollment,
            crate::models::enrollment::EnrollmentDetail,
            crate::models::enrollment::Participant,
            crate::models::enrollment::EnrollResponse,
            // Attendance
            crate::models::attendance::QrToken,
            crate::models::attendance::TokenState,
            crate::models::attendance::QrPayload,
            crate::models::attendance::IssueQrToken,
            crate::models::attendance::QrTokenResponse,
            crate::models::attendance::ScanRequest,
            crate::models::attendance::ScanResponse,
            crate::models::attendance::ManualAttendance,
            crate::models::attendance::AttendanceRecord,
            crate::models::attendance::AttendanceDetail,
            crate::models::attendance::AttendanceStats,
            crate::models::attendance::AttendanceSheet,
            crate::models::attendance::ScanLog,
            attendance::DeactivateResponse,
            // Volunteering
            crate::models::volunteer::VolunteerOpportunity,
            crate::models::volunteer::OpportunitySummary,
            crate::models::volunteer::VolunteerApplication,
            crate::models::volunteer::ApplicationDetail,
            crate::models::volunteer::CreateApplication,
            crate::models::volunteer::ReviewApplication,
            crate::models::volunteer::LogHours,
            crate::models::volunteer::SyncReport,
            crate::models::volunteer::VolunteerStats,
            volunteering::PendingCount,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::SendNotification,
            crate::models::notification::NotifyParticipants,
            crate::models::notification::SendReport,
            crate::models::notification::UnreadCount,
            // Dashboards
            crate::models::stats::StudentDashboard,
            crate::models::stats::InstructorStats,
            crate::models::stats::StudentOverview,
            crate::models::stats::StudentParticipation,
            crate::models::stats::CoordinatorStats,
            crate::models::stats::CoordinatorReport,
            crate::models::stats::ReportOverview,
            crate::models::stats::StatusCount,
            crate::models::stats::MonthlyCount,
            crate::models::stats::AdminDashboard,
            crate::models::stats::AdminTotals,
            crate::models::stats::RoleCount,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::ScanRejection,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "activities", description = "Activity catalogue"),
        (name = "student", description = "Enrollment, check-in and student dashboard"),
        (name = "instructor", description = "Attendance oversight and application review"),
        (name = "coordinator", description = "Activity management, QR codes and reports"),
        (name = "volunteering", description = "Volunteer opportunities"),
        (name = "notifications", description = "In-app notifications"),
        (name = "admin", description = "User administration")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
