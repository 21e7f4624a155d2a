//! Beyond EAMS server
//!
//! REST API server for university extracurricular activity management.

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eams_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Held until shutdown so buffered file logs are flushed
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Beyond EAMS server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config);

    if let Some(admin) = services.users.bootstrap_admin(&config.bootstrap).await? {
        tracing::info!(username = %admin.username, "Created initial administrator account");
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Console logging in the configured format, plus an optional daily JSON file
fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eams_server={},tower_http=info,sqlx=warn", config.level)));

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "eams-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        // Catalogue
        .route("/activities", get(api::activities::list_activities))
        .route("/activities/:id", get(api::activities::get_activity))
        .route("/categories", get(api::activities::list_categories))
        // Volunteer opportunities
        .route("/volunteering/opportunities", get(api::volunteering::list_opportunities))
        .route(
            "/volunteering/opportunities/by-activity/:id",
            get(api::volunteering::opportunity_by_activity),
        )
        // Notifications
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/count", get(api::notifications::unread_count))
        .route("/notifications/:id/read", post(api::notifications::mark_read))
        // Student
        .route("/student/dashboard", get(api::stats::student_dashboard))
        .route(
            "/student/activities/:id/enroll",
            post(api::enrollments::enroll).delete(api::enrollments::withdraw),
        )
        .route("/student/enrollments", get(api::enrollments::my_enrollments))
        .route("/student/recent-activities", get(api::enrollments::recent_activities))
        .route("/student/attendance", get(api::attendance::my_attendance))
        .route("/student/attendance/scan", post(api::attendance::scan))
        .route(
            "/student/volunteering/applications",
            get(api::volunteering::my_applications).post(api::volunteering::apply),
        )
        .route(
            "/student/volunteering/applications/:id/withdraw",
            post(api::volunteering::withdraw_application),
        )
        .route("/student/volunteering/stats", get(api::volunteering::my_stats))
        // Instructor
        .route("/instructor/stats", get(api::stats::instructor_stats))
        .route("/instructor/activities", get(api::activities::instructor_activities))
        .route("/instructor/activities/:id/participants", get(api::enrollments::participants))
        .route(
            "/instructor/activities/:id/attendance",
            get(api::attendance::attendance_sheet).post(api::attendance::mark_attendance),
        )
        .route("/instructor/students", get(api::stats::list_students))
        .route("/instructor/students/:id/participation", get(api::stats::student_participation))
        .route("/instructor/volunteering/applications", get(api::volunteering::list_applications))
        .route(
            "/instructor/volunteering/applications/pending-count",
            get(api::volunteering::pending_count),
        )
        .route(
            "/instructor/volunteering/applications/:id/approve",
            post(api::volunteering::approve_application),
        )
        .route(
            "/instructor/volunteering/applications/:id/reject",
            post(api::volunteering::reject_application),
        )
        .route("/instructor/volunteering/applications/:id/hours", post(api::volunteering::log_hours))
        // Coordinator
        .route("/coordinator/stats", get(api::stats::coordinator_stats))
        .route("/coordinator/reports", get(api::stats::coordinator_report))
        .route(
            "/coordinator/activities",
            get(api::activities::coordinator_activities).post(api::activities::create_activity),
        )
        .route(
            "/coordinator/activities/:id",
            put(api::activities::update_activity).delete(api::activities::delete_activity),
        )
        .route("/coordinator/activities/:id/publish", post(api::activities::publish_activity))
        .route("/coordinator/activities/:id/cancel", post(api::activities::cancel_activity))
        .route(
            "/coordinator/activities/:id/qr-token",
            post(api::attendance::issue_qr_token)
                .get(api::attendance::current_qr_token)
                .delete(api::attendance::deactivate_qr_tokens),
        )
        .route("/coordinator/activities/:id/scan-logs", get(api::attendance::scan_logs))
        .route("/coordinator/activities/:id/notify", post(api::notifications::notify_participants))
        .route("/coordinator/categories", post(api::activities::create_category))
        .route("/coordinator/notifications", post(api::notifications::send_notification))
        .route("/coordinator/volunteering/sync", post(api::volunteering::sync_opportunities))
        // Admin
        .route("/admin/dashboard", get(api::stats::admin_dashboard))
        .route("/admin/users", get(api::users::list_users))
        .route("/admin/users/:id/role", put(api::users::update_role))
        .route("/admin/users/:id/status", put(api::users::update_status))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
