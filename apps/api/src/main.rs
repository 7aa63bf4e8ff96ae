//! Drivelane API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use drivelane_application::{
    DirectoryRepository, PermissionResolver, RoleAdminService, TargetService,
};
use drivelane_core::AppError;
use drivelane_infrastructure::{
    HttpDirectoryClient, InMemoryResolutionCache, PostgresAuditRepository,
    PostgresDirectoryRepository, PostgresServiceRecordRepository, PostgresTargetRepository,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    let directory_provider =
        env::var("DIRECTORY_PROVIDER").unwrap_or_else(|_| "postgres".to_owned());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let directory: Arc<dyn DirectoryRepository> = match directory_provider.as_str() {
        "postgres" => Arc::new(PostgresDirectoryRepository::new(pool.clone())),
        "http" => {
            let base_url = required_non_empty_env("DIRECTORY_BASE_URL")?;
            let base_url = Url::parse(&base_url).map_err(|error| {
                AppError::Validation(format!("invalid DIRECTORY_BASE_URL: {error}"))
            })?;
            Arc::new(HttpDirectoryClient::new(reqwest::Client::new(), base_url))
        }
        _ => {
            return Err(AppError::Validation(format!(
                "DIRECTORY_PROVIDER must be either 'postgres' or 'http', got '{directory_provider}'"
            )));
        }
    };

    let cache = Arc::new(InMemoryResolutionCache::new());
    let resolver = PermissionResolver::new(directory.clone(), cache.clone());

    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let role_admin_service = RoleAdminService::new(
        resolver.clone(),
        directory,
        cache,
        audit_repository.clone(),
    );

    let target_repository = Arc::new(PostgresTargetRepository::new(pool.clone()));
    let service_record_repository = Arc::new(PostgresServiceRecordRepository::new(pool.clone()));
    let target_service = TargetService::new(
        resolver.clone(),
        target_repository,
        service_record_repository,
        audit_repository,
    );

    let app_state = AppState {
        role_admin_service,
        target_service,
        resolver,
        frontend_url: frontend_url.clone(),
    };

    let protected_routes = Router::new()
        .route(
            "/api/permissions",
            get(handlers::security::list_permission_catalog_handler),
        )
        .route(
            "/api/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/roles/{role_id}",
            delete(handlers::security::delete_role_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions",
            put(handlers::security::set_role_permissions_handler),
        )
        .route(
            "/api/role-assignments",
            get(handlers::security::list_role_assignments_handler)
                .post(handlers::security::assign_role_handler),
        )
        .route(
            "/api/role-unassignments",
            post(handlers::security::unassign_role_handler),
        )
        .route(
            "/api/me/permissions",
            get(handlers::security::my_permissions_handler),
        )
        .route(
            "/api/service-records",
            post(handlers::targets::ingest_service_records_handler),
        )
        .route(
            "/api/targets/city",
            put(handlers::targets::save_city_target_handler)
                .get(handlers::targets::city_target_handler),
        )
        .route(
            "/api/targets/advisors",
            get(handlers::targets::advisor_targets_handler),
        )
        .route(
            "/api/targets/distribute",
            post(handlers::targets::distribute_automatic_handler),
        )
        .route(
            "/api/targets/advisor",
            post(handlers::targets::distribute_manual_handler),
        )
        .route(
            "/api/achievements/advisor",
            get(handlers::targets::advisor_achievement_handler),
        )
        .route(
            "/api/achievements/city",
            get(handlers::targets::city_achievement_handler),
        )
        .route_layer(from_fn(middleware::require_identity));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "drivelane-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
