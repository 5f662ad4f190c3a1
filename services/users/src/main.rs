use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod models;
mod repositories;
mod routes;
mod security;
mod service;
mod validation;

use sqlx::PgPool;

use crate::repositories::PgUserRepository;
use crate::security::{Argon2PasswordEncoder, PasswordEncoder};
use crate::service::UserService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub user_service: UserService,
    pub password_encoder: Arc<dyn PasswordEncoder>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting user administration service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let password_encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2PasswordEncoder);
    let user_repository = Arc::new(PgUserRepository::new(pool.clone()));
    let user_service = UserService::new(user_repository, password_encoder.clone());

    info!("User administration service initialized successfully");

    let app_state = AppState {
        db_pool: pool,
        user_service,
        password_encoder,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("User administration service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
