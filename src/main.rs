use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use quiz_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    database::postgres::PgStore,
    middleware::cors::cors_layer,
    routes, AppState,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config()?;

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;

    let state = AppState::new(
        Arc::new(
            PgStore::new(pool)
                .with_lock_timeout(Duration::from_millis(config.db_lock_timeout_ms)),
        ),
        &config.jwt_secret,
        config.token_ttl_hours,
    );

    if let Some(admin) = &config.bootstrap_admin {
        let user = state
            .user_service
            .ensure_admin(&admin.email, &admin.phone, &admin.password)
            .await?;
        info!(user_id = %user.id, email = %admin.email, "administrator account ready");
    }

    let app = routes::router(state, config.public_rps, config.admin_rps).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer())
            .layer(DefaultBodyLimit::max(1024 * 1024)),
    );

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
