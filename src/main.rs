mod auth;
mod catalog;
mod collections;
mod config;
mod db;
mod entities;
mod error;
mod extract;
mod flash;
mod models;
mod routes;
mod search;
mod stats;
mod templates;
mod tmdb;

use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::AuthService, collections::CollectionStore, config::Config, models::Movie,
    tmdb::TmdbClient,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub auth: AuthService,
    pub collections: CollectionStore,
    pub tmdb: TmdbClient,
    /// Curated movies searched before falling back to TMDB.
    pub catalog: Vec<Movie>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinelist=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent("cinelist/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;

    let auth = AuthService::new(db.clone(), config.clone());
    auth.sync_admins().await?;
    spawn_auth_maintenance(auth.clone());

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_language.clone(),
        config.tmdb_rps,
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        collections: CollectionStore::new(db.clone()),
        db,
        auth,
        tmdb,
        catalog: catalog::movies(),
    });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Drops expired sessions and idle sign-in limiter entries, once at startup
/// and then every few minutes.
fn spawn_auth_maintenance(auth: AuthService) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(5 * 60));
        loop {
            tick.tick().await;
            if let Err(err) = auth.purge_expired_sessions().await {
                tracing::warn!(error = %err, "session purge failed");
            }
            auth.prune_sign_in_attempts();
        }
    });
}
