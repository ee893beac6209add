//! # Tallyboard Binary
//!
//! The entry point that assembles the application from configuration and
//! compile-time features.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tb_api::{router, AppState};
use tb_config::{LogFormat, LogSettings, Settings, StoreBackend, StoreSettings};
use tb_core::traits::{AccountRepo, PostRepo};
use tb_services::Services;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "auth-jwt")]
use tb_auth_jwt::{Argon2Hasher, JwtTokenService};

#[cfg(feature = "db-memory")]
use tb_db_memory::MemoryStore;

#[cfg(feature = "db-sqlite")]
use tb_db_sqlite::SqliteStore;

#[cfg(not(feature = "auth-jwt"))]
compile_error!("tallyboard needs a token backend; enable the `auth-jwt` feature");

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);

    let (accounts, posts) = open_store(&settings.store).await?;

    let tokens = Arc::new(JwtTokenService::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::hours(settings.auth.token_ttl_hours),
    ));
    let services = Services::new(
        accounts,
        posts,
        tokens,
        Arc::new(Argon2Hasher::new()),
        settings.auth.admin_handles.clone(),
    );

    let app = router(
        AppState::new(services),
        Duration::from_secs(settings.server.request_timeout_secs),
    );

    let listener = TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    info!(address = %settings.server.bind, "tallyboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("tallyboard stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_store(store: &StoreSettings) -> Result<(Arc<dyn AccountRepo>, Arc<dyn PostRepo>)> {
    match store.backend {
        #[cfg(feature = "db-memory")]
        StoreBackend::Memory => {
            info!("using in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            let accounts: Arc<dyn AccountRepo> = store.clone();
            let posts: Arc<dyn PostRepo> = store;
            Ok((accounts, posts))
        }
        #[cfg(feature = "db-sqlite")]
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect(&store.sqlite_url, Duration::from_secs(store.timeout_secs))
                .await
                .with_context(|| format!("opening {}", store.sqlite_url))?;
            let store = Arc::new(store);
            let accounts: Arc<dyn AccountRepo> = store.clone();
            let posts: Arc<dyn PostRepo> = store;
            Ok((accounts, posts))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("store backend {other:?} is not compiled into this binary"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
