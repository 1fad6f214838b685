//!
//! youthmh HTTP server
//! -------------------
//! Axum router for the portal backend.
//!
//! Responsibilities:
//! - Stateless dispatch endpoints: document counts, resource listing, single and bulk mail.
//! - Cookie sessions: login/logout and a session summary.
//! - Page navigation through the route guard for every other GET path.
//! - Background sweep of expired sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{header::CONTENT_TYPE, Method};
use axum::routing::{any, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::identity::{AuthProvider, LocalAuthProvider, SessionManager};
use crate::mail::{BulkMailer, Mailer, SendGridMailer, SmtpMailer};
use crate::routing::{RouteGuard, RouteTable};
use crate::store::{DocumentStore, FirestoreStore, MemoryStore};

pub mod handlers;
pub mod pages;

/// Request bodies may carry base64 attachments.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared server state injected into all handlers.
///
/// Mailers are `None` when their credentials are not configured; the matching endpoint then
/// answers 500 without touching the network.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub smtp: Option<Arc<dyn Mailer>>,
    pub bulk: Option<Arc<dyn BulkMailer>>,
    pub sessions: Arc<SessionManager>,
    pub auth: Arc<dyn AuthProvider>,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn with_backends(
        config: Config,
        store: Arc<dyn DocumentStore>,
        smtp: Option<Arc<dyn Mailer>>,
        bulk: Option<Arc<dyn BulkMailer>>,
    ) -> Self {
        let sessions = SessionManager::with_ttl(Duration::from_secs(config.session_ttl_secs));
        let auth = LocalAuthProvider::new(config.users.clone());
        Self {
            config: Arc::new(config),
            store,
            smtp,
            bulk,
            sessions: Arc::new(sessions),
            auth: Arc::new(auth),
            guard: RouteGuard::new(RouteTable::portal()),
        }
    }

    /// Wire real backends from configuration.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("youthmh/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("While building the outbound HTTP client")?;

        let store: Arc<dyn DocumentStore> = match FirestoreStore::from_settings(client.clone(), &config.firestore) {
            Some(fs) => {
                info!(target: "startup", url = fs.documents_url(), "using Firestore document store");
                Arc::new(fs)
            }
            None => {
                warn!(target: "startup", "FIRESTORE_PROJECT_ID not set; using an empty in-memory document store");
                Arc::new(MemoryStore::new())
            }
        };

        let smtp: Option<Arc<dyn Mailer>> = if config.smtp.is_configured() {
            match SmtpMailer::from_settings(&config.smtp) {
                Ok(m) => Some(Arc::new(m)),
                Err(e) => {
                    warn!(target: "startup", "SMTP transport could not be built, /sendMail disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        let bulk: Option<Arc<dyn BulkMailer>> = config
            .sendgrid
            .api_key
            .clone()
            .map(|key| Arc::new(SendGridMailer::new(client.clone(), key)) as Arc<dyn BulkMailer>);

        Ok(Self::with_backends(config, store, smtp, bulk))
    }
}

/// Build the router with CORS and body limits applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/countBooks", any(handlers::count_books))
        .route("/sendMail", any(handlers::send_mail))
        .route("/sendBulkEmail", post(handlers::send_bulk_email))
        .route("/api/resources", get(handlers::list_resources))
        .route("/api/resources/count", get(handlers::count_resources))
        .route("/login", post(pages::login))
        .route("/logout", post(pages::logout))
        .route("/session", get(pages::session_info))
        .fallback(pages::navigate)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and block until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.log_summary();
    let port = config.http_port;
    let state = AppState::from_config(config)?;

    // Background session sweeper
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
                let removed = sessions.sweep_expired();
                if removed > 0 { debug!(target: "session", removed = removed, "session_sweep"); }
            }
        });
    }

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
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
