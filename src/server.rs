//! # Server Setup
//!
//! Shared application state, router construction, and the HTTP server loop.
//! Every request gets a trace context before any handler or auth middleware
//! runs, so error responses and logs correlate end to end.

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::auth;
use crate::config::AppConfig;
use crate::handlers;
use crate::oauth::Broker;
use crate::platforms::Registry;
use crate::repositories::{
    AuditRepository, ContentRepository, CredentialRepository, EnrichmentJobRepository,
    SyncJobRepository, TenantRepository,
};
use crate::router::CredentialRouter;
use crate::telemetry::{self, TraceContext};
use crate::vault::Vault;

/// Application state containing shared resources.
///
/// Repositories are cheap handle types over the shared connection pool, so
/// they are constructed on demand rather than stored.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub vault: Vault,
    pub registry: Registry,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        vault: Vault,
        registry: Registry,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            db,
            vault,
            registry,
            http,
        }
    }

    pub fn tenants(&self) -> TenantRepository {
        TenantRepository::new(self.db.clone())
    }

    pub fn credentials(&self) -> CredentialRepository {
        CredentialRepository::new(self.db.clone(), self.vault.clone())
    }

    pub fn sync_jobs(&self) -> SyncJobRepository {
        SyncJobRepository::new(self.db.clone())
    }

    pub fn enrichment_jobs(&self) -> EnrichmentJobRepository {
        EnrichmentJobRepository::new(self.db.clone())
    }

    pub fn content(&self) -> ContentRepository {
        ContentRepository::new(self.db.clone())
    }

    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.db.clone())
    }

    pub fn credential_router(&self) -> CredentialRouter {
        CredentialRouter::new(
            self.tenants(),
            self.credentials(),
            self.audit(),
            self.http.clone(),
            self.config.delivery.clone(),
        )
    }

    pub fn broker(&self) -> Broker {
        Broker::new(
            Arc::clone(&self.config),
            self.registry.clone(),
            self.vault.clone(),
            self.tenants(),
            self.credential_router(),
            self.sync_jobs(),
            self.audit(),
        )
    }
}

/// Assign a request-scoped trace ID and run the rest of the stack inside it,
/// so `ApiError` responses and log lines carry the same correlation ID.
async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let context = TraceContext {
        trace_id: format!("req-{}", &Uuid::new_v4().to_string()[..8]),
    };
    request.extensions_mut().insert(context.clone());
    telemetry::with_trace_context(context, next.run(request)).await
}

/// Creates and configures the Axum application router.
pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/tenants", post(handlers::tenants::upsert_tenant))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ));

    let tenant_routes = Router::new()
        .route("/credentials", get(handlers::credentials::list_credentials))
        .route("/credentials/token", get(handlers::credentials::get_token))
        .route("/jobs/sync", get(handlers::jobs::list_sync_jobs))
        .route("/jobs/enrichment", get(handlers::jobs::list_enrichment_jobs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::tenant_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::health::healthz))
        .route("/auth/{platform}", get(handlers::oauth::authorize))
        .route("/callback", get(handlers::oauth::callback))
        .merge(admin_routes)
        .merge(tenant_routes)
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the server, shutting down gracefully when `shutdown` is cancelled.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
