//! pulse-ach library - Achievement service
//!
//! Evaluates users' health records against the badge catalog, appends newly
//! earned badges to the ledger and pushes notifications to connected
//! clients.

use axum::Router;
use pulse_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod ledger;
pub mod notify;
pub mod reconciler;
pub mod triggers;

use catalog::BadgeCatalog;
use history::SqliteHistory;
use ledger::SqliteLedger;
use notify::{ConnectionRegistry, NotificationChannel};
use reconciler::Reconciler;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Record store connection pool
    pub db: SqlitePool,
    pub catalog: Arc<BadgeCatalog>,
    pub reconciler: Arc<Reconciler>,
    /// Live client connections
    pub channel: NotificationChannel,
    /// Internal write notifications
    pub events: Arc<EventBus>,
}

impl AppState {
    /// Wire the SQLite ledger and history into a reconciler
    pub fn new(
        db: SqlitePool,
        catalog: Arc<BadgeCatalog>,
        registry: Arc<ConnectionRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        let channel = NotificationChannel::new(registry);
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&catalog),
            Arc::new(SqliteLedger::new(db.clone())),
            Arc::new(SqliteHistory::new(db.clone())),
            channel.clone(),
            Arc::clone(&events),
        ));

        Self {
            db,
            catalog,
            reconciler,
            channel,
            events,
        }
    }
}

/// Build application router
///
/// `/health` and `/ws` take no `X-User-Id`; every `/api` route requires it.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let api = Router::new()
        .route("/api/badges", get(api::list_badges))
        .route("/api/achievements", get(api::get_achievements))
        .route("/api/achievements/reconcile", post(api::reconcile_now))
        .route("/api/health-metrics", post(api::create_metric))
        .route("/api/workouts", post(api::create_workout))
        .route("/api/meals", post(api::create_meal))
        .route("/api/medications/doses", post(api::create_dose))
        .route("/api/medications/doses/:id/take", post(api::take_dose))
        .route("/api/goals", post(api::create_goal))
        .route("/api/goals/:id/complete", post(api::complete_goal))
        .route("/api/profile", put(api::update_profile));

    let public = Router::new()
        .route("/ws", get(api::ws_handler))
        .merge(api::health_routes());

    Router::new()
        .merge(api)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
