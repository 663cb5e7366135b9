use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::housing_batch::BatchTasks;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the pool is reference counted and the rest sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: crou_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Event bus for publishing platform events.
    pub event_bus: Arc<crou_events::EventBus>,
    /// Housing batch runs in flight, drained at shutdown.
    pub batch_tasks: BatchTasks,
}

impl AppState {
    /// Publish an event on the shared bus.
    pub fn publish(&self, event: crou_events::PlatformEvent) {
        self.event_bus.publish(event);
    }
}
