//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`PlatformEvent`] to the `events` table. It
//! stops when the bus sender is dropped.

use crou_core::types::DbId;
use crou_db::models::event::CreateEvent;
use crou_db::repositories::EventRepo;
use crou_db::DbPool;
use tokio::sync::{broadcast, mpsc};

use crate::bus::PlatformEvent;

/// An event together with the id of its `events` row.
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub id: DbId,
    pub event: PlatformEvent,
}

pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    ///
    /// Each successfully stored event is sent on `forward` when given.
    pub async fn run(
        pool: DbPool,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        forward: Option<mpsc::Sender<PersistedEvent>>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => match Self::persist(&pool, &event).await {
                    Ok(id) => {
                        if let Some(tx) = &forward {
                            if tx.send(PersistedEvent { id, event }).await.is_err() {
                                tracing::debug!("Persisted event consumer is gone");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event to the `events` table.
    pub async fn persist(pool: &DbPool, event: &PlatformEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &CreateEvent {
                event_type: event.event_type.clone(),
                source_entity_type: event.source_entity_type.clone(),
                source_entity_id: event.source_entity_id,
                actor_user_id: event.actor_user_id,
                tenant_id: event.tenant_id,
                payload: event.payload.clone(),
            },
        )
        .await
    }
}
