//! Marks active meal tickets past their validity as expired.

use std::time::Duration;

use chrono::Utc;
use crou_db::repositories::TicketRepo;
use crou_db::DbPool;
use tokio_util::sync::CancellationToken;

const EXPIRY_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the ticket expiry loop until `cancel` is triggered.
///
/// The first tick fires immediately, so tickets that lapsed while the
/// service was down are expired at startup.
pub async fn run(pool: DbPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = EXPIRY_INTERVAL.as_secs(),
        "Ticket expiry job started"
    );

    let mut interval = tokio::time::interval(EXPIRY_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Ticket expiry job stopping");
                break;
            }
            _ = interval.tick() => {
                let today = Utc::now().date_naive();
                match TicketRepo::expire_overdue(&pool, today).await {
                    Ok(expired) if expired > 0 => {
                        tracing::info!(expired, %today, "Ticket expiry: tickets expired");
                    }
                    Ok(_) => tracing::debug!("Ticket expiry: no overdue tickets"),
                    Err(e) => {
                        tracing::error!(error = %e, "Ticket expiry: update failed");
                    }
                }
            }
        }
    }
}
