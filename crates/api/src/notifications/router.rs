//! Event-to-notification routing engine.
//!
//! Each event type maps to an [`Audience`]: the permission a recipient must
//! hold and how far up the tenant hierarchy to look for recipients. The
//! acting user is never notified of their own action unless the audience
//! says so.

use std::collections::BTreeSet;

use crou_core::event_types::*;
use crou_core::roles::{
    PERM_ALLOCATION_APPROVE, PERM_ALLOCATION_EXECUTE, PERM_ALLOCATION_REQUEST, PERM_BUDGET_APPROVE,
    PERM_BUDGET_WRITE, PERM_HOUSING_PROCESS, PERM_HOUSING_WRITE, PERM_RESTAURATION_WRITE,
    PERM_TRANSACTION_WRITE, PERM_USERS_MANAGE,
};
use crou_core::tenant;
use crou_core::types::DbId;
use crou_db::models::notification::CreateNotification;
use crou_db::repositories::{NotificationRepo, TenantRepo, UserRepo};
use crou_db::DbPool;
use crou_events::{PersistedEvent, PlatformEvent};
use tokio::sync::mpsc;

/// Which tenants to search for recipients, relative to the event's tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// Only the event's own tenant.
    Tenant,
    /// The event's tenant and all of its ancestors.
    Ancestors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audience {
    pub permission: &'static str,
    pub reach: Reach,
    pub include_actor: bool,
}

impl Audience {
    const fn new(permission: &'static str, reach: Reach) -> Self {
        Self {
            permission,
            reach,
            include_actor: false,
        }
    }

    const fn with_actor(mut self) -> Self {
        self.include_actor = true;
        self
    }
}

/// Recipients of each event type. `None` for events nobody subscribes to.
pub fn audience_for(event_type: &str) -> Option<Audience> {
    use Reach::*;
    let audience = match event_type {
        EVT_BUDGET_SUBMITTED => Audience::new(PERM_BUDGET_APPROVE, Ancestors),
        EVT_BUDGET_APPROVED | EVT_BUDGET_REJECTED | EVT_BUDGET_CLOSED => {
            Audience::new(PERM_BUDGET_WRITE, Tenant)
        }
        EVT_ALLOCATION_REQUESTED => Audience::new(PERM_ALLOCATION_APPROVE, Ancestors),
        EVT_ALLOCATION_APPROVED => Audience::new(PERM_ALLOCATION_EXECUTE, Ancestors),
        EVT_ALLOCATION_REJECTED => Audience::new(PERM_ALLOCATION_REQUEST, Tenant),
        EVT_ALLOCATION_EXECUTED => Audience::new(PERM_BUDGET_WRITE, Tenant),
        EVT_ALLOCATION_CANCELLED => Audience::new(PERM_ALLOCATION_APPROVE, Tenant),
        EVT_TRANSACTION_VALIDATED | EVT_TRANSACTION_REJECTED => {
            Audience::new(PERM_TRANSACTION_WRITE, Tenant)
        }
        EVT_CAMPAIGN_OPENED | EVT_CAMPAIGN_CLOSED => Audience::new(PERM_HOUSING_WRITE, Tenant),
        EVT_CAMPAIGN_COMPLETED | EVT_CAMPAIGN_FAILED => {
            Audience::new(PERM_HOUSING_PROCESS, Tenant).with_actor()
        }
        EVT_TICKETS_GENERATED => Audience::new(PERM_RESTAURATION_WRITE, Tenant),
        EVT_STOCK_LOW => Audience::new(PERM_RESTAURATION_WRITE, Ancestors),
        EVT_USER_LOCKED => Audience::new(PERM_USERS_MANAGE, Ancestors),
        _ => return None,
    };
    Some(audience)
}

/// Human-readable title and optional body for an event.
pub fn render(event: &PlatformEvent) -> (String, Option<String>) {
    let p = &event.payload;
    let text = |key: &str| p.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
    let number = |key: &str| p.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
    let reason = p
        .get("reason")
        .and_then(|v| v.as_str())
        .map(|r| format!("Reason: {r}"));

    match event.event_type.as_str() {
        EVT_BUDGET_SUBMITTED => (
            format!("Budget '{}' submitted for approval", text("title")),
            Some(format!("Fiscal year {}", number("fiscalYear"))),
        ),
        EVT_BUDGET_APPROVED => (format!("Budget '{}' approved", text("title")), None),
        EVT_BUDGET_REJECTED => (format!("Budget '{}' rejected", text("title")), reason),
        EVT_BUDGET_CLOSED => (format!("Budget '{}' closed", text("title")), None),
        EVT_ALLOCATION_REQUESTED => (
            format!("Allocation of {} requested", number("amount")),
            None,
        ),
        EVT_ALLOCATION_APPROVED => (
            format!("Allocation of {} approved, ready to execute", number("amount")),
            None,
        ),
        EVT_ALLOCATION_REJECTED => (
            format!("Allocation of {} rejected", number("amount")),
            reason,
        ),
        EVT_ALLOCATION_EXECUTED => (
            format!("Allocation of {} received", number("amount")),
            None,
        ),
        EVT_ALLOCATION_CANCELLED => (
            format!("Allocation of {} cancelled", number("amount")),
            None,
        ),
        EVT_TRANSACTION_VALIDATED => (
            format!("Expense of {} validated", number("amount")),
            Some(text("category")),
        ),
        EVT_TRANSACTION_REJECTED => (
            format!("Expense of {} rejected", number("amount")),
            reason,
        ),
        EVT_CAMPAIGN_OPENED => (
            format!("Housing campaign '{}' is open", text("name")),
            None,
        ),
        EVT_CAMPAIGN_CLOSED => (
            format!("Housing campaign '{}' is closed", text("name")),
            None,
        ),
        EVT_CAMPAIGN_COMPLETED => (
            format!("Housing campaign '{}' processed", text("name")),
            Some(format!(
                "{} assigned, {} unassigned",
                number("assigned"),
                number("unassigned")
            )),
        ),
        EVT_CAMPAIGN_FAILED => (
            format!("Housing campaign '{}' processing failed", text("name")),
            p.get("error").and_then(|v| v.as_str()).map(str::to_string),
        ),
        EVT_TICKETS_GENERATED => (
            format!("{} meal tickets generated", number("count")),
            Some(format!("Batch {}", text("batchRef"))),
        ),
        EVT_STOCK_LOW => (
            format!("Low stock: {}", text("name")),
            p.get("quantity")
                .and_then(|v| v.as_f64())
                .map(|q| format!("{q} {} left", text("unit"))),
        ),
        EVT_USER_LOCKED => (
            format!("Account {} locked after failed logins", text("email")),
            None,
        ),
        other => (other.to_string(), None),
    }
}

/// Writes in-app notifications for persisted events.
pub struct NotificationRouter {
    pool: DbPool,
}

impl NotificationRouter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run the routing loop until the persistence service drops its sender.
    pub async fn run(self, mut receiver: mpsc::Receiver<PersistedEvent>) {
        while let Some(persisted) = receiver.recv().await {
            if let Err(e) = self.route_event(&persisted).await {
                tracing::error!(
                    error = %e,
                    event_id = persisted.id,
                    event_type = %persisted.event.event_type,
                    "Failed to route event"
                );
            }
        }
        tracing::info!("Event stream closed, notification router shutting down");
    }

    /// Route a single event to all affected users. Returns how many
    /// notifications were written.
    pub async fn route_event(&self, persisted: &PersistedEvent) -> Result<usize, sqlx::Error> {
        let event = &persisted.event;
        let Some(audience) = audience_for(&event.event_type) else {
            return Ok(0);
        };

        let recipients = self.determine_targets(event, audience).await?;
        if recipients.is_empty() {
            tracing::debug!(event_type = %event.event_type, "No recipients for event");
            return Ok(0);
        }

        let (title, body) = render(event);
        for &user_id in &recipients {
            NotificationRepo::create(
                &self.pool,
                &CreateNotification {
                    user_id,
                    event_id: Some(persisted.id),
                    title: title.clone(),
                    body: body.clone(),
                },
            )
            .await?;
        }
        tracing::debug!(
            event_id = persisted.id,
            event_type = %event.event_type,
            recipients = recipients.len(),
            "Notifications delivered"
        );
        Ok(recipients.len())
    }

    async fn determine_targets(
        &self,
        event: &PlatformEvent,
        audience: Audience,
    ) -> Result<BTreeSet<DbId>, sqlx::Error> {
        let mut targets = BTreeSet::new();

        if let Some(tenant_id) = event.tenant_id {
            let tenant_ids = match audience.reach {
                Reach::Tenant => vec![tenant_id],
                Reach::Ancestors => match TenantRepo::find_by_id(&self.pool, tenant_id).await? {
                    Some(t) => tenant::path_ids(&t.path),
                    None => vec![tenant_id],
                },
            };
            let users =
                UserRepo::with_permission_in(&self.pool, &tenant_ids, audience.permission).await?;
            targets.extend(users.into_iter().map(|u| u.id));
        }

        if let Some(actor) = event.actor_user_id {
            if audience.include_actor {
                targets.insert(actor);
            } else {
                targets.remove(&actor);
            }
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_go_up_the_hierarchy() {
        let a = audience_for(EVT_BUDGET_SUBMITTED).unwrap();
        assert_eq!(a.permission, PERM_BUDGET_APPROVE);
        assert_eq!(a.reach, Reach::Ancestors);
        assert!(!a.include_actor);
    }

    #[test]
    fn batch_outcome_reaches_the_actor() {
        assert!(audience_for(EVT_CAMPAIGN_COMPLETED).unwrap().include_actor);
        assert!(audience_for(EVT_CAMPAIGN_FAILED).unwrap().include_actor);
        assert!(!audience_for(EVT_CAMPAIGN_OPENED).unwrap().include_actor);
    }

    #[test]
    fn unknown_events_have_no_audience() {
        assert!(audience_for("test.anything").is_none());
        assert!(audience_for(EVT_CAMPAIGN_PROCESSING).is_none());
    }

    #[test]
    fn render_uses_payload() {
        let event = PlatformEvent::new(EVT_BUDGET_REJECTED).with_payload(serde_json::json!({
            "title": "Operating 2026",
            "fiscalYear": 2026,
            "reason": "Missing annex",
        }));
        let (title, body) = render(&event);
        assert_eq!(title, "Budget 'Operating 2026' rejected");
        assert_eq!(body.as_deref(), Some("Reason: Missing annex"));
    }

    #[test]
    fn render_campaign_summary() {
        let event = PlatformEvent::new(EVT_CAMPAIGN_COMPLETED).with_payload(serde_json::json!({
            "name": "Rentree 2026",
            "assigned": 40,
            "unassigned": 2,
        }));
        let (_, body) = render(&event);
        assert_eq!(body.as_deref(), Some("40 assigned, 2 unassigned"));
    }
}
