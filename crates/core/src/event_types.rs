//! Dot-separated event names published on the in-process event bus.
//!
//! Persisted verbatim in `events.event_type`; the notification router keys
//! its fan-out rules off these values.

pub const EVT_BUDGET_SUBMITTED: &str = "budget.submitted";
pub const EVT_BUDGET_APPROVED: &str = "budget.approved";
pub const EVT_BUDGET_REJECTED: &str = "budget.rejected";
pub const EVT_BUDGET_CLOSED: &str = "budget.closed";

pub const EVT_ALLOCATION_REQUESTED: &str = "allocation.requested";
pub const EVT_ALLOCATION_APPROVED: &str = "allocation.approved";
pub const EVT_ALLOCATION_REJECTED: &str = "allocation.rejected";
pub const EVT_ALLOCATION_EXECUTED: &str = "allocation.executed";
pub const EVT_ALLOCATION_CANCELLED: &str = "allocation.cancelled";

pub const EVT_TRANSACTION_VALIDATED: &str = "transaction.validated";
pub const EVT_TRANSACTION_REJECTED: &str = "transaction.rejected";

pub const EVT_CAMPAIGN_OPENED: &str = "housing.campaign.opened";
pub const EVT_CAMPAIGN_CLOSED: &str = "housing.campaign.closed";
pub const EVT_CAMPAIGN_PROCESSING: &str = "housing.campaign.processing";
pub const EVT_CAMPAIGN_COMPLETED: &str = "housing.campaign.completed";
pub const EVT_CAMPAIGN_FAILED: &str = "housing.campaign.failed";

pub const EVT_TICKETS_GENERATED: &str = "restauration.tickets.generated";
pub const EVT_STOCK_LOW: &str = "restauration.stock.low";

pub const EVT_USER_LOCKED: &str = "user.locked";

/// Source entity kinds attached to events.
pub const ENTITY_BUDGET: &str = "budget";
pub const ENTITY_ALLOCATION: &str = "allocation";
pub const ENTITY_TRANSACTION: &str = "transaction";
pub const ENTITY_CAMPAIGN: &str = "housing_campaign";
pub const ENTITY_STOCK_ITEM: &str = "stock_item";
pub const ENTITY_RESTAURANT: &str = "restaurant";
pub const ENTITY_USER: &str = "user";
