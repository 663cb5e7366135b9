//! Food service rules: anonymous meal tickets, meal sessions and stock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::status::{define_status_enum, Lifecycle, StatusEnum};

/// Most tickets a single batch request may generate.
pub const MAX_TICKET_BATCH: i64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            other => Err(CoreError::Validation(format!(
                "Unknown meal type '{other}'. Must be one of: breakfast, lunch, dinner"
            ))),
        }
    }
}

define_status_enum! {
    TicketStatus ("Ticket") {
        Active = 1 => "active",
        Used = 2 => "used",
        Expired = 3 => "expired",
        Cancelled = 4 => "cancelled",
    }
}

impl Lifecycle for TicketStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use TicketStatus::*;
        matches!((self, next), (Active, Used) | (Active, Expired) | (Active, Cancelled))
    }
}

define_status_enum! {
    /// A meal service session at a restaurant.
    MealStatus ("Meal") {
        Planned = 1 => "planned",
        Serving = 2 => "serving",
        Closed = 3 => "closed",
    }
}

impl Lifecycle for MealStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use MealStatus::*;
        matches!((self, next), (Planned, Serving) | (Serving, Closed))
    }
}

/// Human-readable ticket number: `TKT-<CODE>-<YYYYMMDD>-<seq>`.
pub fn ticket_number(tenant_code: &str, date: NaiveDate, seq: i64) -> String {
    format!("TKT-{}-{}-{:06}", tenant_code, date.format("%Y%m%d"), seq)
}

/// Opaque QR payload for a ticket: hex SHA-256 of `secret:number`.
///
/// Reprinting a ticket yields the same code; forging one requires the
/// secret.
pub fn qr_code(secret: &str, ticket_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(ticket_number.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn validate_batch_size(count: i64) -> Result<(), CoreError> {
    if (1..=MAX_TICKET_BATCH).contains(&count) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Ticket batch size must be between 1 and {MAX_TICKET_BATCH}, got {count}"
        )))
    }
}

/// Whether a ticket can be consumed at a meal of type `service_meal` on `today`.
pub fn check_ticket_usable(
    status: TicketStatus,
    valid_until: NaiveDate,
    today: NaiveDate,
    ticket_meal: Option<MealType>,
    service_meal: MealType,
) -> Result<(), CoreError> {
    if status != TicketStatus::Active {
        return Err(CoreError::Conflict(format!(
            "Ticket is {}, only active tickets can be used",
            status.as_str()
        )));
    }
    if today > valid_until {
        return Err(CoreError::Conflict(format!(
            "Ticket expired on {valid_until}"
        )));
    }
    if let Some(meal) = ticket_meal {
        if meal != service_meal {
            return Err(CoreError::Conflict(format!(
                "Ticket is valid for {} only, not {}",
                meal.as_str(),
                service_meal.as_str()
            )));
        }
    }
    Ok(())
}

pub fn ensure_meal_serving(status: MealStatus) -> Result<(), CoreError> {
    if status == MealStatus::Serving {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Meal is {}, tickets can only be scanned while serving",
            status.as_str()
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(CoreError::Validation(format!(
                "Unknown movement kind '{other}'. Must be one of: in, out, adjustment"
            ))),
        }
    }
}

/// New stock quantity after a movement.
///
/// `in` adds, `out` subtracts and `adjustment` sets an absolute value
/// (an inventory count). Quantities never go negative.
pub fn apply_stock_movement(
    quantity: f64,
    kind: MovementKind,
    amount: f64,
) -> Result<f64, CoreError> {
    if !amount.is_finite() {
        return Err(CoreError::Validation("Movement quantity must be a number".into()));
    }
    match kind {
        MovementKind::Adjustment if amount < 0.0 => Err(CoreError::Validation(
            "Adjusted quantity cannot be negative".into(),
        )),
        MovementKind::Adjustment => Ok(amount),
        _ if amount <= 0.0 => Err(CoreError::Validation(
            "Movement quantity must be strictly positive".into(),
        )),
        MovementKind::In => Ok(quantity + amount),
        MovementKind::Out if amount > quantity => Err(CoreError::Conflict(format!(
            "Insufficient stock: {quantity} on hand, {amount} requested"
        ))),
        MovementKind::Out => Ok(quantity - amount),
    }
}

/// Whether an item has fallen to or below its alert threshold.
pub fn is_low_stock(quantity: f64, threshold: f64) -> bool {
    quantity <= threshold
}
