//! Domain core for the CROU administration backend.
//!
//! Pure rules with no I/O: identifiers, the error type, status enums and
//! the state machines, validation and planning logic behind the finance,
//! housing, food service and transport services. Everything here is unit
//! tested without a database.

pub mod budget;
pub mod error;
pub mod event_types;
pub mod housing;
pub mod pagination;
pub mod reporting;
pub mod restauration;
pub mod roles;
pub mod status;
pub mod tenant;
pub mod transport;
pub mod types;
