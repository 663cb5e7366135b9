//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - `FromRow` + `Serialize` row structs (camelCase on the wire, status ids
//!   rendered as their labels)
//! - Create DTOs for inserts
//! - Update DTOs (all `Option` fields) for patches

pub mod budget;
pub mod event;
pub mod housing;
pub mod notification;
pub mod refresh_token;
pub mod report;
pub mod restauration;
pub mod role;
pub mod tenant;
pub mod transport;
pub mod user;
