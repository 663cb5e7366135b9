//! Request handlers, one module per resource family.
//!
//! Handlers check permissions and tenant scope, validate input, delegate
//! persistence to `crou_db` repositories and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod admin;
pub mod allocations;
pub mod auth;
pub mod budgets;
pub mod campaigns;
pub mod housing;
pub mod notifications;
pub mod reports;
pub mod restaurants;
pub mod roles;
pub mod stock;
pub mod tenants;
pub mod tickets;
pub mod transactions;
pub mod transport;
