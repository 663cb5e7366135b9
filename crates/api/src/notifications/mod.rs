//! Notification routing infrastructure.
//!
//! The [`NotificationRouter`] consumes persisted events and writes in-app
//! notifications for the users concerned.

pub mod router;

pub use router::NotificationRouter;
