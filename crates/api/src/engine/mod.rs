//! Long-running work started by API calls.
//!
//! The housing batch assigns beds for a closed campaign in a spawned task
//! while clients poll the campaign's progress endpoint.

pub mod housing_batch;
