//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireAuth`] -- Requires any authenticated user.
//! - [`rbac::require_permission`] -- Checks a `resource:action` permission.
//! - [`scope::TenantScope`] -- Authenticated user plus their tenant subtree.

pub mod auth;
pub mod rbac;
pub mod scope;
