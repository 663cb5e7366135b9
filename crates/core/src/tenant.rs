//! Tenant hierarchy rules (Ministry → Region → CROU).
//!
//! Tenants form a three-level tree. Each row stores a materialized `path`
//! of the form `/<root id>/.../<own id>/` so subtree checks are a prefix
//! comparison instead of a recursive walk.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Position of a tenant in the organizational hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Ministere,
    Region,
    Crou,
}

impl TenantType {
    /// Depth in the tree; the ministry is the root at level 0.
    pub fn level(self) -> i16 {
        match self {
            Self::Ministere => 0,
            Self::Region => 1,
            Self::Crou => 2,
        }
    }

    /// The type a parent of this tenant must have (`None` for the root).
    pub fn expected_parent(self) -> Option<TenantType> {
        match self {
            Self::Ministere => None,
            Self::Region => Some(Self::Ministere),
            Self::Crou => Some(Self::Region),
        }
    }

    /// The type of direct children, if any.
    pub fn child_type(self) -> Option<TenantType> {
        match self {
            Self::Ministere => Some(Self::Region),
            Self::Region => Some(Self::Crou),
            Self::Crou => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ministere => "ministere",
            Self::Region => "region",
            Self::Crou => "crou",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "ministere" => Ok(Self::Ministere),
            "region" => Ok(Self::Region),
            "crou" => Ok(Self::Crou),
            other => Err(CoreError::Validation(format!(
                "Unknown tenant type '{other}'. Must be one of: ministere, region, crou"
            ))),
        }
    }
}

/// Service areas a tenant can be dedicated to.
pub const SERVICE_TYPES: &[&str] = &["general", "housing", "restauration", "transport", "finance"];

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{1,19}$").expect("valid tenant code regex"));

/// Validate a tenant code: 2-20 characters of `A-Z`, `0-9`, `_` or `-`,
/// starting with a letter or digit.
pub fn validate_code(code: &str) -> Result<(), CoreError> {
    if CODE_RE.is_match(code) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid tenant code '{code}': expected 2-20 uppercase letters, digits, '_' or '-'"
        )))
    }
}

pub fn validate_service_type(service_type: Option<&str>) -> Result<(), CoreError> {
    match service_type {
        None => Ok(()),
        Some(s) if SERVICE_TYPES.contains(&s) => Ok(()),
        Some(s) => Err(CoreError::Validation(format!(
            "Unknown service type '{s}'. Must be one of: {}",
            SERVICE_TYPES.join(", ")
        ))),
    }
}

/// Check that a tenant of type `child` may hang under a parent of type
/// `parent` (or sit at the root when `parent` is `None`).
pub fn validate_parent(child: TenantType, parent: Option<TenantType>) -> Result<(), CoreError> {
    match (child.expected_parent(), parent) {
        (None, None) => Ok(()),
        (None, Some(p)) => Err(CoreError::Validation(format!(
            "A {} cannot have a parent (got {})",
            child.as_str(),
            p.as_str()
        ))),
        (Some(expected), None) => Err(CoreError::Validation(format!(
            "A {} must have a {} parent",
            child.as_str(),
            expected.as_str()
        ))),
        (Some(expected), Some(p)) if expected == p => Ok(()),
        (Some(expected), Some(p)) => Err(CoreError::Validation(format!(
            "A {} must have a {} parent, not a {}",
            child.as_str(),
            expected.as_str(),
            p.as_str()
        ))),
    }
}

/// Materialized path for a tenant with `id` under `parent_path`.
pub fn child_path(parent_path: Option<&str>, id: DbId) -> String {
    match parent_path {
        Some(p) => format!("{p}{id}/"),
        None => format!("/{id}/"),
    }
}

/// Whether `path` is `ancestor_path` itself or lies underneath it.
pub fn is_within(ancestor_path: &str, path: &str) -> bool {
    path.starts_with(ancestor_path)
}

/// Ids along a materialized path, root first.
pub fn path_ids(path: &str) -> Vec<DbId> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
