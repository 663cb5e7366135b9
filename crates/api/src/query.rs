//! Shared query parameter types for API handlers.

use crou_core::error::CoreError;
use crou_core::pagination;
use crou_core::status::StatusEnum;
use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// `(limit, offset)` clamped to the shared bounds.
    pub fn page(&self) -> (i64, i64) {
        pagination::page(self.limit, self.offset)
    }
}

/// Parse an optional `?status=` filter into a status enum.
///
/// Unknown labels are a 400 rather than an empty result.
pub fn parse_status_filter<S: StatusEnum>(status: Option<&str>) -> Result<Option<S>, CoreError> {
    match status {
        None | Some("") => Ok(None),
        Some(label) => S::parse(label).map(Some).ok_or_else(|| {
            let allowed: Vec<&str> = S::ALL.iter().map(|s| s.as_str()).collect();
            CoreError::Validation(format!(
                "Unknown {} status '{label}'. Must be one of: {}",
                S::ENTITY.to_lowercase(),
                allowed.join(", ")
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use crou_core::budget::BudgetStatus;

    use super::*;

    #[test]
    fn status_filter_accepts_known_labels() {
        assert_eq!(
            parse_status_filter::<BudgetStatus>(Some("approved")).unwrap(),
            Some(BudgetStatus::Approved)
        );
        assert_eq!(parse_status_filter::<BudgetStatus>(None).unwrap(), None);
        assert_eq!(parse_status_filter::<BudgetStatus>(Some("")).unwrap(), None);
    }

    #[test]
    fn status_filter_rejects_unknown_labels() {
        assert_matches!(
            parse_status_filter::<BudgetStatus>(Some("archived")),
            Err(CoreError::Validation(_))
        );
    }
}
