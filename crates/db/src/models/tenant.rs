//! Tenant (ministry / region / CROU) model and DTOs.

use crou_core::error::CoreError;
use crou_core::tenant::TenantType;
use crou_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tenants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: DbId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tenant_type: String,
    pub parent_id: Option<DbId>,
    pub path: String,
    pub level: i16,
    pub service_type: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Tenant {
    pub fn kind(&self) -> Result<TenantType, CoreError> {
        TenantType::parse(&self.tenant_type)
    }
}

/// DTO for inserting a tenant. `parent_path` is the parent's materialized
/// path, `None` for the root.
#[derive(Debug, Deserialize)]
pub struct CreateTenant {
    pub code: String,
    pub name: String,
    pub tenant_type: TenantType,
    pub parent_id: Option<DbId>,
    pub parent_path: Option<String>,
    pub service_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub service_type: Option<String>,
    pub is_active: Option<bool>,
}
