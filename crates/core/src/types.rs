/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar dates (validity windows, menus, fiscal boundaries).
pub type Date = chrono::NaiveDate;

/// Monetary amounts in FCFA. The currency has no sub-unit.
pub type Amount = i64;
