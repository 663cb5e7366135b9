//! Fleet rules: vehicles, drivers and route assignment.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::CoreError;
use crate::status::{define_status_enum, Lifecycle, StatusEnum};

define_status_enum! {
    VehicleStatus ("Vehicle") {
        Available = 1 => "available",
        InService = 2 => "in_service",
        Maintenance = 3 => "maintenance",
        Retired = 4 => "retired",
    }
}

impl Lifecycle for VehicleStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use VehicleStatus::*;
        match (self, next) {
            (Retired, _) => false,
            (a, b) if a == b => false,
            _ => true,
        }
    }
}

static PLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{1,4}(-[A-Z0-9]{1,4}){1,3}$").expect("valid plate regex"));

/// Normalize and validate a plate number (`AB-123-CD`, `NY-4521-A`).
/// Returns the uppercased plate.
pub fn validate_plate_number(plate: &str) -> Result<String, CoreError> {
    let normalized = plate.trim().to_uppercase();
    if PLATE_RE.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(CoreError::Validation(format!(
            "Invalid plate number '{plate}': expected dash-separated groups of letters and digits"
        )))
    }
}

pub fn validate_seat_capacity(capacity: i32) -> Result<(), CoreError> {
    if (1..=120).contains(&capacity) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Vehicle capacity must be between 1 and 120, got {capacity}"
        )))
    }
}

/// A driver may only be assigned while their license is valid.
pub fn ensure_license_valid(expires_on: NaiveDate, today: NaiveDate) -> Result<(), CoreError> {
    if expires_on >= today {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Driver license expired on {expires_on}"
        )))
    }
}

/// Only vehicles that are available or already running routes can take a route.
pub fn ensure_vehicle_assignable(status: VehicleStatus) -> Result<(), CoreError> {
    match status {
        VehicleStatus::Available | VehicleStatus::InService => Ok(()),
        other => Err(CoreError::Conflict(format!(
            "Vehicle is {}, it cannot be assigned to a route",
            other.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plates() {
        assert_eq!(validate_plate_number(" ny-4521-a ").unwrap(), "NY-4521-A");
        assert!(validate_plate_number("AB-123-CD").is_ok());
        assert!(validate_plate_number("AB123").is_err());
        assert!(validate_plate_number("AB--12").is_err());
        assert!(validate_plate_number("").is_err());
    }

    #[test]
    fn licenses() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert!(ensure_license_valid(today, today).is_ok());
        assert!(ensure_license_valid(today.pred_opt().unwrap(), today).is_err());
    }

    #[test]
    fn assignable_vehicles() {
        assert!(ensure_vehicle_assignable(VehicleStatus::Available).is_ok());
        assert!(ensure_vehicle_assignable(VehicleStatus::InService).is_ok());
        assert!(ensure_vehicle_assignable(VehicleStatus::Maintenance).is_err());
        assert!(ensure_vehicle_assignable(VehicleStatus::Retired).is_err());
    }

    #[test]
    fn retired_is_terminal() {
        assert!(!VehicleStatus::Retired.can_transition_to(VehicleStatus::Available));
        assert!(VehicleStatus::Maintenance.can_transition_to(VehicleStatus::Available));
        assert!(VehicleStatus::Available.can_transition_to(VehicleStatus::Retired));
        assert!(!VehicleStatus::Available.can_transition_to(VehicleStatus::Available));
    }

    #[test]
    fn capacity() {
        assert!(validate_seat_capacity(50).is_ok());
        assert!(validate_seat_capacity(0).is_err());
    }
}
