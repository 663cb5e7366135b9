//! Housing campaigns and bed assignment.
//!
//! A campaign collects applications while open, is closed, then processed:
//! the processor plans one bed per application with [`plan_assignments`]
//! and commits the plan in chunks, reporting progress as it goes.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{define_status_enum, Lifecycle, StatusEnum};
use crate::types::{DbId, Timestamp};

define_status_enum! {
    /// Housing campaign lifecycle.
    CampaignStatus ("Housing campaign") {
        Draft = 1 => "draft",
        Open = 2 => "open",
        Closed = 3 => "closed",
        Processing = 4 => "processing",
        Completed = 5 => "completed",
        Cancelled = 6 => "cancelled",
    }
}

impl Lifecycle for CampaignStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Open)
                | (Open, Closed)
                | (Closed, Open)
                | (Closed, Processing)
                | (Processing, Completed)
                | (Processing, Closed)
                | (Draft, Cancelled)
                | (Open, Cancelled)
                | (Closed, Cancelled)
        )
    }
}

impl CampaignStatus {
    /// Campaign fields (name, dates) may be edited until processing starts.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Open | Self::Closed)
    }
}

define_status_enum! {
    /// Student application to a campaign.
    ApplicationStatus ("Housing application") {
        Pending = 1 => "pending",
        Assigned = 2 => "assigned",
        Unassigned = 3 => "unassigned",
        Withdrawn = 4 => "withdrawn",
    }
}

define_status_enum! {
    BedStatus ("Bed") {
        Available = 1 => "available",
        Occupied = 2 => "occupied",
        Maintenance = 3 => "maintenance",
    }
}

impl BedStatus {
    /// Statuses an operator may set by hand; `occupied` is owned by the
    /// occupancy lifecycle.
    pub fn is_manually_settable(self) -> bool {
        matches!(self, Self::Available | Self::Maintenance)
    }
}

define_status_enum! {
    OccupancyStatus ("Occupancy") {
        Active = 1 => "active",
        Ended = 2 => "ended",
    }
}

/// Reason recorded on applications the processor could not place.
pub const REASON_NO_COMPATIBLE_BED: &str = "no_compatible_bed";

/// The planned bed was taken (or put in maintenance) between planning and commit.
pub const REASON_BED_UNAVAILABLE: &str = "bed_no_longer_available";

/// Largest room capacity accepted.
pub const MAX_ROOM_CAPACITY: i32 = 12;

/// Applicant gender as stored on applications (`M` / `F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "M" => Ok(Self::Male),
            "F" => Ok(Self::Female),
            other => Err(CoreError::Validation(format!(
                "Unknown gender '{other}'. Must be M or F"
            ))),
        }
    }
}

/// Who a room accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomGender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "mixed")]
    Mixed,
}

impl RoomGender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "M" => Ok(Self::Male),
            "F" => Ok(Self::Female),
            "mixed" => Ok(Self::Mixed),
            other => Err(CoreError::Validation(format!(
                "Unknown room gender '{other}'. Must be one of: M, F, mixed"
            ))),
        }
    }

    pub fn accepts(self, gender: Gender) -> bool {
        match self {
            Self::Mixed => true,
            Self::Male => gender == Gender::Male,
            Self::Female => gender == Gender::Female,
        }
    }
}

pub fn validate_capacity(capacity: i32) -> Result<(), CoreError> {
    if (1..=MAX_ROOM_CAPACITY).contains(&capacity) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Room capacity must be between 1 and {MAX_ROOM_CAPACITY}, got {capacity}"
        )))
    }
}

/// Bed label for a zero-based index: `A`..`Z`, then `AA`, `AB`, ...
pub fn bed_label(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `count` consecutive labels starting at zero-based index `from`.
pub fn bed_labels(from: usize, count: usize) -> Vec<String> {
    (from..from + count).map(bed_label).collect()
}

/// The first `count` labels in sequence order not already in `existing`.
pub fn next_free_labels(existing: &[String], count: usize) -> Vec<String> {
    let taken: HashSet<&str> = existing.iter().map(String::as_str).collect();
    (0..)
        .map(bed_label)
        .filter(|label| !taken.contains(label.as_str()))
        .take(count)
        .collect()
}

/// Natural ordering for bed labels (`B` before `AA`).
fn cmp_labels(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Reject a capacity change that would drop beds still in use.
///
/// `in_use` is the number of beds that are not `available`. Beds are
/// removed from the end of the label sequence, so the new capacity must
/// keep at least that many.
pub fn check_capacity_change(new_capacity: i32, in_use: i64) -> Result<(), CoreError> {
    validate_capacity(new_capacity)?;
    if i64::from(new_capacity) < in_use {
        return Err(CoreError::Conflict(format!(
            "Cannot lower capacity to {new_capacity}: {in_use} beds are occupied or in maintenance"
        )));
    }
    Ok(())
}

/// Applications can only change while the campaign is open.
pub fn ensure_accepting_applications(status: CampaignStatus) -> Result<(), CoreError> {
    if status == CampaignStatus::Open {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Campaign is '{}', applications are only accepted while open",
            status.as_str()
        )))
    }
}

/// A pending application as seen by the planner.
#[derive(Debug, Clone)]
pub struct ApplicationCandidate {
    pub id: DbId,
    pub gender: Gender,
    pub priority_score: i32,
    pub submitted_at: Timestamp,
    pub preferred_residence: Option<String>,
}

/// An available bed as seen by the planner.
#[derive(Debug, Clone)]
pub struct BedCandidate {
    pub id: DbId,
    pub room_id: DbId,
    pub residence: String,
    pub room_number: String,
    pub label: String,
    pub room_gender: RoomGender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub application_id: DbId,
    pub bed_id: DbId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unplaced {
    pub application_id: DbId,
    pub reason: &'static str,
}

/// Outcome of planning, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentPlan {
    pub assignments: Vec<Assignment>,
    pub unassigned: Vec<Unplaced>,
}

impl AssignmentPlan {
    pub fn total(&self) -> usize {
        self.assignments.len() + self.unassigned.len()
    }
}

/// Plan one bed per application.
///
/// Applications are served by priority score (highest first), then
/// submission time, then id. Beds are scanned in residence, room number,
/// label, id order. An applicant gets the first free compatible bed in
/// their preferred residence, otherwise the first free compatible bed
/// anywhere. The result only depends on the inputs, not their order.
pub fn plan_assignments(
    applications: &[ApplicationCandidate],
    beds: &[BedCandidate],
) -> AssignmentPlan {
    let mut apps: Vec<&ApplicationCandidate> = applications.iter().collect();
    apps.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut beds: Vec<&BedCandidate> = beds.iter().collect();
    beds.sort_by(|a, b| {
        a.residence
            .cmp(&b.residence)
            .then_with(|| cmp_labels(&a.room_number, &b.room_number))
            .then_with(|| cmp_labels(&a.label, &b.label))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut taken: HashSet<DbId> = HashSet::with_capacity(beds.len());
    let mut plan = AssignmentPlan::default();

    for app in apps {
        let free = |bed: &&&BedCandidate| !taken.contains(&bed.id) && bed.room_gender.accepts(app.gender);

        let preferred = app.preferred_residence.as_deref().and_then(|residence| {
            beds.iter()
                .filter(free)
                .find(|bed| bed.residence == residence)
        });
        let chosen = preferred.or_else(|| beds.iter().find(free)).map(|bed| bed.id);

        match chosen {
            Some(bed_id) => {
                taken.insert(bed_id);
                plan.assignments.push(Assignment {
                    application_id: app.id,
                    bed_id,
                });
            }
            None => plan.unassigned.push(Unplaced {
                application_id: app.id,
                reason: REASON_NO_COMPATIBLE_BED,
            }),
        }
    }

    plan
}

/// Integer percentage of processed work, 100 for an empty batch.
pub fn progress_percent(processed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 100;
    }
    (processed.clamp(0, total) * 100) / total
}

/// Share of beds occupied, in percent with one decimal.
pub fn occupancy_rate(occupied: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((occupied as f64 / total as f64) * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn app(id: DbId, gender: Gender, score: i32, minute: u32, pref: Option<&str>) -> ApplicationCandidate {
        ApplicationCandidate {
            id,
            gender,
            priority_score: score,
            submitted_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, minute, 0).unwrap(),
            preferred_residence: pref.map(str::to_string),
        }
    }

    fn bed(id: DbId, residence: &str, room: &str, label: &str, g: RoomGender) -> BedCandidate {
        BedCandidate {
            id,
            room_id: id * 10,
            residence: residence.into(),
            room_number: room.into(),
            label: label.into(),
            room_gender: g,
        }
    }

    #[test]
    fn campaign_lifecycle() {
        use CampaignStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Open.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Open));
        assert!(Closed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Closed));
        assert!(Open.can_transition_to(Cancelled));

        assert!(!Open.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Open));
        assert!(!Cancelled.can_transition_to(Draft));
    }

    #[test]
    fn applications_only_while_open() {
        assert!(ensure_accepting_applications(CampaignStatus::Open).is_ok());
        assert!(ensure_accepting_applications(CampaignStatus::Closed).is_err());
        assert!(ensure_accepting_applications(CampaignStatus::Draft).is_err());
    }

    #[test]
    fn labels_continue_past_z() {
        assert_eq!(bed_labels(0, 3), vec!["A", "B", "C"]);
        assert_eq!(bed_label(25), "Z");
        assert_eq!(bed_label(26), "AA");
        assert_eq!(bed_label(27), "AB");
        assert_eq!(bed_label(51), "AZ");
        assert_eq!(bed_label(52), "BA");
        assert_eq!(bed_labels(2, 2), vec!["C", "D"]);
    }

    #[test]
    fn free_labels_fill_gaps() {
        let existing = vec!["A".to_string(), "C".to_string()];
        assert_eq!(next_free_labels(&existing, 3), vec!["B", "D", "E"]);
        assert!(next_free_labels(&existing, 0).is_empty());
    }

    #[test]
    fn room_gender_compatibility() {
        assert!(RoomGender::Mixed.accepts(Gender::Male));
        assert!(RoomGender::Mixed.accepts(Gender::Female));
        assert!(RoomGender::Female.accepts(Gender::Female));
        assert!(!RoomGender::Female.accepts(Gender::Male));
    }

    #[test]
    fn capacity_rules() {
        assert!(validate_capacity(4).is_ok());
        assert!(validate_capacity(0).is_err());
        assert!(check_capacity_change(2, 2).is_ok());
        assert!(check_capacity_change(1, 2).is_err());
    }

    #[test]
    fn higher_priority_served_first() {
        let apps = vec![
            app(1, Gender::Male, 10, 0, None),
            app(2, Gender::Male, 50, 5, None),
        ];
        let beds = vec![bed(100, "Cite A", "101", "A", RoomGender::Male)];

        let plan = plan_assignments(&apps, &beds);
        assert_eq!(
            plan.assignments,
            vec![Assignment {
                application_id: 2,
                bed_id: 100
            }]
        );
        assert_eq!(plan.unassigned[0].application_id, 1);
        assert_eq!(plan.unassigned[0].reason, REASON_NO_COMPATIBLE_BED);
    }

    #[test]
    fn ties_broken_by_submission_then_id() {
        let apps = vec![
            app(3, Gender::Female, 10, 7, None),
            app(2, Gender::Female, 10, 5, None),
            app(1, Gender::Female, 10, 7, None),
        ];
        let beds = vec![
            bed(11, "R", "1", "A", RoomGender::Mixed),
            bed(12, "R", "1", "B", RoomGender::Mixed),
            bed(13, "R", "1", "C", RoomGender::Mixed),
        ];
        let plan = plan_assignments(&apps, &beds);
        let order: Vec<_> = plan.assignments.iter().map(|a| (a.application_id, a.bed_id)).collect();
        assert_eq!(order, vec![(2, 11), (1, 12), (3, 13)]);
    }

    #[test]
    fn gender_never_mismatched() {
        let apps = vec![app(1, Gender::Female, 0, 0, None)];
        let beds = vec![
            bed(1, "A", "1", "A", RoomGender::Male),
            bed(2, "A", "2", "A", RoomGender::Female),
        ];
        let plan = plan_assignments(&apps, &beds);
        assert_eq!(plan.assignments[0].bed_id, 2);
    }

    #[test]
    fn preferred_residence_first_then_anywhere() {
        let apps = vec![
            app(1, Gender::Male, 5, 0, Some("Cite B")),
            app(2, Gender::Male, 4, 0, Some("Cite B")),
        ];
        let beds = vec![
            bed(1, "Cite A", "1", "A", RoomGender::Male),
            bed(2, "Cite B", "1", "A", RoomGender::Male),
        ];
        let plan = plan_assignments(&apps, &beds);
        assert_eq!(plan.assignments[0], Assignment { application_id: 1, bed_id: 2 });
        assert_eq!(plan.assignments[1], Assignment { application_id: 2, bed_id: 1 });
    }

    #[test]
    fn no_bed_assigned_twice_and_input_order_irrelevant() {
        let apps: Vec<_> = (1..=6)
            .map(|i| app(i, if i % 2 == 0 { Gender::Male } else { Gender::Female }, 0, i as u32, None))
            .collect();
        let beds: Vec<_> = (1..=4)
            .map(|i| bed(i, "R", "1", &bed_label(i as usize), RoomGender::Mixed))
            .collect();

        let plan = plan_assignments(&apps, &beds);
        let mut used: Vec<_> = plan.assignments.iter().map(|a| a.bed_id).collect();
        used.sort_unstable();
        used.dedup();
        assert_eq!(used.len(), 4);
        assert_eq!(plan.unassigned.len(), 2);
        assert_eq!(plan.total(), 6);

        let mut reversed_apps = apps.clone();
        reversed_apps.reverse();
        let mut reversed_beds = beds.clone();
        reversed_beds.reverse();
        let again = plan_assignments(&reversed_apps, &reversed_beds);
        assert_eq!(again.assignments, plan.assignments);
        assert_eq!(again.unassigned, plan.unassigned);
    }

    #[test]
    fn natural_label_order() {
        let beds = vec![
            bed(1, "R", "1", "AA", RoomGender::Mixed),
            bed(2, "R", "1", "B", RoomGender::Mixed),
        ];
        let plan = plan_assignments(&[app(1, Gender::Male, 0, 0, None)], &beds);
        assert_eq!(plan.assignments[0].bed_id, 2);
    }

    #[test]
    fn progress() {
        assert_eq!(progress_percent(0, 0), 100);
        assert_eq!(progress_percent(0, 10), 0);
        assert_eq!(progress_percent(3, 10), 30);
        assert_eq!(progress_percent(15, 10), 100);
        assert_eq!(occupancy_rate(1, 3), 33.3);
    }
}
