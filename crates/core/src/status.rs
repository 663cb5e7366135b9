//! Status enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its label matches
//! the seeded `name` column.

use serde::Serializer;

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Common surface of every status enum produced by [`define_status_enum!`].
pub trait StatusEnum: Copy + Eq + std::fmt::Debug + Sized + 'static {
    /// Human name of the owning entity, used in error messages.
    const ENTITY: &'static str;

    /// Every variant, in seed order.
    const ALL: &'static [Self];

    fn id(self) -> StatusId;

    fn as_str(self) -> &'static str;

    /// Resolve a database status ID back to the enum.
    fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }

    /// Parse the snake_case label (as sent by API clients).
    fn parse(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == label)
    }

    /// Like [`StatusEnum::from_id`] but fails with an internal error, for ids
    /// read back from the database where an unknown value means corrupt data.
    fn try_from_id(id: StatusId) -> Result<Self, CoreError> {
        Self::from_id(id)
            .ok_or_else(|| CoreError::Internal(format!("Unknown {} status id {id}", Self::ENTITY)))
    }
}

/// A status enum with an explicit transition table.
pub trait Lifecycle: StatusEnum {
    fn can_transition_to(self, next: Self) -> bool;
}

/// Fail with [`CoreError::Conflict`] unless `from -> to` is an allowed transition.
pub fn ensure_transition<S: Lifecycle>(from: S, to: S) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "{} cannot move from '{}' to '{}'",
            S::ENTITY,
            from.as_str(),
            to.as_str()
        )))
    }
}

/// Serialize a raw status id as its label. Used with
/// `#[serde(serialize_with = "status::serialize_label::<BudgetStatus, _>")]`
/// on row structs so API payloads carry `"status": "approved"`.
pub fn serialize_label<E: StatusEnum, S: Serializer>(
    id: &StatusId,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match E::from_id(*id) {
        Some(status) => serializer.serialize_str(status.as_str()),
        None => serializer.serialize_i16(*id),
    }
}

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($entity:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $crate::status::StatusEnum for $name {
            const ENTITY: &'static str = $entity;
            const ALL: &'static [Self] = &[$( Self::$variant ),+];

            fn id(self) -> $crate::status::StatusId {
                self as $crate::status::StatusId
            }

            fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }
        }

        impl From<$name> for $crate::status::StatusId {
            fn from(value: $name) -> Self {
                value as $crate::status::StatusId
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str($crate::status::StatusEnum::as_str(*self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                <Self as $crate::status::StatusEnum>::parse(&label).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} status '{label}'",
                        <Self as $crate::status::StatusEnum>::ENTITY
                    ))
                })
            }
        }
    };
}

pub(crate) use define_status_enum;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetStatus;
    use crate::housing::CampaignStatus;

    #[test]
    fn ids_round_trip_through_from_id() {
        for status in CampaignStatus::ALL {
            assert_eq!(CampaignStatus::from_id(status.id()), Some(*status));
        }
        assert_eq!(CampaignStatus::from_id(99), None);
    }

    #[test]
    fn labels_serialize_as_strings() {
        let json = serde_json::to_string(&CampaignStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");

        let parsed: BudgetStatus = serde_json::from_str("\"submitted\"").unwrap();
        assert_eq!(parsed, BudgetStatus::Submitted);
    }

    #[test]
    fn unknown_label_fails_to_deserialize() {
        let result: Result<BudgetStatus, _> = serde_json::from_str("\"frozen\"");
        assert!(result.is_err());
    }

    #[test]
    fn try_from_id_reports_entity() {
        let err = BudgetStatus::try_from_id(42).unwrap_err();
        assert!(err.to_string().contains("Budget"));
    }

    #[test]
    fn forbidden_transition_is_a_conflict() {
        let err = ensure_transition(CampaignStatus::Draft, CampaignStatus::Completed).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(err.to_string().contains("'draft' to 'completed'"));
    }
}
