//! Domain types shared by the registry, the ledger and the engine.
//!
//! Unit identities are plain file names; ordering them as strings orders them
//! by their 13-digit millisecond prefix.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// File name of a migration unit, e.g. `1699999999999_add_users_table.js`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond epoch prefix, or `None` for names outside the convention.
    pub fn timestamp_millis(&self) -> Option<i64> {
        let prefix = self.0.get(..13)?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok()
    }

    /// Creation time encoded in the prefix.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis()?)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which entry point of a unit to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    pub fn is_down(self) -> bool {
        self == Direction::Down
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(ConfigError::InvalidDirection(other.to_owned())),
        }
    }
}

/// Source language of the unit files in the migrations directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptKind {
    #[default]
    Js,
    Coffee,
}

impl ScriptKind {
    pub fn extension(self) -> &'static str {
        match self {
            ScriptKind::Js => "js",
            ScriptKind::Coffee => "coffee",
        }
    }
}

// ---------------------------------------------------------------------------
// Plans and ledger entries
// ---------------------------------------------------------------------------

/// One step of a plan: run `unit` in `direction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub unit: UnitId,
    pub direction: Direction,
}

impl PlanItem {
    pub fn new(unit: impl Into<UnitId>, direction: Direction) -> Self {
        Self {
            unit: unit.into(),
            direction,
        }
    }

    pub fn up(unit: impl Into<UnitId>) -> Self {
        Self::new(unit, Direction::Up)
    }

    pub fn down(unit: impl Into<UnitId>) -> Self {
        Self::new(unit, Direction::Down)
    }
}

impl fmt::Display for PlanItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.unit, self.direction)
    }
}

/// Ordered list of steps produced by the selector or the diff engine.
pub type Plan = Vec<PlanItem>;

/// Ledger metadata for one applied unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppliedEntry {
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub migrated_at: Option<DateTime<Utc>>,
}

impl AppliedEntry {
    pub fn now() -> Self {
        Self {
            migrated_at: Some(Utc::now()),
        }
    }
}

/// Applied units of a single environment.
pub type EnvHistory = BTreeMap<UnitId, AppliedEntry>;

// Hand-edited ledgers sometimes carry odd timestamps; the entry's presence is
// what marks a unit applied, so a bad value degrades to `None`.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_timestamp_prefix() {
        let id = UnitId::from("1699999999999_add_users_table.js");
        assert_eq!(id.timestamp_millis(), Some(1_699_999_999_999));
        assert!(id.created_at().is_some());
        assert_eq!(UnitId::from("notes.txt").timestamp_millis(), None);
        assert_eq!(UnitId::from("12").timestamp_millis(), None);
    }

    #[test]
    fn unit_ids_order_by_prefix() {
        let mut ids = vec![
            UnitId::from("1700000000002_b.js"),
            UnitId::from("1700000000001_z.js"),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "1700000000001_z.js");
    }

    #[test]
    fn direction_parse_and_display() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert_eq!(Direction::Down.to_string(), "down");
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown direction: \"sideways\"");
    }

    #[test]
    fn applied_entry_tolerates_bad_timestamp() {
        let entry: AppliedEntry = serde_json::from_str(r#"{"migrated_at": 42}"#).unwrap();
        assert!(entry.migrated_at.is_none());
        let entry: AppliedEntry =
            serde_json::from_str(r#"{"migrated_at": "2013-08-20T12:00:00.000Z"}"#).unwrap();
        assert!(entry.migrated_at.is_some());
        let entry: AppliedEntry = serde_json::from_str("{}").unwrap();
        assert!(entry.migrated_at.is_none());
    }
}
