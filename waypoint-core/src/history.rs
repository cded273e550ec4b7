//! History ledger: which units have been applied, per environment.
//!
//! Persists a JSON document at `<migrations>/.migrated.json`:
//!
//! ```text
//! { "<env>": { "<unit-id>": { "migrated_at": "<RFC 3339>" } } }
//! ```
//!
//! Older ledgers were a flat `{ "<unit-id>": {...} }` map with no environment
//! level; [`fix_legacy_shape`] nests those under the active environment on
//! load. Writes go to a `.tmp` file first and are renamed into place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{history_io, HistoryError};
use crate::types::{AppliedEntry, Direction, EnvHistory, PlanItem, UnitId};

/// Fixed ledger file name inside the migrations directory.
pub const LEDGER_FILE: &str = ".migrated.json";

/// Environment name → applied units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(pub BTreeMap<String, EnvHistory>);

impl History {
    /// Applied units for `env`; empty when the environment has no entry.
    pub fn env(&self, env: &str) -> EnvHistory {
        self.0.get(env).cloned().unwrap_or_default()
    }

    pub fn is_applied(&self, env: &str, unit: &UnitId) -> bool {
        self.0.get(env).is_some_and(|applied| applied.contains_key(unit))
    }

    /// Record a successful step: insert for `up`, remove for `down`.
    pub fn record(&mut self, env: &str, item: &PlanItem) {
        let applied = self.0.entry(env.to_owned()).or_default();
        match item.direction {
            Direction::Up => {
                applied.insert(item.unit.clone(), AppliedEntry::now());
            }
            Direction::Down => {
                applied.remove(&item.unit);
            }
        }
    }
}

/// Storage port for the ledger. The engine only talks to this trait.
pub trait LedgerStore {
    /// Fresh copy of the ledger. Never fails: unreadable ledgers load empty.
    fn load(&self) -> History;

    /// Overwrite the ledger. Must complete before a step counts as durable.
    fn save(&self, history: &History) -> Result<(), HistoryError>;
}

/// [`LedgerStore`] backed by `<dir>/.migrated.json`.
#[derive(Debug, Clone)]
pub struct FileLedger {
    dir: PathBuf,
    env: String,
}

impl FileLedger {
    pub fn new(dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            env: env.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        ledger_path_at(&self.dir)
    }
}

impl LedgerStore for FileLedger {
    fn load(&self) -> History {
        load_at(&self.dir, &self.env)
    }

    fn save(&self, history: &History) -> Result<(), HistoryError> {
        save_at(&self.dir, history)
    }
}

/// `<dir>/.migrated.json`
pub fn ledger_path_at(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILE)
}

/// Load the ledger in `dir` for environment `env`.
///
/// A missing or unparsable file yields an empty history rather than an error.
pub fn load_at(dir: &Path, env: &str) -> History {
    let path = ledger_path_at(dir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<Value>(&contents) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("ignoring unparsable ledger {}: {e}", path.display());
                Value::Null
            }
        },
        Err(e) => {
            tracing::debug!("no ledger at {}: {e}", path.display());
            Value::Null
        }
    };
    fix_legacy_shape(raw, env)
}

/// Normalise a raw ledger document into a [`History`] with an entry for `env`.
///
/// If there is no `env` key and every top-level key looks like a unit id,
/// the document is a legacy single-environment ledger and is nested under
/// `env`. Non-object documents are treated as empty.
pub fn fix_legacy_shape(raw: Value, env: &str) -> History {
    let mut top = match raw {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if !top.contains_key(env) {
        if is_legacy(&top) {
            tracing::info!("upgrading legacy ledger into environment '{env}'");
            let legacy = std::mem::take(&mut top);
            top.insert(env.to_owned(), Value::Object(legacy));
        } else {
            top.insert(env.to_owned(), Value::Object(Map::new()));
        }
    }

    let mut history = History::default();
    for (name, section) in top {
        let applied = parse_section(&name, section);
        history.0.insert(name, applied);
    }
    history
}

/// A present key marks its unit applied, so entries with unreadable metadata
/// are kept with an empty [`AppliedEntry`] rather than dropped.
fn parse_section(name: &str, section: Value) -> EnvHistory {
    let entries = match section {
        Value::Object(entries) => entries,
        other => {
            tracing::warn!("ignoring ledger section '{name}': expected an object, found {other}");
            return EnvHistory::new();
        }
    };
    entries
        .into_iter()
        .map(|(unit, entry)| {
            let entry = serde_json::from_value::<AppliedEntry>(entry).unwrap_or_else(|e| {
                tracing::warn!("malformed ledger entry '{unit}' in '{name}', keeping it: {e}");
                AppliedEntry::default()
            });
            (UnitId::from(unit), entry)
        })
        .collect()
}

fn is_legacy(top: &Map<String, Value>) -> bool {
    !top.is_empty() && top.keys().all(|key| looks_like_unit_id(key))
}

fn looks_like_unit_id(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 14 && bytes[..13].iter().all(u8::is_ascii_digit) && bytes[13] == b'_'
}

/// Save `history` into `dir` atomically.
///
/// Writes to `.migrated.json.tmp` then renames over `.migrated.json`.
pub fn save_at(dir: &Path, history: &History) -> Result<(), HistoryError> {
    std::fs::create_dir_all(dir).map_err(|e| history_io(dir, e))?;

    let path = ledger_path_at(dir);
    let json = serde_json::to_string_pretty(history)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| history_io(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(history_io(&path, e));
    }
    Ok(())
}
