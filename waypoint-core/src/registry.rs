//! Migration registry: discovery and scaffolding of unit files.
//!
//! # Directory layout
//!
//! ```text
//! <cwd>/migrations/
//!   1699999999999_add_users_table.js   (one file per unit)
//!   .migrated.json                     (history ledger, see [`crate::history`])
//! ```
//!
//! Only names matching `^[0-9]{13}_.*\.<ext>$` are units; everything else in
//! the directory is ignored.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{registry_io, RegistryError};
use crate::types::{ScriptKind, UnitId};

static JS_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}_.*\.js$").expect("static regex"));
static COFFEE_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}_.*\.coffee$").expect("static regex"));
static WORD_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s.]+").expect("static regex"));

const JS_TEMPLATE: &str = "\
exports.up = function (done) {
  done();
};

exports.down = function (done) {
  done();
};
";

const COFFEE_TEMPLATE: &str = "\
exports.up = (done) ->
  done()

exports.down = (done) ->
  done()
";

// ---------------------------------------------------------------------------
// 1. Discovery
// ---------------------------------------------------------------------------

/// Naming convention for units of `kind`.
pub fn unit_pattern(kind: ScriptKind) -> &'static Regex {
    match kind {
        ScriptKind::Js => &*JS_UNIT,
        ScriptKind::Coffee => &*COFFEE_UNIT,
    }
}

/// `true` when `name` follows the unit naming convention for `kind`.
pub fn is_unit_name(name: &str, kind: ScriptKind) -> bool {
    unit_pattern(kind).is_match(name)
}

/// List the unit ids present in `dir`, sorted ascending.
///
/// Returns `RegistryError::DirectoryUnreadable` if `dir` cannot be listed.
/// Entries whose names are not valid UTF-8 are skipped.
pub fn list_units(dir: &Path, kind: ScriptKind) -> Result<Vec<UnitId>, RegistryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut units: Vec<UnitId> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| is_unit_name(name, kind))
        .map(UnitId::from)
        .collect();
    units.sort();
    Ok(units)
}

/// Create `dir` (and parents) if it does not exist yet.
pub fn ensure_directory(dir: &Path) -> Result<(), RegistryError> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| registry_io(dir, e))?;
    tracing::debug!("created migrations directory {}", dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Scaffolding
// ---------------------------------------------------------------------------

/// `<millis>_<name>.<ext>` where `name` is `args` joined by spaces with runs of
/// whitespace and dots turned into `_`, or `migration` when empty.
pub fn unit_file_name(now_millis: i64, args: &[String], kind: ScriptKind) -> UnitId {
    let joined = args.join(" ");
    let slug = WORD_BREAK.replace_all(&joined, "_");
    let slug = if slug.is_empty() { "migration" } else { slug.as_ref() };
    UnitId(format!("{now_millis:013}_{slug}.{}", kind.extension()))
}

/// Template content for new units.
///
/// With `path = None` the built-in template for `kind` is returned.
pub fn load_template(path: Option<&Path>, kind: ScriptKind) -> Result<String, RegistryError> {
    let Some(path) = path else {
        return Ok(match kind {
            ScriptKind::Js => JS_TEMPLATE,
            ScriptKind::Coffee => COFFEE_TEMPLATE,
        }
        .to_owned());
    };
    if !path.exists() {
        return Err(RegistryError::TemplateNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|e| registry_io(path, e))
}

/// Write a new unit file into `dir` and return its id.
pub fn create_unit(
    dir: &Path,
    now_millis: i64,
    args: &[String],
    kind: ScriptKind,
    template: &str,
) -> Result<UnitId, RegistryError> {
    ensure_directory(dir)?;
    let id = unit_file_name(now_millis, args, kind);
    let path = unit_path(dir, &id);
    std::fs::write(&path, template).map_err(|e| registry_io(&path, e))?;
    tracing::info!("created unit {}", path.display());
    Ok(id)
}

/// `<dir>/<unit>`, pure, no I/O.
pub fn unit_path(dir: &Path, unit: &UnitId) -> PathBuf {
    dir.join(&unit.0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").expect("write fixture");
    }

    #[test]
    fn lists_only_conforming_names_sorted() {
        let tmp = TempDir::new().expect("tempdir");
        touch(tmp.path(), "1700000000002_second.js");
        touch(tmp.path(), "1700000000001_first.js");
        touch(tmp.path(), "1700000000003_other.coffee");
        touch(tmp.path(), "170000000000_short.js");
        touch(tmp.path(), "README.md");
        touch(tmp.path(), ".migrated.json");

        let units = list_units(tmp.path(), ScriptKind::Js).expect("list");
        assert_eq!(
            units,
            vec![
                UnitId::from("1700000000001_first.js"),
                UnitId::from("1700000000002_second.js"),
            ]
        );

        let coffee = list_units(tmp.path(), ScriptKind::Coffee).expect("list");
        assert_eq!(coffee, vec![UnitId::from("1700000000003_other.coffee")]);
    }

    #[test]
    fn missing_directory_is_unreadable() {
        let tmp = TempDir::new().expect("tempdir");
        let err = list_units(&tmp.path().join("nope"), ScriptKind::Js).unwrap_err();
        assert!(matches!(err, RegistryError::DirectoryUnreadable { .. }));
    }

    #[test]
    fn file_name_from_args() {
        let name = unit_file_name(
            1_700_000_000_000,
            &["My Super".to_string(), "Migration".to_string()],
            ScriptKind::Js,
        );
        assert_eq!(name.as_str(), "1700000000000_My_Super_Migration.js");

        let dotted = unit_file_name(1_700_000_000_000, &["v1.2  fix".to_string()], ScriptKind::Coffee);
        assert_eq!(dotted.as_str(), "1700000000000_v1_2_fix.coffee");
    }

    #[test]
    fn file_name_defaults_to_migration() {
        let name = unit_file_name(1_700_000_000_000, &[], ScriptKind::Js);
        assert_eq!(name.as_str(), "1700000000000_migration.js");
        assert!(is_unit_name(name.as_str(), ScriptKind::Js));
    }

    #[test]
    fn builtin_template_has_both_entry_points() {
        let js = load_template(None, ScriptKind::Js).expect("template");
        assert!(js.contains("exports.up") && js.contains("exports.down"));
    }

    #[test]
    fn missing_template_is_not_found() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("missing.tpl.js");
        let err = load_template(Some(&path), ScriptKind::Js).unwrap_err();
        assert!(matches!(err, RegistryError::TemplateNotFound { .. }));
        assert!(err.to_string().contains("missing.tpl.js"));
    }

    #[test]
    fn create_unit_makes_directory_and_file() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("migrations");
        let id = create_unit(&dir, 1_700_000_000_000, &[], ScriptKind::Js, "/* tpl */\n")
            .expect("create");
        let content = std::fs::read_to_string(unit_path(&dir, &id)).expect("read");
        assert_eq!(content, "/* tpl */\n");
    }
}
