//! Reconciliation between the unit files on disk and the ledger.
//!
//! Used after a branch switch: units that only the ledger knows about came
//! from the branch we left and must be rolled back; units that only the
//! directory knows about arrived with the new branch and must be applied.

use std::collections::BTreeSet;

use waypoint_core::{EnvHistory, Plan, PlanItem, UnitId};

/// Plan that makes `applied` match `units`.
///
/// All `down` items come first, newest first; then all `up` items, oldest
/// first.
pub fn diff(units: &[UnitId], applied: &EnvHistory) -> Plan {
    let on_disk: BTreeSet<&UnitId> = units.iter().collect();

    let downs = applied
        .keys()
        .filter(|unit| !on_disk.contains(unit))
        .rev()
        .map(|unit| PlanItem::down(unit.clone()));

    // BTreeSet iteration is ascending and dedups repeated ids.
    let ups = on_disk
        .iter()
        .filter(|unit| !applied.contains_key(**unit))
        .map(|unit| PlanItem::up((*unit).clone()));

    downs.chain(ups).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{AppliedEntry, Direction};

    fn applied(names: &[&str]) -> EnvHistory {
        names
            .iter()
            .map(|n| (UnitId::from(*n), AppliedEntry::now()))
            .collect()
    }

    #[test]
    fn in_sync_is_empty() {
        let units = vec![UnitId::from("1700000000001_a.js")];
        assert!(diff(&units, &applied(&["1700000000001_a.js"])).is_empty());
    }

    #[test]
    fn downs_precede_ups() {
        let units = vec![
            UnitId::from("1700000000004_new_b.js"),
            UnitId::from("1700000000001_shared.js"),
            UnitId::from("1700000000003_new_a.js"),
        ];
        let ledger = applied(&[
            "1700000000001_shared.js",
            "1700000000002_old_a.js",
            "1700000000005_old_b.js",
        ]);

        let plan = diff(&units, &ledger);
        let got: Vec<(&str, Direction)> = plan
            .iter()
            .map(|item| (item.unit.as_str(), item.direction))
            .collect();
        assert_eq!(
            got,
            vec![
                ("1700000000005_old_b.js", Direction::Down),
                ("1700000000002_old_a.js", Direction::Down),
                ("1700000000003_new_a.js", Direction::Up),
                ("1700000000004_new_b.js", Direction::Up),
            ]
        );
    }

    #[test]
    fn empty_disk_rolls_back_everything() {
        let plan = diff(&[], &applied(&["1700000000001_a.js", "1700000000002_b.js"]));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], PlanItem::down("1700000000002_b.js"));
    }
}
