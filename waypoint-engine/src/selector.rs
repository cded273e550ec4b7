//! Selection of the units eligible for a `run` / `dry` invocation.

use waypoint_core::{Direction, EnvHistory, Plan, PlanItem, UnitId};

/// Compute the ordered plan for `direction`.
///
/// 1. `up` keeps units not in `applied`; `down` keeps units in `applied`.
/// 2. With a name and `limit == 1`, only the unit named exactly `name` is kept.
/// 3. With a name and any other limit, `down` keeps ids `<= name` and `up`
///    keeps ids `>= name`.
/// 4. `up` sorts ascending, `down` descending.
/// 5. `limit > 0` truncates.
///
/// An empty name is the same as no name.
pub fn select(
    units: &[UnitId],
    applied: &EnvHistory,
    direction: Direction,
    limit: usize,
    name: Option<&str>,
) -> Plan {
    let name = name.filter(|n| !n.is_empty());

    let mut selected: Vec<&UnitId> = units
        .iter()
        .filter(|unit| applied.contains_key(*unit) == direction.is_down())
        .filter(|unit| match name {
            None => true,
            Some(name) if limit == 1 => unit.as_str() == name,
            Some(name) => match direction {
                Direction::Down => unit.as_str() <= name,
                Direction::Up => unit.as_str() >= name,
            },
        })
        .collect();

    selected.sort();
    if direction.is_down() {
        selected.reverse();
    }
    if limit > 0 {
        selected.truncate(limit);
    }

    selected
        .into_iter()
        .map(|unit| PlanItem::new(unit.clone(), direction))
        .collect()
}
