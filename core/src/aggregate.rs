//! Snapshot totals.
//!
//! Totals are always rebuilt from the entity set, never merged with what the
//! record already carried: a stale aggregate must not survive a pass.

use serde_json::{Map, Value};
use tracing::trace;

use ledger_types::Record;

use crate::SnapshotLayout;

#[derive(Debug, Clone, Copy)]
enum Tally {
    Int(i64),
    Float(f64),
}

impl Default for Tally {
    fn default() -> Self {
        Tally::Int(0)
    }
}

impl Tally {
    fn add(self, value: &Value) -> Self {
        let Value::Number(number) = value else {
            return self;
        };
        match (self, number.as_i64()) {
            (Tally::Int(sum), Some(n)) => match sum.checked_add(n) {
                Some(total) => Tally::Int(total),
                None => Tally::Float(sum as f64 + n as f64),
            },
            (Tally::Int(sum), None) => Tally::Float(sum as f64 + number.as_f64().unwrap_or(0.0)),
            (Tally::Float(sum), _) => Tally::Float(sum + number.as_f64().unwrap_or(0.0)),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Tally::Int(sum) => Value::from(sum),
            Tally::Float(sum) => Value::from(sum),
        }
    }
}

/// Sum every configured counter across `entities` and count distinct keys.
///
/// A counter missing from an entity (or an entity that is not an object)
/// contributes zero. Sums stay integral unless a fractional or out-of-range
/// value shows up.
#[must_use]
pub fn totals_for(entities: &Map<String, Value>, layout: &SnapshotLayout) -> Map<String, Value> {
    let mut totals = Map::new();
    for counter in &layout.counters {
        let tally = entities
            .values()
            .filter_map(|metrics| metrics.get(counter))
            .fold(Tally::default(), |tally, value| {
                if !value.is_number() {
                    trace!(counter = %counter, "Ignoring non-numeric counter value");
                }
                tally.add(value)
            });
        totals.insert(counter.clone(), tally.into_value());
    }
    totals.insert(layout.count_field.clone(), Value::from(entities.len()));
    totals
}

/// Replace `record`'s totals with ones computed from `entities`.
///
/// Returns whether the stored totals changed. An unchanged record keeps its
/// cached source text.
pub fn apply_totals(
    record: &mut Record,
    entities: &Map<String, Value>,
    layout: &SnapshotLayout,
) -> bool {
    let totals = Value::Object(totals_for(entities, layout));
    if record.get(&layout.totals_field) == Some(&totals) {
        return false;
    }
    record.insert(layout.totals_field.clone(), totals);
    true
}
