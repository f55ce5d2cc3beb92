//! Snapshot deduplication.
//!
//! Two passes:
//!
//! - **Across snapshots**: one record per `date`; the greatest `timestamp`
//!   wins (ISO-8601 strings compare lexicographically). Survivors are sorted
//!   by date.
//! - **Inside a snapshot**: an `entities` object whose raw text repeats a key
//!   keeps the first occurrence. This reads the record's source text, because
//!   a parsed map has already collapsed duplicates (last one wins).
//!
//! [`compact_snapshots`] runs both and rebuilds totals for every record that
//! has entities.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use tracing::debug;

use ledger_types::Record;

use crate::{SnapshotLayout, aggregate};

/// A record dropped by cross-snapshot dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superseded {
    pub date: String,
    pub timestamp: Option<String>,
}

#[derive(Debug)]
pub struct SnapshotDedup {
    pub records: Vec<Record>,
    pub superseded: Vec<Superseded>,
}

/// Group by date and keep the latest timestamp per group.
///
/// A missing timestamp sorts before any present one; on equal timestamps the
/// record appearing later in the input wins. Records without a string date
/// are kept after the dated ones, in input order.
#[must_use]
pub fn dedup_snapshots(records: Vec<Record>, layout: &SnapshotLayout) -> SnapshotDedup {
    let mut winners: BTreeMap<String, Record> = BTreeMap::new();
    let mut undated = Vec::new();
    let mut superseded = Vec::new();

    for record in records {
        let Some(date) = record.get_str(&layout.date_field).map(str::to_owned) else {
            undated.push(record);
            continue;
        };
        match winners.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let loser = if timestamp(&record, layout) >= timestamp(slot.get(), layout) {
                    slot.insert(record)
                } else {
                    record
                };
                let dropped = Superseded {
                    date: slot.key().clone(),
                    timestamp: loser.get_str(&layout.timestamp_field).map(str::to_owned),
                };
                debug!(
                    date = %dropped.date,
                    timestamp = dropped.timestamp.as_deref().unwrap_or("-"),
                    "Superseded duplicate snapshot"
                );
                superseded.push(dropped);
            }
        }
    }

    if !undated.is_empty() {
        debug!(count = undated.len(), "Snapshot records without a date kept as-is");
    }

    SnapshotDedup {
        records: winners.into_values().chain(undated).collect(),
        superseded,
    }
}

fn timestamp<'a>(record: &'a Record, layout: &SnapshotLayout) -> Option<&'a str> {
    record.get_str(&layout.timestamp_field)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDedup {
    pub entities: Map<String, Value>,
    /// Raw key/value pairs dropped because their key was already seen.
    pub discarded: usize,
}

/// First-occurrence-wins view of a record's entities.
///
/// `None` when the record has no entities object. Records built in memory
/// (no source text) cannot hold duplicate keys and come back unchanged.
#[must_use]
pub fn dedup_entities(record: &Record, layout: &SnapshotLayout) -> Option<EntityDedup> {
    let parsed = record.get(&layout.entities_field)?.as_object()?;

    if let Some(source) = record.source() {
        match raw_entity_pairs(source, &layout.entities_field) {
            Ok(Some(pairs)) => return Some(first_wins(pairs)),
            Ok(None) => {}
            Err(err) => {
                debug!("Falling back to parsed entities: {err}");
            }
        }
    }

    Some(EntityDedup {
        entities: parsed.clone(),
        discarded: 0,
    })
}

fn first_wins(pairs: Vec<(String, Value)>) -> EntityDedup {
    let mut entities = Map::new();
    let mut discarded = 0;
    for (key, value) in pairs {
        if entities.contains_key(&key) {
            discarded += 1;
        } else {
            entities.insert(key, value);
        }
    }
    EntityDedup {
        entities,
        discarded,
    }
}

fn raw_entity_pairs(
    source: &RawValue,
    field: &str,
) -> Result<Option<Vec<(String, Value)>>, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(source.get());
    let Some(raw) = FieldProbe { name: field }.deserialize(&mut de)? else {
        return Ok(None);
    };
    de.end()?;
    if !raw.get().starts_with('{') {
        return Ok(None);
    }
    serde_json::from_str::<EntityPairs>(raw.get()).map(|pairs| Some(pairs.0))
}

/// Finds the raw text of the first top-level field called `name`.
struct FieldProbe<'n> {
    name: &'n str,
}

impl<'de> DeserializeSeed<'de> for FieldProbe<'_> {
    type Value = Option<&'de RawValue>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for FieldProbe<'_> {
    type Value = Option<&'de RawValue>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut found = None;
        while let Some(key) = map.next_key::<String>()? {
            if found.is_none() && key == self.name {
                found = Some(map.next_value::<&'de RawValue>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }
}

/// Object entries in encounter order, duplicates included.
struct EntityPairs(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for EntityPairs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = EntityPairs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an entities object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    pairs.push(entry);
                }
                Ok(EntityPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDiscard {
    pub date: Option<String>,
    pub discarded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub records_in: usize,
    pub records_out: usize,
    pub superseded: Vec<Superseded>,
    pub entity_discards: Vec<EntityDiscard>,
    pub totals_rewritten: usize,
}

impl CompactionReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.superseded.is_empty() && self.entity_discards.is_empty() && self.totals_rewritten == 0
    }
}

#[derive(Debug)]
pub struct Compaction {
    pub records: Vec<Record>,
    pub report: CompactionReport,
}

/// Cross-snapshot dedup, then per-record entity dedup and totals rebuild.
///
/// Records without an entities object pass through untouched. Every other
/// survivor gets fresh totals, even when nothing was deduplicated.
#[must_use]
pub fn compact_snapshots(records: Vec<Record>, layout: &SnapshotLayout) -> Compaction {
    let records_in = records.len();
    let SnapshotDedup {
        mut records,
        superseded,
    } = dedup_snapshots(records, layout);

    let mut entity_discards = Vec::new();
    let mut totals_rewritten = 0;

    for record in &mut records {
        let Some(EntityDedup {
            entities,
            discarded,
        }) = dedup_entities(record, layout)
        else {
            continue;
        };

        if discarded > 0 {
            let date = record.get_str(&layout.date_field).map(str::to_owned);
            debug!(
                date = date.as_deref().unwrap_or("-"),
                discarded, "Dropped repeated entity blocks"
            );
            entity_discards.push(EntityDiscard { date, discarded });
            record.insert(layout.entities_field.clone(), Value::Object(entities.clone()));
        }

        if aggregate::apply_totals(record, &entities, layout) {
            totals_rewritten += 1;
        }
    }

    let report = CompactionReport {
        records_in,
        records_out: records.len(),
        superseded,
        entity_discards,
        totals_rewritten,
    };
    Compaction { records, report }
}

/// Keep only the single latest snapshot and drop all history.
///
/// Destructive. Ordering is the same as [`dedup_snapshots`]: greatest date,
/// then greatest timestamp, later input winning ties. Undated records lose to
/// any dated one. Returns the survivor (if any) and how many were dropped.
#[must_use]
pub fn collapse_to_latest(records: Vec<Record>, layout: &SnapshotLayout) -> (Vec<Record>, usize) {
    let total = records.len();
    let latest = records.into_iter().reduce(|best, candidate| {
        let rank = |r: &Record| {
            (
                r.get_str(&layout.date_field).map(str::to_owned),
                r.get_str(&layout.timestamp_field).map(str::to_owned),
            )
        };
        if rank(&candidate) >= rank(&best) {
            candidate
        } else {
            best
        }
    });
    let kept: Vec<Record> = latest.into_iter().collect();
    let dropped = total - kept.len();
    (kept, dropped)
}
