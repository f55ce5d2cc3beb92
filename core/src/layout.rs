use serde::Deserialize;

/// Field names of a snapshot ledger and the counters its totals sum.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnapshotLayout {
    pub date_field: String,
    pub timestamp_field: String,
    pub entities_field: String,
    pub totals_field: String,
    /// Name of the distinct-entity count inside `totals`.
    pub count_field: String,
    pub counters: Vec<String>,
}

impl Default for SnapshotLayout {
    fn default() -> Self {
        Self {
            date_field: "date".to_string(),
            timestamp_field: "timestamp".to_string(),
            entities_field: "entities".to_string(),
            totals_field: "totals".to_string(),
            count_field: "entities_count".to_string(),
            counters: ["views", "unique_views", "clones", "unique_clones", "stars", "forks"]
                .map(String::from)
                .to_vec(),
        }
    }
}
