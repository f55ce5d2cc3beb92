//! Core ledger algorithms.
//!
//! Everything here works on in-memory record sequences; file IO lives in
//! `ledger-store`.
//!
//! ```text
//! text ──codec::decode_records──▶ Vec<Record>
//!                                   ├── dedup::compact_snapshots (dedup + aggregate)
//!                                   └── transition::complete ──▶ CompletionAuditEntry
//! Vec<Record> ──codec::encode_records──▶ NDJSON text
//! ```

pub mod aggregate;
pub mod codec;
pub mod dedup;
mod layout;
pub mod transition;

pub use aggregate::{apply_totals, totals_for};
pub use codec::{
    DecodeDiagnostic, DecodeRecovery, Decoded, DiagnosticKind, RawItem, decode_records,
    decode_stream, encode_records,
};
pub use dedup::{
    Compaction, CompactionReport, EntityDedup, EntityDiscard, SnapshotDedup, Superseded,
    collapse_to_latest, compact_snapshots, dedup_entities, dedup_snapshots,
};
pub use layout::SnapshotLayout;
pub use transition::{CompletionStamp, TransitionError, complete, find_open, open_tasks};
