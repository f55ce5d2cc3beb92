//! Ledger file adapters.
//!
//! All filesystem access for ledgers lives here:
//!
//! - [`RecordStore`]: load a ledger file, hold its records in order, and write
//!   it back atomically (temp file + rename in the same directory).
//! - [`CompletionLog`]: the append-only audit file. Opened in append mode for
//!   every entry; prior content is never read or rewritten.
//!
//! Neither adapter locks across processes. Two processes running
//! read → transition → write against one ledger can lose an update; callers
//! that need that guarantee must hold their own advisory lock.

mod completion_log;
mod error;
mod record_store;

pub use completion_log::CompletionLog;
pub use error::{AuditError, StoreError};
pub use record_store::RecordStore;
