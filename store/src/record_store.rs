use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use ledger_core::{DecodeDiagnostic, DecodeRecovery, decode_records, encode_records, find_open};
use ledger_types::{Record, TaskKey};
use ledger_utils::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, atomic_write_with_options,
    existing_mode, recover_bak_file,
};

use crate::StoreError;

/// One ledger file's records, in file order.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<Record>,
    diagnostics: Vec<DecodeDiagnostic>,
    /// Whether [`save`](Self::save) may drop content behind `diagnostics`.
    drop_malformed: bool,
    /// Text as loaded, used to skip rewrites that would change nothing.
    loaded: String,
}

impl RecordStore {
    /// Load `path`. Malformed content is reported through
    /// [`diagnostics`](Self::diagnostics), never as a load error; it only
    /// blocks [`save`](Self::save) until [`drop_malformed`](Self::drop_malformed).
    pub fn load(path: impl AsRef<Path>, recovery: DecodeRecovery) -> Result<Self, StoreError> {
        let path = path.as_ref();
        recover_bak_file(path);

        let text = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_text(path, text, recovery);
        debug!(
            path = %path.display(),
            records = store.records.len(),
            diagnostics = store.diagnostics.len(),
            "Loaded ledger"
        );
        Ok(store)
    }

    /// Build a store from text already in memory; `path` is where
    /// [`save`](Self::save) will write.
    #[must_use]
    pub fn from_text(path: impl Into<PathBuf>, text: String, recovery: DecodeRecovery) -> Self {
        let decoded = decode_records(&text, recovery);
        Self {
            path: path.into(),
            records: decoded.items,
            diagnostics: decoded.diagnostics,
            drop_malformed: false,
            loaded: text,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn replace_records(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    /// Move the records out, leaving the store empty until
    /// [`replace_records`](Self::replace_records).
    pub fn take_records(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[DecodeDiagnostic] {
        &self.diagnostics
    }

    /// Accept that the next save loses whatever failed to decode.
    pub fn drop_malformed(&mut self) {
        self.drop_malformed = true;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record with `key`, whatever its status.
    #[must_use]
    pub fn find(&self, key: &TaskKey) -> Option<&Record> {
        self.records.iter().find(|record| key.matches(record))
    }

    /// First record with `key` that is still `todo`.
    pub fn find_open_mut(&mut self, key: &TaskKey) -> Option<&mut Record> {
        let index = find_open(&self.records, key)?;
        self.records.get_mut(index)
    }

    pub fn serialize(&self) -> Result<String, StoreError> {
        encode_records(&self.records).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })
    }

    /// Whether saving now would change the file content.
    pub fn is_modified(&self) -> Result<bool, StoreError> {
        Ok(self.serialize()? != self.loaded)
    }

    /// Write every record back to the store's path, atomically.
    ///
    /// The existing file's permissions are kept. On failure the previous
    /// content is left in place. Fails with [`StoreError::Malformed`] when the
    /// load reported diagnostics, unless [`drop_malformed`](Self::drop_malformed)
    /// was called.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.check_lossless()?;
        let text = self.serialize()?;
        let options = AtomicWriteOptions {
            file_sync: FileSyncPolicy::SyncAll,
            parent_dir_sync: ParentDirSyncPolicy::SyncBestEffort,
            mode: existing_mode(&self.path),
        };
        atomic_write_with_options(&self.path, text.as_bytes(), options).map_err(|source| {
            StoreError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(path = %self.path.display(), records = self.records.len(), "Saved ledger");
        if !self.diagnostics.is_empty() {
            warn!(
                path = %self.path.display(),
                dropped = self.diagnostics.len(),
                "Malformed content dropped from ledger"
            );
            self.diagnostics.clear();
        }
        self.loaded = text;
        Ok(())
    }

    fn check_lossless(&self) -> Result<(), StoreError> {
        match self.diagnostics.first() {
            Some(first) if !self.drop_malformed => Err(StoreError::Malformed {
                path: self.path.clone(),
                count: self.diagnostics.len(),
                line: first.line,
                message: first.message.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// [`save`](Self::save) only when the content changed. Returns whether a
    /// write happened.
    pub fn save_if_modified(&mut self) -> Result<bool, StoreError> {
        if !self.is_modified()? {
            debug!(path = %self.path.display(), "Ledger unchanged; skipping write");
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}
