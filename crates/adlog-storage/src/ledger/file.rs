//! File-backed append-only ledger
//!
//! A single log file of length-prefixed postcard records. On open the file
//! is replayed to rebuild the record index and per-signer sequence
//! counters; a truncated tail left by a crash is cut off. Records are final
//! once their write has been synced.

use std::collections::{BTreeMap, HashMap};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use adlog_core::{
    ContentAddress, EventType, Ledger, LedgerError, LedgerRecord, RecordId, SignerId,
};

use super::{assign_record_id, check_submission};

/// Largest entry accepted during replay
const MAX_ENTRY_LEN: usize = 1024 * 1024;

/// Configuration for [`FileLedger`]
#[derive(Debug, Clone)]
pub struct FileLedgerConfig {
    /// Directory holding the ledger file
    pub base_dir: PathBuf,
    /// File name within `base_dir`
    pub file_name: String,
}

impl Default for FileLedgerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/ledger"),
            file_name: "ledger.log".to_string(),
        }
    }
}

impl FileLedgerConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }
}

struct LedgerFile {
    file: File,
    /// End of the last complete entry
    len: u64,
    /// record id -> entry offset; ids sort in submission order
    index: BTreeMap<RecordId, u64>,
    next_sequence: HashMap<SignerId, u64>,
}

impl LedgerFile {
    async fn read_at(&mut self, offset: u64) -> Result<LedgerRecord, LedgerError> {
        self.file.seek(SeekFrom::Start(offset)).await?;

        let mut len_buf = [0u8; 4];
        self.file.read_exact(&mut len_buf).await?;
        let entry_len = u32::from_be_bytes(len_buf) as usize;

        let mut entry_buf = vec![0u8; entry_len];
        self.file.read_exact(&mut entry_buf).await?;

        postcard::from_bytes(&entry_buf).map_err(|e| LedgerError::Corrupted(e.to_string()))
    }
}

/// Append-only ledger persisted to a local file
pub struct FileLedger {
    path: PathBuf,
    inner: Mutex<LedgerFile>,
}

impl FileLedger {
    /// Open (or create) the ledger and replay it
    #[instrument(skip_all)]
    pub async fn open(config: FileLedgerConfig) -> Result<Self, LedgerError> {
        tokio::fs::create_dir_all(&config.base_dir).await?;
        let path = config.base_dir.join(&config.file_name);

        info!(path = %path.display(), "Opening ledger");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let mut ledger_file = LedgerFile {
            file,
            len: 0,
            index: BTreeMap::new(),
            next_sequence: HashMap::new(),
        };
        replay(&mut ledger_file).await?;

        Ok(Self {
            path,
            inner: Mutex::new(ledger_file),
        })
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the ledger
    pub async fn len(&self) -> usize {
        self.inner.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Rebuild the index from disk, truncating any torn tail
async fn replay(ledger: &mut LedgerFile) -> Result<(), LedgerError> {
    let file_size = ledger.file.metadata().await?.len();
    let mut reader = BufReader::new(ledger.file.try_clone().await?);
    let mut offset = 0u64;

    while offset < file_size {
        let mut len_buf = [0u8; 4];
        if reader.read_exact(&mut len_buf).await.is_err() {
            warn!(offset, "Truncated ledger entry, stopping replay");
            break;
        }

        let entry_len = u32::from_be_bytes(len_buf) as usize;
        if entry_len == 0 || entry_len > MAX_ENTRY_LEN {
            warn!(offset, len = entry_len, "Invalid ledger entry length");
            break;
        }

        let mut entry_buf = vec![0u8; entry_len];
        if reader.read_exact(&mut entry_buf).await.is_err() {
            warn!(offset, "Failed to read ledger entry, stopping replay");
            break;
        }

        match postcard::from_bytes::<LedgerRecord>(&entry_buf) {
            Ok(record) => {
                let next = ledger.next_sequence.entry(record.signer).or_insert(0);
                *next = (*next).max(record.sequence + 1);
                ledger.index.insert(record.record_id, offset);
            }
            Err(e) => {
                warn!(offset, error = %e, "Failed to decode ledger entry");
                break;
            }
        }

        offset += 4 + entry_len as u64;
    }

    if offset < file_size {
        warn!(
            valid = offset,
            size = file_size,
            "Discarding torn ledger tail"
        );
        ledger.file.set_len(offset).await?;
    }
    ledger.len = offset;

    info!(records = ledger.index.len(), "Replayed ledger");
    Ok(())
}

#[async_trait]
impl Ledger for FileLedger {
    async fn next_sequence(&self, signer: &SignerId) -> Result<u64, LedgerError> {
        Ok(self
            .inner
            .lock()
            .await
            .next_sequence
            .get(signer)
            .copied()
            .unwrap_or(0))
    }

    #[instrument(skip(self, address), fields(address = %address.short()))]
    async fn append(
        &self,
        signer: &SignerId,
        sequence: u64,
        event_type: EventType,
        address: &ContentAddress,
    ) -> Result<RecordId, LedgerError> {
        let mut inner = self.inner.lock().await;

        let expected = inner.next_sequence.get(signer).copied().unwrap_or(0);
        check_submission(expected, sequence, address)?;

        let position = inner.index.len() as u64;
        let record_id = assign_record_id(position, signer, sequence, event_type, address);
        let record = LedgerRecord {
            record_id: record_id.clone(),
            event_type,
            address: address.clone(),
            signer: signer.clone(),
            sequence,
            submitted_at_millis: chrono::Utc::now().timestamp_millis(),
            is_valid: true,
        };

        let serialized =
            postcard::to_allocvec(&record).map_err(|e| LedgerError::Corrupted(e.to_string()))?;

        let offset = inner.len;
        inner.file.seek(SeekFrom::Start(offset)).await?;
        inner
            .file
            .write_all(&(serialized.len() as u32).to_be_bytes())
            .await?;
        inner.file.write_all(&serialized).await?;
        inner.file.sync_data().await?;

        inner.len = offset + 4 + serialized.len() as u64;
        inner.index.insert(record_id.clone(), offset);
        inner.next_sequence.insert(signer.clone(), sequence + 1);

        debug!(record_id = %record_id, offset, "Appended record");
        Ok(record_id)
    }

    async fn await_finality(
        &self,
        record_id: &RecordId,
        _timeout: Duration,
    ) -> Result<(), LedgerError> {
        // Appends are synced before they are acknowledged.
        if self.inner.lock().await.index.contains_key(record_id) {
            Ok(())
        } else {
            Err(LedgerError::NotFound(record_id.clone()))
        }
    }

    async fn get(&self, record_id: &RecordId) -> Result<LedgerRecord, LedgerError> {
        let mut inner = self.inner.lock().await;
        let offset = *inner
            .index
            .get(record_id)
            .ok_or_else(|| LedgerError::NotFound(record_id.clone()))?;
        inner.read_at(offset).await
    }

    async fn scan(
        &self,
        after: Option<&RecordId>,
        limit: usize,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        use std::ops::Bound;

        let mut inner = self.inner.lock().await;
        let lower = match after {
            Some(id) => Bound::Excluded(id.clone()),
            None => Bound::Unbounded,
        };
        let offsets: Vec<u64> = inner
            .index
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, &offset)| offset)
            .collect();

        let mut records = Vec::with_capacity(offsets.len());
        for offset in offsets {
            records.push(inner.read_at(offset).await?);
        }
        Ok(records)
    }
}
