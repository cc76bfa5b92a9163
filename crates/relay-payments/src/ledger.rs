//! Payment Ledger
//!
//! Append-only audit file of successful charges. Opened once at startup and
//! shared by every request task; each record is exactly one line.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Prefix of every ledger record
pub const RECORD_PREFIX: &str = "payment_successful: ";

/// Default ledger location, relative to the working directory
pub const DEFAULT_LEDGER_PATH: &str = "successful_payments.log";

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Append-only payment record sink
pub struct PaymentLedger {
    path: PathBuf,
    file: Mutex<File>,
    failed_writes: AtomicU64,
}

impl PaymentLedger {
    /// Open (creating if absent) the ledger in append mode
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Opened payment ledger");

        Ok(Self {
            path,
            file: Mutex::new(file),
            failed_writes: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped record.
    ///
    /// The lock is held for the whole line so concurrent records never interleave.
    pub async fn append(&self, summary: &str) -> Result<()> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let line = format_record(&timestamp, summary);

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Append a record, logging and counting any failure instead of returning it.
    ///
    /// Returns whether the record was written.
    pub async fn record(&self, summary: &str) -> bool {
        match self.append(summary).await {
            Ok(()) => true,
            Err(e) => {
                let failed = self.failed_writes.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    failed_writes = failed,
                    "Failed to write payment ledger record"
                );
                false
            }
        }
    }

    /// Number of records lost to write failures since the ledger was opened
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// Flush and fsync; called once the server has stopped accepting requests
    pub async fn sync(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

impl std::fmt::Debug for PaymentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentLedger")
            .field("path", &self.path)
            .field("failed_writes", &self.failed_writes())
            .finish_non_exhaustive()
    }
}

fn format_record(timestamp: &str, summary: &str) -> String {
    let summary = summary.replace(['\r', '\n'], " ");
    format!("{RECORD_PREFIX}{timestamp} {summary}\n")
}
