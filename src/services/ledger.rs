use super::aggregation::AggregationStore;
use super::archive::ArchiveStore;
use super::tabular::{decode_records, encode_records};
use crate::error::{MonitorError, Result};
use crate::models::{Appliance, DailyRecord};
use chrono::{Local, Timelike};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Durable ledger of completed monitoring sessions.
///
/// The mutex doubles as the persistence write lock: every append rewrites the
/// whole file before the in-memory copy is updated, and resets archive under
/// the same guard.
pub struct DailyLedger {
    path: PathBuf,
    records: Mutex<Vec<DailyRecord>>,
    archive: ArchiveStore,
    rate_per_kwh: f64,
}

impl DailyLedger {
    /// Load an existing ledger file; a missing file is an empty ledger.
    pub async fn open(
        path: impl Into<PathBuf>,
        archive: ArchiveStore,
        rate_per_kwh: f64,
    ) -> Result<Self> {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(bytes) => decode_records(&path, &bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(MonitorError::storage(&path, e)),
        };
        log::info!("Loaded {} daily records from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: Mutex::new(records),
            archive,
            rate_per_kwh,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    pub async fn records(&self) -> Vec<DailyRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Append one record and write the full ledger through to disk.
    ///
    /// On a failed write the in-memory ledger is left untouched.
    pub async fn append(&self, record: DailyRecord) -> Result<()> {
        let mut records = self.records.lock().await;

        let mut updated = Vec::with_capacity(records.len() + 1);
        updated.extend(records.iter().cloned());
        updated.push(record);

        self.write_through(&updated).await?;
        *records = updated;
        log::debug!("Ledger now holds {} records", records.len());
        Ok(())
    }

    /// Fold an appliance's closed session into a new record.
    ///
    /// The buffered samples are the source of truth for the total. The
    /// appliance's state is cleared only after the record is on disk.
    pub async fn materialize(
        &self,
        store: &AggregationStore,
        appliance: Appliance,
    ) -> Result<DailyRecord> {
        let snapshot = store.snapshot(appliance);
        let total_consumption_kw = snapshot.total_consumption();
        let now = Local::now();

        let record = DailyRecord {
            date: now.date_naive(),
            time: now.time().with_nanosecond(0).unwrap_or_else(|| now.time()),
            appliance,
            total_consumption_kw,
            cost: total_consumption_kw * self.rate_per_kwh,
            total_time_seconds: snapshot.duration_seconds(),
        };

        self.append(record.clone()).await?;
        store.finish_session(appliance);

        log::info!(
            "{appliance}: recorded {:.3} kW over {:.1}s (cost {:.2})",
            record.total_consumption_kw,
            record.total_time_seconds,
            record.cost
        );
        Ok(record)
    }

    async fn write_through(&self, records: &[DailyRecord]) -> Result<()> {
        let bytes = encode_records(&self.path, records, true)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MonitorError::storage(parent, e))?;
        }
        fs::write(&self.path, bytes).await.map_err(|e| {
            log::warn!("Failed to persist daily ledger to {}: {e}", self.path.display());
            MonitorError::storage(&self.path, e)
        })
    }

    /// Move every record into the archive, then remove the ledger file.
    ///
    /// Returns how many records were archived.
    pub async fn reset_all(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let archived = records.len();

        if !records.is_empty() {
            self.archive.append(&records).await?;
        }
        // Archived rows must not be archived again if the file removal below fails.
        records.clear();

        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(MonitorError::storage(&self.path, e)),
        }

        log::info!("Reset daily ledger, archived {archived} records");
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::TempDir;

    fn record(appliance: Appliance, kw: f64) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            appliance,
            total_consumption_kw: kw,
            cost: kw * 10.0,
            total_time_seconds: 30.0,
        }
    }

    async fn open_in(dir: &TempDir) -> DailyLedger {
        DailyLedger::open(
            dir.path().join("daily.csv"),
            ArchiveStore::new(dir.path().join("archive.csv")),
            10.0,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn appends_are_written_through_and_reloaded() {
        let temp_dir = TempDir::new().unwrap();
        {
            let ledger = open_in(&temp_dir).await;
            ledger.append(record(Appliance::AirConditioner, 2.0)).await.unwrap();
            ledger.append(record(Appliance::Refrigerator, 1.0)).await.unwrap();
        }

        let reopened = open_in(&temp_dir).await;
        assert_eq!(
            reopened.records().await,
            vec![
                record(Appliance::AirConditioner, 2.0),
                record(Appliance::Refrigerator, 1.0)
            ]
        );
    }

    #[tokio::test]
    async fn reset_archives_then_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        ledger.append(record(Appliance::WashingMachine, 4.0)).await.unwrap();

        assert_eq!(ledger.reset_all().await.unwrap(), 1);
        assert!(ledger.is_empty().await);
        assert!(!ledger.path().exists());
        assert_eq!(
            ledger.archive().read_all().await.unwrap(),
            Some(vec![record(Appliance::WashingMachine, 4.0)])
        );

        // Nothing left to archive.
        assert_eq!(ledger.reset_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_does_not_archive_twice_when_file_removal_fails() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        ledger.append(record(Appliance::AirConditioner, 3.0)).await.unwrap();

        // A non-empty directory at the ledger path cannot be removed as a file.
        std::fs::remove_file(ledger.path()).unwrap();
        std::fs::create_dir(ledger.path()).unwrap();
        std::fs::write(ledger.path().join("blocker"), b"x").unwrap();

        let err = ledger.reset_all().await.unwrap_err();
        assert!(matches!(err, MonitorError::StorageUnavailable { .. }));
        assert!(ledger.is_empty().await);
        assert!(ledger.reset_all().await.is_err());

        std::fs::remove_dir_all(ledger.path()).unwrap();
        assert_eq!(ledger.reset_all().await.unwrap(), 0);
        assert_eq!(
            ledger.archive().read_all().await.unwrap(),
            Some(vec![record(Appliance::AirConditioner, 3.0)])
        );
    }

    #[tokio::test]
    async fn empty_session_records_positive_zero() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        let store = AggregationStore::new(15.1);
        store.set_session_active(Appliance::AirConditioner, true);
        store.set_session_active(Appliance::AirConditioner, false);

        let record = ledger.materialize(&store, Appliance::AirConditioner).await.unwrap();
        assert!(record.total_consumption_kw.is_sign_positive());
        assert!(record.cost.is_sign_positive());

        let text = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(!text.contains(",-0"));
    }

    #[tokio::test]
    async fn materialize_sums_samples_and_clears_state() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        let store = AggregationStore::new(15.1);

        store.set_session_active(Appliance::Refrigerator, true);
        store.record_sample(Appliance::Refrigerator, 0.5);
        store.record_sample(Appliance::Refrigerator, 1.75);
        store.set_session_active(Appliance::Refrigerator, false);

        let record = ledger.materialize(&store, Appliance::Refrigerator).await.unwrap();
        assert!((record.total_consumption_kw - 2.25).abs() < 1e-9);
        assert!((record.cost - 22.5).abs() < 1e-9);
        assert!(record.total_time_seconds >= 0.0);
        assert_eq!(store.running_total(Appliance::Refrigerator), 0.0);
        assert!(store.samples(Appliance::Refrigerator).is_empty());
        assert_eq!(ledger.records().await, vec![record]);
    }

    #[tokio::test]
    async fn materialize_without_session_window_has_zero_duration() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        let store = AggregationStore::new(15.1);
        store.record_sample(Appliance::WashingMachine, 1.0);

        let record = ledger.materialize(&store, Appliance::WashingMachine).await.unwrap();
        assert_eq!(record.total_time_seconds, 0.0);
        assert_eq!(record.total_consumption_kw, 1.0);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_records() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = open_in(&temp_dir).await;
        ledger.append(record(Appliance::AirConditioner, 1.0)).await.unwrap();

        std::fs::remove_file(ledger.path()).unwrap();
        std::fs::create_dir(ledger.path()).unwrap();

        let err = ledger.append(record(Appliance::AirConditioner, 2.0)).await.unwrap_err();
        assert!(matches!(err, MonitorError::StorageUnavailable { .. }));
        assert_eq!(ledger.len().await, 1);
    }
}
