//! CSV encoding shared by the daily ledger and the archive.

use crate::error::{MonitorError, Result};
use crate::models::DailyRecord;
use std::path::Path;

pub const HEADER: [&str; 6] = [
    "Date",
    "Time",
    "Appliance",
    "TotalConsumptionKW",
    "CostINR",
    "TotalTimeSeconds",
];

pub fn encode_records(path: &Path, records: &[DailyRecord], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer
            .write_record(HEADER)
            .map_err(|e| MonitorError::storage(path, e))?;
    }
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| MonitorError::storage(path, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| MonitorError::storage(path, e.into_error()))
}

pub fn decode_records(path: &Path, bytes: &[u8]) -> Result<Vec<DailyRecord>> {
    csv::Reader::from_reader(bytes)
        .deserialize()
        .collect::<std::result::Result<Vec<DailyRecord>, _>>()
        .map_err(|e| MonitorError::storage(path, e))
}
