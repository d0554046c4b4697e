//! Append-only outcome log.
//!
//! One CSV row per finished job attempt. The serial number of a new row is
//! the largest serial already in the file plus one; a missing or empty file
//! is created with the header row first. The file is opened, appended and
//! closed on every write and assumes a single writer.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};
use crate::state_machine::Termination;

pub const COLUMNS: [&str; 7] = [
    "SerialNumber",
    "Endpoint",
    "EstimatedTimeOfArrival",
    "ImageLinks",
    "GenerationTime",
    "ImagesDeliveryTime",
    "Status",
];

const LINK_SEPARATOR: &str = ", ";

/// A verified image link: seconds from job start until it answered 200,
/// and how many failed fetches preceded that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCheck {
    pub link: String,
    pub delivery_time: f64,
    pub retry_count: u32,
}

/// Everything about a finished attempt except its serial number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub endpoint: String,
    pub estimated_time_of_arrival: Option<f64>,
    pub image_links: Vec<String>,
    pub generation_time: Option<f64>,
    pub images_delivery_time: Option<Vec<LinkCheck>>,
    pub status: String,
}

impl NewRecord {
    /// A record for an attempt that never produced images: only endpoint
    /// and status are filled.
    pub fn terminal(endpoint: &str, termination: &Termination) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            estimated_time_of_arrival: None,
            image_links: Vec::new(),
            generation_time: None,
            images_delivery_time: None,
            status: termination.status(),
        }
    }
}

/// One persisted row of the outcome log.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub serial_number: u64,
    pub endpoint: String,
    pub estimated_time_of_arrival: Option<f64>,
    pub image_links: Vec<String>,
    pub generation_time: Option<f64>,
    pub images_delivery_time: Option<Vec<LinkCheck>>,
    pub status: String,
}

impl OutcomeRecord {
    fn from_new(serial_number: u64, new: NewRecord) -> Self {
        Self {
            serial_number,
            endpoint: new.endpoint,
            estimated_time_of_arrival: new.estimated_time_of_arrival,
            image_links: new.image_links,
            generation_time: new.generation_time,
            images_delivery_time: new.images_delivery_time,
            status: new.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRow {
    #[serde(rename = "SerialNumber")]
    serial_number: u64,
    #[serde(rename = "Endpoint")]
    endpoint: String,
    #[serde(rename = "EstimatedTimeOfArrival")]
    estimated_time_of_arrival: Option<f64>,
    #[serde(rename = "ImageLinks")]
    image_links: String,
    #[serde(rename = "GenerationTime")]
    generation_time: Option<f64>,
    #[serde(rename = "ImagesDeliveryTime")]
    images_delivery_time: String,
    #[serde(rename = "Status")]
    status: String,
}

impl LogRow {
    fn from_record(record: &OutcomeRecord) -> Result<Self> {
        let images_delivery_time = match &record.images_delivery_time {
            Some(checks) => serde_json::to_string(checks)?,
            None => String::new(),
        };
        Ok(Self {
            serial_number: record.serial_number,
            endpoint: record.endpoint.clone(),
            estimated_time_of_arrival: record.estimated_time_of_arrival,
            image_links: record.image_links.join(LINK_SEPARATOR),
            generation_time: record.generation_time,
            images_delivery_time,
            status: record.status.clone(),
        })
    }

    fn into_record(self) -> Result<OutcomeRecord> {
        let image_links = if self.image_links.is_empty() {
            Vec::new()
        } else {
            self.image_links
                .split(LINK_SEPARATOR)
                .map(str::to_string)
                .collect()
        };
        let images_delivery_time = if self.images_delivery_time.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&self.images_delivery_time).map_err(|e| {
                    ProbeError::ParseFailure(format!(
                        "row {}: bad ImagesDeliveryTime: {e}",
                        self.serial_number
                    ))
                })?,
            )
        };
        Ok(OutcomeRecord {
            serial_number: self.serial_number,
            endpoint: self.endpoint,
            estimated_time_of_arrival: self.estimated_time_of_arrival,
            image_links,
            generation_time: self.generation_time,
            images_delivery_time,
            status: self.status,
        })
    }
}

/// Writes and reads the outcome log at a fixed path.
#[derive(Debug, Clone)]
pub struct OutcomeRecorder {
    path: PathBuf,
}

impl OutcomeRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row and returns it with its assigned serial number.
    pub fn append(&self, new: NewRecord) -> Result<OutcomeRecord> {
        self.ensure_log()?;
        let serial_number = self.last_serial()? + 1;
        let record = OutcomeRecord::from_new(serial_number, new);

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(LogRow::from_record(&record)?)?;
        writer.flush()?;

        tracing::info!(
            serial = record.serial_number,
            endpoint = %record.endpoint,
            status = %record.status,
            "outcome recorded"
        );
        Ok(record)
    }

    /// Reads every row back. A missing log reads as empty.
    pub fn read_all(&self) -> Result<Vec<OutcomeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader
            .deserialize::<LogRow>()
            .map(|row| row.map_err(ProbeError::from).and_then(LogRow::into_record))
            .collect()
    }

    /// Largest serial number in the log, 0 when there are no rows.
    pub fn last_serial(&self) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut last = 0;
        for row in reader.deserialize::<LogRow>() {
            last = last.max(row?.serial_number);
        }
        Ok(last)
    }

    fn ensure_log(&self) -> Result<()> {
        let missing = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if !missing {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(COLUMNS)?;
        writer.flush()?;
        tracing::debug!(path = %self.path.display(), "created outcome log");
        Ok(())
    }
}
