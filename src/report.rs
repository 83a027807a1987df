//! Tabular and JSON projections of the final roster.
//!
//! Field names and status strings are read by downstream viewers and must
//! not change.

use serde::Serialize;
use std::path::Path;

use crate::plate::state_name;
use crate::registry::{VehicleId, VehicleRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NOT_AVAILABLE: &str = "N/A";
const SLOW_BELOW_KMH: f64 = 30.0;
const FAST_FROM_KMH: f64 = 60.0;

/// One row per unique vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Frame_Number")]
    pub frame_number: u64,
    #[serde(rename = "Vehicle_ID")]
    pub vehicle_id: VehicleId,
    #[serde(rename = "Plate_Number")]
    pub plate_number: String,
    /// `N/A` until the speed is final
    #[serde(rename = "Speed_kmh")]
    pub speed_kmh: String,
    #[serde(rename = "Vehicle_X")]
    pub vehicle_x: i32,
    #[serde(rename = "Vehicle_Y")]
    pub vehicle_y: i32,
    #[serde(rename = "Speed_Status")]
    pub speed_status: String,
}

impl From<&VehicleRecord> for VehicleRow {
    fn from(record: &VehicleRecord) -> Self {
        let status = record.speed_status();
        Self {
            timestamp: record.first_seen_timestamp().format(TIMESTAMP_FORMAT).to_string(),
            frame_number: record.first_seen_frame(),
            vehicle_id: record.id(),
            plate_number: record.canonical_plate().to_string(),
            speed_kmh: status
                .speed_kmh()
                .map_or_else(|| NOT_AVAILABLE.to_string(), |kmh| format!("{:.1}", kmh)),
            vehicle_x: record.last_position().x,
            vehicle_y: record.last_position().y,
            speed_status: status.to_string(),
        }
    }
}

impl VehicleRow {
    pub fn csv_header() -> &'static str {
        "Timestamp,Frame_Number,Vehicle_ID,Plate_Number,Speed_kmh,Vehicle_X,Vehicle_Y,Speed_Status"
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp,
            self.frame_number,
            self.vehicle_id,
            self.plate_number,
            self.speed_kmh,
            self.vehicle_x,
            self.vehicle_y,
            self.speed_status,
        )
    }
}

/// Distribution of final speeds across the roster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedStats {
    pub average_kmh: f64,
    pub max_kmh: f64,
    pub min_kmh: f64,
    /// Below 30 km/h
    pub slow: usize,
    /// From 30 km/h up to 60 km/h
    pub medium: usize,
    /// 60 km/h and above
    pub fast: usize,
}

impl SpeedStats {
    /// `None` when no vehicle has a final speed.
    pub fn from_speeds(speeds: &[f64]) -> Option<Self> {
        if speeds.is_empty() {
            return None;
        }
        let count = |pred: fn(f64) -> bool| speeds.iter().filter(|v| pred(**v)).count();
        Some(Self {
            average_kmh: speeds.iter().sum::<f64>() / speeds.len() as f64,
            max_kmh: speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min_kmh: speeds.iter().copied().fold(f64::INFINITY, f64::min),
            slow: count(|v| v < SLOW_BELOW_KMH),
            medium: count(|v| (SLOW_BELOW_KMH..FAST_FROM_KMH).contains(&v)),
            fast: count(|v| v >= FAST_FROM_KMH),
        })
    }
}

/// Speed samples a vehicle contributed over the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleCount {
    pub vehicle_id: VehicleId,
    pub speed_samples: usize,
}

/// Where the session's results were written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilesCreated {
    pub detailed_results: String,
    pub summary: String,
}

/// Aggregate counts plus the ordered roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timestamp: Option<String>,
    pub total_frames_processed: u64,
    pub unique_vehicles_detected: usize,
    pub vehicles_with_speed_data: usize,
    pub speed_stats: Option<SpeedStats>,
    pub speed_samples: Vec<SampleCount>,
    pub vehicles: Vec<VehicleRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_created: Option<FilesCreated>,
}

impl SessionSummary {
    pub fn new(total_frames_processed: u64, records: &[VehicleRecord]) -> Self {
        let speeds: Vec<f64> = records
            .iter()
            .filter_map(|r| r.speed_status().speed_kmh())
            .collect();
        Self {
            session_timestamp: None,
            total_frames_processed,
            unique_vehicles_detected: records.len(),
            vehicles_with_speed_data: speeds.len(),
            speed_stats: SpeedStats::from_speeds(&speeds),
            speed_samples: records
                .iter()
                .map(|r| SampleCount {
                    vehicle_id: r.id(),
                    speed_samples: r.speed().accepted(),
                })
                .collect(),
            vehicles: records.iter().map(VehicleRow::from).collect(),
            files_created: None,
        }
    }

    /// Stamp the summary with the session start and the files written.
    pub fn with_outputs(mut self, session_timestamp: &str, detailed_results: &Path, summary: &Path) -> Self {
        self.session_timestamp = Some(session_timestamp.to_string());
        self.files_created = Some(FilesCreated {
            detailed_results: detailed_results.display().to_string(),
            summary: summary.display().to_string(),
        });
        self
    }

    /// Unique vehicles per processed frame, as a percentage.
    pub fn detection_rate(&self) -> Option<f64> {
        if self.total_frames_processed == 0 {
            return None;
        }
        Some(self.unique_vehicles_detected as f64 / self.total_frames_processed as f64 * 100.0)
    }

    /// Header line followed by one line per vehicle.
    pub fn to_csv(&self) -> String {
        let mut s = String::from(VehicleRow::csv_header());
        s.push('\n');
        for row in &self.vehicles {
            s.push_str(&row.to_csv_row());
            s.push('\n');
        }
        s
    }

    /// Human-readable roster for the console.
    pub fn to_table(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("  Total Frames Processed:    {}\n", self.total_frames_processed));
        s.push_str(&format!("  Unique Vehicles Detected:  {}\n", self.unique_vehicles_detected));
        s.push_str(&format!("  Vehicles with Speed Data:  {}\n", self.vehicles_with_speed_data));
        if let Some(rate) = self.detection_rate() {
            s.push_str(&format!("  Detection Rate:            {:.2}% efficiency\n", rate));
        }
        s.push('\n');
        s.push_str(&format!(
            "{:>3} | {:^12} | {:^12} | {:^24} | {}\n",
            "ID", "Plate Number", "Speed (km/h)", "Status", "State"
        ));
        s.push_str(&format!("{}\n", "-".repeat(78)));
        for row in &self.vehicles {
            s.push_str(&format!(
                "{:>3} | {:^12} | {:^12} | {:^24} | {}\n",
                row.vehicle_id,
                row.plate_number,
                row.speed_kmh,
                row.speed_status,
                state_name(&row.plate_number[..2]),
            ));
        }

        s.push_str("\nSPEED ANALYSIS\n");
        match &self.speed_stats {
            Some(stats) => {
                s.push_str(&format!("  Average Speed: {:.1} km/h\n", stats.average_kmh));
                s.push_str(&format!("  Maximum Speed: {:.1} km/h\n", stats.max_kmh));
                s.push_str(&format!("  Minimum Speed: {:.1} km/h\n", stats.min_kmh));
                s.push_str(&format!("  Slow (< 30 km/h):    {} vehicles\n", stats.slow));
                s.push_str(&format!("  Medium (30-60 km/h): {} vehicles\n", stats.medium));
                s.push_str(&format!("  Fast (>= 60 km/h):   {} vehicles\n", stats.fast));
            }
            None => s.push_str("  No speed data available in this session\n"),
        }
        s
    }
}
