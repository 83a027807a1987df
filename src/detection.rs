use chrono::{DateTime, NaiveDateTime};
use nalgebra::Point2;
use serde::Deserialize;

use crate::error::ObservationError;
use crate::speed::{FlowSample, Sighting};

/// Layouts accepted for naive timestamps, tried in order.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A per-frame plate detection as the detection/OCR collaborator sends it.
/// Every field is optional here so that a malformed record can be reported
/// instead of failing the whole stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObservation {
    pub frame_index: Option<u64>,
    pub timestamp: Option<String>,
    pub bounding_box_center: Option<[i32; 2]>,
    pub raw_plate_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub displacement_sample: Option<f64>,
    pub tracked_points: Option<usize>,
}

/// A validated detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub frame_index: u64,
    pub timestamp: NaiveDateTime,
    pub center: Point2<i32>,
    pub raw_plate: String,
    pub confidence: f64,
    pub flow: Option<FlowSample>,
}

impl Observation {
    pub fn new(
        frame_index: u64,
        timestamp: NaiveDateTime,
        center: Point2<i32>,
        raw_plate: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            frame_index,
            timestamp,
            center,
            raw_plate: raw_plate.into(),
            confidence,
            flow: None,
        }
    }

    /// Attach an optical-flow displacement.
    pub fn with_flow(mut self, mean_displacement_px: f64, tracked_points: Option<usize>) -> Self {
        self.flow = Some(FlowSample { mean_displacement_px, tracked_points });
        self
    }

    pub fn sighting(&self) -> Sighting {
        Sighting {
            frame_index: self.frame_index,
            position: self.center,
        }
    }
}

pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ObservationError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .ok_or_else(|| ObservationError::MalformedTimestamp(text.to_string()))
}

fn finite(value: f64, field: &'static str) -> Result<f64, ObservationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ObservationError::NonFinite(field))
    }
}

impl TryFrom<RawObservation> for Observation {
    type Error = ObservationError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let frame_index = raw.frame_index.ok_or(ObservationError::MissingField("frame_index"))?;
        let timestamp = raw.timestamp.ok_or(ObservationError::MissingField("timestamp"))?;
        let [x, y] = raw
            .bounding_box_center
            .ok_or(ObservationError::MissingField("bounding_box_center"))?;
        let raw_plate = raw
            .raw_plate_text
            .ok_or(ObservationError::MissingField("raw_plate_text"))?;
        let confidence = raw
            .ocr_confidence
            .ok_or(ObservationError::MissingField("ocr_confidence"))?;
        let flow = match raw.displacement_sample {
            Some(d) => Some(FlowSample {
                mean_displacement_px: finite(d, "displacement_sample")?,
                tracked_points: raw.tracked_points,
            }),
            None => None,
        };

        Ok(Observation {
            frame_index,
            timestamp: parse_timestamp(&timestamp)?,
            center: Point2::new(x, y),
            raw_plate,
            confidence: finite(confidence, "ocr_confidence")?,
            flow,
        })
    }
}
