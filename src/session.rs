//! Sequential processing of a detection stream.
//!
//! Identity assignment depends on arrival order, so a [`Session`] is the
//! single consumer of observations: each call normalizes, matches, updates
//! the registry and attaches a speed sample before returning.

use chrono::NaiveDateTime;
use nalgebra::Point2;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detection::{Observation, RawObservation};
use crate::error::ObservationError;
use crate::registry::{VehicleId, VehicleRecord, VehicleRegistry};
use crate::report::SessionSummary;
use crate::speed::{SpeedEstimator, SpeedStatus};

/// What a processed observation resolved to, for logging and display.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleUpdate {
    pub vehicle_id: VehicleId,
    pub is_new: bool,
    pub canonical_plate: String,
    pub frame_index: u64,
    pub timestamp: NaiveDateTime,
    pub position: Point2<i32>,
    /// Speed sample accepted from this observation, if any
    pub instantaneous_kmh: Option<f64>,
    pub speed_status: SpeedStatus,
}

#[derive(Debug)]
pub struct Session {
    registry: VehicleRegistry,
    estimator: SpeedEstimator,
    newest_frame: Option<u64>,
    frames_processed: u64,
}

impl Session {
    pub fn new(cfg: &Config) -> Self {
        Self {
            registry: VehicleRegistry::new(cfg),
            estimator: SpeedEstimator::new(cfg),
            newest_frame: None,
            frames_processed: 0,
        }
    }

    /// Account for `frame_index`, rejecting frames older than the newest seen.
    fn enter_frame(&mut self, frame_index: u64) -> Result<(), ObservationError> {
        match self.newest_frame {
            Some(newest) if frame_index < newest => {
                return Err(ObservationError::OutOfOrder { frame: frame_index, newest });
            }
            Some(newest) if frame_index == newest => return Ok(()),
            _ => {}
        }
        self.newest_frame = Some(frame_index);
        self.frames_processed += 1;
        if self.frames_processed % 50 == 0 {
            info!(
                "Processed {} frames | {} unique vehicles",
                self.frames_processed,
                self.registry.len()
            );
        }
        Ok(())
    }

    /// Note a frame that produced no detections.
    pub fn skip_frame(&mut self, frame_index: u64) -> Result<(), ObservationError> {
        self.enter_frame(frame_index)
    }

    /// Run one validated observation through the pipeline. `Ok(None)` is a
    /// read rejected as OCR noise.
    pub fn process(&mut self, obs: &Observation) -> Result<Option<VehicleUpdate>, ObservationError> {
        self.enter_frame(obs.frame_index)?;

        let Some(observed) = self.registry.observe(
            &obs.raw_plate,
            obs.confidence,
            obs.frame_index,
            obs.timestamp,
            obs.center,
        ) else {
            return Ok(None);
        };

        let motion = self
            .estimator
            .resolve_motion(obs.flow.as_ref(), observed.previous, obs.sighting());
        let Some(record) = self.registry.get_mut(observed.vehicle_id) else {
            return Ok(None);
        };
        let was_final = record.speed_status().is_final();
        let instantaneous_kmh = match motion {
            Some(m) => record.record_speed(&self.estimator, obs.frame_index, &m),
            None => None,
        };
        let speed_status = record.speed_status();

        if let (false, SpeedStatus::Final { kmh, .. }) = (was_final, speed_status) {
            info!("Vehicle #{} {} speed: {:.1} km/h", record.id(), record.canonical_plate(), kmh);
        }

        Ok(Some(VehicleUpdate {
            vehicle_id: record.id(),
            is_new: observed.is_new,
            canonical_plate: record.canonical_plate().to_string(),
            frame_index: obs.frame_index,
            timestamp: obs.timestamp,
            position: obs.center,
            instantaneous_kmh,
            speed_status,
        }))
    }

    /// Validate and process a collaborator record. Malformed or out-of-order
    /// records are logged and dropped without touching the registry.
    pub fn ingest(&mut self, raw: RawObservation) -> Option<VehicleUpdate> {
        let result = Observation::try_from(raw).and_then(|obs| self.process(&obs));
        match result {
            Ok(update) => update,
            Err(e) => {
                warn!("Skipping observation: {}", e);
                None
            }
        }
    }

    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    pub fn records(&self) -> &[VehicleRecord] {
        self.registry.records()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Aggregate counts plus one row per vehicle.
    pub fn summary(&self) -> SessionSummary {
        debug!("Summarising {} vehicles", self.registry.len());
        SessionSummary::new(self.frames_processed, self.registry.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts(frame: u64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + chrono::Duration::milliseconds(frame as i64 * 33)
    }

    fn obs(frame: u64, plate: &str, x: i32) -> Observation {
        Observation::new(frame, ts(frame), Point2::new(x, 300), plate, 0.9)
    }

    #[test]
    fn test_centroid_fallback_produces_samples() {
        let mut session = Session::new(&Config::default());
        // 4 px per frame at 0.15 m/px and 30 fps = 64.8 km/h
        let first = session.process(&obs(1, "DL01AB1234", 100)).unwrap().unwrap();
        assert!(first.is_new);
        assert_eq!(first.instantaneous_kmh, None);
        assert_eq!(first.speed_status, SpeedStatus::Pending);

        let second = session.process(&obs(2, "DL01AB1234", 104)).unwrap().unwrap();
        assert_relative_eq!(second.instantaneous_kmh.unwrap(), 64.8, epsilon = 1e-9);
        assert_eq!(second.speed_status, SpeedStatus::Collecting { collected: 1, required: 3 });

        session.process(&obs(3, "DL01AB1234", 108)).unwrap();
        let fourth = session.process(&obs(4, "DL01AB1234", 112)).unwrap().unwrap();
        assert_relative_eq!(fourth.speed_status.speed_kmh().unwrap(), 64.8, epsilon = 1e-9);
    }

    #[test]
    fn test_flow_sample_on_first_sighting() {
        let mut session = Session::new(&Config::default());
        let update = session
            .process(&obs(1, "DL01AB1234", 100).with_flow(4.0, Some(20)))
            .unwrap()
            .unwrap();
        assert_relative_eq!(update.instantaneous_kmh.unwrap(), 64.8, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_order_frame_is_rejected() {
        let mut session = Session::new(&Config::default());
        session.process(&obs(5, "DL01AB1234", 100)).unwrap();
        assert_eq!(
            session.process(&obs(4, "MH12CD5678", 100)),
            Err(ObservationError::OutOfOrder { frame: 4, newest: 5 })
        );
        assert_eq!(session.records().len(), 1);
        // same frame is fine: several plates per frame
        assert!(session.process(&obs(5, "MH12CD5678", 400)).unwrap().is_some());
    }

    #[test]
    fn test_frame_counting() {
        let mut session = Session::new(&Config::default());
        session.process(&obs(1, "DL01AB1234", 100)).unwrap();
        session.process(&obs(1, "MH12CD5678", 400)).unwrap();
        session.skip_frame(2).unwrap();
        session.process(&obs(3, "garbage", 100)).unwrap();
        assert_eq!(session.frames_processed(), 3);
    }

    #[test]
    fn test_double_read_in_one_frame_is_sampled_once() {
        let mut session = Session::new(&Config::default());
        for frame in 1..=2 {
            for plate in ["DL01AB1234", "DL01A81234"] {
                session
                    .process(&obs(frame, plate, 100).with_flow(4.0, Some(20)))
                    .unwrap()
                    .unwrap();
            }
        }
        let record = &session.records()[0];
        assert_eq!(session.records().len(), 1);
        assert_eq!(record.sightings(), 4);
        assert_eq!(record.speed().accepted(), 2);
        assert_eq!(record.speed_status().to_string(), "Calculating... (2/3)");
    }

    #[test]
    fn test_ingest_skips_malformed_records() {
        let mut session = Session::new(&Config::default());
        let raw: RawObservation = serde_json::from_str(r#"{"frame_index": 1, "raw_plate_text": "DL01AB1234"}"#).unwrap();
        assert!(session.ingest(raw).is_none());
        assert!(session.records().is_empty());
        assert_eq!(session.frames_processed(), 0);
    }
}
