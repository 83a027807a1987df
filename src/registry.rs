//! Roster of distinct vehicles seen during a session.

use chrono::NaiveDateTime;
use nalgebra::Point2;
use tracing::{debug, info};

use crate::config::Config;
use crate::matcher::SimilarityMatcher;
use crate::plate::PlateNormalizer;
use crate::speed::{Motion, Sighting, SpeedEstimator, SpeedPolicy, SpeedStatus, SpeedTrack};

/// Session-unique vehicle number, starting at 1.
pub type VehicleId = u32;

/// One physical vehicle.
#[derive(Debug, Clone)]
pub struct VehicleRecord {
    id: VehicleId,
    canonical_plate: String,
    first_seen_frame: u64,
    first_seen_timestamp: NaiveDateTime,
    /// Last observed bounding-box centre
    last_position: Point2<i32>,
    last_seen_frame: u64,
    last_seen_timestamp: NaiveDateTime,
    /// Confirmed sightings, including the first
    sightings: usize,
    speed: SpeedTrack,
}

impl VehicleRecord {
    fn new(
        id: VehicleId,
        canonical_plate: String,
        frame_index: u64,
        timestamp: NaiveDateTime,
        position: Point2<i32>,
        policy: SpeedPolicy,
    ) -> Self {
        Self {
            id,
            canonical_plate,
            first_seen_frame: frame_index,
            first_seen_timestamp: timestamp,
            last_position: position,
            last_seen_frame: frame_index,
            last_seen_timestamp: timestamp,
            sightings: 1,
            speed: SpeedTrack::new(policy),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn canonical_plate(&self) -> &str {
        &self.canonical_plate
    }

    pub fn first_seen_frame(&self) -> u64 {
        self.first_seen_frame
    }

    pub fn first_seen_timestamp(&self) -> NaiveDateTime {
        self.first_seen_timestamp
    }

    pub fn last_position(&self) -> Point2<i32> {
        self.last_position
    }

    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    pub fn last_seen_timestamp(&self) -> NaiveDateTime {
        self.last_seen_timestamp
    }

    pub fn sightings(&self) -> usize {
        self.sightings
    }

    pub fn speed(&self) -> &SpeedTrack {
        &self.speed
    }

    pub fn last_sighting(&self) -> Sighting {
        Sighting {
            frame_index: self.last_seen_frame,
            position: self.last_position,
        }
    }

    pub fn speed_status(&self) -> SpeedStatus {
        self.speed.status()
    }

    /// Convert `motion` into a sample for this vehicle. Returns the accepted
    /// speed, `None` when the estimator discarded it.
    pub fn record_speed(
        &mut self,
        estimator: &SpeedEstimator,
        frame_index: u64,
        motion: &Motion,
    ) -> Option<f64> {
        estimator.record(&mut self.speed, frame_index, motion)
    }

    fn touch(&mut self, frame_index: u64, timestamp: NaiveDateTime, position: Point2<i32>) {
        self.last_position = position;
        self.last_seen_frame = frame_index;
        self.last_seen_timestamp = timestamp;
        self.sightings += 1;
    }
}

/// Outcome of a validated observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub vehicle_id: VehicleId,
    pub is_new: bool,
    /// The normalized read, which may differ from the stored canonical plate
    pub read_plate: String,
    /// Where the vehicle was before this sighting; `None` for new vehicles
    pub previous: Option<Sighting>,
}

/// Owns every [`VehicleRecord`] and decides new vs. duplicate.
#[derive(Debug, Clone)]
pub struct VehicleRegistry {
    normalizer: PlateNormalizer,
    matcher: SimilarityMatcher,
    policy: SpeedPolicy,
    /// Ordered by id; record `i` has id `i + 1`
    records: Vec<VehicleRecord>,
}

impl VehicleRegistry {
    pub fn new(cfg: &Config) -> Self {
        Self {
            normalizer: PlateNormalizer::new(cfg.min_ocr_confidence),
            matcher: SimilarityMatcher::new(cfg.similarity_threshold),
            policy: SpeedPolicy::from(cfg),
            records: Vec::new(),
        }
    }

    /// Existing vehicle a canonical plate belongs to. Does not mutate.
    pub fn resolve(&self, canonical: &str) -> Option<VehicleId> {
        self.matcher.best_match(
            canonical,
            self.records.iter().map(|r| (r.id, r.canonical_plate.as_str())),
        )
    }

    /// Whether `raw` would be confirmed as an already registered vehicle.
    pub fn is_known(&self, raw: &str, confidence: f64) -> bool {
        self.normalizer
            .normalize(raw, confidence)
            .and_then(|plate| self.resolve(&plate))
            .is_some()
    }

    /// Register one plate read. `None` means the read was rejected and
    /// contributes nothing.
    pub fn observe(
        &mut self,
        raw_plate: &str,
        confidence: f64,
        frame_index: u64,
        timestamp: NaiveDateTime,
        position: Point2<i32>,
    ) -> Option<Observed> {
        let plate = self.normalizer.normalize(raw_plate, confidence)?;

        if let Some(id) = self.resolve(&plate) {
            let record = self.get_mut(id)?;
            let previous = record.last_sighting();
            // first confirmed plate stays authoritative
            if record.canonical_plate != plate {
                debug!(
                    "Vehicle #{} read as {} (kept {})",
                    id, plate, record.canonical_plate
                );
            }
            record.touch(frame_index, timestamp, position);
            return Some(Observed {
                vehicle_id: id,
                is_new: false,
                read_plate: plate,
                previous: Some(previous),
            });
        }

        let id = self.records.len() as VehicleId + 1;
        info!("New vehicle #{} {} at frame {}", id, plate, frame_index);
        self.records.push(VehicleRecord::new(
            id,
            plate.clone(),
            frame_index,
            timestamp,
            position,
            self.policy,
        ));
        Some(Observed {
            vehicle_id: id,
            is_new: true,
            read_plate: plate,
            previous: None,
        })
    }

    /// All vehicles, by ascending id.
    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn get(&self, id: VehicleId) -> Option<&VehicleRecord> {
        let index = (id as usize).checked_sub(1)?;
        self.records.get(index)
    }

    pub fn get_mut(&mut self, id: VehicleId) -> Option<&mut VehicleRecord> {
        let index = (id as usize).checked_sub(1)?;
        self.records.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, second)
            .unwrap()
    }

    fn registry() -> VehicleRegistry {
        VehicleRegistry::new(&Config::default())
    }

    #[test]
    fn test_repeated_plate_is_one_vehicle() {
        let mut reg = registry();
        for frame in 1..=10u64 {
            let seen = reg
                .observe("DL01AB1234", 0.9, frame, ts(frame as u32), Point2::new(10, 20))
                .unwrap();
            assert_eq!(seen.vehicle_id, 1);
            assert_eq!(seen.is_new, frame == 1);
        }
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.records()[0].sightings(), 10);
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut reg = registry();
        let plates = ["DL01AB1234", "MH12CD5678", "DL01AB1234", "UP16EF9012", "KA03GH3456"];
        let new_ids: Vec<VehicleId> = plates
            .iter()
            .enumerate()
            .filter_map(|(i, p)| reg.observe(p, 0.9, i as u64, ts(0), Point2::new(0, 0)))
            .filter(|o| o.is_new)
            .map(|o| o.vehicle_id)
            .collect();
        assert_eq!(new_ids, vec![1, 2, 3, 4]);
        let ids: Vec<VehicleId> = reg.records().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rejected_reads_leave_no_trace() {
        let mut reg = registry();
        assert!(reg.observe("XX99ZZ9999", 0.9, 1, ts(0), Point2::new(0, 0)).is_none());
        assert!(reg.observe("DL01AB1234", 0.1, 2, ts(0), Point2::new(0, 0)).is_none());
        assert!(reg.is_empty());
        let first = reg.observe("DL01AB1234", 0.9, 3, ts(0), Point2::new(0, 0)).unwrap();
        assert_eq!(first.vehicle_id, 1);
    }

    #[test]
    fn test_duplicate_updates_position_but_keeps_first_plate() {
        let mut reg = registry();
        reg.observe("DL01AB1234", 0.9, 1, ts(1), Point2::new(100, 200)).unwrap();
        let seen = reg
            .observe("DL01AB1239", 0.9, 4, ts(2), Point2::new(110, 190))
            .unwrap();
        assert!(!seen.is_new);
        assert_eq!(seen.read_plate, "DL01AB1239");
        assert_eq!(
            seen.previous,
            Some(Sighting { frame_index: 1, position: Point2::new(100, 200) })
        );

        let record = reg.get(1).unwrap();
        assert_eq!(record.canonical_plate(), "DL01AB1234");
        assert_eq!(record.last_position(), Point2::new(110, 190));
        assert_eq!(record.last_seen_frame(), 4);
        assert_eq!(record.last_seen_timestamp(), ts(2));
        assert_eq!(record.sightings(), 2);
        assert_eq!(record.first_seen_frame(), 1);
        assert_eq!(record.first_seen_timestamp(), ts(1));
    }

    #[test]
    fn test_different_lengths_are_distinct() {
        let mut reg = registry();
        let a = reg.observe("DL7CM3702", 0.9, 1, ts(0), Point2::new(0, 0)).unwrap();
        let b = reg.observe("DL07CM3702", 0.9, 2, ts(0), Point2::new(0, 0)).unwrap();
        assert!(a.is_new && b.is_new);
        assert_eq!((a.vehicle_id, b.vehicle_id), (1, 2));
    }

    #[test]
    fn test_is_known_does_not_mutate() {
        let mut reg = registry();
        assert!(!reg.is_known("DL01AB1234", 0.9));
        reg.observe("DL01AB1234", 0.9, 1, ts(0), Point2::new(0, 0)).unwrap();
        assert!(reg.is_known("DL01A81234", 0.9));
        assert_eq!(reg.records()[0].sightings(), 1);
    }

    #[test]
    fn test_speed_status_follows_samples() {
        let mut reg = registry();
        reg.observe("DL01AB1234", 0.9, 1, ts(0), Point2::new(0, 0)).unwrap();
        assert_eq!(reg.get(1).unwrap().speed_status(), SpeedStatus::Pending);
        let estimator = SpeedEstimator::new(&Config::default());
        let record = reg.get_mut(1).unwrap();
        // 2 px over one frame: 32.4 km/h
        let accepted = record.record_speed(&estimator, 2, &Motion::OpticalFlow { displacement_px: 2.0 });
        assert!(accepted.is_some());
        assert_eq!(
            record.record_speed(&estimator, 3, &Motion::OpticalFlow { displacement_px: 50.0 }),
            None
        );
        assert_eq!(record.speed().accepted(), 1);
        assert_eq!(
            reg.get(1).unwrap().speed_status(),
            SpeedStatus::Collecting { collected: 1, required: 3 }
        );
        assert!(reg.get(0).is_none());
        assert!(reg.get(2).is_none());
    }
}
