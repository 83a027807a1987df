//! Per-vehicle speed estimation from image displacement.
//!
//! Every sighting may carry motion evidence: the mean optical-flow
//! displacement of feature points inside the vehicle box, or, when too few
//! points could be tracked, the movement of the box centre since the
//! previous sighting. Each piece of evidence becomes one instantaneous speed
//! sample. Samples outside a plausibility band are discarded on arrival; the
//! rest go into a short FIFO window, are IQR-filtered and then averaged with
//! weights that favour recent samples.

use nalgebra::Point2;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use crate::config::Config;
use crate::utils::{centroid_distance, linear_weights, quartiles, weighted_mean};

const MPS_TO_KMH: f64 = 3.6;
/// Weight given to the oldest sample; the newest always weighs 1.
const OLDEST_WEIGHT: f64 = 0.5;

/// Optical-flow measurement supplied by the tracking collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    /// Mean displacement of the tracked points between consecutive frames, in pixels
    pub mean_displacement_px: f64,
    /// Number of points the mean was taken over, when known
    pub tracked_points: Option<usize>,
}

/// Where a vehicle was at some frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub frame_index: u64,
    pub position: Point2<i32>,
}

/// Displacement evidence for one speed sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Displacement over exactly one frame interval
    OpticalFlow { displacement_px: f64 },
    /// Box-centre movement between two sightings
    Centroid { from: Sighting, to: Sighting },
}

impl Motion {
    pub fn displacement_px(&self) -> f64 {
        match self {
            Motion::OpticalFlow { displacement_px } => *displacement_px,
            Motion::Centroid { from, to } => centroid_distance(&from.position, &to.position),
        }
    }

    /// Frame intervals the displacement spans.
    pub fn frames_elapsed(&self) -> u64 {
        match self {
            Motion::OpticalFlow { .. } => 1,
            Motion::Centroid { from, to } => to.frame_index.saturating_sub(from.frame_index),
        }
    }
}

/// One accepted instantaneous speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub frame_index: u64,
    pub kmh: f64,
}

/// Reporting state of a vehicle's speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedStatus {
    /// No sample ever accepted
    Pending,
    Collecting { collected: usize, required: usize },
    /// `samples` is how many window samples survived outlier filtering
    Final { kmh: f64, samples: usize },
}

impl SpeedStatus {
    pub fn speed_kmh(&self) -> Option<f64> {
        match self {
            SpeedStatus::Final { kmh, .. } => Some(*kmh),
            _ => None,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SpeedStatus::Final { .. })
    }
}

impl fmt::Display for SpeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedStatus::Pending => write!(f, "Not calculated yet"),
            SpeedStatus::Collecting { collected, required } => {
                write!(f, "Calculating... ({}/{})", collected, required)
            }
            SpeedStatus::Final { samples: 1, .. } => write!(f, "Estimated from 1 sample"),
            SpeedStatus::Final { samples, .. } => write!(f, "Estimated from {} samples", samples),
        }
    }
}

/// Window and filtering parameters shared by every track of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedPolicy {
    pub window: usize,
    pub min_samples: usize,
    pub iqr_multiplier: f64,
}

impl From<&Config> for SpeedPolicy {
    fn from(cfg: &Config) -> Self {
        Self {
            window: cfg.speed_window,
            min_samples: cfg.min_speed_samples,
            iqr_multiplier: cfg.iqr_multiplier,
        }
    }
}

/// Speed samples owned by one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTrack {
    policy: SpeedPolicy,
    samples: VecDeque<SpeedSample>,
    /// Samples accepted over the whole session, including ones since evicted
    accepted: usize,
}

impl SpeedTrack {
    pub fn new(policy: SpeedPolicy) -> Self {
        Self {
            policy,
            samples: VecDeque::with_capacity(policy.window),
            accepted: 0,
        }
    }

    /// Append a sample, evicting the oldest once the window is full.
    pub(crate) fn push(&mut self, sample: SpeedSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.policy.window {
            self.samples.pop_front();
        }
        self.accepted += 1;
    }

    pub fn samples(&self) -> &VecDeque<SpeedSample> {
        &self.samples
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Window samples inside the Tukey fences, oldest first.
    pub fn filtered(&self) -> Vec<f64> {
        let values: Vec<f64> = self.samples.iter().map(|s| s.kmh).collect();
        let Some((q1, q3)) = quartiles(&values) else {
            return values;
        };
        let margin = self.policy.iqr_multiplier * (q3 - q1);
        let (lower, upper) = (q1 - margin, q3 + margin);
        let kept: Vec<f64> = values.iter().copied().filter(|v| *v >= lower && *v <= upper).collect();
        if kept.is_empty() {
            values
        } else {
            kept
        }
    }

    /// Recency-weighted mean of the filtered window and how many samples it used.
    fn aggregate(&self) -> Option<(f64, usize)> {
        let kept = self.filtered();
        let kmh = weighted_mean(&kept, &linear_weights(kept.len(), OLDEST_WEIGHT, 1.0))?;
        Some((kmh, kept.len()))
    }

    pub fn smoothed_kmh(&self) -> Option<f64> {
        self.aggregate().map(|(kmh, _)| kmh)
    }

    pub fn status(&self) -> SpeedStatus {
        if self.accepted == 0 {
            return SpeedStatus::Pending;
        }
        if self.accepted < self.policy.min_samples {
            return SpeedStatus::Collecting {
                collected: self.accepted,
                required: self.policy.min_samples,
            };
        }
        match self.aggregate() {
            Some((kmh, samples)) => SpeedStatus::Final { kmh, samples },
            // accepted > 0 keeps at least one sample in the window
            None => SpeedStatus::Pending,
        }
    }
}

/// Turns motion evidence into speed samples.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    meters_per_pixel: f64,
    frame_interval: f64,
    min_kmh: f64,
    max_kmh: f64,
    min_flow_points: usize,
}

impl SpeedEstimator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            meters_per_pixel: cfg.meters_per_pixel,
            frame_interval: cfg.frame_interval(),
            min_kmh: cfg.min_plausible_kmh,
            max_kmh: cfg.max_plausible_kmh,
            min_flow_points: cfg.min_flow_points,
        }
    }

    /// Choose the evidence for this sighting: optical flow when enough points
    /// backed it, else centre movement since the previous sighting. A vehicle
    /// already sighted in this frame gets no second sample for it.
    pub fn resolve_motion(
        &self,
        flow: Option<&FlowSample>,
        previous: Option<Sighting>,
        current: Sighting,
    ) -> Option<Motion> {
        if previous.is_some_and(|p| current.frame_index <= p.frame_index) {
            return None;
        }
        if let Some(flow) = flow {
            let enough_points = flow
                .tracked_points
                .map_or(true, |n| n >= self.min_flow_points);
            if enough_points {
                return Some(Motion::OpticalFlow {
                    displacement_px: flow.mean_displacement_px,
                });
            }
        }
        let from = previous?;
        Some(Motion::Centroid { from, to: current })
    }

    /// Speed in km/h implied by `motion`, before the plausibility check.
    pub fn instantaneous_kmh(&self, motion: &Motion) -> Option<f64> {
        let seconds = motion.frames_elapsed() as f64 * self.frame_interval;
        if seconds <= 0.0 {
            return None;
        }
        let meters = motion.displacement_px() * self.meters_per_pixel;
        let kmh = meters / seconds * MPS_TO_KMH;
        kmh.is_finite().then_some(kmh)
    }

    pub fn is_plausible(&self, kmh: f64) -> bool {
        kmh >= self.min_kmh && kmh <= self.max_kmh
    }

    /// Convert `motion` and append it to `track` if plausible. Returns the
    /// accepted speed.
    pub fn record(&self, track: &mut SpeedTrack, frame_index: u64, motion: &Motion) -> Option<f64> {
        let kmh = self.instantaneous_kmh(motion)?;
        if !self.is_plausible(kmh) {
            debug!("Discarding implausible speed {:.1} km/h at frame {}", kmh, frame_index);
            return None;
        }
        track.push(SpeedSample { frame_index, kmh });
        Some(kmh)
    }
}
