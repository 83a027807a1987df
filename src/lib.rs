pub mod config;
pub mod detection;
pub mod error;
pub mod matcher;
pub mod plate;
pub mod registry;
pub mod report;
pub mod session;
pub mod speed;
pub mod utils;

// Re-export main types
pub use crate::config::Config;
pub use crate::detection::{Observation, RawObservation};
pub use crate::error::{ConfigError, ObservationError};
pub use crate::matcher::SimilarityMatcher;
pub use crate::plate::PlateNormalizer;
pub use crate::registry::{VehicleId, VehicleRecord, VehicleRegistry};
pub use crate::report::{FilesCreated, SampleCount, SessionSummary, SpeedStats, VehicleRow};
pub use crate::session::{Session, VehicleUpdate};
pub use crate::speed::{SpeedEstimator, SpeedStatus};
