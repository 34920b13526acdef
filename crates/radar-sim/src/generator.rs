//! ---
//! radar_section: "11-simulation"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Random generators for valid tracks and health reports."
//! radar_version: "v0.1.0"
//! radar_owner: "tbd"
//! ---
use std::ops::RangeInclusive;

use chrono::Utc;
use radar_msg::{HealthStatus, RadarMode, Track, ValidationFailure};
use rand::prelude::*;

const RANGE_M: RangeInclusive<f64> = 50.0..=25_000.0;
const AZ_DEG: RangeInclusive<f64> = -60.0..=60.0;
const EL_DEG: RangeInclusive<f64> = -5.0..=25.0;
const VR_MPS: RangeInclusive<f64> = -50.0..=50.0;
const SNR_DB: RangeInclusive<f64> = 10.0..=40.0;

const TEMPERATURE_C: RangeInclusive<f64> = 35.0..=55.0;
const SUPPLY_V: RangeInclusive<f64> = 11.8..=12.6;
const CPU_LOAD_PCT: RangeInclusive<f64> = 5.0..=65.0;

/// Produces plausible detections inside the sensor field of view and nominal health reports.
#[derive(Debug)]
pub struct TelemetryGenerator {
    rng: StdRng,
    next_id: u64,
}

impl TelemetryGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 1,
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            next_id: 1,
        }
    }

    /// Track ids start at 1 and increase by one per call.
    pub fn next_track(&mut self) -> Result<Track, ValidationFailure> {
        let id = self.next_id;
        self.next_id += 1;
        self.track(id)
    }

    pub fn track(&mut self, id: u64) -> Result<Track, ValidationFailure> {
        Track::new(
            Utc::now(),
            id,
            self.rng.gen_range(RANGE_M),
            self.rng.gen_range(AZ_DEG),
            self.rng.gen_range(EL_DEG),
            self.rng.gen_range(VR_MPS),
            self.rng.gen_range(SNR_DB),
        )
    }

    pub fn health(&mut self) -> Result<HealthStatus, ValidationFailure> {
        HealthStatus::new(
            Utc::now(),
            RadarMode::Operational,
            self.rng.gen_range(TEMPERATURE_C),
            self.rng.gen_range(SUPPLY_V),
            self.rng.gen_range(CPU_LOAD_PCT),
        )
    }

    /// Ids handed out so far.
    pub fn tracks_generated(&self) -> u64 {
        self.next_id - 1
    }
}
