use crate::core::resources::{self, DrivingStyle, ResourcePars};
use helpers::general::{clamp_pct, PCT_MAX};
use serde::{Deserialize, Serialize};

/// PitService selects what is done during a pit stop.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PitService {
    /// Fresh tires and a full tank
    Full,
    /// Full tank, tires unchanged
    FuelOnly,
}

impl PitService {
    /// Returns the standstill time (s) of the service.
    pub fn t_standstill(&self, pars: &ResourcePars) -> f64 {
        match self {
            PitService::Full => pars.t_pit_standstill,
            PitService::FuelOnly => pars.t_pit_fuel_only,
        }
    }
}

/// CarDelta is a change of the car resources as produced by a decision outcome.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CarDelta {
    pub tire_wear: f64,
    pub fuel_level: f64,
    pub damage: f64,
}

impl CarDelta {
    pub fn is_zero(&self) -> bool {
        self.tire_wear == 0.0 && self.fuel_level == 0.0 && self.damage == 0.0
    }
}

/// * `tire_wear` - (%) Remaining tire life, 100 = fresh
/// * `fuel_level` - (%) Remaining fuel
/// * `laps_since_pit` - Laps completed since the start or the last pit stop
/// * `damage` - (%) Accumulated damage, 0 = undamaged
/// * `driving_style` - Current driving style
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Car {
    pub tire_wear: f64,
    pub fuel_level: f64,
    pub laps_since_pit: u32,
    pub damage: f64,
    pub driving_style: DrivingStyle,
}

impl Default for Car {
    fn default() -> Self {
        Car::new()
    }
}

impl Car {
    pub fn new() -> Car {
        Car {
            tire_wear: PCT_MAX,
            fuel_level: PCT_MAX,
            laps_since_pit: 0,
            damage: 0.0,
            driving_style: DrivingStyle::Balanced,
        }
    }

    /// The method applies the resource model for one completed lap.
    pub fn drive_lap(&mut self, pars: &ResourcePars, track_wear_factor: f64) {
        self.tire_wear = resources::tire_wear_after_lap(
            self.tire_wear,
            pars,
            self.driving_style,
            track_wear_factor,
        );
        self.fuel_level = resources::fuel_level_after_lap(self.fuel_level, pars, self.driving_style);
        self.laps_since_pit += 1;
    }

    /// The method performs the service part of a pit stop. The standstill itself is handled by the
    /// race.
    pub fn perform_pitstop(&mut self, service: PitService) {
        if service == PitService::Full {
            self.tire_wear = PCT_MAX;
        }
        self.fuel_level = PCT_MAX;
        self.laps_since_pit = 0;
    }

    /// The method applies a resource delta, clamping every value into [0, 100].
    pub fn apply(&mut self, delta: &CarDelta) {
        self.tire_wear = clamp_pct(self.tire_wear + delta.tire_wear);
        self.fuel_level = clamp_pct(self.fuel_level + delta.fuel_level);
        self.damage = clamp_pct(self.damage + delta.damage);
    }
}
