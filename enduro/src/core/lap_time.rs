use crate::core::car::Car;
use crate::core::driver::{Driver, DriverId, SkillKind};
use crate::core::resources::DrivingStyle;
use crate::core::track::{Track, TrackType};
use crate::errors::{ConfigurationError, InvalidReferenceError};
use helpers::general::{clamp_pct, lin_interp};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Skill composite at which a driver matches the track reference lap time.
const SKILL_REFERENCE: f64 = 50.0;
/// Maximum relative lap time loss due to the tire cliff.
const MAX_TIRE_CLIFF_PENALTY: f64 = 0.25;
/// Lower bound of a lap time relative to the track reference lap time.
const MIN_LAP_TIME_FRAC: f64 = 0.5;

/// All losses are relative to the track reference lap time `t_base`.
///
/// * `skill_spread` - Lap time difference between skill composites 0 and 100
/// * `tire_loss` - Linear loss for completely worn tires
/// * `tire_cliff` - (%) Tire wear below which the quadratic cliff loss sets in
/// * `k_cliff` - Cliff loss per squared percent below `tire_cliff`
/// * `fuel_starvation_levels` - (%) Fuel levels of the starvation curve (increasing)
/// * `fuel_starvation_loss` - Losses at `fuel_starvation_levels`
/// * `damage_loss` - Linear loss for a completely damaged car
/// * `aggressive_pace` - Loss when driving aggressively (negative = faster)
/// * `conservative_pace` - Loss when driving conservatively
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LapTimePars {
    pub skill_spread: f64,
    pub tire_loss: f64,
    pub tire_cliff: f64,
    pub k_cliff: f64,
    pub fuel_starvation_levels: Vec<f64>,
    pub fuel_starvation_loss: Vec<f64>,
    pub damage_loss: f64,
    pub aggressive_pace: f64,
    pub conservative_pace: f64,
}

impl Default for LapTimePars {
    fn default() -> Self {
        LapTimePars {
            skill_spread: 0.05,
            tire_loss: 0.06,
            tire_cliff: 20.0,
            k_cliff: 0.0005,
            fuel_starvation_levels: vec![0.0, 3.0, 8.0],
            fuel_starvation_loss: vec![0.03, 0.01, 0.0],
            damage_loss: 0.05,
            aggressive_pace: -0.004,
            conservative_pace: 0.006,
        }
    }
}

impl LapTimePars {
    /// The method checks the parameters before a race is built from them. The fuel starvation
    /// curve must have as many losses as levels, and the levels must be strictly increasing.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let scalar_checks = [
            ("skill_spread", self.skill_spread),
            ("tire_loss", self.tire_loss),
            ("tire_cliff", self.tire_cliff),
            ("k_cliff", self.k_cliff),
            ("damage_loss", self.damage_loss),
            ("aggressive_pace", self.aggressive_pace),
            ("conservative_pace", self.conservative_pace),
        ];
        let curve_checks = self
            .fuel_starvation_levels
            .iter()
            .map(|&v| ("fuel_starvation_levels", v))
            .chain(self.fuel_starvation_loss.iter().map(|&v| ("fuel_starvation_loss", v)));
        if let Some((field, value)) = scalar_checks
            .into_iter()
            .chain(curve_checks)
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ConfigurationError::NonFiniteLapTimeValue { field, value });
        }

        let (levels, losses) = (
            self.fuel_starvation_levels.len(),
            self.fuel_starvation_loss.len(),
        );
        if levels == 0 || levels != losses {
            return Err(ConfigurationError::FuelCurveLength { levels, losses });
        }
        if self.fuel_starvation_levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigurationError::FuelCurveOrder);
        }
        Ok(())
    }
}

/// skill_weights returns the skills that matter on a track type together with their weights.
pub fn skill_weights(track_type: TrackType) -> &'static [(SkillKind, f64)] {
    match track_type {
        TrackType::ShortTrack => &[
            (SkillKind::Racecraft, 0.35),
            (SkillKind::Aggression, 0.20),
            (SkillKind::Consistency, 0.20),
            (SkillKind::TireManagement, 0.15),
            (SkillKind::Focus, 0.10),
        ],
        TrackType::Intermediate => &[
            (SkillKind::Racecraft, 0.25),
            (SkillKind::Consistency, 0.25),
            (SkillKind::TireManagement, 0.25),
            (SkillKind::Focus, 0.15),
            (SkillKind::Composure, 0.10),
        ],
        TrackType::Superspeedway => &[
            (SkillKind::Racecraft, 0.30),
            (SkillKind::Focus, 0.30),
            (SkillKind::Composure, 0.20),
            (SkillKind::Consistency, 0.20),
        ],
        TrackType::RoadCourse => &[
            (SkillKind::Racecraft, 0.30),
            (SkillKind::Consistency, 0.30),
            (SkillKind::Focus, 0.20),
            (SkillKind::TireManagement, 0.20),
        ],
    }
}

/// calc_skill_composite returns the weighted average of the skills relevant for the track type.
pub fn calc_skill_composite(driver: &Driver, track_type: TrackType) -> f64 {
    let weights = skill_weights(track_type);
    let sum_weights: f64 = weights.iter().map(|(_, w)| w).sum();
    let weighted: f64 = weights.iter().map(|(kind, w)| driver.skill(*kind) * w).sum();
    clamp_pct(weighted / sum_weights)
}

/// calc_tire_loss returns the relative lap time loss due to tire wear. It increases monotonically
/// while the tire wear decreases.
pub fn calc_tire_loss(tire_wear: f64, pars: &LapTimePars) -> f64 {
    let worn = (100.0 - clamp_pct(tire_wear)) / 100.0;
    let linear = pars.tire_loss * worn;

    let cliff = if tire_wear < pars.tire_cliff {
        let over = pars.tire_cliff - clamp_pct(tire_wear);
        (pars.k_cliff * over.powi(2)).min(MAX_TIRE_CLIFF_PENALTY)
    } else {
        0.0
    };

    linear + cliff
}

/// calc_fuel_loss returns the relative lap time loss of a car running out of fuel.
pub fn calc_fuel_loss(fuel_level: f64, pars: &LapTimePars) -> f64 {
    lin_interp(
        clamp_pct(fuel_level),
        &pars.fuel_starvation_levels,
        &pars.fuel_starvation_loss,
    )
}

/// calc_lap_time returns the current lap time (s) of a driver in his car. The result is always
/// strictly positive.
///
/// t_lap = t_base * (1 + skill loss + tire loss + fuel loss + damage loss + style loss)
pub fn calc_lap_time(track: &Track, pars: &LapTimePars, driver: &Driver, car: &Car) -> f64 {
    let composite = calc_skill_composite(driver, track.track_type);
    let skill_loss = pars.skill_spread * (SKILL_REFERENCE - composite) / 100.0;
    let damage_loss = pars.damage_loss * clamp_pct(car.damage) / 100.0;
    let style_loss = match car.driving_style {
        DrivingStyle::Balanced => 0.0,
        DrivingStyle::Aggressive => pars.aggressive_pace,
        DrivingStyle::Conservative => pars.conservative_pace,
    };

    let factor = 1.0
        + skill_loss
        + calc_tire_loss(car.tire_wear, pars)
        + calc_fuel_loss(car.fuel_level, pars)
        + damage_loss
        + style_loss;

    track.t_base * factor.max(MIN_LAP_TIME_FRAC)
}

/// try_lap_time_for looks up a driver and his car by id and returns the current lap time.
pub fn try_lap_time_for(
    track: &Track,
    pars: &LapTimePars,
    drivers: &BTreeMap<DriverId, Driver>,
    cars: &BTreeMap<DriverId, Car>,
    driver_id: &str,
) -> Result<f64, InvalidReferenceError> {
    match (drivers.get(driver_id), cars.get(driver_id)) {
        (Some(driver), Some(car)) => Ok(calc_lap_time(track, pars, driver, car)),
        _ => Err(InvalidReferenceError {
            driver_id: driver_id.to_owned(),
        }),
    }
}

/// lap_time_for returns the current lap time of a driver or 0.0 if the driver does not take part
/// in the race. Callers must treat 0.0 as "no such driver", never as a lap time.
pub fn lap_time_for(
    track: &Track,
    pars: &LapTimePars,
    drivers: &BTreeMap<DriverId, Driver>,
    cars: &BTreeMap<DriverId, Car>,
    driver_id: &str,
) -> f64 {
    try_lap_time_for(track, pars, drivers, cars, driver_id).unwrap_or_else(|e| {
        warn!("Lap time requested for an invalid reference: {}", e);
        0.0
    })
}
