//! Resource model: per-lap tire wear and fuel consumption.
//!
//! All functions are pure. Inputs outside [0, 100] are clamped, never rejected.

use helpers::general::clamp_pct;
use serde::{Deserialize, Serialize};

/// DrivingStyle is set per car. AI cars keep `Balanced`, the player's style is changed by decision
/// effects.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrivingStyle {
    #[default]
    Balanced,
    Aggressive,
    Conservative,
}

/// * `tire_wear_per_lap` - (%) Baseline tire wear per lap on a nominal track
/// * `fuel_per_lap` - (%) Baseline fuel consumption per lap
/// * `aggressive_extra_wear` - (%/lap) Additional tire wear when driving aggressively
/// * `conservative_wear_saving` - (%/lap) Tire wear saved when driving conservatively
/// * `aggressive_extra_fuel` - (%/lap) Additional fuel consumption when driving aggressively
/// * `efficient_fuel_saving` - (%/lap) Fuel saved when driving conservatively
/// * `min_wear_per_lap` - (%) Lower bound of the tire wear per lap, whatever the style
/// * `fuel_reserve` - (%) Fuel level at which the next pit window opens
/// * `t_pit_standstill` - (s) Standstill time of a full pit stop (tires and fuel)
/// * `t_pit_fuel_only` - (s) Standstill time of a fuel-only stop
/// * `ai_pit_tire_threshold` - (%) AI cars pit once their tires drop below this value
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResourcePars {
    pub tire_wear_per_lap: f64,
    pub fuel_per_lap: f64,
    pub aggressive_extra_wear: f64,
    pub conservative_wear_saving: f64,
    pub aggressive_extra_fuel: f64,
    pub efficient_fuel_saving: f64,
    pub min_wear_per_lap: f64,
    pub fuel_reserve: f64,
    pub t_pit_standstill: f64,
    pub t_pit_fuel_only: f64,
    pub ai_pit_tire_threshold: f64,
}

impl Default for ResourcePars {
    fn default() -> Self {
        ResourcePars {
            tire_wear_per_lap: 4.0,
            fuel_per_lap: 3.0,
            aggressive_extra_wear: 5.0,
            conservative_wear_saving: 3.0,
            aggressive_extra_fuel: 0.5,
            efficient_fuel_saving: 2.0,
            min_wear_per_lap: 0.5,
            fuel_reserve: 5.0,
            t_pit_standstill: 12.0,
            t_pit_fuel_only: 5.0,
            ai_pit_tire_threshold: 30.0,
        }
    }
}

/// wear_rate returns the tire wear (decrement) per lap for the given style and track wear factor.
pub fn wear_rate(pars: &ResourcePars, style: DrivingStyle, track_wear_factor: f64) -> f64 {
    let base = pars.tire_wear_per_lap * track_wear_factor.max(0.0);
    let rate = match style {
        DrivingStyle::Balanced => base,
        DrivingStyle::Aggressive => base + pars.aggressive_extra_wear,
        DrivingStyle::Conservative => base - pars.conservative_wear_saving,
    };
    rate.max(pars.min_wear_per_lap)
}

/// consumption_rate returns the fuel consumption (decrement) per lap for the given style.
pub fn consumption_rate(pars: &ResourcePars, style: DrivingStyle) -> f64 {
    let rate = match style {
        DrivingStyle::Balanced => pars.fuel_per_lap,
        DrivingStyle::Aggressive => pars.fuel_per_lap + pars.aggressive_extra_fuel,
        DrivingStyle::Conservative => pars.fuel_per_lap - pars.efficient_fuel_saving,
    };
    rate.max(0.0)
}

/// tire_wear_after_lap returns the tire wear after one more completed lap.
pub fn tire_wear_after_lap(
    tire_wear: f64,
    pars: &ResourcePars,
    style: DrivingStyle,
    track_wear_factor: f64,
) -> f64 {
    clamp_pct(clamp_pct(tire_wear) - wear_rate(pars, style, track_wear_factor))
}

/// fuel_level_after_lap returns the fuel level after one more completed lap.
pub fn fuel_level_after_lap(fuel_level: f64, pars: &ResourcePars, style: DrivingStyle) -> f64 {
    clamp_pct(clamp_pct(fuel_level) - consumption_rate(pars, style))
}

/// laps_to_pit_window returns the number of laps that can still be driven before the fuel level
/// reaches the reserve, i.e. before the next anticipated pit window.
pub fn laps_to_pit_window(fuel_level: f64, pars: &ResourcePars, style: DrivingStyle) -> u32 {
    let rate = consumption_rate(pars, style);
    let usable = clamp_pct(fuel_level) - pars.fuel_reserve;

    if usable <= 0.0 {
        0
    } else if rate <= 0.0 {
        u32::MAX
    } else {
        (usable / rate).floor() as u32
    }
}

/// ai_wants_pit returns true if an AI car should pit at the end of its current lap: either the
/// tires dropped below the threshold or the next lap would eat into the fuel reserve.
pub fn ai_wants_pit(tire_wear: f64, fuel_level: f64, pars: &ResourcePars, style: DrivingStyle) -> bool {
    tire_wear < pars.ai_pit_tire_threshold
        || fuel_level - consumption_rate(pars, style) < pars.fuel_reserve
}
