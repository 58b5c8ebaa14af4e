//! Strategic decisions: templates, trigger generation and outcome evaluation.
//!
//! Every decision kind shares one contract (`DecisionKind` in `templates`): a trigger predicate, a
//! list of option templates and per-result effect actions. The race engine only talks to the
//! generator and the evaluator, so new kinds do not touch its control flow.

pub mod evaluator;
pub mod generator;
pub mod templates;

use crate::core::car::{CarDelta, PitService};
use crate::core::driver::{DriverId, MentalDelta, SkillKind};
use crate::core::resources::DrivingStyle;
use serde::{Deserialize, Serialize};

pub use templates::DecisionKind;

/// Option id that resolves a decision without a choice, e.g. once its time limit elapsed. It is
/// accepted for every pending decision and yields a neutral outcome without effects.
pub const NO_CHOICE_OPTION_ID: &str = "no_choice";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Penalty (percentage points) subtracted from the success chance.
    pub fn penalty(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.0,
            RiskLevel::Medium => -5.0,
            RiskLevel::High => -15.0,
        }
    }

    /// Multiplier applied to the outcome effect magnitudes.
    pub fn scale(&self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Medium => 2.0,
            RiskLevel::High => 3.0,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DecisionOption {
    pub id: String,
    pub label: String,
    pub description: String,
    pub risk: RiskLevel,
    pub primary_skill: SkillKind,
    pub secondary_skill: Option<SkillKind>,
}

/// DecisionContext is the snapshot of the player's race situation that trigger predicates are
/// evaluated against. It is stored with every decision.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DecisionContext {
    pub lap: u32,
    pub total_laps: u32,
    pub position: u32,
    pub driver_ahead: Option<DriverId>,
    pub gap_ahead: f64,
    pub laps_behind_same_driver: u32,
    pub tire_wear: f64,
    pub fuel_level: f64,
    pub laps_to_pit_window: u32,
    pub confidence: f64,
    pub frustration: f64,
    pub distraction: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Decision {
    pub id: u32,
    pub kind: DecisionKind,
    pub title: String,
    pub context: DecisionContext,
    pub time_limit_s: f64,
    pub options: Vec<DecisionOption>,
}

impl Decision {
    pub fn option(&self, option_id: &str) -> Option<&DecisionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Neutral,
    Failure,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SkillXp {
    pub skill: SkillKind,
    pub xp: f64,
}

/// * `service` - Service performed during the stop
/// * `t_extra` - (s) Standstill time on top of the regular service time
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PitStop {
    pub service: PitService,
    pub t_extra: f64,
}

/// OutcomeEffects bundles everything the race engine applies for a decision outcome.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct OutcomeEffects {
    pub position_delta: i32,
    pub mental: MentalDelta,
    pub car: CarDelta,
    pub pit_stop: Option<PitStop>,
    pub driving_style: Option<DrivingStyle>,
    pub skill_xp: Vec<SkillXp>,
}

impl OutcomeEffects {
    pub fn is_empty(&self) -> bool {
        self.position_delta == 0
            && self.mental.is_zero()
            && self.car.is_zero()
            && self.pit_stop.is_none()
            && self.driving_style.is_none()
            && self.skill_xp.is_empty()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub decision_id: u32,
    pub option_id: String,
    pub result: OutcomeResult,
    pub success_chance: f64,
    pub effects: OutcomeEffects,
    pub summary: String,
}
