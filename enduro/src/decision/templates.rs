//! Decision template library.
//!
//! Trigger predicates are evaluated against the player's car and driver only.

use crate::core::car::PitService;
use crate::core::driver::SkillKind;
use crate::core::resources::DrivingStyle;
use crate::decision::{Decision, DecisionContext, DecisionOption, OutcomeResult, RiskLevel};
use serde::{Deserialize, Serialize};

// pit strategy
pub const PIT_MIN_LAP: u32 = 50;
pub const PIT_TIRE_WEAR: f64 = 60.0;
pub const PIT_FUEL_LEVEL: f64 = 40.0;
// passing
pub const PASSING_MIN_LAPS_BEHIND: u32 = 10;
// mental state
pub const MENTAL_FRUSTRATION: f64 = 70.0;
pub const MENTAL_DISTRACTION: f64 = 60.0;
// tire management
pub const TIRE_MGMT_WEAR: f64 = 50.0;
pub const TIRE_MGMT_MIN_LAPS_TO_PIT: u32 = 20;

/// Effect of an option result besides the standard mental and XP effects of the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionAction {
    PitStop { service: PitService, t_extra: f64 },
    SetStyle(DrivingStyle),
    Positions(i32),
    TireWear(f64),
    Focus(f64),
    Distraction(f64),
}

/// OptionTemplate describes one option of a decision kind.
///
/// * `neutral_band` - (percentage points) Draws in [chance, chance + band) resolve to neutral.
///   Only used for low-risk options.
/// * `aggressive` - Failed aggressive options damage the car
#[derive(Clone, Copy)]
pub struct OptionTemplate {
    pub id: &'static str,
    pub label: &'static str,
    pub risk: RiskLevel,
    pub primary: SkillKind,
    pub secondary: Option<SkillKind>,
    pub neutral_band: f64,
    pub aggressive: bool,
    pub describe: fn(&DecisionContext) -> String,
    pub on_success: &'static [OptionAction],
    pub on_neutral: &'static [OptionAction],
    pub on_failure: &'static [OptionAction],
}

impl OptionTemplate {
    pub fn actions(&self, result: OutcomeResult) -> &'static [OptionAction] {
        match result {
            OutcomeResult::Success => self.on_success,
            OutcomeResult::Neutral => self.on_neutral,
            OutcomeResult::Failure => self.on_failure,
        }
    }

    /// Returns the neutral band width that applies to this option.
    pub fn effective_neutral_band(&self) -> f64 {
        if self.risk == RiskLevel::Low {
            self.neutral_band.max(0.0)
        } else {
            0.0
        }
    }

    fn instantiate(&self, ctx: &DecisionContext) -> DecisionOption {
        DecisionOption {
            id: self.id.to_owned(),
            label: self.label.to_owned(),
            description: (self.describe)(ctx),
            risk: self.risk,
            primary_skill: self.primary,
            secondary_skill: self.secondary,
        }
    }
}

/// DecisionKind is the tag of a decision. Kinds are checked in the order of `PRIORITY`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    PitStrategy,
    Passing,
    MentalState,
    TireManagement,
}

impl DecisionKind {
    pub const PRIORITY: [DecisionKind; 4] = [
        DecisionKind::PitStrategy,
        DecisionKind::Passing,
        DecisionKind::MentalState,
        DecisionKind::TireManagement,
    ];

    pub fn is_triggered(&self, ctx: &DecisionContext) -> bool {
        match self {
            DecisionKind::PitStrategy => {
                ctx.lap >= PIT_MIN_LAP
                    && (ctx.tire_wear < PIT_TIRE_WEAR || ctx.fuel_level < PIT_FUEL_LEVEL)
            }
            DecisionKind::Passing => {
                ctx.position > 1
                    && ctx.driver_ahead.is_some()
                    && ctx.laps_behind_same_driver >= PASSING_MIN_LAPS_BEHIND
            }
            DecisionKind::MentalState => {
                ctx.frustration > MENTAL_FRUSTRATION || ctx.distraction > MENTAL_DISTRACTION
            }
            DecisionKind::TireManagement => {
                ctx.tire_wear < TIRE_MGMT_WEAR && ctx.laps_to_pit_window > TIRE_MGMT_MIN_LAPS_TO_PIT
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DecisionKind::PitStrategy => "Pit strategy",
            DecisionKind::Passing => "Passing opportunity",
            DecisionKind::MentalState => "Keep your head",
            DecisionKind::TireManagement => "Tire management",
        }
    }

    /// (s) Time the player has to answer.
    pub fn time_limit_s(&self) -> f64 {
        match self {
            DecisionKind::PitStrategy => 15.0,
            DecisionKind::Passing => 10.0,
            DecisionKind::MentalState | DecisionKind::TireManagement => 20.0,
        }
    }

    pub fn options(&self) -> &'static [OptionTemplate] {
        match self {
            DecisionKind::PitStrategy => PIT_STRATEGY_OPTIONS,
            DecisionKind::Passing => PASSING_OPTIONS,
            DecisionKind::MentalState => MENTAL_STATE_OPTIONS,
            DecisionKind::TireManagement => TIRE_MANAGEMENT_OPTIONS,
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&'static OptionTemplate> {
        self.options().iter().find(|o| o.id == option_id)
    }

    /// Builds a decision of this kind from the template, filling in the context.
    pub fn build(&self, id: u32, ctx: &DecisionContext) -> Decision {
        Decision {
            id,
            kind: *self,
            title: self.title().to_owned(),
            context: ctx.clone(),
            time_limit_s: self.time_limit_s(),
            options: self.options().iter().map(|o| o.instantiate(ctx)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------------------------
// PIT STRATEGY --------------------------------------------------------------------------------
// ---------------------------------------------------------------------------------------------

const PIT_STRATEGY_OPTIONS: &[OptionTemplate] = &[
    OptionTemplate {
        id: "pit_now",
        label: "Pit now",
        risk: RiskLevel::Low,
        primary: SkillKind::PitStrategy,
        secondary: Some(SkillKind::Composure),
        neutral_band: 10.0,
        aggressive: false,
        describe: describe_pit_now,
        on_success: &[OptionAction::PitStop {
            service: PitService::Full,
            t_extra: 0.0,
        }],
        on_neutral: &[OptionAction::PitStop {
            service: PitService::Full,
            t_extra: 2.0,
        }],
        on_failure: &[OptionAction::PitStop {
            service: PitService::Full,
            t_extra: 6.0,
        }],
    },
    OptionTemplate {
        id: "stay_out",
        label: "Stay out",
        risk: RiskLevel::Medium,
        primary: SkillKind::TireManagement,
        secondary: Some(SkillKind::Focus),
        neutral_band: 0.0,
        aggressive: false,
        describe: describe_stay_out,
        on_success: &[OptionAction::SetStyle(DrivingStyle::Conservative)],
        on_neutral: &[],
        on_failure: &[OptionAction::TireWear(-5.0)],
    },
    OptionTemplate {
        id: "fuel_only",
        label: "Fuel only",
        risk: RiskLevel::High,
        primary: SkillKind::PitStrategy,
        secondary: Some(SkillKind::Racecraft),
        neutral_band: 0.0,
        aggressive: true,
        describe: describe_fuel_only,
        on_success: &[
            OptionAction::PitStop {
                service: PitService::FuelOnly,
                t_extra: 0.0,
            },
            OptionAction::Positions(1),
        ],
        on_neutral: &[],
        on_failure: &[OptionAction::PitStop {
            service: PitService::FuelOnly,
            t_extra: 4.0,
        }],
    },
];

fn describe_pit_now(ctx: &DecisionContext) -> String {
    format!(
        "Box this lap for four tires and a full tank. Tires at {:.0}%, fuel at {:.0}%.",
        ctx.tire_wear, ctx.fuel_level
    )
}

fn describe_stay_out(ctx: &DecisionContext) -> String {
    format!(
        "Hold P{} and stretch the run. Fuel covers about {} more laps.",
        ctx.position, ctx.laps_to_pit_window
    )
}

fn describe_fuel_only(ctx: &DecisionContext) -> String {
    format!(
        "Quick splash of fuel, keep the {:.0}% tires and gain track position.",
        ctx.tire_wear
    )
}

// ---------------------------------------------------------------------------------------------
// PASSING -------------------------------------------------------------------------------------
// ---------------------------------------------------------------------------------------------

const PASSING_OPTIONS: &[OptionTemplate] = &[
    OptionTemplate {
        id: "dive_inside",
        label: "Dive to the inside",
        risk: RiskLevel::High,
        primary: SkillKind::Racecraft,
        secondary: Some(SkillKind::Aggression),
        neutral_band: 0.0,
        aggressive: true,
        describe: describe_dive_inside,
        on_success: &[OptionAction::Positions(1)],
        on_neutral: &[],
        on_failure: &[OptionAction::Positions(-1)],
    },
    OptionTemplate {
        id: "apply_pressure",
        label: "Apply pressure",
        risk: RiskLevel::Medium,
        primary: SkillKind::Racecraft,
        secondary: Some(SkillKind::Focus),
        neutral_band: 0.0,
        aggressive: false,
        describe: describe_apply_pressure,
        on_success: &[OptionAction::Positions(1)],
        on_neutral: &[],
        on_failure: &[OptionAction::TireWear(-3.0)],
    },
    OptionTemplate {
        id: "bide_time",
        label: "Bide your time",
        risk: RiskLevel::Low,
        primary: SkillKind::Composure,
        secondary: Some(SkillKind::Consistency),
        neutral_band: 10.0,
        aggressive: false,
        describe: describe_bide_time,
        on_success: &[OptionAction::Focus(5.0)],
        on_neutral: &[],
        on_failure: &[OptionAction::Distraction(5.0)],
    },
];

fn driver_ahead_name(ctx: &DecisionContext) -> &str {
    ctx.driver_ahead.as_deref().unwrap_or("the car ahead")
}

fn describe_dive_inside(ctx: &DecisionContext) -> String {
    format!(
        "Throw it to the inside of {} into the next turn. Contact is possible.",
        driver_ahead_name(ctx)
    )
}

fn describe_apply_pressure(ctx: &DecisionContext) -> String {
    format!(
        "Sit on the bumper of {} ({:.2}s ahead) and force a mistake.",
        driver_ahead_name(ctx),
        ctx.gap_ahead
    )
}

fn describe_bide_time(ctx: &DecisionContext) -> String {
    format!(
        "You have been behind {} for {} laps. Save the tires and wait.",
        driver_ahead_name(ctx),
        ctx.laps_behind_same_driver
    )
}

// ---------------------------------------------------------------------------------------------
// MENTAL STATE --------------------------------------------------------------------------------
// ---------------------------------------------------------------------------------------------

const MENTAL_STATE_OPTIONS: &[OptionTemplate] = &[
    OptionTemplate {
        id: "breathe",
        label: "Reset and refocus",
        risk: RiskLevel::Low,
        primary: SkillKind::Composure,
        secondary: Some(SkillKind::Focus),
        neutral_band: 10.0,
        aggressive: false,
        describe: describe_breathe,
        on_success: &[OptionAction::Distraction(-15.0), OptionAction::Focus(10.0)],
        on_neutral: &[OptionAction::Distraction(-5.0)],
        on_failure: &[],
    },
    OptionTemplate {
        id: "radio_crew",
        label: "Talk it through with the crew chief",
        risk: RiskLevel::Medium,
        primary: SkillKind::Focus,
        secondary: Some(SkillKind::Composure),
        neutral_band: 0.0,
        aggressive: false,
        describe: describe_radio_crew,
        on_success: &[OptionAction::Distraction(-20.0)],
        on_neutral: &[],
        on_failure: &[OptionAction::Distraction(10.0)],
    },
    OptionTemplate {
        id: "use_the_anger",
        label: "Use the anger",
        risk: RiskLevel::High,
        primary: SkillKind::Aggression,
        secondary: Some(SkillKind::Racecraft),
        neutral_band: 0.0,
        aggressive: true,
        describe: describe_use_the_anger,
        on_success: &[
            OptionAction::SetStyle(DrivingStyle::Aggressive),
            OptionAction::Positions(1),
        ],
        on_neutral: &[],
        on_failure: &[OptionAction::Positions(-1)],
    },
];

fn describe_breathe(ctx: &DecisionContext) -> String {
    format!(
        "Frustration at {:.0}, distraction at {:.0}. Slow your breathing and hit your marks.",
        ctx.frustration, ctx.distraction
    )
}

fn describe_radio_crew(_ctx: &DecisionContext) -> String {
    "Key the radio and let the crew chief talk you down.".to_owned()
}

fn describe_use_the_anger(ctx: &DecisionContext) -> String {
    format!(
        "Turn the frustration into speed and attack from P{}.",
        ctx.position
    )
}

// ---------------------------------------------------------------------------------------------
// TIRE MANAGEMENT -----------------------------------------------------------------------------
// ---------------------------------------------------------------------------------------------

const TIRE_MANAGEMENT_OPTIONS: &[OptionTemplate] = &[
    OptionTemplate {
        id: "conserve",
        label: "Conserve the tires",
        risk: RiskLevel::Low,
        primary: SkillKind::TireManagement,
        secondary: Some(SkillKind::Consistency),
        neutral_band: 10.0,
        aggressive: false,
        describe: describe_conserve,
        on_success: &[
            OptionAction::SetStyle(DrivingStyle::Conservative),
            OptionAction::TireWear(3.0),
        ],
        on_neutral: &[OptionAction::SetStyle(DrivingStyle::Conservative)],
        on_failure: &[OptionAction::SetStyle(DrivingStyle::Conservative), OptionAction::Positions(-1)],
    },
    OptionTemplate {
        id: "hold_pace",
        label: "Hold the pace",
        risk: RiskLevel::Medium,
        primary: SkillKind::Consistency,
        secondary: Some(SkillKind::Focus),
        neutral_band: 0.0,
        aggressive: false,
        describe: describe_hold_pace,
        on_success: &[OptionAction::SetStyle(DrivingStyle::Balanced)],
        on_neutral: &[],
        on_failure: &[
            OptionAction::SetStyle(DrivingStyle::Balanced),
            OptionAction::TireWear(-3.0),
        ],
    },
    OptionTemplate {
        id: "push",
        label: "Push on worn tires",
        risk: RiskLevel::High,
        primary: SkillKind::Aggression,
        secondary: Some(SkillKind::TireManagement),
        neutral_band: 0.0,
        aggressive: true,
        describe: describe_push,
        on_success: &[
            OptionAction::SetStyle(DrivingStyle::Aggressive),
            OptionAction::Positions(1),
        ],
        on_neutral: &[],
        on_failure: &[
            OptionAction::SetStyle(DrivingStyle::Aggressive),
            OptionAction::TireWear(-5.0),
        ],
    },
];

fn describe_conserve(ctx: &DecisionContext) -> String {
    format!(
        "Tires at {:.0}% with {} laps to the pit window. Lift early and save them.",
        ctx.tire_wear, ctx.laps_to_pit_window
    )
}

fn describe_hold_pace(_ctx: &DecisionContext) -> String {
    "Keep the current rhythm and manage the drop-off.".to_owned()
}

fn describe_push(ctx: &DecisionContext) -> String {
    format!(
        "Ignore the {:.0}% tires and push for position.",
        ctx.tire_wear
    )
}
