//! Decision evaluator.
//!
//! successChance = clamp(50 + skillBonus + mentalModifier + riskPenalty, 5, 95) with
//! skillBonus = (primary skill - 50) * 0.5 and mentalModifier = (confidence - frustration) * 0.1.
//! The evaluator never mutates anything, the race engine applies the returned effects.

use crate::core::car::Car;
use crate::core::driver::{Driver, MentalState};
use crate::decision::templates::{OptionAction, OptionTemplate};
use crate::decision::{
    Decision, DecisionOutcome, OutcomeEffects, OutcomeResult, PitStop, RiskLevel, SkillXp,
    NO_CHOICE_OPTION_ID,
};
use crate::errors::InvalidDecisionError;
use rand::Rng;

pub const MIN_SUCCESS_CHANCE: f64 = 5.0;
pub const MAX_SUCCESS_CHANCE: f64 = 95.0;
const BASE_SUCCESS_CHANCE: f64 = 50.0;
const SKILL_FACTOR: f64 = 0.5;
const MENTAL_FACTOR: f64 = 0.1;

// effect magnitudes, multiplied by the risk scale where noted
const CONFIDENCE_STEP: f64 = 5.0; // x risk scale
const FRUSTRATION_RELIEF: f64 = -10.0;
const FRUSTRATION_STEP: f64 = 5.0; // 5 + 5 x risk scale on failure
const DAMAGE_STEP: f64 = 5.0; // x risk scale, aggressive options only
const XP_SUCCESS_PRIMARY: f64 = 10.0; // x risk scale
const XP_SUCCESS_SECONDARY: f64 = 5.0; // x risk scale
const XP_NEUTRAL_PRIMARY: f64 = 5.0;
const XP_FAILURE_PRIMARY: f64 = 3.0; // x risk scale

/// calc_success_chance returns the success chance (%) of an option.
pub fn calc_success_chance(primary_skill: f64, mental: &MentalState, risk: RiskLevel) -> f64 {
    let skill_bonus = (primary_skill - 50.0) * SKILL_FACTOR;
    let mental_modifier = (mental.confidence - mental.frustration) * MENTAL_FACTOR;
    let chance = BASE_SUCCESS_CHANCE + skill_bonus + mental_modifier + risk.penalty();

    if chance.is_nan() {
        MIN_SUCCESS_CHANCE
    } else {
        chance.clamp(MIN_SUCCESS_CHANCE, MAX_SUCCESS_CHANCE)
    }
}

/// draw_percentage draws a uniformly distributed value in [0, 100).
pub fn draw_percentage<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0.0..100.0)
}

/// determine_result maps a draw in [0, 100) onto the outcome tag of an option.
pub fn determine_result(draw: f64, success_chance: f64, neutral_band: f64) -> OutcomeResult {
    if draw < success_chance {
        OutcomeResult::Success
    } else if draw < success_chance + neutral_band {
        OutcomeResult::Neutral
    } else {
        OutcomeResult::Failure
    }
}

/// evaluate resolves the chosen option of a decision for the given draw in [0, 100). It fails if
/// the option is not part of the decision.
pub fn evaluate(
    decision: &Decision,
    option_id: &str,
    driver: &Driver,
    mental: &MentalState,
    car: &Car,
    draw: f64,
) -> Result<DecisionOutcome, InvalidDecisionError> {
    if option_id == NO_CHOICE_OPTION_ID {
        return Ok(DecisionOutcome {
            decision_id: decision.id,
            option_id: option_id.to_owned(),
            result: OutcomeResult::Neutral,
            success_chance: 0.0,
            effects: OutcomeEffects::default(),
            summary: "No choice made, carrying on as before".to_owned(),
        });
    }

    let unknown_option = || InvalidDecisionError::UnknownOption {
        decision_id: decision.id,
        option_id: option_id.to_owned(),
    };
    let option = decision.option(option_id).ok_or_else(unknown_option)?;
    let template = decision.kind.option(option_id).ok_or_else(unknown_option)?;

    let success_chance = calc_success_chance(driver.skill(option.primary_skill), mental, option.risk);
    let result = determine_result(draw, success_chance, template.effective_neutral_band());
    let effects = build_effects(template, result, car);

    let summary = format!(
        "{}: {} ({:.0}% chance, tires {:.0}%, fuel {:.0}%)",
        option.label,
        match result {
            OutcomeResult::Success => "success",
            OutcomeResult::Neutral => "neutral",
            OutcomeResult::Failure => "failure",
        },
        success_chance,
        car.tire_wear,
        car.fuel_level
    );

    Ok(DecisionOutcome {
        decision_id: decision.id,
        option_id: option_id.to_owned(),
        result,
        success_chance,
        effects,
        summary,
    })
}

/// evaluate_with_rng draws from the given generator and evaluates the option.
pub fn evaluate_with_rng<R: Rng + ?Sized>(
    decision: &Decision,
    option_id: &str,
    driver: &Driver,
    mental: &MentalState,
    car: &Car,
    rng: &mut R,
) -> Result<DecisionOutcome, InvalidDecisionError> {
    let draw = draw_percentage(rng);
    evaluate(decision, option_id, driver, mental, car, draw)
}

fn build_effects(template: &OptionTemplate, result: OutcomeResult, car: &Car) -> OutcomeEffects {
    let scale = template.risk.scale();
    let mut effects = OutcomeEffects::default();

    match result {
        OutcomeResult::Success => {
            effects.mental.confidence = CONFIDENCE_STEP * scale;
            effects.mental.frustration = FRUSTRATION_RELIEF;
            effects.skill_xp.push(SkillXp {
                skill: template.primary,
                xp: XP_SUCCESS_PRIMARY * scale,
            });
            if let Some(secondary) = template.secondary {
                effects.skill_xp.push(SkillXp {
                    skill: secondary,
                    xp: XP_SUCCESS_SECONDARY * scale,
                });
            }
        }
        OutcomeResult::Neutral => {
            effects.skill_xp.push(SkillXp {
                skill: template.primary,
                xp: XP_NEUTRAL_PRIMARY,
            });
        }
        OutcomeResult::Failure => {
            effects.mental.confidence = -CONFIDENCE_STEP * scale;
            effects.mental.frustration = FRUSTRATION_STEP + FRUSTRATION_STEP * scale;
            if template.aggressive {
                effects.car.damage = DAMAGE_STEP * scale;
            }
            effects.skill_xp.push(SkillXp {
                skill: template.primary,
                xp: XP_FAILURE_PRIMARY * scale,
            });
        }
    }

    for action in template.actions(result) {
        match *action {
            OptionAction::PitStop { service, t_extra } => {
                effects.pit_stop = Some(PitStop { service, t_extra })
            }
            OptionAction::SetStyle(style) => {
                if style != car.driving_style {
                    effects.driving_style = Some(style)
                }
            }
            OptionAction::Positions(delta) => effects.position_delta += delta,
            OptionAction::TireWear(delta) => effects.car.tire_wear += delta,
            OptionAction::Focus(delta) => effects.mental.focus += delta,
            OptionAction::Distraction(delta) => effects.mental.distraction += delta,
        }
    }

    effects
}
