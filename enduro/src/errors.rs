use crate::core::race::RaceStatus;
use thiserror::Error;

/// ConfigurationError is returned by `Race::initialize` if the supplied race configuration cannot
/// be turned into a race. It is fatal for the call: no partial race state is created.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("driver list is empty")]
    NoDrivers,
    #[error("track {track_id} has no sections")]
    NoSections { track_id: String },
    #[error("track {track_id}: {field} must be positive (got {value})")]
    NonPositiveTrackValue {
        track_id: String,
        field: &'static str,
        value: f64,
    },
    #[error("track {track_id} must be raced over at least one lap")]
    NoLaps { track_id: String },
    #[error("exactly one driver must be flagged as the player (found {found})")]
    PlayerCount { found: usize },
    #[error("driver id {0} is used more than once")]
    DuplicateDriver(String),
    #[error("lap time parameter {field} must be finite (got {value})")]
    NonFiniteLapTimeValue { field: &'static str, value: f64 },
    #[error("fuel starvation curve has {levels} levels and {losses} losses, both must be equal and non-zero")]
    FuelCurveLength { levels: usize, losses: usize },
    #[error("fuel starvation levels must be strictly increasing")]
    FuelCurveOrder,
}

/// InvalidReferenceError signals a lookup of a driver id that does not take part in the race.
/// It never crosses the control surface, callers map it to a sentinel value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown driver id {driver_id}")]
pub struct InvalidReferenceError {
    pub driver_id: String,
}

/// InvalidDecisionError is returned by `Race::submit_decision` for a malformed submission. The race
/// state is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidDecisionError {
    #[error("no decision is pending")]
    NoPendingDecision,
    #[error("decision {submitted} is not the pending decision {pending}")]
    DecisionMismatch { pending: u32, submitted: u32 },
    #[error("decision {decision_id} has no option {option_id}")]
    UnknownOption { decision_id: u32, option_id: String },
    #[error("player {player_id} has no driver or car in the race")]
    PlayerMissing { player_id: String },
}

/// StateViolationError describes an operation that is not valid in the current race state. The
/// engine logs it and treats the call as a no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} is not allowed while the race is {status:?}")]
pub struct StateViolationError {
    pub operation: &'static str,
    pub status: RaceStatus,
}
