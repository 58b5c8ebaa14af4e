use crate::core::car::PitService;
use crate::core::driver::DriverId;
use crate::core::race::RaceState;
use crate::decision::{Decision, DecisionOutcome};
use crate::post::race_result::RaceResult;
use serde::Serialize;

/// Maximum frequency (Hz) at which race state snapshots are published in real-time mode.
pub const MAX_SNAPSHOT_FREQUENCY: f64 = 20.0;

/// RaceEvent is produced by `Race::advance`. Every event is emitted exactly once.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    LapCompleted {
        driver_id: DriverId,
        lap: u32,
        lap_time: f64,
        race_time: f64,
    },
    PitStop {
        driver_id: DriverId,
        lap: u32,
        service: PitService,
        t_standstill: f64,
    },
    DriverFinished {
        driver_id: DriverId,
        race_time: f64,
    },
    DecisionRequired(Decision),
    RaceCompleted {
        race_time: f64,
    },
}

/// RaceMessage is published by `handle_race` to an external collaborator (console, renderer,
/// network relay).
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum RaceMessage {
    Snapshot(Box<RaceState>),
    Event(RaceEvent),
    Outcome(DecisionOutcome),
    Finished(Box<RaceResult>),
}
