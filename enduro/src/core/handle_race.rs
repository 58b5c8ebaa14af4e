use crate::core::race::{Race, RaceConfig, RaceState};
use crate::decision::evaluator::calc_success_chance;
use crate::decision::{Decision, NO_CHOICE_OPTION_ID};
use crate::interfaces::race_messages::{RaceEvent, RaceMessage, MAX_SNAPSHOT_FREQUENCY};
use crate::post::race_result::RaceResult;
use anyhow::Context;
use flume::{Receiver, Sender, TryRecvError};
use helpers::general::argmax;
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Poll interval while a headless race waits for an answer.
const DECISION_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// DecisionResponder answers the decisions raised for the player.
pub trait DecisionResponder {
    /// poll returns the option id to submit, or None if no answer is available yet.
    fn poll(&mut self, decision: &Decision, state: &RaceState) -> Option<String>;
}

/// Autopilot always picks the option with the highest success chance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autopilot;

impl DecisionResponder for Autopilot {
    fn poll(&mut self, decision: &Decision, state: &RaceState) -> Option<String> {
        let driver = state.drivers.get(&state.player_id)?;
        let chances: Vec<f64> = decision
            .options
            .iter()
            .map(|o| calc_success_chance(driver.skill(o.primary_skill), &driver.mental_state, o.risk))
            .collect();

        match argmax(&chances) {
            Some(idx) => Some(decision.options[idx].id.to_owned()),
            None => Some(NO_CHOICE_OPTION_ID.to_owned()),
        }
    }
}

/// ChannelResponder takes answers from a channel, e.g. fed by a console input thread. An answer is
/// either an option id or the 1-based number of an option.
#[derive(Debug)]
pub struct ChannelResponder {
    rx: Receiver<String>,
}

impl ChannelResponder {
    pub fn new(rx: Receiver<String>) -> ChannelResponder {
        ChannelResponder { rx }
    }
}

impl DecisionResponder for ChannelResponder {
    fn poll(&mut self, decision: &Decision, _state: &RaceState) -> Option<String> {
        match self.rx.try_recv() {
            Ok(answer) => {
                let answer = answer.trim();
                let option_id = match answer.parse::<usize>() {
                    Ok(no) if no >= 1 && no <= decision.options.len() => {
                        decision.options[no - 1].id.to_owned()
                    }
                    _ => answer.to_owned(),
                };
                Some(option_id)
            }
            Err(TryRecvError::Empty) => None,
            // nobody can answer any more
            Err(TryRecvError::Disconnected) => Some(NO_CHOICE_OPTION_ID.to_owned()),
        }
    }
}

/// PendingAnswer keeps track of the decision currently waiting for the responder.
struct PendingAnswer {
    decision: Decision,
    t_raised: Instant,
}

/// handle_race creates and simulates a race on the basis of the inserted configuration, and
/// returns the results for post-processing.
///
/// * `timestep_size` - (s) Simulated time per step
/// * `responder` - Answers the player's decisions
/// * `tx` - Receives events, decision outcomes, snapshots (real-time only) and the final result
/// * `realtime_factor` - None simulates as fast as possible, Some(f) sleeps such that the race
///   runs f times faster than real time
///
/// A decision that is not answered within its time limit (wall clock, scaled by the real-time
/// factor) is resolved with the no-choice option. In real time the race keeps running while the
/// responder is thinking, headless races wait.
pub fn handle_race(
    config: &RaceConfig,
    timestep_size: f64,
    responder: &mut dyn DecisionResponder,
    tx: Option<&Sender<RaceMessage>>,
    realtime_factor: Option<f64>,
) -> anyhow::Result<RaceResult> {
    if !(timestep_size > 0.0 && timestep_size.is_finite()) {
        anyhow::bail!("Timestep size must be positive (got {})!", timestep_size);
    }
    let realtime_factor = match realtime_factor {
        Some(f) if !(f > 0.0 && f.is_finite()) => {
            anyhow::bail!("Real-time factor must be positive (got {})!", f)
        }
        f => f,
    };

    let mut race = Race::new();
    race.initialize(config)
        .context("Failed to initialize the race from the configuration!")?;
    race.start();

    let timestep = Duration::from_secs_f64(timestep_size);
    let time_scale = realtime_factor.unwrap_or(1.0);
    let mut pending: Option<PendingAnswer> = None;
    let mut t_race_update_print = 0.0;
    let mut t_race_update_snapshot = f64::NEG_INFINITY;

    while !race.is_completed() {
        let t_start = Instant::now();

        // answer the pending decision if possible
        if let Some(answer) = pending.as_ref() {
            let state = race
                .get_state()
                .context("Race state vanished during the simulation!")?;
            let timed_out =
                answer.t_raised.elapsed().as_secs_f64() * time_scale >= answer.decision.time_limit_s;

            let option_id = match responder.poll(&answer.decision, &state) {
                Some(option_id) => Some(option_id),
                None if timed_out => {
                    info!("Decision {} timed out", answer.decision.id);
                    Some(NO_CHOICE_OPTION_ID.to_owned())
                }
                None => None,
            };

            if let Some(option_id) = option_id {
                let decision_id = answer.decision.id;
                let outcome = match race.submit_decision(decision_id, &option_id) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Rejected answer {:?}: {}", option_id, e);
                        race.submit_decision(decision_id, NO_CHOICE_OPTION_ID)
                            .context("Failed to resolve the pending decision!")?
                    }
                };
                if let Some(tx) = tx {
                    tx.send(RaceMessage::Outcome(outcome))
                        .context("Failed to send decision outcome!")?;
                }
                pending = None;
            } else if realtime_factor.is_none() {
                sleep(DECISION_POLL_INTERVAL);
                continue;
            }
        }

        // simulate the time step
        for event in race.advance(timestep) {
            if let RaceEvent::DecisionRequired(decision) = &event {
                pending = Some(PendingAnswer {
                    decision: decision.to_owned(),
                    t_raised: Instant::now(),
                });
            }
            if let Some(tx) = tx {
                tx.send(RaceMessage::Event(event))
                    .context("Failed to send race event!")?;
            }
        }

        let state = race
            .get_state()
            .context("Race state vanished during the simulation!")?;
        if state.race_time > t_race_update_print + 9.9999 {
            debug!(
                "Simulating... Current race time is {:.3}s, current lap is {}",
                state.race_time, state.current_lap
            );
            t_race_update_print = state.race_time;
        }

        if let Some(factor) = realtime_factor {
            if let Some(tx) = tx {
                if state.race_time > t_race_update_snapshot + 1.0 / MAX_SNAPSHOT_FREQUENCY - 0.001 {
                    t_race_update_snapshot = state.race_time;
                    tx.send(RaceMessage::Snapshot(Box::new(state)))
                        .context("Failed to send race state!")?;
                }
            }

            // sleep until time step is finished in real-time as well
            let t_step = Duration::from_secs_f64(timestep_size / factor);
            match t_step.checked_sub(t_start.elapsed()) {
                Some(t_sleep) if !t_sleep.is_zero() => sleep(t_sleep),
                _ => warn!("Could not keep up with real-time!"),
            }
        }
    }

    let result = race
        .get_race_result()
        .context("Race result is not available!")?;
    if let Some(tx) = tx {
        tx.send(RaceMessage::Finished(Box::new(result.to_owned())))
            .context("Failed to send final race result!")?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race::tests::test_config;
    use crate::decision::templates::tests::calm_context;
    use crate::decision::DecisionKind;

    #[test]
    fn autopilot_picks_the_safest_bet() {
        let mut race = Race::new();
        race.initialize(&test_config(10)).unwrap();
        let state = race.get_state().unwrap();

        let mut ctx = calm_context(60);
        ctx.tire_wear = 50.0;
        let decision = DecisionKind::PitStrategy.build(1, &ctx);
        assert_eq!(Autopilot.poll(&decision, &state).as_deref(), Some("pit_now"));
    }

    #[test]
    fn channel_responder_accepts_numbers_and_ids() {
        let (tx, rx) = flume::unbounded();
        let mut responder = ChannelResponder::new(rx);
        let mut race = Race::new();
        race.initialize(&test_config(10)).unwrap();
        let state = race.get_state().unwrap();
        let decision = DecisionKind::MentalState.build(1, &calm_context(20));

        assert_eq!(responder.poll(&decision, &state), None);
        tx.send("2".to_owned()).unwrap();
        assert_eq!(responder.poll(&decision, &state).as_deref(), Some("radio_crew"));
        tx.send(" use_the_anger\n".to_owned()).unwrap();
        assert_eq!(responder.poll(&decision, &state).as_deref(), Some("use_the_anger"));

        drop(tx);
        assert_eq!(
            responder.poll(&decision, &state).as_deref(),
            Some(NO_CHOICE_OPTION_ID)
        );
    }

    #[test]
    fn headless_race_runs_to_completion() {
        let mut config = test_config(20);
        config.drivers[0].mental_state.frustration = 90.0;
        let (tx, rx) = flume::unbounded();

        let result = handle_race(&config, 0.1, &mut Autopilot, Some(&tx), None).unwrap();
        assert_eq!(result.classification.len(), 3);
        assert!(result.histories.iter().all(|h| h.laptimes.len() == 20));
        assert!(!result.decisions.is_empty());

        let messages: Vec<RaceMessage> = rx.drain().collect();
        assert!(matches!(messages.last(), Some(RaceMessage::Finished(_))));
        let outcomes = messages
            .iter()
            .filter(|m| matches!(m, RaceMessage::Outcome(_)))
            .count();
        assert_eq!(outcomes, result.decisions.len());
    }

    #[test]
    fn invalid_timestep_is_rejected() {
        assert!(handle_race(&test_config(5), 0.0, &mut Autopilot, None, None).is_err());
        assert!(handle_race(&test_config(5), 0.1, &mut Autopilot, None, Some(-1.0)).is_err());
    }
}
