use crate::core::car::{Car, PitService};
use crate::core::driver::{Driver, DriverId, DriverPars, SkillKind};
use crate::core::lap_time::{self, LapTimePars};
use crate::core::resources::{self, ResourcePars};
use crate::core::standings::{compute_standings, CompetitorProgress};
use crate::core::track::{Track, TrackPars};
use crate::decision::evaluator::{self, draw_percentage};
use crate::decision::generator::{DecisionGenerator, DEFAULT_DECISION_SPACING};
use crate::decision::{Decision, DecisionContext, DecisionOutcome, OutcomeEffects, PitStop, NO_CHOICE_OPTION_ID};
use crate::errors::{ConfigurationError, InvalidDecisionError, StateViolationError};
use crate::interfaces::race_messages::RaceEvent;
use crate::post::race_result::{ClassificationEntry, LapHistory, RaceResult};
use helpers::general::max;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Lap progress within this distance of 1.0 counts as a completed lap.
pub const LAP_EPSILON: f64 = 1e-9;
/// Lower bound of a noisy lap time relative to the deterministic lap time.
const MIN_NOISY_LAP_TIME_FRAC: f64 = 0.5;

/// * `seed` - Seed of the race random number generator (decision draws, lap time noise)
/// * `player_only_gate` - If true, AI competitors keep racing while the player decides, otherwise
///   the whole race waits for the decision
/// * `decision_spacing` - Minimum number of laps between two decisions
/// * `lap_variance` - (s) Lap time standard deviation of a driver with consistency 0, 0.0
///   disables the lap time noise
/// * `ai_pit_stops` - Let AI competitors pit on their own
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimSettings {
    pub seed: u64,
    pub player_only_gate: bool,
    pub decision_spacing: u32,
    pub lap_variance: f64,
    pub ai_pit_stops: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        SimSettings {
            seed: 42,
            player_only_gate: true,
            decision_spacing: DEFAULT_DECISION_SPACING,
            lap_variance: 0.0,
            ai_pit_stops: true,
        }
    }
}

/// RaceConfig bundles everything a race is initialized from. It is read once by
/// `Race::initialize` and never again afterwards.
#[derive(Debug, Deserialize, Clone)]
pub struct RaceConfig {
    pub track: TrackPars,
    pub drivers: Vec<DriverPars>,
    #[serde(default)]
    pub resources: ResourcePars,
    #[serde(default)]
    pub lap_time: LapTimePars,
    #[serde(default)]
    pub sim: SimSettings,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    Completed,
}

/// PassingTracker counts the consecutive player laps spent at the same position behind the same
/// competitor.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct PassingTracker {
    pub driver_ahead: Option<DriverId>,
    pub position: u32,
    pub consecutive_laps: u32,
}

impl PassingTracker {
    fn observe(&mut self, position: u32, driver_ahead: Option<&DriverId>) {
        match driver_ahead {
            Some(ahead)
                if self.position == position && self.driver_ahead.as_ref() == Some(ahead) =>
            {
                self.consecutive_laps += 1
            }
            Some(ahead) => {
                *self = PassingTracker {
                    driver_ahead: Some(ahead.to_owned()),
                    position,
                    consecutive_laps: 1,
                }
            }
            None => {
                *self = PassingTracker {
                    driver_ahead: None,
                    position,
                    consecutive_laps: 0,
                }
            }
        }
    }
}

/// RaceState is the aggregate state of a race. `Race::get_state` hands out copies only.
///
/// * `current_lap` - Global race lap, i.e. the maximum current lap over all competitors
/// * `race_time` - (s) Simulated race time
/// * `positions` - Competitor progress in race order
/// * `started` - True once `start` was called, distinguishes a race paused before the start
/// * `last_decision_lap` - Player lap at which the last decision was triggered
/// * `skill_xp` - Skill XP accumulated by the player through decision outcomes
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RaceState {
    pub track: Arc<Track>,
    pub total_laps: u32,
    pub current_lap: u32,
    pub race_time: f64,
    pub positions: Vec<CompetitorProgress>,
    pub player_id: DriverId,
    pub drivers: BTreeMap<DriverId, Driver>,
    pub cars: BTreeMap<DriverId, Car>,
    pub status: RaceStatus,
    pub paused: bool,
    pub completed: bool,
    pub started: bool,
    pub last_decision_lap: Option<u32>,
    pub pending_decision: Option<Decision>,
    pub passing: PassingTracker,
    pub skill_xp: BTreeMap<SkillKind, f64>,
}

impl RaceState {
    pub fn competitor(&self, driver_id: &str) -> Option<&CompetitorProgress> {
        self.positions.iter().find(|p| p.driver_id == driver_id)
    }

    pub fn player(&self) -> Option<&CompetitorProgress> {
        self.competitor(&self.player_id)
    }

    fn idx_of(&self, driver_id: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.driver_id == driver_id)
    }
}

/// Session holds everything that exists between `initialize` and the next `initialize`.
#[derive(Debug)]
struct Session {
    state: RaceState,
    resources: ResourcePars,
    lap_time_pars: LapTimePars,
    sim: SimSettings,
    generator: DecisionGenerator,
    rng: ChaCha20Rng,
    histories: BTreeMap<DriverId, LapHistory>,
    outcomes: Vec<DecisionOutcome>,
    queued_events: Vec<RaceEvent>,
}

/// Race is the race engine. It owns the race state exclusively and is driven by an external
/// caller through the control operations `initialize`, `start`, `pause`, `resume`, `advance`,
/// `submit_decision` and `get_state`. Operations that are not valid in the current state are
/// logged and ignored.
#[derive(Debug, Default)]
pub struct Race {
    session: Option<Session>,
}

impl Race {
    pub fn new() -> Race {
        Race { session: None }
    }

    pub fn status(&self) -> RaceStatus {
        self.session
            .as_ref()
            .map_or(RaceStatus::Uninitialized, |s| s.state.status)
    }

    fn violation(&self, operation: &'static str) {
        let err = StateViolationError {
            operation,
            status: self.status(),
        };
        warn!("Ignored control operation: {}", err);
    }

    // ---------------------------------------------------------------------------------------------
    // CONTROL SURFACE -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// initialize builds a new race from the configuration, replacing any previous race. On error
    /// the previous race (if any) is kept untouched.
    pub fn initialize(&mut self, config: &RaceConfig) -> Result<(), ConfigurationError> {
        if config.drivers.is_empty() {
            return Err(ConfigurationError::NoDrivers);
        }
        config.lap_time.validate()?;
        let track = Arc::new(Track::new(&config.track)?);

        let mut drivers = BTreeMap::new();
        for driver_pars in config.drivers.iter() {
            if drivers
                .insert(driver_pars.id.to_owned(), Driver::new(driver_pars))
                .is_some()
            {
                return Err(ConfigurationError::DuplicateDriver(driver_pars.id.to_owned()));
            }
        }

        let player_ids: Vec<&DriverId> = drivers
            .values()
            .filter(|d| d.is_player)
            .map(|d| &d.id)
            .collect();
        let player_id = match player_ids.as_slice() {
            [id] => (*id).to_owned(),
            _ => {
                return Err(ConfigurationError::PlayerCount {
                    found: player_ids.len(),
                })
            }
        };

        let cars: BTreeMap<DriverId, Car> = drivers.keys().map(|id| (id.to_owned(), Car::new())).collect();

        let mut positions: Vec<CompetitorProgress> = config
            .drivers
            .iter()
            .enumerate()
            .map(|(i, driver_pars)| {
                let t_lap = lap_time::lap_time_for(&track, &config.lap_time, &drivers, &cars, &driver_pars.id);
                CompetitorProgress::new(driver_pars.id.to_owned(), i as u32 + 1, t_lap)
            })
            .collect();
        compute_standings(&mut positions);

        let histories = drivers
            .keys()
            .map(|id| (id.to_owned(), LapHistory::default()))
            .collect();

        info!(
            "Race initialized: {} over {} laps with {} drivers (player {})",
            track.name,
            track.tot_no_laps,
            drivers.len(),
            player_id
        );

        self.session = Some(Session {
            state: RaceState {
                total_laps: track.tot_no_laps,
                track,
                current_lap: 0,
                race_time: 0.0,
                positions,
                player_id,
                drivers,
                cars,
                status: RaceStatus::Initialized,
                paused: false,
                completed: false,
                started: false,
                last_decision_lap: None,
                pending_decision: None,
                passing: PassingTracker::default(),
                skill_xp: BTreeMap::new(),
            },
            resources: config.resources.to_owned(),
            lap_time_pars: config.lap_time.to_owned(),
            sim: config.sim.to_owned(),
            generator: DecisionGenerator::new(config.sim.decision_spacing),
            rng: ChaCha20Rng::seed_from_u64(config.sim.seed),
            histories,
            outcomes: Vec::new(),
            queued_events: Vec::new(),
        });
        Ok(())
    }

    /// start puts every competitor on lap 1 and starts the race.
    pub fn start(&mut self) {
        match self.session.as_mut() {
            Some(session) if session.state.status == RaceStatus::Initialized => session.start(),
            _ => self.violation("start"),
        }
    }

    /// pause freezes the race. Pausing an initialized race yields a race that is paused before
    /// the start, pausing a paused race changes nothing.
    pub fn pause(&mut self) {
        match self.session.as_mut() {
            Some(session) => match session.state.status {
                RaceStatus::Running | RaceStatus::Initialized => {
                    session.state.status = RaceStatus::Paused;
                    session.state.paused = true;
                    info!("Race paused at {:.3}s", session.state.race_time);
                }
                RaceStatus::Paused => {}
                _ => self.violation("pause"),
            },
            None => self.violation("pause"),
        }
    }

    /// resume continues a paused race. A race paused before the start returns to the initialized
    /// state, resuming a running race changes nothing.
    pub fn resume(&mut self) {
        match self.session.as_mut() {
            Some(session) => match session.state.status {
                RaceStatus::Paused => {
                    session.state.status = if session.state.started {
                        RaceStatus::Running
                    } else {
                        RaceStatus::Initialized
                    };
                    session.state.paused = false;
                    info!("Race resumed at {:.3}s", session.state.race_time);
                }
                RaceStatus::Running => {}
                _ => self.violation("resume"),
            },
            None => self.violation("resume"),
        }
    }

    /// advance integrates the elapsed time into the race and returns the events that occurred.
    /// It only changes the race while it is running.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<RaceEvent> {
        match self.session.as_mut() {
            Some(session) => match session.state.status {
                RaceStatus::Running => session.advance(elapsed.as_secs_f64()),
                RaceStatus::Paused | RaceStatus::Completed => Vec::new(),
                _ => {
                    self.violation("advance");
                    Vec::new()
                }
            },
            None => {
                self.violation("advance");
                Vec::new()
            }
        }
    }

    /// submit_decision resolves the pending decision with the chosen option and applies the
    /// outcome. On error the race is left unchanged.
    pub fn submit_decision(
        &mut self,
        decision_id: u32,
        option_id: &str,
    ) -> Result<DecisionOutcome, InvalidDecisionError> {
        match self.session.as_mut() {
            Some(session) => session.submit_decision(decision_id, option_id),
            None => Err(InvalidDecisionError::NoPendingDecision),
        }
    }

    /// get_state returns a snapshot of the race state, None before the first initialization.
    pub fn get_state(&self) -> Option<RaceState> {
        self.session.as_ref().map(|s| s.state.to_owned())
    }

    pub fn pending_decision(&self) -> Option<&Decision> {
        self.session.as_ref()?.state.pending_decision.as_ref()
    }

    /// request_pit_stop sends a driver to the pits right away. Returns false if the request was
    /// ignored.
    pub fn request_pit_stop(&mut self, driver_id: &str, service: PitService) -> bool {
        match self.session.as_mut() {
            Some(session)
                if matches!(
                    session.state.status,
                    RaceStatus::Running | RaceStatus::Paused
                ) =>
            {
                session.request_pit_stop(driver_id, service)
            }
            _ => {
                self.violation("request_pit_stop");
                false
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// lap_time_for returns the current deterministic lap time (s) of a driver, 0.0 if the driver
    /// is unknown.
    pub fn lap_time_for(&self, driver_id: &str) -> f64 {
        match self.session.as_ref() {
            Some(session) => lap_time::lap_time_for(
                &session.state.track,
                &session.lap_time_pars,
                &session.state.drivers,
                &session.state.cars,
                driver_id,
            ),
            None => {
                warn!("Lap time requested for {} before initialization", driver_id);
                0.0
            }
        }
    }

    pub fn get_all_finished(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |s| s.state.positions.iter().all(|p| p.finished))
    }

    pub fn is_completed(&self) -> bool {
        self.status() == RaceStatus::Completed
    }

    pub fn get_race_result(&self) -> Option<RaceResult> {
        self.session.as_ref().map(|s| s.get_race_result())
    }
}

impl Session {
    fn start(&mut self) {
        self.state.status = RaceStatus::Running;
        self.state.started = true;
        self.state.current_lap = 1;

        let ids: Vec<DriverId> = self.state.positions.iter().map(|p| p.driver_id.to_owned()).collect();
        for id in ids.iter() {
            let t_lap = self.draw_lap_time(id);
            if let Some(idx) = self.state.idx_of(id) {
                let entry = &mut self.state.positions[idx];
                entry.current_lap = 1;
                entry.cur_lap_time = t_lap;
            }
        }
        compute_standings(&mut self.state.positions);
        info!("Race started");
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn advance(&mut self, dt: f64) -> Vec<RaceEvent> {
        let mut events = std::mem::take(&mut self.queued_events);
        if !(dt > 0.0) {
            return events;
        }

        let awaiting_decision = self.state.pending_decision.is_some();
        if awaiting_decision && !self.sim.player_only_gate {
            return events;
        }

        // AI competitors first, the player's decision predicates see their movement of this tick
        let t_tick_start = self.state.race_time;
        let ai_ids: Vec<DriverId> = self
            .state
            .drivers
            .keys()
            .filter(|id| **id != self.state.player_id)
            .cloned()
            .collect();
        for id in ai_ids.iter() {
            self.integrate(id, dt, t_tick_start, &mut events);
        }
        if !awaiting_decision {
            let player_id = self.state.player_id.to_owned();
            self.integrate(&player_id, dt, t_tick_start, &mut events);
        }

        self.state.race_time = t_tick_start + dt;
        compute_standings(&mut self.state.positions);
        self.update_global_lap();

        if self.state.positions.iter().all(|p| p.finished) {
            self.state.status = RaceStatus::Completed;
            self.state.completed = true;
            info!("Race completed after {:.3}s", self.state.race_time);
            events.push(RaceEvent::RaceCompleted {
                race_time: self.state.race_time,
            });
        }

        events
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// integrate moves a competitor forward by dt, completing as many laps as the time covers.
    fn integrate(&mut self, driver_id: &str, dt: f64, t_tick_start: f64, events: &mut Vec<RaceEvent>) {
        let mut t_left = dt;

        loop {
            let idx = match self.state.idx_of(driver_id) {
                Some(idx) => idx,
                None => return,
            };
            let entry = &mut self.state.positions[idx];
            if entry.finished {
                return;
            }

            // pit standstill consumes time before any progress is made
            if entry.t_pit_standstill > 0.0 {
                let t_standstill = entry.t_pit_standstill.min(t_left);
                entry.t_pit_standstill -= t_standstill;
                t_left -= t_standstill;
            }
            if t_left <= 0.0 || !(entry.cur_lap_time > 0.0) {
                return;
            }

            let lap_progress = entry.lap_progress + t_left / entry.cur_lap_time;
            if lap_progress < 1.0 - LAP_EPSILON {
                entry.lap_progress = lap_progress;
                return;
            }

            // split the remaining time at the finish line
            t_left = (lap_progress - 1.0).max(0.0) * entry.cur_lap_time;
            let t_line = t_tick_start + dt - t_left;

            if self.complete_lap(driver_id, t_line, events) {
                return;
            }
        }
    }

    /// complete_lap handles a finish line crossing. Returns true if the competitor must not be
    /// integrated any further in this tick.
    fn complete_lap(&mut self, driver_id: &str, t_line: f64, events: &mut Vec<RaceEvent>) -> bool {
        let idx = match self.state.idx_of(driver_id) {
            Some(idx) => idx,
            None => return true,
        };

        let history = self.histories.entry(driver_id.to_owned()).or_default();
        let lap_time = t_line - history.racetimes.last().copied().unwrap_or(0.0);
        history.laptimes.push(lap_time);
        history.racetimes.push(t_line);

        let total_laps = self.state.total_laps;
        let entry = &mut self.state.positions[idx];
        let lap = entry.current_lap;
        entry.last_lap_time = lap_time;
        if lap >= total_laps {
            entry.finished = true;
            entry.lap_progress = 1.0;
            entry.finish_time = Some(t_line);
        } else {
            entry.current_lap += 1;
            entry.lap_progress = 0.0;
        }
        let finished = entry.finished;

        let track_wear_factor = self.state.track.tire_wear_factor();
        if let Some(car) = self.state.cars.get_mut(driver_id) {
            car.drive_lap(&self.resources, track_wear_factor);
        }

        debug!(
            "{} completed lap {} in {:.3}s (race time {:.3}s)",
            driver_id, lap, lap_time, t_line
        );
        events.push(RaceEvent::LapCompleted {
            driver_id: driver_id.to_owned(),
            lap,
            lap_time,
            race_time: t_line,
        });

        if finished {
            info!("{} finished the race after {:.3}s", driver_id, t_line);
            events.push(RaceEvent::DriverFinished {
                driver_id: driver_id.to_owned(),
                race_time: t_line,
            });
            return true;
        }

        let is_player = driver_id == self.state.player_id;
        if !is_player && self.sim.ai_pit_stops {
            self.handle_ai_pit_stop(driver_id, events);
        }

        let t_lap = self.draw_lap_time(driver_id);
        if let Some(idx) = self.state.idx_of(driver_id) {
            self.state.positions[idx].cur_lap_time = t_lap;
        }

        if is_player {
            self.check_decision(events)
        } else {
            false
        }
    }

    fn handle_ai_pit_stop(&mut self, driver_id: &str, events: &mut Vec<RaceEvent>) {
        let service = match self.state.cars.get(driver_id) {
            Some(car)
                if resources::ai_wants_pit(
                    car.tire_wear,
                    car.fuel_level,
                    &self.resources,
                    car.driving_style,
                ) =>
            {
                if car.tire_wear < self.resources.ai_pit_tire_threshold {
                    PitService::Full
                } else {
                    PitService::FuelOnly
                }
            }
            _ => return,
        };

        let pit_stop = PitStop {
            service,
            t_extra: 0.0,
        };
        if let Some(event) = self.perform_pit_stop(driver_id, &pit_stop) {
            events.push(event);
        }
    }

    /// perform_pit_stop services the car and puts the competitor into standstill.
    fn perform_pit_stop(&mut self, driver_id: &str, pit_stop: &PitStop) -> Option<RaceEvent> {
        let idx = self.state.idx_of(driver_id)?;
        let car = self.state.cars.get_mut(driver_id)?;
        car.perform_pitstop(pit_stop.service);

        let t_standstill = pit_stop.service.t_standstill(&self.resources) + pit_stop.t_extra.max(0.0);
        let entry = &mut self.state.positions[idx];
        entry.t_pit_standstill += t_standstill;
        let lap = entry.get_compl_laps();

        if let Some(history) = self.histories.get_mut(driver_id) {
            history.pit_laps.push(lap);
        }

        info!(
            "{} pits after lap {} ({:?}, {:.1}s standstill)",
            driver_id, lap, pit_stop.service, t_standstill
        );
        Some(RaceEvent::PitStop {
            driver_id: driver_id.to_owned(),
            lap,
            service: pit_stop.service,
            t_standstill,
        })
    }

    /// draw_lap_time returns the lap time of the next lap, including the lap time noise.
    fn draw_lap_time(&mut self, driver_id: &str) -> f64 {
        let t_lap = lap_time::lap_time_for(
            &self.state.track,
            &self.lap_time_pars,
            &self.state.drivers,
            &self.state.cars,
            driver_id,
        );
        if !(self.sim.lap_variance > 0.0) || t_lap <= 0.0 {
            return t_lap;
        }

        let consistency = self
            .state
            .drivers
            .get(driver_id)
            .map_or(0.0, |d| d.skill(SkillKind::Consistency));
        let std_dev = self.sim.lap_variance * (1.0 - consistency / 100.0);
        if !(std_dev > 0.0) {
            return t_lap;
        }

        let noise = match Normal::new(0.0, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        };
        (t_lap + noise).max(t_lap * MIN_NOISY_LAP_TIME_FRAC)
    }

    fn update_global_lap(&mut self) {
        let laps: Vec<u32> = self.state.positions.iter().map(|p| p.current_lap).collect();
        self.state.current_lap = max(&laps).unwrap_or(0);
    }

    // ---------------------------------------------------------------------------------------------
    // DECISIONS -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// check_decision runs the decision generator after a player lap. Returns true if a decision
    /// was raised.
    fn check_decision(&mut self, events: &mut Vec<RaceEvent>) -> bool {
        compute_standings(&mut self.state.positions);

        let (position, driver_ahead) = match self.state.idx_of(&self.state.player_id) {
            Some(idx) => (
                self.state.positions[idx].position,
                idx.checked_sub(1)
                    .map(|i| self.state.positions[i].driver_id.to_owned()),
            ),
            None => return false,
        };
        self.state.passing.observe(position, driver_ahead.as_ref());

        let ctx = match self.decision_context() {
            Some(ctx) => ctx,
            None => return false,
        };

        match self.generator.check(&ctx, self.state.last_decision_lap) {
            Some(decision) => {
                info!(
                    "Decision {} required in lap {}: {}",
                    decision.id, ctx.lap, decision.title
                );
                self.state.last_decision_lap = Some(ctx.lap);
                self.state.pending_decision = Some(decision.to_owned());
                events.push(RaceEvent::DecisionRequired(decision));
                true
            }
            None => false,
        }
    }

    fn decision_context(&self) -> Option<DecisionContext> {
        let player_id = &self.state.player_id;
        let entry = self.state.player()?;
        let driver = self.state.drivers.get(player_id)?;
        let car = self.state.cars.get(player_id)?;

        let remaining_laps = self.state.total_laps.saturating_sub(entry.get_compl_laps());
        let laps_to_pit_window =
            resources::laps_to_pit_window(car.fuel_level, &self.resources, car.driving_style)
                .min(remaining_laps);

        Some(DecisionContext {
            lap: entry.current_lap,
            total_laps: self.state.total_laps,
            position: entry.position,
            driver_ahead: self.state.passing.driver_ahead.to_owned(),
            gap_ahead: entry.gap_to_next,
            laps_behind_same_driver: self.state.passing.consecutive_laps,
            tire_wear: car.tire_wear,
            fuel_level: car.fuel_level,
            laps_to_pit_window,
            confidence: driver.mental_state.confidence,
            frustration: driver.mental_state.frustration,
            distraction: driver.mental_state.distraction,
        })
    }

    fn submit_decision(
        &mut self,
        decision_id: u32,
        option_id: &str,
    ) -> Result<DecisionOutcome, InvalidDecisionError> {
        let decision = self
            .state
            .pending_decision
            .as_ref()
            .ok_or(InvalidDecisionError::NoPendingDecision)?;
        if decision.id != decision_id {
            return Err(InvalidDecisionError::DecisionMismatch {
                pending: decision.id,
                submitted: decision_id,
            });
        }
        if option_id != NO_CHOICE_OPTION_ID && decision.option(option_id).is_none() {
            return Err(InvalidDecisionError::UnknownOption {
                decision_id,
                option_id: option_id.to_owned(),
            });
        }

        let player_id = self.state.player_id.to_owned();
        let (driver, car) = match (
            self.state.drivers.get(&player_id),
            self.state.cars.get(&player_id),
        ) {
            (Some(driver), Some(car)) => (driver, car),
            _ => return Err(InvalidDecisionError::PlayerMissing { player_id }),
        };

        let draw = if option_id == NO_CHOICE_OPTION_ID {
            0.0
        } else {
            draw_percentage(&mut self.rng)
        };
        let outcome = evaluator::evaluate(decision, option_id, driver, &driver.mental_state, car, draw)?;

        self.apply_effects(&player_id, &outcome.effects);
        self.state.pending_decision = None;
        self.outcomes.push(outcome.to_owned());

        info!("Decision {} resolved: {}", decision_id, outcome.summary);
        Ok(outcome)
    }

    /// apply_effects is the single mutation path of decision outcomes and pit stop requests.
    fn apply_effects(&mut self, driver_id: &str, effects: &OutcomeEffects) {
        if let Some(driver) = self.state.drivers.get_mut(driver_id) {
            driver.mental_state.apply(&effects.mental);
        }
        if let Some(car) = self.state.cars.get_mut(driver_id) {
            car.apply(&effects.car);
            if let Some(style) = effects.driving_style {
                car.driving_style = style;
            }
        }
        if let Some(pit_stop) = effects.pit_stop.as_ref() {
            if let Some(event) = self.perform_pit_stop(driver_id, pit_stop) {
                self.queued_events.push(event);
            }
        }
        for xp in effects.skill_xp.iter() {
            *self.state.skill_xp.entry(xp.skill).or_insert(0.0) += xp.xp;
        }

        self.shift_position(driver_id, effects.position_delta);

        let t_lap = self.draw_lap_time(driver_id);
        if let Some(idx) = self.state.idx_of(driver_id) {
            self.state.positions[idx].cur_lap_time = t_lap;
        }
        compute_standings(&mut self.state.positions);
    }

    /// shift_position moves a competitor by swapping its lap progress with the neighbour ahead
    /// (delta > 0) or behind (delta < 0). Competitors on different laps are never swapped.
    fn shift_position(&mut self, driver_id: &str, delta: i32) {
        for _ in 0..delta.unsigned_abs() {
            compute_standings(&mut self.state.positions);

            let idx = match self.state.idx_of(driver_id) {
                Some(idx) => idx,
                None => return,
            };
            let other = if delta > 0 {
                idx.checked_sub(1)
            } else {
                Some(idx + 1).filter(|&i| i < self.state.positions.len())
            };
            let other = match other {
                Some(other) => other,
                None => return,
            };

            let (a, b) = (&self.state.positions[idx], &self.state.positions[other]);
            if a.current_lap != b.current_lap || a.finished || b.finished {
                debug!(
                    "Position change of {} skipped, {} is not on the same lap",
                    driver_id, b.driver_id
                );
                return;
            }

            let lap_progress = self.state.positions[idx].lap_progress;
            self.state.positions[idx].lap_progress = self.state.positions[other].lap_progress;
            self.state.positions[other].lap_progress = lap_progress;
        }
    }

    fn request_pit_stop(&mut self, driver_id: &str, service: PitService) -> bool {
        match self.state.competitor(driver_id) {
            Some(entry) if !entry.finished => {}
            Some(_) => {
                debug!("Pit stop request for {} ignored, driver finished", driver_id);
                return false;
            }
            None => {
                warn!("Pit stop requested for unknown driver {}", driver_id);
                return false;
            }
        }

        let effects = OutcomeEffects {
            pit_stop: Some(PitStop {
                service,
                t_extra: 0.0,
            }),
            ..OutcomeEffects::default()
        };
        self.apply_effects(driver_id, &effects);
        true
    }

    // ---------------------------------------------------------------------------------------------
    // RESULTS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn get_race_result(&self) -> RaceResult {
        let classification: Vec<ClassificationEntry> = self
            .state
            .positions
            .iter()
            .map(|p| {
                let driver = self.state.drivers.get(&p.driver_id);
                ClassificationEntry {
                    position: p.position,
                    driver_id: p.driver_id.to_owned(),
                    driver_name: driver.map_or_else(|| p.driver_id.to_owned(), |d| d.name.to_owned()),
                    is_player: p.driver_id == self.state.player_id,
                    laps_completed: p.get_compl_laps(),
                    finish_time: p.finish_time,
                    gap_to_leader: p.gap_to_leader,
                    pit_stops: self
                        .histories
                        .get(&p.driver_id)
                        .map_or(0, |h| h.pit_laps.len() as u32),
                }
            })
            .collect();

        let histories = self
            .state
            .positions
            .iter()
            .map(|p| self.histories.get(&p.driver_id).cloned().unwrap_or_default())
            .collect();

        RaceResult {
            track_name: self.state.track.name.to_owned(),
            tot_no_laps: self.state.total_laps,
            classification,
            histories,
            decisions: self.outcomes.to_owned(),
            skill_xp: self.state.skill_xp.to_owned(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::driver::MentalState;
    use crate::core::track::tests::short_oval_pars;
    use crate::decision::{DecisionKind, OutcomeResult};
    use approx::assert_relative_eq;

    pub(crate) fn driver_pars(id: &str, is_player: bool) -> DriverPars {
        DriverPars {
            id: id.to_owned(),
            name: id.to_uppercase(),
            is_player,
            skills: Default::default(),
            mental_state: MentalState::default(),
        }
    }

    pub(crate) fn test_config(tot_no_laps: u32) -> RaceConfig {
        RaceConfig {
            track: short_oval_pars(tot_no_laps),
            drivers: vec![
                driver_pars("p1", true),
                driver_pars("ai1", false),
                driver_pars("ai2", false),
            ],
            resources: ResourcePars::default(),
            lap_time: LapTimePars::default(),
            sim: SimSettings::default(),
        }
    }

    fn running_race(tot_no_laps: u32) -> Race {
        let mut race = Race::new();
        race.initialize(&test_config(tot_no_laps)).unwrap();
        race.start();
        race
    }

    #[test]
    fn uninitialized_race_ignores_control_operations() {
        let mut race = Race::new();
        race.start();
        race.pause();
        race.resume();
        assert!(race.advance(Duration::from_secs(10)).is_empty());
        assert_eq!(race.status(), RaceStatus::Uninitialized);
        assert!(race.get_state().is_none());
        assert_eq!(race.lap_time_for("p1"), 0.0);
        assert_eq!(
            race.submit_decision(1, "pit_now"),
            Err(InvalidDecisionError::NoPendingDecision)
        );
    }

    #[test]
    fn initialize_rejects_bad_configurations() {
        let mut race = Race::new();

        let mut config = test_config(10);
        config.drivers.clear();
        assert_eq!(race.initialize(&config), Err(ConfigurationError::NoDrivers));

        let mut config = test_config(10);
        config.drivers[1].is_player = true;
        assert_eq!(
            race.initialize(&config),
            Err(ConfigurationError::PlayerCount { found: 2 })
        );

        let mut config = test_config(10);
        config.drivers[2].id = "ai1".to_owned();
        assert_eq!(
            race.initialize(&config),
            Err(ConfigurationError::DuplicateDriver("ai1".to_owned()))
        );

        let mut config = test_config(10);
        config.lap_time.fuel_starvation_loss = vec![0.03];
        assert_eq!(
            race.initialize(&config),
            Err(ConfigurationError::FuelCurveLength {
                levels: 3,
                losses: 1
            })
        );

        assert_eq!(race.status(), RaceStatus::Uninitialized);
    }

    #[test]
    fn failed_reinitialization_keeps_the_running_race() {
        let mut race = running_race(10);
        race.advance(Duration::from_secs(5));
        let before = race.get_state();

        let mut config = test_config(10);
        config.track.sections.clear();
        assert!(race.initialize(&config).is_err());
        assert_eq!(race.get_state(), before);
    }

    #[test]
    fn start_puts_everybody_on_lap_one() {
        let race = running_race(10);
        let state = race.get_state().unwrap();
        assert_eq!(state.status, RaceStatus::Running);
        assert_eq!(state.current_lap, 1);
        assert!(state.positions.iter().all(|p| p.current_lap == 1));
        let ranks: Vec<u32> = state.positions.iter().map(|p| p.position).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn advance_before_start_is_ignored() {
        let mut race = Race::new();
        race.initialize(&test_config(10)).unwrap();
        let before = race.get_state();
        assert!(race.advance(Duration::from_secs(3)).is_empty());
        assert_eq!(race.get_state(), before);
    }

    #[test]
    fn pause_before_start_resumes_to_initialized() {
        let mut race = Race::new();
        race.initialize(&test_config(10)).unwrap();
        race.pause();
        assert_eq!(race.status(), RaceStatus::Paused);
        race.start();
        assert_eq!(race.status(), RaceStatus::Paused);
        race.resume();
        assert_eq!(race.status(), RaceStatus::Initialized);
        race.start();
        assert_eq!(race.status(), RaceStatus::Running);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut race = running_race(10);
        race.resume();
        assert_eq!(race.status(), RaceStatus::Running);
        race.pause();
        race.pause();
        assert_eq!(race.status(), RaceStatus::Paused);
        race.resume();
        assert_eq!(race.status(), RaceStatus::Running);
    }

    #[test]
    fn advancing_while_paused_changes_nothing() {
        let mut race = running_race(10);
        race.advance(Duration::from_millis(7300));
        race.pause();
        let before = race.get_state();
        assert!(race.advance(Duration::from_secs(100)).is_empty());
        assert_eq!(race.get_state(), before);
    }

    #[test]
    fn lap_progress_is_integrated_with_the_lap_time() {
        let mut race = running_race(10);
        let t_lap = race.lap_time_for("p1");
        assert_relative_eq!(t_lap, 15.4, epsilon = 1e-9);

        race.advance(Duration::from_secs_f64(t_lap / 4.0));
        let state = race.get_state().unwrap();
        let player = state.player().unwrap();
        assert_relative_eq!(player.lap_progress, 0.25, epsilon = 1e-6);
        assert_eq!(player.current_lap, 1);
    }

    #[test]
    fn lap_completion_wears_the_car_and_records_the_lap() {
        let mut race = running_race(10);
        let events = race.advance(Duration::from_secs_f64(16.0));

        let laps_completed = events
            .iter()
            .filter(|e| matches!(e, RaceEvent::LapCompleted { .. }))
            .count();
        assert_eq!(laps_completed, 3);

        let state = race.get_state().unwrap();
        assert_eq!(state.current_lap, 2);
        let car = &state.cars["p1"];
        assert!(car.tire_wear < 100.0);
        assert!(car.fuel_level < 100.0);
        assert_eq!(car.laps_since_pit, 1);

        let player = state.player().unwrap();
        assert_relative_eq!(player.last_lap_time, 15.4, epsilon = 1e-6);
        assert_relative_eq!(player.lap_progress, 0.6 / player.cur_lap_time, epsilon = 1e-6);
    }

    #[test]
    fn one_lap_race_completes_within_one_advance() {
        let mut race = running_race(1);
        let events = race.advance(Duration::from_millis(15500));

        assert!(race.is_completed());
        assert!(race.get_all_finished());
        assert!(matches!(events.last(), Some(RaceEvent::RaceCompleted { .. })));

        let state = race.get_state().unwrap();
        assert!(state.completed);
        assert!(state.positions.iter().all(|p| p.current_lap == 1 && p.finished));
        assert!(state.cars.values().all(|c| c.tire_wear < 100.0 && c.fuel_level < 100.0));

        // completed races do not move any more
        assert!(race.advance(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn unknown_driver_has_zero_lap_time() {
        let race = running_race(10);
        assert_eq!(race.lap_time_for("nobody"), 0.0);
    }

    #[test]
    fn requested_pit_stop_freezes_progress_for_the_standstill() {
        let mut race = running_race(10);
        race.advance(Duration::from_secs(2));
        assert!(race.request_pit_stop("ai1", PitService::Full));
        assert!(!race.request_pit_stop("nobody", PitService::Full));

        let before = race.get_state().unwrap().competitor("ai1").unwrap().lap_progress;
        let events = race.advance(Duration::from_secs(5));
        assert!(events
            .iter()
            .any(|e| matches!(e, RaceEvent::PitStop { driver_id, .. } if driver_id == "ai1")));

        let state = race.get_state().unwrap();
        let ai1 = state.competitor("ai1").unwrap();
        assert_eq!(ai1.lap_progress, before);
        assert_relative_eq!(ai1.t_pit_standstill, 7.0, epsilon = 1e-9);
        assert!(state.player().unwrap().lap_progress > before);
    }

    #[test]
    fn frustrated_player_gets_a_mental_state_decision() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();

        let events = race.advance(Duration::from_secs(16));
        let decision = events
            .iter()
            .find_map(|e| match e {
                RaceEvent::DecisionRequired(d) => Some(d.to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(decision.kind, DecisionKind::MentalState);
        assert_eq!(decision.context.lap, 2);

        let state = race.get_state().unwrap();
        assert_eq!(state.last_decision_lap, Some(2));
        assert_eq!(state.pending_decision.as_ref(), Some(&decision));
    }

    #[test]
    fn player_only_gate_lets_the_ai_continue() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));

        let before = race.get_state().unwrap();
        race.advance(Duration::from_secs(5));
        let after = race.get_state().unwrap();

        let (player_before, player_after) = (before.player().unwrap(), after.player().unwrap());
        assert_eq!(player_after.current_lap, player_before.current_lap);
        assert_eq!(player_after.lap_progress, player_before.lap_progress);
        assert_eq!(after.cars["p1"], before.cars["p1"]);
        assert!(
            after.competitor("ai1").unwrap().lap_progress
                > before.competitor("ai1").unwrap().lap_progress
        );
        assert!(after.race_time > before.race_time);
    }

    #[test]
    fn full_gate_freezes_the_whole_race() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        config.sim.player_only_gate = false;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));

        let before = race.get_state();
        assert!(race.advance(Duration::from_secs(5)).is_empty());
        assert_eq!(race.get_state(), before);
    }

    #[test]
    fn invalid_submissions_leave_the_state_unchanged() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));
        let decision_id = race.pending_decision().unwrap().id;
        let before = race.get_state();

        assert_eq!(
            race.submit_decision(decision_id + 1, "breathe"),
            Err(InvalidDecisionError::DecisionMismatch {
                pending: decision_id,
                submitted: decision_id + 1
            })
        );
        assert!(matches!(
            race.submit_decision(decision_id, "pit_now"),
            Err(InvalidDecisionError::UnknownOption { .. })
        ));
        assert_eq!(race.get_state(), before);
    }

    #[test]
    fn submitted_decision_applies_effects_and_clears_the_gate() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));
        let decision_id = race.pending_decision().unwrap().id;

        let outcome = race.submit_decision(decision_id, "breathe").unwrap();
        let state = race.get_state().unwrap();
        assert!(state.pending_decision.is_none());
        assert_eq!(
            race.submit_decision(decision_id, "breathe"),
            Err(InvalidDecisionError::NoPendingDecision)
        );

        let frustration = state.drivers["p1"].mental_state.frustration;
        match outcome.result {
            OutcomeResult::Success => assert_relative_eq!(frustration, 75.0),
            OutcomeResult::Neutral => assert_relative_eq!(frustration, 85.0),
            OutcomeResult::Failure => assert_relative_eq!(frustration, 95.0),
        }
        assert!(state.skill_xp.get(&SkillKind::Composure).copied().unwrap_or(0.0) > 0.0);

        let lap_progress = state.player().unwrap().lap_progress;
        race.advance(Duration::from_secs(1));
        assert!(race.get_state().unwrap().player().unwrap().lap_progress > lap_progress);
    }

    #[test]
    fn submission_without_player_car_is_rejected() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.frustration = 85.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));
        let decision_id = race.pending_decision().unwrap().id;

        let session = race.session.as_mut().unwrap();
        session.state.cars.remove("p1");
        assert_eq!(
            race.submit_decision(decision_id, "breathe"),
            Err(InvalidDecisionError::PlayerMissing {
                player_id: "p1".to_owned()
            })
        );
        assert!(race.pending_decision().is_some());
    }

    #[test]
    fn no_choice_resolves_without_effects() {
        let mut config = test_config(30);
        config.drivers[0].mental_state.distraction = 75.0;
        let mut race = Race::new();
        race.initialize(&config).unwrap();
        race.start();
        race.advance(Duration::from_secs(16));
        let decision_id = race.pending_decision().unwrap().id;
        let mental_before = race.get_state().unwrap().drivers["p1"].mental_state.to_owned();

        let outcome = race.submit_decision(decision_id, NO_CHOICE_OPTION_ID).unwrap();
        assert_eq!(outcome.result, OutcomeResult::Neutral);
        assert_eq!(race.get_state().unwrap().drivers["p1"].mental_state, mental_before);
        assert!(race.pending_decision().is_none());
    }

    #[test]
    fn position_shift_swaps_with_the_car_ahead_on_the_same_lap() {
        let mut race = running_race(10);
        race.advance(Duration::from_secs(3));
        let session = race.session.as_mut().unwrap();
        session.state.positions.iter_mut().for_each(|p| {
            p.lap_progress = match p.driver_id.as_str() {
                "ai1" => 0.5,
                "ai2" => 0.4,
                _ => 0.3,
            }
        });
        compute_standings(&mut session.state.positions);

        session.shift_position("p1", 1);
        compute_standings(&mut session.state.positions);
        let order: Vec<&str> = session.state.positions.iter().map(|p| p.driver_id.as_str()).collect();
        assert_eq!(order, vec!["ai1", "p1", "ai2"]);

        session.shift_position("p1", -2);
        compute_standings(&mut session.state.positions);
        let order: Vec<&str> = session.state.positions.iter().map(|p| p.driver_id.as_str()).collect();
        assert_eq!(order, vec!["ai1", "ai2", "p1"]);
    }

    #[test]
    fn position_shift_never_crosses_laps() {
        let mut race = running_race(10);
        let session = race.session.as_mut().unwrap();
        for p in session.state.positions.iter_mut() {
            if p.driver_id == "ai1" {
                p.current_lap = 2;
            }
        }
        compute_standings(&mut session.state.positions);
        let before = session.state.positions.to_owned();

        session.shift_position("p1", 2);
        compute_standings(&mut session.state.positions);
        let order: Vec<&str> = session.state.positions.iter().map(|p| p.driver_id.as_str()).collect();
        assert_eq!(order[0], "ai1");
        assert_eq!(before[0].driver_id, "ai1");
    }

    #[test]
    fn passing_tracker_counts_laps_behind_the_same_driver() {
        let mut tracker = PassingTracker::default();
        let ahead = "ai1".to_owned();
        tracker.observe(2, Some(&ahead));
        tracker.observe(2, Some(&ahead));
        assert_eq!(tracker.consecutive_laps, 2);

        tracker.observe(3, Some(&ahead));
        assert_eq!(tracker.consecutive_laps, 1);
        tracker.observe(1, None);
        assert_eq!(tracker.consecutive_laps, 0);
        assert_eq!(tracker.driver_ahead, None);
    }

    #[test]
    fn race_result_lists_all_drivers_in_order() {
        let mut race = running_race(2);
        race.advance(Duration::from_secs(40));
        assert!(race.is_completed());

        let result = race.get_race_result().unwrap();
        assert_eq!(result.classification.len(), 3);
        assert!(result.histories.iter().all(|h| h.laptimes.len() == 2));
        let positions: Vec<u32> = result.classification.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(result.classification.iter().any(|e| e.is_player));
    }
}
