use crate::core::driver::DriverId;
use serde::Serialize;
use std::cmp::Ordering;

/// CompetitorProgress tracks the race progress of one driver.
///
/// * `current_lap` - Lap currently driven (1-based, 0 before the start, capped at the total number
///   of laps)
/// * `lap_progress` - Fraction of the current lap already driven in [0.0, 1.0]
/// * `position` - Rank in the standings (1-based)
/// * `gap_to_leader` - (s) Time gap to the leader
/// * `gap_to_next` - (s) Time gap to the competitor directly ahead
/// * `last_lap_time` - (s) Measured time of the last completed lap (0.0 before the first one)
/// * `cur_lap_time` - (s) Lap time currently used to integrate the lap progress
/// * `t_pit_standstill` - (s) Remaining pit standstill time, progress is frozen while positive
/// * `finished` - True once the final lap is completed
/// * `finish_time` - (s) Race time at which the final lap was completed
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CompetitorProgress {
    pub driver_id: DriverId,
    pub current_lap: u32,
    pub lap_progress: f64,
    pub position: u32,
    pub gap_to_leader: f64,
    pub gap_to_next: f64,
    pub last_lap_time: f64,
    pub cur_lap_time: f64,
    pub t_pit_standstill: f64,
    pub finished: bool,
    pub finish_time: Option<f64>,
}

impl CompetitorProgress {
    pub fn new(driver_id: DriverId, position: u32, cur_lap_time: f64) -> CompetitorProgress {
        CompetitorProgress {
            driver_id,
            current_lap: 0,
            lap_progress: 0.0,
            position,
            gap_to_leader: 0.0,
            gap_to_next: 0.0,
            last_lap_time: 0.0,
            cur_lap_time,
            t_pit_standstill: 0.0,
            finished: false,
            finish_time: None,
        }
    }

    /// get_race_prog returns the total race distance covered in laps.
    pub fn get_race_prog(&self) -> f64 {
        self.current_lap.saturating_sub(1) as f64 + self.lap_progress
    }

    /// get_compl_laps returns the number of completed laps.
    pub fn get_compl_laps(&self) -> u32 {
        if self.finished {
            self.current_lap
        } else {
            self.current_lap.saturating_sub(1)
        }
    }
}

/// cmp_race_order orders two competitors: more race distance first, finished competitors by finish
/// time, the driver id as final tie-breaker.
fn cmp_race_order(a: &CompetitorProgress, b: &CompetitorProgress) -> Ordering {
    b.get_race_prog()
        .total_cmp(&a.get_race_prog())
        .then_with(|| match (a.finish_time, b.finish_time) {
            (Some(t_a), Some(t_b)) => t_a.total_cmp(&t_b),
            _ => Ordering::Equal,
        })
        .then_with(|| a.driver_id.cmp(&b.driver_id))
}

/// calc_gap returns the time gap of `rear` behind `front`.
fn calc_gap(front: &CompetitorProgress, rear: &CompetitorProgress) -> f64 {
    match (front.finish_time, rear.finish_time) {
        (Some(t_front), Some(t_rear)) => (t_rear - t_front).max(0.0),
        _ => ((front.get_race_prog() - rear.get_race_prog()) * rear.cur_lap_time).max(0.0),
    }
}

/// compute_standings sorts the competitors into race order, assigns the positions 1..N and derives
/// the gaps. Calling it twice without a state change in between yields identical output.
pub fn compute_standings(positions: &mut [CompetitorProgress]) {
    positions.sort_by(cmp_race_order);

    for i in 0..positions.len() {
        let (gap_to_leader, gap_to_next) = if i == 0 {
            (0.0, 0.0)
        } else {
            (
                calc_gap(&positions[0], &positions[i]),
                calc_gap(&positions[i - 1], &positions[i]),
            )
        };

        let entry = &mut positions[i];
        entry.position = i as u32 + 1;
        entry.gap_to_leader = gap_to_leader;
        entry.gap_to_next = gap_to_next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn progress(id: &str, current_lap: u32, lap_progress: f64) -> CompetitorProgress {
        CompetitorProgress {
            current_lap,
            lap_progress,
            ..CompetitorProgress::new(id.to_owned(), 0, 20.0)
        }
    }

    #[test]
    fn orders_by_distance_and_assigns_positions() {
        let mut positions = vec![
            progress("a", 3, 0.2),
            progress("b", 3, 0.7),
            progress("c", 4, 0.1),
        ];
        compute_standings(&mut positions);

        let order: Vec<_> = positions.iter().map(|p| p.driver_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        let ranks: Vec<_> = positions.iter().map(|p| p.position).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn equal_distance_is_broken_by_driver_id() {
        let mut positions = vec![progress("zed", 2, 0.5), progress("amy", 2, 0.5)];
        compute_standings(&mut positions);
        assert_eq!(positions[0].driver_id, "amy");
        assert_eq!(positions[1].driver_id, "zed");
    }

    #[test]
    fn finished_competitors_are_ordered_by_finish_time() {
        let mut early = progress("b", 5, 1.0);
        early.finished = true;
        early.finish_time = Some(100.0);
        let mut late = progress("a", 5, 1.0);
        late.finished = true;
        late.finish_time = Some(101.5);

        let mut positions = vec![late, early];
        compute_standings(&mut positions);
        assert_eq!(positions[0].driver_id, "b");
        assert_relative_eq!(positions[1].gap_to_leader, 1.5);
    }

    #[test]
    fn gaps_follow_distance_and_lap_time() {
        let mut positions = vec![
            progress("a", 1, 0.5),
            progress("b", 1, 0.25),
            progress("c", 1, 0.2),
        ];
        compute_standings(&mut positions);

        assert_eq!(positions[0].gap_to_leader, 0.0);
        assert_relative_eq!(positions[1].gap_to_leader, 5.0);
        assert_relative_eq!(positions[2].gap_to_leader, 6.0, epsilon = 1e-9);
        assert_relative_eq!(positions[2].gap_to_next, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let mut positions = vec![
            progress("a", 2, 0.3),
            progress("b", 2, 0.3),
            progress("c", 1, 0.9),
        ];
        compute_standings(&mut positions);
        let first = positions.clone();
        compute_standings(&mut positions);
        assert_eq!(first, positions);
    }
}
