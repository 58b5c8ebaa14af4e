use crate::core::driver::{DriverId, SkillKind};
use crate::decision::DecisionOutcome;
use anyhow::Context;
use helpers::general::{argsort, SortOrder};
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// LapHistory records the measured lap times and cumulative race times (s) of one competitor.
/// Entry i belongs to lap i + 1.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct LapHistory {
    pub laptimes: Vec<f64>,
    pub racetimes: Vec<f64>,
    pub pit_laps: Vec<u32>,
}

impl LapHistory {
    pub fn best_lap(&self) -> Option<f64> {
        self.laptimes
            .iter()
            .copied()
            .fold(None, |best, t| match best {
                Some(b) if b <= t => Some(b),
                _ => Some(t),
            })
    }
}

/// ClassificationEntry is one line of the final classification.
///
/// * `laps_completed` - Number of completed laps
/// * `finish_time` - (s) Race time at the finish line, None if the driver did not finish
/// * `gap_to_leader` - (s) Gap to the winner
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassificationEntry {
    pub position: u32,
    pub driver_id: DriverId,
    pub driver_name: String,
    pub is_player: bool,
    pub laps_completed: u32,
    pub finish_time: Option<f64>,
    pub gap_to_leader: f64,
    pub pit_stops: u32,
}

/// RaceResult contains all race information that is required for post-processing the results.
/// Lap histories are stored in classification order.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub track_name: String,
    pub tot_no_laps: u32,
    pub classification: Vec<ClassificationEntry>,
    pub histories: Vec<LapHistory>,
    pub decisions: Vec<DecisionOutcome>,
    pub skill_xp: BTreeMap<SkillKind, f64>,
}

#[derive(Debug, Serialize)]
struct LapRecord<'a> {
    driver_id: &'a str,
    lap: u32,
    lap_time: f64,
    race_time: f64,
    pit_stop: bool,
}

impl RaceResult {
    /// fastest_laps returns the best lap of every driver that completed at least one lap, fastest
    /// first.
    pub fn fastest_laps(&self) -> Vec<(DriverId, f64)> {
        let best: Vec<(DriverId, f64)> = self
            .classification
            .iter()
            .zip(self.histories.iter())
            .filter_map(|(entry, history)| Some((entry.driver_id.to_owned(), history.best_lap()?)))
            .collect();
        let times: Vec<f64> = best.iter().map(|(_, t)| *t).collect();

        argsort(&times, SortOrder::Ascending)
            .into_iter()
            .map(|i| best[i].to_owned())
            .collect()
    }

    /// format_lap_and_race_times returns the lap and race time tables, one row per lap and one
    /// column per driver. Laps a driver did not complete are printed as "-".
    pub fn format_lap_and_race_times(&self) -> Result<String, std::fmt::Error> {
        let mut header = String::from("lap");
        for entry in self.classification.iter() {
            write!(&mut header, ", {:>10}", entry.driver_id)?;
        }

        let mut laptimes = String::new();
        let mut racetimes = String::new();
        for lap in 0..self.tot_no_laps as usize {
            write!(&mut laptimes, "{:3}", lap + 1)?;
            write!(&mut racetimes, "{:3}", lap + 1)?;

            for history in self.histories.iter() {
                match (history.laptimes.get(lap), history.racetimes.get(lap)) {
                    (Some(t_lap), Some(t_race)) => {
                        write!(&mut laptimes, ", {:9.3}s", t_lap)?;
                        write!(&mut racetimes, ", {:9.3}s", t_race)?;
                    }
                    _ => {
                        write!(&mut laptimes, ", {:>10}", "-")?;
                        write!(&mut racetimes, ", {:>10}", "-")?;
                    }
                }
            }
            writeln!(&mut laptimes)?;
            writeln!(&mut racetimes)?;
        }

        let mut content = String::new();
        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "{}", header)?;
        write!(&mut content, "{}", laptimes)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "{}", header)?;
        write!(&mut content, "{}", racetimes)?;
        Ok(content)
    }

    /// format_classification returns the final classification table.
    pub fn format_classification(&self) -> Result<String, std::fmt::Error> {
        let mut content = String::new();
        writeln!(&mut content, "RESULT: Classification ({})", self.track_name)?;
        writeln!(&mut content, "pos, driver              , laps,       time,      gap, pits")?;

        for entry in self.classification.iter() {
            let name = if entry.is_player {
                format!("{} (you)", entry.driver_name)
            } else {
                entry.driver_name.to_owned()
            };
            let time = match entry.finish_time {
                Some(t) => format!("{:9.3}s", t),
                None => "       DNF".to_owned(),
            };
            writeln!(
                &mut content,
                "{:3}, {:20}, {:4}, {}, {:7.3}s, {:4}",
                entry.position, name, entry.laps_completed, time, entry.gap_to_leader, entry.pit_stops
            )?;
        }
        Ok(content)
    }

    /// print_lap_and_race_times prints the resulting lap and race times to the console output.
    pub fn print_lap_and_race_times(&self) {
        match self.format_lap_and_race_times() {
            Ok(content) => print!("{}", content),
            Err(e) => warn!("Could not format lap and race times: {}", e),
        }
    }

    /// print_classification prints the final classification and the decision summary.
    pub fn print_classification(&self) {
        match self.format_classification() {
            Ok(content) => print!("{}", content),
            Err(e) => warn!("Could not format classification: {}", e),
        }

        if !self.decisions.is_empty() {
            println!("RESULT: Decisions");
            for outcome in self.decisions.iter() {
                println!("{:3}: {}", outcome.decision_id, outcome.summary);
            }
        }
    }

    /// write_lap_and_race_times_to_file writes the lap and race time tables to a text file.
    pub fn write_lap_and_race_times_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = self
            .format_lap_and_race_times()
            .context("Failed to format lap and race times!")?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .context(format!("Failed to create output directory {}!", dir.display()))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)
            .context(format!("Failed to open output file {}!", path.display()))?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// write_csv exports one row per driver and completed lap.
    pub fn write_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .context(format!("Failed to create CSV file {}!", path.display()))?;

        for (entry, history) in self.classification.iter().zip(self.histories.iter()) {
            for (i, (lap_time, race_time)) in history
                .laptimes
                .iter()
                .zip(history.racetimes.iter())
                .enumerate()
            {
                let lap = i as u32 + 1;
                writer.serialize(LapRecord {
                    driver_id: &entry.driver_id,
                    lap,
                    lap_time: *lap_time,
                    race_time: *race_time,
                    pit_stop: history.pit_laps.contains(&lap),
                })?;
            }
        }

        writer
            .flush()
            .context(format!("Failed to write CSV file {}!", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_driver_result() -> RaceResult {
        let entry = |position, id: &str, finish_time: Option<f64>| ClassificationEntry {
            position,
            driver_id: id.to_owned(),
            driver_name: id.to_uppercase(),
            is_player: id == "p1",
            laps_completed: if finish_time.is_some() { 2 } else { 1 },
            finish_time,
            gap_to_leader: 0.0,
            pit_stops: 0,
        };
        RaceResult {
            track_name: "Bristol".to_owned(),
            tot_no_laps: 2,
            classification: vec![entry(1, "ai1", Some(30.5)), entry(2, "p1", None)],
            histories: vec![
                LapHistory {
                    laptimes: vec![15.5, 15.0],
                    racetimes: vec![15.5, 30.5],
                    pit_laps: vec![2],
                },
                LapHistory {
                    laptimes: vec![15.2],
                    racetimes: vec![15.2],
                    pit_laps: vec![],
                },
            ],
            decisions: vec![],
            skill_xp: BTreeMap::new(),
        }
    }

    #[test]
    fn tables_mark_missing_laps() {
        let content = two_driver_result().format_lap_and_race_times().unwrap();
        assert!(content.starts_with("RESULT: Lap times"));
        assert!(content.contains("15.500s"));
        assert!(content.contains("-"));
        assert!(content.contains("RESULT: Race times"));
    }

    #[test]
    fn classification_flags_the_player_and_dnf() {
        let content = two_driver_result().format_classification().unwrap();
        assert!(content.contains("P1 (you)"));
        assert!(content.contains("DNF"));
    }

    #[test]
    fn fastest_laps_are_sorted() {
        let fastest = two_driver_result().fastest_laps();
        assert_eq!(fastest[0], ("ai1".to_owned(), 15.0));
        assert_eq!(fastest[1], ("p1".to_owned(), 15.2));
    }

    #[test]
    fn csv_has_one_row_per_completed_lap() {
        let path = std::env::temp_dir().join(format!("enduro_result_{}.csv", std::process::id()));
        two_driver_result().write_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][0], "ai1");
        assert_eq!(&rows[1][4], "true");
        assert_eq!(&rows[2][0], "p1");
    }
}
