#![allow(dead_code)]

use enduro::core::driver::{DriverPars, MentalState, Skills};
use enduro::core::lap_time::LapTimePars;
use enduro::core::race::{RaceConfig, SimSettings};
use enduro::core::resources::ResourcePars;
use enduro::core::track::{SectionPars, SectionType, TrackPars};

/// Half-mile oval with a 15.4s reference lap.
pub fn oval(tot_no_laps: u32) -> TrackPars {
    let section = |section_type, length, banking| SectionPars {
        section_type,
        length,
        banking,
    };
    TrackPars {
        id: "bristol".to_owned(),
        name: "Bristol Motor Speedway".to_owned(),
        length: 858.0,
        t_base: 15.4,
        grip: 1.0,
        surface_abrasion: 1.0,
        tot_no_laps,
        sections: vec![
            section(SectionType::Straight, 198.0, 5.0),
            section(SectionType::Turn, 231.0, 26.0),
            section(SectionType::Straight, 198.0, 5.0),
            section(SectionType::Turn, 231.0, 26.0),
        ],
    }
}

pub fn driver(id: &str, is_player: bool) -> DriverPars {
    DriverPars {
        id: id.to_owned(),
        name: id.to_uppercase(),
        is_player,
        skills: Skills::default(),
        mental_state: MentalState::default(),
    }
}

/// One player and two AI drivers, all with average skills.
pub fn config(tot_no_laps: u32) -> RaceConfig {
    RaceConfig {
        track: oval(tot_no_laps),
        drivers: vec![driver("p1", true), driver("ai1", false), driver("ai2", false)],
        resources: ResourcePars::default(),
        lap_time: LapTimePars::default(),
        sim: SimSettings::default(),
    }
}
