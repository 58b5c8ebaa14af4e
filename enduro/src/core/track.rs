use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Banking (deg) below which a turn counts as a flat road-course corner.
const FLAT_TURN_BANKING: f64 = 5.0;
/// Minimum number of flat turns that make a track a road course.
const ROAD_COURSE_MIN_FLAT_TURNS: usize = 4;
/// (m) Tracks shorter than this are short tracks.
const SHORT_TRACK_MAX_LENGTH: f64 = 1000.0;
/// (m) Tracks longer than this are superspeedways.
const SUPERSPEEDWAY_MIN_LENGTH: f64 = 3500.0;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Straight,
    Turn,
    Transition,
}

/// * `section_type` - Straight, turn or transition
/// * `length` - (m) Length of the section
/// * `banking` - (deg) Banking angle of the section
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SectionPars {
    pub section_type: SectionType,
    pub length: f64,
    #[serde(default)]
    pub banking: f64,
}

/// * `id` - Track identifier, e.g. bristol
/// * `name` - Track name, e.g. Bristol Motor Speedway
/// * `length` - (m) Length of the track
/// * `t_base` - (s) Reference lap time of an average driver on fresh tires
/// * `grip` - Grip factor (1.0 = nominal), more grip means more tire load
/// * `surface_abrasion` - Abrasiveness of the surface (1.0 = nominal)
/// * `tot_no_laps` - Total number of race laps
/// * `sections` - Ordered list of track sections starting at the finish line
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackPars {
    pub id: String,
    pub name: String,
    pub length: f64,
    pub t_base: f64,
    #[serde(default = "default_factor")]
    pub grip: f64,
    #[serde(default = "default_factor")]
    pub surface_abrasion: f64,
    pub tot_no_laps: u32,
    pub sections: Vec<SectionPars>,
}

fn default_factor() -> f64 {
    1.0
}

/// TrackType selects the skill weighting used for the lap-time skill composite.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    ShortTrack,
    Intermediate,
    Superspeedway,
    RoadCourse,
}

/// Track is the immutable race track descriptor. It is built once during race initialization and
/// never mutated afterwards.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub length: f64,
    pub t_base: f64,
    pub grip: f64,
    pub surface_abrasion: f64,
    pub tot_no_laps: u32,
    pub sections: Vec<SectionPars>,
    pub track_type: TrackType,
    pub turns_lap_frac: f64,
    pub avg_banking: f64,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> Result<Track, ConfigurationError> {
        if track_pars.sections.is_empty() {
            return Err(ConfigurationError::NoSections {
                track_id: track_pars.id.to_owned(),
            });
        }

        let positive_checks = [
            ("length", track_pars.length),
            ("t_base", track_pars.t_base),
            ("grip", track_pars.grip),
            ("surface_abrasion", track_pars.surface_abrasion),
        ];
        for (field, value) in positive_checks {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigurationError::NonPositiveTrackValue {
                    track_id: track_pars.id.to_owned(),
                    field,
                    value,
                });
            }
        }
        if let Some(section) = track_pars.sections.iter().find(|s| !(s.length > 0.0)) {
            return Err(ConfigurationError::NonPositiveTrackValue {
                track_id: track_pars.id.to_owned(),
                field: "section length",
                value: section.length,
            });
        }
        if track_pars.tot_no_laps == 0 {
            return Err(ConfigurationError::NoLaps {
                track_id: track_pars.id.to_owned(),
            });
        }

        // calculate turn lap fraction and length-weighted banking
        let len_sections: f64 = track_pars.sections.iter().map(|s| s.length).sum();
        let len_turns: f64 = track_pars
            .sections
            .iter()
            .filter(|s| s.section_type == SectionType::Turn)
            .map(|s| s.length)
            .sum();
        let avg_banking = track_pars
            .sections
            .iter()
            .map(|s| s.banking * s.length)
            .sum::<f64>()
            / len_sections;

        Ok(Track {
            id: track_pars.id.to_owned(),
            name: track_pars.name.to_owned(),
            length: track_pars.length,
            t_base: track_pars.t_base,
            grip: track_pars.grip,
            surface_abrasion: track_pars.surface_abrasion,
            tot_no_laps: track_pars.tot_no_laps,
            sections: track_pars.sections.to_owned(),
            track_type: classify(track_pars),
            turns_lap_frac: len_turns / len_sections,
            avg_banking,
        })
    }

    /// The method returns the factor applied to the baseline tire wear per lap on this track.
    pub fn tire_wear_factor(&self) -> f64 {
        self.grip * self.surface_abrasion
    }
}

fn classify(track_pars: &TrackPars) -> TrackType {
    let flat_turns = track_pars
        .sections
        .iter()
        .filter(|s| s.section_type == SectionType::Turn && s.banking.abs() < FLAT_TURN_BANKING)
        .count();

    if flat_turns >= ROAD_COURSE_MIN_FLAT_TURNS {
        TrackType::RoadCourse
    } else if track_pars.length < SHORT_TRACK_MAX_LENGTH {
        TrackType::ShortTrack
    } else if track_pars.length > SUPERSPEEDWAY_MIN_LENGTH {
        TrackType::Superspeedway
    } else {
        TrackType::Intermediate
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Half-mile high-banked oval with a ~15.4s reference lap.
    pub(crate) fn short_oval_pars(tot_no_laps: u32) -> TrackPars {
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

    #[test]
    fn short_oval_is_classified_and_measured() {
        let track = Track::new(&short_oval_pars(500)).unwrap();
        assert_eq!(track.track_type, TrackType::ShortTrack);
        assert_relative_eq!(track.turns_lap_frac, 462.0 / 858.0);
        assert!(track.avg_banking > 5.0 && track.avg_banking < 26.0);
        assert_relative_eq!(track.tire_wear_factor(), 1.0);
    }

    #[test]
    fn flat_turns_make_a_road_course() {
        let mut pars = short_oval_pars(60);
        pars.length = 3900.0;
        pars.sections = (0..6)
            .map(|_| SectionPars {
                section_type: SectionType::Turn,
                length: 650.0,
                banking: 1.0,
            })
            .collect();
        assert_eq!(Track::new(&pars).unwrap().track_type, TrackType::RoadCourse);
    }

    #[test]
    fn track_without_sections_is_rejected() {
        let mut pars = short_oval_pars(10);
        pars.sections.clear();
        assert_eq!(
            Track::new(&pars),
            Err(ConfigurationError::NoSections {
                track_id: "bristol".to_owned()
            })
        );
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let mut pars = short_oval_pars(10);
        pars.t_base = 0.0;
        assert!(matches!(
            Track::new(&pars),
            Err(ConfigurationError::NonPositiveTrackValue { field: "t_base", .. })
        ));

        let mut pars = short_oval_pars(0);
        pars.t_base = 15.4;
        assert!(matches!(Track::new(&pars), Err(ConfigurationError::NoLaps { .. })));
    }
}
