use helpers::general::clamp_pct;
use serde::{Deserialize, Serialize};

pub type DriverId = String;

/// SkillKind names one of the driver skills. Decision options reference their primary and
/// secondary skills through it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Racecraft,
    PitStrategy,
    TireManagement,
    Focus,
    Composure,
    Aggression,
    Consistency,
}

impl SkillKind {
    pub const ALL: [SkillKind; 7] = [
        SkillKind::Racecraft,
        SkillKind::PitStrategy,
        SkillKind::TireManagement,
        SkillKind::Focus,
        SkillKind::Composure,
        SkillKind::Aggression,
        SkillKind::Consistency,
    ];
}

/// Skill values in [0, 100]. Missing skills default to 50.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Skills {
    #[serde(default = "default_skill")]
    pub racecraft: f64,
    #[serde(default = "default_skill", alias = "pitStrategy")]
    pub pit_strategy: f64,
    #[serde(default = "default_skill", alias = "tireManagement")]
    pub tire_management: f64,
    #[serde(default = "default_skill")]
    pub focus: f64,
    #[serde(default = "default_skill")]
    pub composure: f64,
    #[serde(default = "default_skill")]
    pub aggression: f64,
    #[serde(default = "default_skill")]
    pub consistency: f64,
}

fn default_skill() -> f64 {
    50.0
}

impl Default for Skills {
    fn default() -> Self {
        Skills {
            racecraft: default_skill(),
            pit_strategy: default_skill(),
            tire_management: default_skill(),
            focus: default_skill(),
            composure: default_skill(),
            aggression: default_skill(),
            consistency: default_skill(),
        }
    }
}

impl Skills {
    pub fn get(&self, kind: SkillKind) -> f64 {
        match kind {
            SkillKind::Racecraft => self.racecraft,
            SkillKind::PitStrategy => self.pit_strategy,
            SkillKind::TireManagement => self.tire_management,
            SkillKind::Focus => self.focus,
            SkillKind::Composure => self.composure,
            SkillKind::Aggression => self.aggression,
            SkillKind::Consistency => self.consistency,
        }
    }

    fn get_mut(&mut self, kind: SkillKind) -> &mut f64 {
        match kind {
            SkillKind::Racecraft => &mut self.racecraft,
            SkillKind::PitStrategy => &mut self.pit_strategy,
            SkillKind::TireManagement => &mut self.tire_management,
            SkillKind::Focus => &mut self.focus,
            SkillKind::Composure => &mut self.composure,
            SkillKind::Aggression => &mut self.aggression,
            SkillKind::Consistency => &mut self.consistency,
        }
    }

    /// Returns a copy with every skill clamped into [0, 100].
    pub fn clamped(&self) -> Skills {
        let mut skills = self.clone();
        for kind in SkillKind::ALL {
            let value = skills.get_mut(kind);
            *value = clamp_pct(*value);
        }
        skills
    }
}

/// MentalState holds the transient psychological attributes of a driver, each in [0, 100]. It is
/// changed only by decision effects.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MentalState {
    pub confidence: f64,
    pub focus: f64,
    pub frustration: f64,
    pub distraction: f64,
}

impl Default for MentalState {
    fn default() -> Self {
        MentalState {
            confidence: 60.0,
            focus: 70.0,
            frustration: 20.0,
            distraction: 10.0,
        }
    }
}

/// MentalDelta is a change of the mental state as produced by a decision outcome.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct MentalDelta {
    pub confidence: f64,
    pub focus: f64,
    pub frustration: f64,
    pub distraction: f64,
}

impl MentalDelta {
    pub fn is_zero(&self) -> bool {
        self.confidence == 0.0 && self.focus == 0.0 && self.frustration == 0.0 && self.distraction == 0.0
    }
}

impl MentalState {
    pub fn clamped(&self) -> MentalState {
        MentalState {
            confidence: clamp_pct(self.confidence),
            focus: clamp_pct(self.focus),
            frustration: clamp_pct(self.frustration),
            distraction: clamp_pct(self.distraction),
        }
    }

    /// Applies a delta and clamps every value into [0, 100].
    pub fn apply(&mut self, delta: &MentalDelta) {
        self.confidence = clamp_pct(self.confidence + delta.confidence);
        self.focus = clamp_pct(self.focus + delta.focus);
        self.frustration = clamp_pct(self.frustration + delta.frustration);
        self.distraction = clamp_pct(self.distraction + delta.distraction);
    }
}

/// * `id` - Driver identifier, also used as the standings tie-breaker
/// * `name` - Display name
/// * `is_player` - True for the single human-controlled driver
/// * `skills` - Skill values in [0, 100]
/// * `mental_state` - Initial mental state (optional)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriverPars {
    pub id: DriverId,
    pub name: String,
    #[serde(default)]
    pub is_player: bool,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub mental_state: MentalState,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub is_player: bool,
    pub skills: Skills,
    pub mental_state: MentalState,
}

impl Driver {
    pub fn new(driver_pars: &DriverPars) -> Driver {
        Driver {
            id: driver_pars.id.to_owned(),
            name: driver_pars.name.to_owned(),
            is_player: driver_pars.is_player,
            skills: driver_pars.skills.clamped(),
            mental_state: driver_pars.mental_state.clamped(),
        }
    }

    pub fn skill(&self, kind: SkillKind) -> f64 {
        self.skills.get(kind)
    }
}
