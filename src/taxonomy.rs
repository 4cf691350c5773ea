use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of canonical play types; also the length of every classifier
/// probability vector and rolled-share array in the crate.
pub const PLAY_TYPE_COUNT: usize = 13;

/// One share/probability per canonical play type, in `PlayType::ALL` order.
pub type PlayShares = [f64; PLAY_TYPE_COUNT];

/// Canonical plate-appearance outcomes. The variant order is the category
/// order every `OutcomeModel` must emit probabilities in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Strikeout,
    FlyOut,
    Double,
    Out,
    FieldersChoice,
    Error,
    Walk,
    HomeRun,
    Single,
    Sacrifice,
    DoublePlay,
    IntentWalk,
    Triple,
}

impl PlayType {
    pub const ALL: [PlayType; PLAY_TYPE_COUNT] = [
        PlayType::Strikeout,
        PlayType::FlyOut,
        PlayType::Double,
        PlayType::Out,
        PlayType::FieldersChoice,
        PlayType::Error,
        PlayType::Walk,
        PlayType::HomeRun,
        PlayType::Single,
        PlayType::Sacrifice,
        PlayType::DoublePlay,
        PlayType::IntentWalk,
        PlayType::Triple,
    ];

    /// Position in `ALL`, usable as an array index.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayType::Strikeout => "strikeout",
            PlayType::FlyOut => "fly_out",
            PlayType::Double => "double",
            PlayType::Out => "out",
            PlayType::FieldersChoice => "fielders_choice",
            PlayType::Error => "error",
            PlayType::Walk => "walk",
            PlayType::HomeRun => "home_run",
            PlayType::Single => "single",
            PlayType::Sacrifice => "sacrifice",
            PlayType::DoublePlay => "double_play",
            PlayType::IntentWalk => "intent_walk",
            PlayType::Triple => "triple",
        }
    }

    /// Whether the outcome puts the batter on base (the binary label of the
    /// assembled dataset).
    pub fn is_on_base(self) -> bool {
        matches!(
            self,
            PlayType::Single
                | PlayType::Double
                | PlayType::Triple
                | PlayType::HomeRun
                | PlayType::Walk
                | PlayType::IntentWalk
        )
    }
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw statcast events that end a plate appearance. Pitch rows with any
/// other event (pickoffs, caught stealing, ...) are filtered out upstream of
/// the canonical mapping.
pub const RELEVANT_RAW_EVENTS: [&str; 19] = [
    "field_out",
    "strikeout",
    "strikeout_double_play",
    "force_out",
    "grounded_into_double_play",
    "double_play",
    "fielders_choice",
    "fielders_choice_out",
    "other_out",
    "sac_fly",
    "sac_bunt",
    "single",
    "double",
    "triple",
    "home_run",
    "walk",
    "hit_by_pitch",
    "intent_walk",
    "field_error",
];

/// Many-to-one mapping from a raw statcast event to its canonical play type.
/// Returns `None` for events outside the allow-list.
pub fn canonical_play_type(raw_event: &str) -> Option<PlayType> {
    let mapped = match raw_event {
        "field_out" => PlayType::FlyOut,
        "strikeout" | "strikeout_double_play" => PlayType::Strikeout,
        "force_out" | "other_out" => PlayType::Out,
        "grounded_into_double_play" | "double_play" => PlayType::DoublePlay,
        "fielders_choice" | "fielders_choice_out" => PlayType::FieldersChoice,
        "sac_fly" | "sac_bunt" => PlayType::Sacrifice,
        "single" => PlayType::Single,
        "double" => PlayType::Double,
        "triple" => PlayType::Triple,
        "home_run" => PlayType::HomeRun,
        "walk" | "hit_by_pitch" => PlayType::Walk,
        "intent_walk" => PlayType::IntentWalk,
        "field_error" => PlayType::Error,
        _ => return None,
    };
    Some(mapped)
}

/// Batter stand x pitcher throwing hand. All coefficient, rolling and
/// league-average structures are stratified by this and never mixed across
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitbatCombo {
    RR,
    RL,
    LR,
    LL,
}

impl PitbatCombo {
    pub const ALL: [PitbatCombo; 4] = [
        PitbatCombo::RR,
        PitbatCombo::RL,
        PitbatCombo::LR,
        PitbatCombo::LL,
    ];

    pub fn from_hands(batter_stand: char, pitcher_throws: char) -> Option<Self> {
        match (batter_stand, pitcher_throws) {
            ('R', 'R') => Some(PitbatCombo::RR),
            ('R', 'L') => Some(PitbatCombo::RL),
            ('L', 'R') => Some(PitbatCombo::LR),
            ('L', 'L') => Some(PitbatCombo::LL),
            _ => None,
        }
    }

    pub fn batter_stand(self) -> char {
        match self {
            PitbatCombo::RR | PitbatCombo::RL => 'R',
            PitbatCombo::LR | PitbatCombo::LL => 'L',
        }
    }

    pub fn pitcher_throws(self) -> char {
        match self {
            PitbatCombo::RR | PitbatCombo::LR => 'R',
            PitbatCombo::RL | PitbatCombo::LL => 'L',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PitbatCombo::RR => "RR",
            PitbatCombo::RL => "RL",
            PitbatCombo::LR => "LR",
            PitbatCombo::LL => "LL",
        }
    }
}

impl fmt::Display for PitbatCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per handedness combo. Replaces the open string-keyed map the
/// original data model used, so combo coverage is checked exhaustively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComboTable<T> {
    pub rr: T,
    pub rl: T,
    pub lr: T,
    pub ll: T,
}

impl<T> ComboTable<T> {
    pub fn get(&self, combo: PitbatCombo) -> &T {
        match combo {
            PitbatCombo::RR => &self.rr,
            PitbatCombo::RL => &self.rl,
            PitbatCombo::LR => &self.lr,
            PitbatCombo::LL => &self.ll,
        }
    }

    pub fn get_mut(&mut self, combo: PitbatCombo) -> &mut T {
        match combo {
            PitbatCombo::RR => &mut self.rr,
            PitbatCombo::RL => &mut self.rl,
            PitbatCombo::LR => &mut self.lr,
            PitbatCombo::LL => &mut self.ll,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PitbatCombo, &T)> {
        PitbatCombo::ALL.iter().map(move |c| (*c, self.get(*c)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(PitbatCombo, &T) -> U) -> ComboTable<U> {
        ComboTable {
            rr: f(PitbatCombo::RR, &self.rr),
            rl: f(PitbatCombo::RL, &self.rl),
            lr: f(PitbatCombo::LR, &self.lr),
            ll: f(PitbatCombo::LL, &self.ll),
        }
    }

    pub fn from_fn(mut f: impl FnMut(PitbatCombo) -> T) -> Self {
        ComboTable {
            rr: f(PitbatCombo::RR),
            rl: f(PitbatCombo::RL),
            lr: f(PitbatCombo::LR),
            ll: f(PitbatCombo::LL),
        }
    }
}
