//! Static voice preset catalog: display metadata plus a factory for the
//! underlying effect. Read-only data for selection UIs and billing; the
//! engine itself only ever sees the built `VoiceEffect`.

use crate::dsp::{Echo, PitchShift, Reverb, RobotVoice, Tremor, VoiceEffect, Whisper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Pitch,
    Modulation,
    Environment,
    Special,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pitch => "pitch",
            Category::Modulation => "modulation",
            Category::Environment => "environment",
            Category::Special => "special",
        }
    }
}

pub struct Preset {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub credit_cost: u32,
    pub category: Category,
    factory: fn() -> Box<dyn VoiceEffect>,
}

impl Preset {
    pub fn build(&self) -> Box<dyn VoiceEffect> {
        (self.factory)()
    }
}

pub static PRESETS: &[Preset] = &[
    Preset {
        id: "female",
        display_name: "Female",
        description: "Higher pitched feminine voice",
        credit_cost: 1,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Female", 1.6)),
    },
    Preset {
        id: "male_deep",
        display_name: "Deep Male",
        description: "Deep masculine voice",
        credit_cost: 1,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Deep Male", 0.7)),
    },
    Preset {
        id: "child",
        display_name: "Child",
        description: "High-pitched child voice",
        credit_cost: 1,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Child", 1.8)),
    },
    Preset {
        id: "helium",
        display_name: "Helium",
        description: "Super high chipmunk voice",
        credit_cost: 2,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Helium", 2.2)),
    },
    Preset {
        id: "monster",
        display_name: "Monster",
        description: "Deep scary monster voice",
        credit_cost: 2,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Monster", 0.5)),
    },
    Preset {
        id: "old_man",
        display_name: "Old Man",
        description: "Elderly trembling voice",
        credit_cost: 2,
        category: Category::Pitch,
        factory: || Box::new(PitchShift::new("Old Man", 0.8)),
    },
    Preset {
        id: "robot",
        display_name: "Robot",
        description: "Metallic robotic voice",
        credit_cost: 2,
        category: Category::Modulation,
        factory: || Box::new(RobotVoice::new(150.0)),
    },
    Preset {
        id: "alien",
        display_name: "Alien",
        description: "Extraterrestrial voice",
        credit_cost: 3,
        category: Category::Special,
        factory: || Box::new(RobotVoice::new(300.0)),
    },
    Preset {
        id: "echo",
        display_name: "Echo",
        description: "Voice with echo/delay",
        credit_cost: 1,
        category: Category::Environment,
        factory: || Box::new(Echo::new(300, 0.5, 0.4)),
    },
    Preset {
        id: "reverb",
        display_name: "Hall",
        description: "Concert hall reverb",
        credit_cost: 1,
        category: Category::Environment,
        factory: || Box::new(Reverb::new(0.7, 0.35)),
    },
    Preset {
        id: "whisper",
        display_name: "Whisper",
        description: "Soft whispering voice",
        credit_cost: 2,
        category: Category::Special,
        factory: || Box::new(Whisper::new(0.6)),
    },
    Preset {
        id: "tremor",
        display_name: "Tremor",
        description: "Shaky trembling voice",
        credit_cost: 1,
        category: Category::Special,
        factory: || Box::new(Tremor::new(6.0, 0.5)),
    },
];

pub fn find(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        for (i, a) in PRESETS.iter().enumerate() {
            for b in &PRESETS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn every_preset_builds_a_working_effect() {
        let input = vec![1000i16; 256];
        for preset in PRESETS {
            let mut fx = preset.build();
            let out = fx.process(&input, 44_100);
            assert!(!out.is_empty(), "{} produced nothing", preset.id);
            fx.reset();
        }
    }

    #[test]
    fn find_resolves_known_ids() {
        assert_eq!(find("monster").map(|p| p.display_name), Some("Monster"));
        assert!(find("nope").is_none());
    }
}
