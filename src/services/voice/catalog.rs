//! Bundled voices used when the remote library is unreachable.

use super::{VoiceEntry, VoiceSource};

struct LocalVoice {
    id: &'static str,
    name: &'static str,
    gender: &'static str,
    tags: [&'static str; 4],
    description: &'static str,
    recommended: bool,
}

const LOCAL_VOICES: [LocalVoice; 9] = [
    LocalVoice {
        id: "lively-woman",
        name: "Lively woman",
        gender: "Female",
        tags: ["Energetic", "Friendly", "Warm", "Young"],
        description: "A bright, energetic female voice with warmth and enthusiasm",
        recommended: true,
    },
    LocalVoice {
        id: "calm-woman",
        name: "Calm woman",
        gender: "Female",
        tags: ["Calm", "Mature", "Soothing", "Professional"],
        description: "A gentle, calming female voice with a mature tone",
        recommended: false,
    },
    LocalVoice {
        id: "steady-women",
        name: "Steady women",
        gender: "Female",
        tags: ["Steady", "Confident", "Clear", "Reliable"],
        description: "A confident and steady female voice, clear and trustworthy",
        recommended: false,
    },
    LocalVoice {
        id: "friendly-women",
        name: "Friendly women",
        gender: "Female",
        tags: ["Friendly", "Approachable", "Warm", "Casual"],
        description: "A friendly and approachable female voice, easy to connect with",
        recommended: false,
    },
    LocalVoice {
        id: "attractive-woman",
        name: "Attractive woman",
        gender: "Female",
        tags: ["Attractive", "Charismatic", "Smooth", "Alluring"],
        description: "A charismatic and attractive female voice with smooth delivery",
        recommended: false,
    },
    LocalVoice {
        id: "deep-toned-man",
        name: "Deep-toned man",
        gender: "Male",
        tags: ["Deep", "Masculine", "Authoritative", "Mature"],
        description: "A deep, authoritative male voice with a mature tone",
        recommended: false,
    },
    LocalVoice {
        id: "jovial-man",
        name: "Jovial man",
        gender: "Male",
        tags: ["Jovial", "Cheerful", "Humorous", "Friendly"],
        description: "A cheerful and jovial male voice, great for humor",
        recommended: false,
    },
    LocalVoice {
        id: "lively-man",
        name: "Lively man",
        gender: "Male",
        tags: ["Lively", "Energetic", "Dynamic", "Young"],
        description: "A lively and energetic male voice with dynamic delivery",
        recommended: false,
    },
    LocalVoice {
        id: "calm-man",
        name: "Calm man",
        gender: "Male",
        tags: ["Calm", "Gentle", "Soothing", "Relaxed"],
        description: "A calm and gentle male voice with a relaxing tone",
        recommended: false,
    },
];

pub const DEFAULT_VOICE_ID: &str = "lively-woman";

pub fn local_voices() -> Vec<VoiceEntry> {
    LOCAL_VOICES
        .iter()
        .map(|v| VoiceEntry {
            id: v.id.to_string(),
            name: v.name.to_string(),
            gender: v.gender.to_string(),
            accent: String::new(),
            age: String::new(),
            tags: v.tags.iter().map(|t| t.to_string()).collect(),
            description: v.description.to_string(),
            preview_url: None,
            category: "local".to_string(),
            use_case: String::new(),
            source: VoiceSource::Local,
            recommended: v.recommended,
        })
        .collect()
}
