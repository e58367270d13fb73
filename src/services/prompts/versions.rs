//! Fixed prompt sets kept side by side for A/B comparison. Exactly one is
//! active per run, chosen by `pipeline.prompt_version`.

use log::warn;
use serde::Serialize;
use std::fmt;

pub const IDENTITY_ANCHOR: &str = "exact same person exact same face";
pub const PRESERVE_PHRASE: &str = "preserve facial features";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PromptVersion {
    #[serde(rename = "v0.1")]
    V0_1,
    #[serde(rename = "v0.2")]
    V0_2,
    #[serde(rename = "v0.3")]
    V0_3,
    #[serde(rename = "v0.4")]
    V0_4,
    #[serde(rename = "v0.5")]
    V0_5,
    #[default]
    #[serde(rename = "v0.6")]
    V0_6,
}

impl PromptVersion {
    pub const ALL: [PromptVersion; 6] = [
        PromptVersion::V0_1,
        PromptVersion::V0_2,
        PromptVersion::V0_3,
        PromptVersion::V0_4,
        PromptVersion::V0_5,
        PromptVersion::V0_6,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let s = s.strip_prefix('v').unwrap_or(&s);
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().trim_start_matches('v') == s)
    }

    /// Like [`parse`](Self::parse) but never fails: unknown names become v0.6.
    pub fn resolve(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            warn!("Unknown prompt version {:?}, using v0.6", s);
            PromptVersion::V0_6
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptVersion::V0_1 => "v0.1",
            PromptVersion::V0_2 => "v0.2",
            PromptVersion::V0_3 => "v0.3",
            PromptVersion::V0_4 => "v0.4",
            PromptVersion::V0_5 => "v0.5",
            PromptVersion::V0_6 => "v0.6",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PromptVersion::V0_1 => "Fixed styles",
            PromptVersion::V0_2 => "Tag templated",
            PromptVersion::V0_3 => "Minimal",
            PromptVersion::V0_4 => "Pure style",
            PromptVersion::V0_5 => "Dynamic tags",
            PromptVersion::V0_6 => "Scene based",
        }
    }

    /// Only the dynamic versions ask the model; the rest are table-only.
    pub fn uses_model(self) -> bool {
        matches!(self, PromptVersion::V0_5 | PromptVersion::V0_6)
    }
}

impl fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSet {
    pub version: PromptVersion,
    pub prompts: Vec<String>,
    pub style_labels: Vec<String>,
}

/// Wraps a prompt body in the identity anchor and preservation phrase,
/// leaving either alone when already present.
pub fn anchor_prompt(body: &str) -> String {
    let mut body = body.trim().trim_end_matches(['.', ',']).trim().to_string();
    if !body.to_lowercase().starts_with(IDENTITY_ANCHOR) {
        body = format!("{}, {}", IDENTITY_ANCHOR, body);
    }
    if !body.to_lowercase().ends_with(PRESERVE_PHRASE) {
        body = format!("{}, {}", body, PRESERVE_PHRASE);
    }
    body
}

/// Concrete settings for identity tags.
pub const SCENE_TABLE: &[(&[&str], &[&str])] = &[
    (&["Prince", "Royalty"], &["throne room", "castle balcony", "royal garden"]),
    (&["Vampire"], &["gothic castle", "moonlit graveyard", "candlelit chamber"]),
    (&["Demon"], &["hellfire background", "dark throne", "volcanic lair"]),
    (&["Angel", "Fallen-Angel"], &["clouds", "golden light", "heavenly gates"]),
    (&["Assassin"], &["rooftop at night", "shadows", "rain-soaked alley"]),
    (&["Knight"], &["battlefield", "castle walls", "training grounds"]),
    (&["Mage", "Witch"], &["magical library", "enchanted forest", "potion room"]),
    (&["CEO", "Mafia-Boss"], &["penthouse office", "luxury car", "private jet"]),
    (&["Cyberpunk", "Hacker"], &["neon city", "holographic displays", "futuristic street"]),
    (&["Gothic"], &["Victorian mansion", "candlelight", "dark roses"]),
    (&["Anime"], &["cherry blossoms", "school rooftop", "sunset"]),
];

pub fn scenes_for_tag(tag: &str) -> Option<&'static [&'static str]> {
    SCENE_TABLE
        .iter()
        .find(|(tags, _)| tags.iter().any(|t| t.eq_ignore_ascii_case(tag.trim())))
        .map(|(_, scenes)| *scenes)
}

/// Relationship tags only ever colour the mood of a single-person scene.
pub fn relationship_mood(tag: &str) -> Option<&'static str> {
    let mood = match tag.trim().to_lowercase().as_str() {
        "soulmate" => "warm tender mood",
        "protector" => "watchful protective mood",
        "rival" | "enemies-to-lovers" => "defiant smoldering mood",
        "secret-admirer" => "wistful secretive mood",
        "childhood-friend" | "roommate" => "easy nostalgic mood",
        "forbidden" | "toxic-ex" | "obsessed" => "tense forbidden mood",
        "ex" => "bittersweet mood",
        "fake-dating" => "playful teasing mood",
        "stranger" => "intriguing first-meeting mood",
        _ => return None,
    };
    Some(mood)
}

const V06_ANGLES: [&str; 3] = ["low angle shot", "close-up portrait", "profile view"];
const V06_DEFAULT_SCENES: [(&str, &str); 3] = [
    ("city rooftop at dusk", "golden hour glow"),
    ("grand library", "warm window light"),
    ("rain-soaked street at night", "neon reflections"),
];

fn v06_prompts(tags: &[String]) -> (Vec<String>, Vec<String>) {
    let mut scenes: Vec<&str> = Vec::new();
    for tag in tags {
        if let Some(options) = scenes_for_tag(tag) {
            // one scene per matching tag first, so mixed tags all show up
            if let Some(s) = options.iter().find(|s| !scenes.contains(s)) {
                scenes.push(s);
            }
        }
    }
    for tag in tags {
        if let Some(options) = scenes_for_tag(tag) {
            for s in options.iter() {
                if !scenes.contains(s) {
                    scenes.push(s);
                }
            }
        }
    }
    let mood = tags.iter().find_map(|t| relationship_mood(t));

    let mut prompts = Vec::with_capacity(3);
    let mut labels = Vec::with_capacity(3);
    for i in 0..3 {
        let (scene, lighting) = match scenes.get(i) {
            Some(s) => (*s, "dramatic cinematic lighting"),
            None => V06_DEFAULT_SCENES[i],
        };
        let mut body = format!("{}, {}, {}", scene, V06_ANGLES[i], lighting);
        if let Some(m) = mood {
            body.push_str(", ");
            body.push_str(m);
        }
        prompts.push(anchor_prompt(&body));
        labels.push(title_case(scene));
    }
    (prompts, labels)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(f) => f.to_uppercase().chain(c).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The fixed prompt set for `version`. Every prompt carries the identity
/// anchor and preservation phrase, whatever the version's original wording.
pub fn fallback_prompts(version: PromptVersion, tags: &[String]) -> PromptSet {
    let (prompts, style_labels) = match version {
        PromptVersion::V0_1 => (
            owned(&[
                "Impressionist oil painting portrait of this person, visible brushstrokes, vibrant colors, outdoor natural lighting, Monet style, same person same face",
                "Cyberpunk neon portrait of this person, blue and pink neon lights, futuristic city background, rain reflections, same person same face",
                "Vintage 1950s Hollywood glamour black and white portrait of this person, soft focus, classic film grain, elegant, same person same face",
            ]),
            owned(&["Impressionist", "Cyberpunk", "Vintage B&W"]),
        ),
        PromptVersion::V0_2 => {
            let joined = if tags.is_empty() {
                "unique".to_string()
            } else {
                tags.join(", ")
            };
            (
                vec![
                    format!("Portrait of the person with {} vibe, artistic oil painting style, warm tones, fine art", joined),
                    format!("Portrait of the person with {} energy, cinematic dramatic lighting, movie poster style", joined),
                    format!("Portrait of the person with {} aesthetic, fashion magazine editorial, glamorous", joined),
                ],
                owned(&["Artistic", "Cinematic", "Fashion"]),
            )
        }
        PromptVersion::V0_3 => (
            owned(&[
                "oil painting portrait, warm colors, artistic",
                "cinematic portrait, dramatic lighting, movie style",
                "fashion photography, studio lighting, glamorous",
            ]),
            owned(&["Artistic", "Cinematic", "Fashion"]),
        ),
        PromptVersion::V0_4 => (
            owned(&[
                "anime style portrait",
                "cyberpunk neon portrait",
                "vintage black white photo",
            ]),
            owned(&["Anime", "Cyberpunk", "Vintage B&W"]),
        ),
        PromptVersion::V0_5 => (
            owned(&[
                "romantic soft portrait",
                "dramatic cinematic lighting",
                "artistic oil painting style",
            ]),
            owned(&["Romantic", "Cinematic", "Artistic"]),
        ),
        PromptVersion::V0_6 => v06_prompts(tags),
    };

    PromptSet {
        version,
        prompts: prompts.iter().map(|p| anchor_prompt(p)).collect(),
        style_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(PromptVersion::parse("v0.4"), Some(PromptVersion::V0_4));
        assert_eq!(PromptVersion::parse(" V0.2 "), Some(PromptVersion::V0_2));
        assert_eq!(PromptVersion::parse("0.5"), Some(PromptVersion::V0_5));
        assert_eq!(PromptVersion::parse("v9"), None);
        assert_eq!(PromptVersion::resolve("v0.1-combined"), PromptVersion::V0_6);
        assert_eq!(PromptVersion::default(), PromptVersion::V0_6);
        assert!(PromptVersion::V0_5.uses_model());
        assert!(!PromptVersion::V0_3.uses_model());
    }

    #[test]
    fn test_every_version_is_anchored() {
        for version in PromptVersion::ALL {
            for input in [tags(&[]), tags(&["Vampire", "Soulmate"])] {
                let set = fallback_prompts(version, &input);
                assert_eq!(set.prompts.len(), 3, "{}", version);
                assert_eq!(set.style_labels.len(), 3, "{}", version);
                for p in &set.prompts {
                    assert!(p.starts_with(IDENTITY_ANCHOR), "{}: {}", version, p);
                    assert!(p.ends_with(PRESERVE_PHRASE), "{}: {}", version, p);
                }
            }
        }
    }

    #[test]
    fn test_anchor_is_not_doubled() {
        let p = "exact same person exact same face, gothic castle, preserve facial features.";
        assert_eq!(
            anchor_prompt(p),
            "exact same person exact same face, gothic castle, preserve facial features"
        );
        assert_eq!(
            anchor_prompt("anime style portrait"),
            "exact same person exact same face, anime style portrait, preserve facial features"
        );
    }

    #[test]
    fn test_v02_templates_tags() {
        let set = fallback_prompts(PromptVersion::V0_2, &tags(&["Gothic", "Idol"]));
        assert!(set.prompts[0].contains("with Gothic, Idol vibe"));
        assert!(set.prompts[2].contains("fashion magazine editorial"));
    }

    #[test]
    fn test_v06_maps_tags_to_scenes() {
        let set = fallback_prompts(
            PromptVersion::V0_6,
            &tags(&["Vampire", "CEO", "Secret-Admirer"]),
        );
        assert!(set.prompts[0].contains("gothic castle"));
        assert!(set.prompts[1].contains("penthouse office"));
        assert!(set.prompts[2].contains("moonlit graveyard"));
        assert!(set.prompts.iter().all(|p| p.contains("wistful secretive mood")));
        assert_eq!(set.style_labels[0], "Gothic Castle");
        assert!(set
            .prompts
            .iter()
            .all(|p| p.split_whitespace().count() <= 25));
    }

    #[test]
    fn test_v06_without_scene_tags_uses_defaults() {
        let set = fallback_prompts(PromptVersion::V0_6, &tags(&["Barista"]));
        assert!(set.prompts[0].contains("city rooftop at dusk"));
        assert!(set.prompts[2].contains("profile view"));
    }
}
