use crate::core::error::StageError;
use crate::services::llm::LlmClient;
use crate::services::parser::parse_model_as;
use crate::services::prompts::versions::{
    fallback_prompts, PromptVersion, IDENTITY_ANCHOR, PRESERVE_PHRASE, SCENE_TABLE,
};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PROMPT_COUNT: usize = 3;
pub const MAX_PROMPT_WORDS: usize = 25;

pub const CAMERA_ANGLES: [&str; 6] = [
    "low angle shot",
    "high angle shot",
    "close-up portrait",
    "profile view",
    "three-quarter view",
    "dramatic side lighting",
];

/// Phrases that would put a second person in the frame.
pub const FORBIDDEN_PHRASES: [&str; 6] = [
    "side by side",
    "two people",
    "looking at each other",
    "eye contact with another",
    "each other",
    "couple",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StylePrompts {
    pub prompts: Vec<String>,
    pub style_labels: Vec<String>,
    pub version: PromptVersion,
    /// `ai_dynamic` when the model wrote them, `version_managed` for the table.
    pub method: String,
}

impl StylePrompts {
    pub fn from_table(version: PromptVersion, tags: &[String]) -> Self {
        let set = fallback_prompts(version, tags);
        Self {
            prompts: set.prompts,
            style_labels: set.style_labels,
            version,
            method: "version_managed".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct PromptAnswer {
    #[serde(default)]
    prompts: Vec<String>,
    #[serde(default, rename = "styleLabels", alias = "style_labels")]
    style_labels: Vec<String>,
}

fn system_prompt() -> String {
    let mut table = String::new();
    for (tags, scenes) in SCENE_TABLE {
        table.push_str(&format!("- {} -> {}\n", tags.join("/"), scenes.join(", ")));
    }
    let angles = CAMERA_ANGLES
        .iter()
        .map(|a| format!("- \"{}\"", a))
        .collect::<Vec<_>>()
        .join("\n");
    let forbidden = FORBIDDEN_PHRASES
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a creative director generating {count} CINEMATIC character portraits.

=== IDENTITY FIRST ===
ALWAYS start with: "{anchor}"
ALWAYS end with: "{preserve}"

=== MISSION ===
Create {count} different images based on the character tags.
Not just style transfer: create SCENES that match the character's identity.

=== TAG TO SCENE MAPPING ===
{table}
=== CAMERA ANGLES (one per image) ===
{angles}

=== RELATIONSHIP TAG ===
A relationship tag (e.g. Soulmate, Secret-Admirer) is the USER's relationship to this character. It is NOT a second person in the scene. Express it only through mood and atmosphere.

=== SINGLE PERSON ONLY ===
Each image shows exactly ONE person. Never describe a second person.
Forbidden phrases: {forbidden}.

=== FORMAT ===
"{anchor}, [scene], [angle], [lighting], {preserve}"
Each prompt is at most {max_words} words.

=== OUTPUT (JSON only) ===
{{
  "prompts": ["prompt1", "prompt2", "prompt3"],
  "styleLabels": ["Scene1", "Scene2", "Scene3"]
}}"#,
        count = PROMPT_COUNT,
        anchor = IDENTITY_ANCHOR,
        preserve = PRESERVE_PHRASE,
        table = table,
        angles = angles,
        forbidden = forbidden,
        max_words = MAX_PROMPT_WORDS,
    )
}

/// Numbered tag list plus a random seed and three shuffled angle hints.
fn user_prompt(tags: &[String]) -> String {
    let mut rng = rand::rng();
    let seed: u32 = rng.random_range(0..10_000);
    let mut angles = CAMERA_ANGLES.to_vec();
    angles.shuffle(&mut rng);
    angles.truncate(PROMPT_COUNT);

    let listed = tags
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, t))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "=== CHARACTER TAGS ===\n{}\n\n=== CREATIVE SEED: {} ===\n=== SUGGESTED ANGLES: {} ===\n\nCreate {} cinematic scenes for this character, each with a different angle and setting. Keep every prompt under {} words. Output JSON only.",
        listed,
        seed,
        angles.join(", "),
        PROMPT_COUNT,
        MAX_PROMPT_WORDS
    )
}

/// Checks one model-written prompt against the identity and single-subject rules.
pub fn validate_prompt(prompt: &str) -> Result<(), StageError> {
    let lower = prompt.trim().trim_end_matches('.').trim().to_lowercase();
    if !lower.starts_with(IDENTITY_ANCHOR) {
        return Err(StageError::validation(format!(
            "prompt does not open with the identity anchor: {:?}",
            prompt
        )));
    }
    if !lower.ends_with(PRESERVE_PHRASE) {
        return Err(StageError::validation(format!(
            "prompt does not close with the preservation phrase: {:?}",
            prompt
        )));
    }
    let words = lower.split_whitespace().count();
    if words > MAX_PROMPT_WORDS {
        return Err(StageError::validation(format!(
            "prompt has {} words (max {}): {:?}",
            words, MAX_PROMPT_WORDS, prompt
        )));
    }
    if let Some(phrase) = FORBIDDEN_PHRASES.iter().find(|p| lower.contains(*p)) {
        return Err(StageError::validation(format!(
            "prompt implies a second person ({:?}): {:?}",
            phrase, prompt
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PromptSynthesizer {
    llm: Arc<dyn LlmClient>,
    version: PromptVersion,
}

impl PromptSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, version: PromptVersion) -> Self {
        Self { llm, version }
    }

    pub fn version(&self) -> PromptVersion {
        self.version
    }

    /// The stage default: the active version's fixed table.
    pub fn fallback(&self, tags: &[String]) -> StylePrompts {
        StylePrompts::from_table(self.version, tags)
    }

    pub async fn synthesize(&self, tags: &[String]) -> Result<StylePrompts, StageError> {
        info!("Synthesizing style prompts ({}, {} tags)", self.version, tags.len());

        if !self.version.uses_model() {
            return Ok(self.fallback(tags));
        }
        if tags.is_empty() {
            return Err(StageError::validation("no tags selected"));
        }

        let raw = self
            .llm
            .complete(&system_prompt(), &user_prompt(tags), None)
            .await
            .into_result()?;
        debug!("Prompt synthesis raw: {}", raw);

        let answer: PromptAnswer = parse_model_as(&raw)?;
        if answer.prompts.len() < PROMPT_COUNT {
            return Err(StageError::validation(format!(
                "expected {} prompts, got {}",
                PROMPT_COUNT,
                answer.prompts.len()
            )));
        }

        let prompts: Vec<String> = answer
            .prompts
            .into_iter()
            .take(PROMPT_COUNT)
            .map(|p| p.trim().trim_end_matches('.').trim().to_string())
            .collect();
        for p in &prompts {
            validate_prompt(p)?;
        }

        let style_labels = (0..PROMPT_COUNT)
            .map(|i| {
                answer
                    .style_labels
                    .get(i)
                    .map(|l| l.trim())
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Scene {}", i + 1))
            })
            .collect();

        Ok(StylePrompts {
            prompts,
            style_labels,
            version: self.version,
            method: "ai_dynamic".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockLlm;
    use crate::services::tags::library;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const GOOD: &str = r#"{
      "prompts": [
        "exact same person exact same face, gothic castle, low angle shot, candlelight, wistful mood, preserve facial features",
        "exact same person exact same face, penthouse office at night, profile view, city glow, preserve facial features",
        "exact same person exact same face, moonlit graveyard, close-up portrait, cold moonlight, preserve facial features."
      ],
      "styleLabels": ["Castle", "  "]
    }"#;

    #[tokio::test]
    async fn test_model_prompts_pass_and_labels_are_padded() {
        let llm = MockLlm::with_replies([GOOD]);
        let synth = PromptSynthesizer::new(Arc::new(llm.clone()), PromptVersion::V0_6);

        let out = synth
            .synthesize(&tags(&["Vampire", "CEO", "Secret-Admirer"]))
            .await
            .unwrap();
        assert_eq!(out.method, "ai_dynamic");
        assert_eq!(out.prompts.len(), 3);
        for p in &out.prompts {
            assert!(p.starts_with(IDENTITY_ANCHOR));
            assert!(p.ends_with(PRESERVE_PHRASE));
        }
        assert_eq!(out.style_labels, vec!["Castle", "Scene 2", "Scene 3"]);

        let call = &llm.calls()[0];
        assert!(!call.had_image);
        assert!(call.system.contains("Vampire -> gothic castle"));
        assert!(call.user.contains("1. Vampire\n2. CEO\n3. Secret-Admirer"));
        assert!(call.user.contains("CREATIVE SEED"));
    }

    #[tokio::test]
    async fn test_second_person_is_rejected() {
        let reply = r#"{"prompts": [
            "exact same person exact same face, ballroom, two people dancing, preserve facial features",
            "exact same person exact same face, garden, profile view, preserve facial features",
            "exact same person exact same face, rooftop, close-up portrait, preserve facial features"
        ]}"#;
        let synth = PromptSynthesizer::new(Arc::new(MockLlm::with_replies([reply])), PromptVersion::V0_6);
        let err = synth.synthesize(&tags(&["Soulmate"])).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("two people"));

        // the stage default is still single-subject and anchored
        let fallback = synth.fallback(&tags(&["Soulmate"]));
        for p in &fallback.prompts {
            assert!(validate_prompt(p).is_ok(), "{}", p);
        }
    }

    #[tokio::test]
    async fn test_too_few_prompts_and_missing_anchor() {
        let synth = PromptSynthesizer::new(
            Arc::new(MockLlm::with_replies([r#"{"prompts": ["only one"]}"#])),
            PromptVersion::V0_5,
        );
        assert_eq!(synth.synthesize(&tags(&["Idol"])).await.unwrap_err().kind(), "validation");

        let reply = r#"{"prompts": ["a castle, preserve facial features", "b", "c"]}"#;
        let synth = PromptSynthesizer::new(Arc::new(MockLlm::with_replies([reply])), PromptVersion::V0_6);
        let err = synth.synthesize(&tags(&["Idol"])).await.unwrap_err();
        assert!(err.to_string().contains("identity anchor"));
    }

    #[test]
    fn test_word_limit() {
        let long = format!(
            "{}, {}, {}",
            IDENTITY_ANCHOR,
            "very ".repeat(20).trim(),
            PRESERVE_PHRASE
        );
        assert!(validate_prompt(&long).is_err());
    }

    #[tokio::test]
    async fn test_empty_tags_and_table_versions_skip_the_model() {
        let llm = MockLlm::with_replies([GOOD]);
        let synth = PromptSynthesizer::new(Arc::new(llm.clone()), PromptVersion::V0_6);
        assert_eq!(synth.synthesize(&[]).await.unwrap_err().kind(), "validation");

        let table = PromptSynthesizer::new(Arc::new(llm.clone()), PromptVersion::V0_4);
        let out = table.synthesize(&tags(&["Vampire"])).await.unwrap();
        assert_eq!(out.method, "version_managed");
        assert_eq!(out.style_labels, vec!["Anime", "Cyberpunk", "Vintage B&W"]);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tag_labels_round_trip_to_ids() {
        let ids = ["p46", "p1", "r4"];
        let labels: Vec<String> = ids
            .iter()
            .map(|id| library::find_by_id(id).unwrap().label.to_string())
            .collect();

        let llm = MockLlm::with_replies([GOOD]);
        let synth = PromptSynthesizer::new(Arc::new(llm.clone()), PromptVersion::V0_6);
        synth.synthesize(&labels).await.unwrap();

        let user = llm.calls()[0].user.clone();
        let listed: Vec<&str> = user
            .lines()
            .filter_map(|l| l.split_once(". "))
            .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()))
            .map(|(_, label)| label)
            .collect();
        let back: Vec<&str> = listed
            .iter()
            .map(|l| library::find_by_label(l).unwrap().id)
            .collect();
        assert_eq!(back, ids);
    }

    #[test]
    fn test_user_prompt_suggests_three_distinct_angles() {
        let prompt = user_prompt(&tags(&["Knight"]));
        let line = prompt
            .lines()
            .find(|l| l.contains("SUGGESTED ANGLES"))
            .unwrap();
        let hits = CAMERA_ANGLES.iter().filter(|a| line.contains(*a)).count();
        assert_eq!(hits, 3);
    }
}
