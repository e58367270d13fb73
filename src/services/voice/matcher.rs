use super::catalog::DEFAULT_VOICE_ID;
use super::VoiceEntry;
use crate::core::error::StageError;
use crate::services::llm::LlmClient;
use crate::services::parser::parse_model_as;
use crate::utils::image::InlineImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default)]
    pub perceived_gender: String,
    #[serde(default)]
    pub perceived_age: String,
    #[serde(default)]
    pub suggested_tempo: String,
    #[serde(default)]
    pub suggested_timbre: String,
    #[serde(default)]
    pub suggested_tone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceRecommendation {
    pub voice_id: String,
    pub reasoning: String,
    pub profile: Option<VoiceProfile>,
    pub alternative_voice_id: Option<String>,
    pub method: String,
}

const DEFAULT_REASONING: &str = "Default recommendation based on common preferences.";

/// Best tag overlap, ties in catalog order; with no overlap the entry
/// flagged as recommended, then the first entry.
pub fn fallback_voice<S: AsRef<str>>(tags: &[S], catalog: &[VoiceEntry]) -> VoiceRecommendation {
    let best = catalog
        .iter()
        .map(|v| (v, v.overlap(tags)))
        .filter(|(_, score)| *score > 0)
        // max_by_key keeps the last max; reverse so the first one wins
        .rev()
        .max_by_key(|(_, score)| *score);

    let (voice_id, reasoning) = match best {
        Some((v, _)) => {
            let shared: Vec<&str> = v
                .tags
                .iter()
                .filter(|t| tags.iter().any(|s| s.as_ref().eq_ignore_ascii_case(t)))
                .map(String::as_str)
                .collect();
            (v.id.clone(), format!("Closest tag match: {}.", shared.join(", ")))
        }
        None => {
            let id = catalog
                .iter()
                .find(|v| v.recommended)
                .or_else(|| catalog.first())
                .map(|v| v.id.clone())
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());
            (id, DEFAULT_REASONING.to_string())
        }
    };

    VoiceRecommendation {
        voice_id,
        reasoning,
        profile: None,
        alternative_voice_id: None,
        method: "default".to_string(),
    }
}

const SYSTEM_PROMPT: &str = r#"# Role
You are a top-tier Audio Casting Director with expert synesthesia skills. Recommend the single best-fitting default voice from the provided Voice Library, based on the character image and the user-selected tags.

# Instructions
1. Character Voice Profiling: from the image, decide
   - Gender: Male/Female
   - Age Range: Young (18-25), Adult (26-40), Mature (40+)
   - Speech Tempo: Fast, Medium, Slow
   - Vocal Timbre: Deep, Bright, Raspy, Soft, Warm
   - Emotional Tone: Cool, Energetic, Gentle, Serious, Playful
2. Matching: compare the profile against the library on gender, tag overlap and description.
3. Decision: select exactly 1 voice. Use an id that appears in the library.

# Output Format
Return ONLY a JSON object:
{
  "character_voice_profile": {
    "perceived_gender": "Male/Female",
    "perceived_age": "Young/Adult/Mature",
    "suggested_tempo": "Fast/Medium/Slow",
    "suggested_timbre": "Ideal voice quality",
    "suggested_tone": "Emotional quality"
  },
  "recommended_voice_id": "The_Selected_Voice_ID",
  "reasoning": "Why this voice matches the character (2-3 sentences)",
  "alternative_voice_id": "A backup option if available"
}"#;

#[derive(Serialize)]
struct CatalogLine<'a> {
    id: &'a str,
    name: &'a str,
    gender: &'a str,
    tags: &'a [String],
    description: &'a str,
}

#[derive(Deserialize)]
struct MatchAnswer {
    #[serde(default)]
    character_voice_profile: Option<VoiceProfile>,
    #[serde(default)]
    recommended_voice_id: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    alternative_voice_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoiceMatcher {
    llm: Arc<dyn LlmClient>,
    max_prompt_voices: usize,
}

impl VoiceMatcher {
    pub fn new(llm: Arc<dyn LlmClient>, max_prompt_voices: usize) -> Self {
        Self {
            llm,
            max_prompt_voices: max_prompt_voices.max(1),
        }
    }

    /// Catalog excerpt for the prompt: best tag overlap first, then capped.
    fn excerpt<'a>(&self, tags: &[String], catalog: &'a [VoiceEntry]) -> Vec<CatalogLine<'a>> {
        let mut ranked: Vec<&VoiceEntry> = catalog.iter().collect();
        ranked.sort_by_key(|v| std::cmp::Reverse(v.overlap(tags)));
        ranked
            .into_iter()
            .take(self.max_prompt_voices)
            .map(|v| CatalogLine {
                id: &v.id,
                name: &v.name,
                gender: &v.gender,
                tags: &v.tags,
                description: &v.description,
            })
            .collect()
    }

    pub async fn recommend(
        &self,
        tags: &[String],
        catalog: &[VoiceEntry],
        image: Option<&InlineImage>,
    ) -> Result<VoiceRecommendation, StageError> {
        if tags.is_empty() {
            return Err(StageError::validation("voice matching needs at least one tag"));
        }
        if catalog.is_empty() {
            return Err(StageError::validation("voice catalog is empty"));
        }
        info!("Matching voice for {} tags against {} voices", tags.len(), catalog.len());

        let excerpt = serde_json::to_string(&self.excerpt(tags, catalog))
            .map_err(|e| StageError::validation(e.to_string()))?;
        let selected = serde_json::to_string(tags).map_err(|e| StageError::validation(e.to_string()))?;
        let user = format!(
            "User-Selected Tags: {}\n\nVoice Library: {}\n\nAnalyze this character and recommend the best matching voice. Output JSON only.",
            selected, excerpt
        );

        let raw = self
            .llm
            .complete(SYSTEM_PROMPT, &user, image)
            .await
            .into_result()?;
        debug!("Voice match raw: {}", raw);
        let answer: MatchAnswer = parse_model_as(&raw)?;

        let voice_id = answer.recommended_voice_id.trim().to_string();
        if !catalog.iter().any(|v| v.id == voice_id) {
            return Err(StageError::validation(format!(
                "recommended voice {:?} is not in the catalog",
                voice_id
            )));
        }
        let alternative_voice_id = answer
            .alternative_voice_id
            .map(|a| a.trim().to_string())
            .filter(|a| *a != voice_id && catalog.iter().any(|v| v.id == *a));

        Ok(VoiceRecommendation {
            voice_id,
            reasoning: answer.reasoning,
            profile: answer.character_voice_profile,
            alternative_voice_id,
            method: "llm".to_string(),
        })
    }
}
