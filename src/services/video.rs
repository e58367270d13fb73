use crate::core::error::StageError;
use crate::services::llm::LlmClient;
use crate::services::parser::parse_model_as;
use crate::services::voice::VoiceEntry;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Script {
    pub id: &'static str,
    pub text: &'static str,
    pub mood: &'static str,
    pub energy: &'static str,
}

pub const SCRIPT_LIBRARY: [Script; 4] = [
    Script {
        id: "intro_1",
        text: "Hey there! Welcome to my world. Let me show you around.",
        mood: "friendly",
        energy: "high",
    },
    Script {
        id: "intro_2",
        text: "I've been waiting for you. Ready to explore?",
        mood: "mysterious",
        energy: "medium",
    },
    Script {
        id: "intro_3",
        text: "Life is an adventure. Let's make it unforgettable.",
        mood: "adventurous",
        energy: "high",
    },
    Script {
        id: "intro_4",
        text: "Sometimes the best moments are the quiet ones.",
        mood: "calm",
        energy: "low",
    },
];

pub fn script_by_id(id: &str) -> Option<&'static Script> {
    SCRIPT_LIBRARY.iter().find(|s| s.id == id.trim())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterPersona {
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub energy_level: String,
    #[serde(default)]
    pub communication_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionDetails {
    #[serde(default)]
    pub opening: String,
    #[serde(default)]
    pub during_speech: String,
    #[serde(default)]
    pub closing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoDirection {
    pub script_id: String,
    pub script_text: String,
    pub motion_prompt: String,
    pub suggested_name: Option<String>,
    pub persona: Option<CharacterPersona>,
    pub motion_details: Option<MotionDetails>,
    pub reasoning: String,
    pub method: String,
}

const DEFAULT_MOTION: &str = "A close-up shot, the character smiles warmly, eyes bright and welcoming, gentle head tilt, maintaining natural eye contact";

pub fn default_video_direction() -> VideoDirection {
    let script = &SCRIPT_LIBRARY[0];
    VideoDirection {
        script_id: script.id.to_string(),
        script_text: script.text.to_string(),
        motion_prompt: DEFAULT_MOTION.to_string(),
        suggested_name: None,
        persona: None,
        motion_details: None,
        reasoning: "Default energetic and welcoming introduction.".to_string(),
        method: "default".to_string(),
    }
}

const SYSTEM_PROMPT: &str = r#"# Role
You are an AI Video Director skilled in character consistency and expressive performance direction. Select the best script for the user's Avatar and write a specific prompt to drive the video generation model.

# Instructions
1. Character Persona Analysis: from the image description, voice and tags define the personality type, energy level (High/Medium/Low) and communication style.
2. Script Selection: choose the candidate script whose mood and energy fit the persona.
3. Video Prompt Generation: describe camera framing, facial micro-expressions, head movements, pacing and the emotional arc during the speech.
4. Character Name: suggest a name fitting the perceived gender, cultural background and vibe.

# Output Format
Return a JSON object:
{
  "character_persona": {
    "personality": "Personality description",
    "energy_level": "High/Medium/Low",
    "communication_style": "Style description"
  },
  "suggested_name": "A fitting character name",
  "selected_script_id": "The_Script_ID",
  "script_text": "The_Actual_Script_Text",
  "video_model_prompt": "Detailed prompt for video generation",
  "motion_details": {
    "opening": "How the character starts",
    "during_speech": "Expressions during main content",
    "closing": "How the character ends"
  },
  "reasoning": "Why this script and style fit the character"
}"#;

#[derive(Deserialize)]
struct DirectorAnswer {
    #[serde(default)]
    character_persona: Option<CharacterPersona>,
    #[serde(default)]
    suggested_name: Option<String>,
    #[serde(default)]
    selected_script_id: String,
    #[serde(default)]
    script_text: String,
    #[serde(default)]
    video_model_prompt: String,
    #[serde(default)]
    motion_details: Option<MotionDetails>,
    #[serde(default)]
    reasoning: String,
}

/// The voice fields the director actually needs.
#[derive(Serialize)]
struct VoiceBrief<'a> {
    id: &'a str,
    name: &'a str,
    gender: &'a str,
    tags: &'a [String],
    description: &'a str,
}

#[derive(Debug, Clone)]
pub struct VideoDirector {
    llm: Arc<dyn LlmClient>,
}

impl VideoDirector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn direct(
        &self,
        image_description: &str,
        voice: Option<&VoiceEntry>,
        tags: &[String],
    ) -> Result<VideoDirection, StageError> {
        info!("Directing intro video for {} tags", tags.len());
        let voice_json = match voice {
            Some(v) => serde_json::to_string(&VoiceBrief {
                id: &v.id,
                name: &v.name,
                gender: &v.gender,
                tags: &v.tags,
                description: &v.description,
            }),
            None => Ok("null".to_string()),
        }
        .map_err(|e| StageError::validation(e.to_string()))?;
        let tags_json = serde_json::to_string(tags).map_err(|e| StageError::validation(e.to_string()))?;
        let scripts_json =
            serde_json::to_string(&SCRIPT_LIBRARY).map_err(|e| StageError::validation(e.to_string()))?;

        let user = format!(
            "Selected Image Description: {}\nSelected Voice: {}\nUser-Selected Tags: {}\nCandidate Scripts: {}\n\nPlease analyze the character and select the best script with a detailed video prompt.",
            image_description, voice_json, tags_json, scripts_json
        );

        // text only: the description stands in for the image
        let raw = self.llm.complete(SYSTEM_PROMPT, &user, None).await.into_result()?;
        debug!("Video director raw: {}", raw);
        let answer: DirectorAnswer = parse_model_as(&raw)?;

        let script_id = answer.selected_script_id.trim().to_string();
        let mut script_text = answer.script_text.trim().to_string();
        if script_text.is_empty() {
            if let Some(script) = script_by_id(&script_id) {
                script_text = script.text.to_string();
            }
        }
        if script_text.is_empty() {
            return Err(StageError::validation("director returned no script text"));
        }
        let motion_prompt = answer.video_model_prompt.trim().to_string();
        if motion_prompt.is_empty() {
            return Err(StageError::validation("director returned no video prompt"));
        }

        Ok(VideoDirection {
            script_id,
            script_text,
            motion_prompt,
            suggested_name: answer
                .suggested_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            persona: answer.character_persona,
            motion_details: answer.motion_details,
            reasoning: answer.reasoning,
            method: "llm".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockLlm;
    use crate::services::voice::catalog::local_voices;

    #[test]
    fn test_default_direction_is_fixed() {
        let a = default_video_direction();
        assert_eq!(a, default_video_direction());
        assert_eq!(a.script_id, "intro_1");
        assert!(a.motion_prompt.starts_with("A close-up shot"));
        assert_eq!(a.method, "default");
    }

    #[tokio::test]
    async fn test_direct_parses_full_answer() {
        let llm = MockLlm::with_replies([r#"```json
{
  "character_persona": {"personality": "brooding", "energy_level": "Low", "communication_style": "Formal"},
  "suggested_name": " Lucian ",
  "selected_script_id": "intro_2",
  "script_text": "I've been waiting for you. Ready to explore?",
  "video_model_prompt": "Medium close-up, slow blink, faint smirk",
  "motion_details": {"opening": "eyes lift", "during_speech": "slight head tilt", "closing": "smirk"},
  "reasoning": "Mysterious fits a vampire."
}
```"#]);
        let director = VideoDirector::new(Arc::new(llm.clone()));
        let voice = local_voices().into_iter().find(|v| v.id == "deep-toned-man");
        let tags = vec!["Vampire".to_string(), "CEO".to_string()];

        let direction = director
            .direct("A pale man in a dark suit", voice.as_ref(), &tags)
            .await
            .unwrap();
        assert_eq!(direction.script_id, "intro_2");
        assert_eq!(direction.suggested_name.as_deref(), Some("Lucian"));
        assert_eq!(direction.persona.unwrap().energy_level, "Low");
        assert_eq!(direction.motion_details.unwrap().closing, "smirk");
        assert_eq!(direction.method, "llm");

        let call = &llm.calls()[0];
        assert!(!call.had_image);
        assert!(call.user.contains("deep-toned-man"));
        assert!(call.user.contains("intro_4"));
    }

    #[tokio::test]
    async fn test_missing_script_text_uses_library() {
        let llm = MockLlm::with_replies([
            r#"{"selected_script_id": "intro_4", "video_model_prompt": "calm gaze"}"#,
        ]);
        let direction = VideoDirector::new(Arc::new(llm))
            .direct("portrait", None, &["Poet".to_string()])
            .await
            .unwrap();
        assert_eq!(direction.script_text, SCRIPT_LIBRARY[3].text);
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected() {
        let llm = MockLlm::with_replies([
            r#"{"selected_script_id": "intro_9", "video_model_prompt": "x"}"#,
            r#"{"selected_script_id": "intro_1", "script_text": "Hi", "video_model_prompt": "  "}"#,
        ]);
        let director = VideoDirector::new(Arc::new(llm));
        for _ in 0..2 {
            let err = director.direct("portrait", None, &[]).await.unwrap_err();
            assert_eq!(err.kind(), "validation");
        }
    }
}
