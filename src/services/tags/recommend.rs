use crate::core::error::StageError;
use crate::services::llm::LlmClient;
use crate::services::parser::parse_model_as;
use crate::services::tags::library::{self, TagNamespace};
use crate::utils::image::InlineImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_PERSONA_TAGS: usize = 6;
const MAX_FREE_LABEL_WORDS: usize = 3;
const MAX_FREE_LABEL_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStrategy {
    /// Model must pick from the closed tag vocabulary.
    #[default]
    Library,
    /// Model describes the photo, then invents its own labels.
    FreeForm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
}

impl ImageAnalysis {
    /// One-line description used by later stages that cannot see the image.
    pub fn describe(&self) -> String {
        [
            Some(self.subject.as_str()),
            Some(self.style.as_str()),
            Some(self.mood.as_str()),
            self.lighting.as_deref(),
            self.vibe.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRecommendation {
    /// Display labels, recommended order.
    pub persona_tags: Vec<String>,
    pub relationship_tag: Option<String>,
    pub image_analysis: Option<ImageAnalysis>,
    pub method: String,
}

pub fn default_tag_recommendation() -> TagRecommendation {
    TagRecommendation {
        persona_tags: ["Mysterious", "Prince", "Vampire", "CEO", "Artist", "Model"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        relationship_tag: Some("Secret-Admirer".to_string()),
        image_analysis: None,
        method: "default".to_string(),
    }
}

const LIBRARY_SYSTEM_PROMPT: &str = r#"# Role
You are a Creative Character Designer for a social AI companion app. Your job is to analyze uploaded photos and recommend FUN, ENGAGING character tags, not boring stereotypes.

# Strategy
You recommend, the user decides.

## Persona Tags (recommend 6)
1. Fantasy/Roleplay (2-3): Vampire, Demon, Angel, Yandere, Tsundere, Prince, Assassin
2. Style Match (1-2): Cyberpunk, Gothic, Dark-Academia, Anime
3. Surprise Twist (1): something unexpected that adds depth

## Relationship Tag (recommend 1)
Pick ONE relationship that creates the most interesting dynamic:
- Mysterious photo: Secret-Admirer or Forbidden
- Powerful vibe: Rival or Enemies-to-Lovers
- Romantic look: Soulmate or Forbidden
- Cute/playful: Childhood-Friend or Fake-Dating

# Rules
- Use ONLY labels that appear in the Tag Library, spelled exactly as given.
- Do not take every tag from the same category.

# Output Format
Return ONLY a JSON object:
{
  "image_analysis": {
    "subject": "Brief description",
    "mood": "Overall vibe",
    "style": "Visual style",
    "lighting": "Lighting"
  },
  "recommended_persona_tags": ["Tag1", "Tag2", "Tag3", "Tag4", "Tag5", "Tag6"],
  "recommended_relationship": "RelationshipTag"
}"#;

const ANALYSIS_SYSTEM_PROMPT: &str = r#"# Role
You are an expert Visual Analyst specialized in portrait and character photography.

# Task
Describe the person in the uploaded photo so a character designer who cannot see it can work from your notes.

# Output Format
Return ONLY a JSON object:
{
  "subject": "Who is in the image",
  "style": "Visual/photography style",
  "mood": "Overall mood",
  "vibe": "The energy this person gives off"
}"#;

const FREE_FORM_SYSTEM_PROMPT: &str = r#"# Role
You are a Creative Character Designer naming characters for a social feed.

# Task
From a photo description, invent short scroll-stopping character labels.
- "matching": labels that fit what the photo already shows
- "contrasting": labels that twist it into something unexpected
- "relationship": one label for the user's relationship to the character

# Rules
- Each label is at most 3 words.
- No hashtags, no emoji.

# Output Format
Return ONLY a JSON object:
{
  "matching": ["Label", "Label", "Label"],
  "contrasting": ["Label", "Label", "Label"],
  "relationship": "Label"
}"#;

#[derive(Deserialize)]
struct LibraryAnswer {
    #[serde(default)]
    image_analysis: Option<ImageAnalysis>,
    #[serde(default, alias = "recommended_tags")]
    recommended_persona_tags: Vec<String>,
    #[serde(default)]
    recommended_relationship: Option<String>,
}

#[derive(Deserialize)]
struct FreeFormAnswer {
    #[serde(default)]
    matching: Vec<String>,
    #[serde(default)]
    contrasting: Vec<String>,
    #[serde(default)]
    relationship: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TagRecommender {
    llm: Arc<dyn LlmClient>,
    strategy: TagStrategy,
}

impl TagRecommender {
    pub fn new(llm: Arc<dyn LlmClient>, strategy: TagStrategy) -> Self {
        Self { llm, strategy }
    }

    pub async fn recommend(&self, image: &InlineImage) -> Result<TagRecommendation, StageError> {
        info!("Recommending tags ({:?})", self.strategy);
        match self.strategy {
            TagStrategy::Library => self.recommend_from_library(image).await,
            TagStrategy::FreeForm => self.recommend_free_form(image).await,
        }
    }

    async fn recommend_from_library(
        &self,
        image: &InlineImage,
    ) -> Result<TagRecommendation, StageError> {
        let vocabulary = serde_json::to_string(&library::all_labels())
            .map_err(|e| StageError::validation(e.to_string()))?;
        let user = format!(
            "Tag Library: {}\n\nAnalyze this image and recommend 6 persona tags and 1 relationship. Output JSON only.",
            vocabulary
        );

        let raw = self
            .llm
            .complete(LIBRARY_SYSTEM_PROMPT, &user, Some(image))
            .await
            .into_result()?;
        debug!("Tag recommendation raw: {}", raw);
        let answer: LibraryAnswer = parse_model_as(&raw)?;

        let mut persona_tags: Vec<String> = Vec::new();
        for label in &answer.recommended_persona_tags {
            match library::find_in_namespace(label, TagNamespace::Persona) {
                Some(tag) if !persona_tags.iter().any(|t| t == tag.label) => {
                    persona_tags.push(tag.label.to_string())
                }
                Some(_) => {}
                None => debug!("Dropping unknown persona label {:?}", label),
            }
        }
        persona_tags.truncate(MAX_PERSONA_TAGS);

        if persona_tags.is_empty() {
            return Err(StageError::validation(
                "no recommended persona label matched the tag library",
            ));
        }

        let relationship_tag = answer
            .recommended_relationship
            .as_deref()
            .and_then(|l| library::find_in_namespace(l, TagNamespace::Relationship))
            .map(|t| t.label.to_string());

        Ok(TagRecommendation {
            persona_tags,
            relationship_tag,
            image_analysis: answer.image_analysis,
            method: "library".to_string(),
        })
    }

    async fn recommend_free_form(
        &self,
        image: &InlineImage,
    ) -> Result<TagRecommendation, StageError> {
        let raw = self
            .llm
            .complete(
                ANALYSIS_SYSTEM_PROMPT,
                "Describe this photo. Output JSON only.",
                Some(image),
            )
            .await
            .into_result()?;
        let analysis: ImageAnalysis = parse_model_as(&raw)?;

        let user = format!(
            "Photo description:\n- subject: {}\n- style: {}\n- mood: {}\n- vibe: {}\n\nInvent the labels. Output JSON only.",
            analysis.subject,
            analysis.style,
            analysis.mood,
            analysis.vibe.as_deref().unwrap_or("-"),
        );
        let raw = self
            .llm
            .complete(FREE_FORM_SYSTEM_PROMPT, &user, None)
            .await
            .into_result()?;
        let answer: FreeFormAnswer = parse_model_as(&raw)?;

        let matching: Vec<String> = answer.matching.iter().filter_map(|l| clean_free_label(l)).collect();
        let contrasting: Vec<String> = answer
            .contrasting
            .iter()
            .filter_map(|l| clean_free_label(l))
            .collect();

        let mut persona_tags: Vec<String> = Vec::new();
        let longest = matching.len().max(contrasting.len());
        for i in 0..longest {
            for label in [matching.get(i), contrasting.get(i)].into_iter().flatten() {
                if !persona_tags.iter().any(|t| t.eq_ignore_ascii_case(label)) {
                    persona_tags.push(label.clone());
                }
            }
        }
        persona_tags.truncate(MAX_PERSONA_TAGS);

        if persona_tags.is_empty() {
            return Err(StageError::validation("model returned no usable labels"));
        }

        Ok(TagRecommendation {
            persona_tags,
            relationship_tag: answer.relationship.as_deref().and_then(clean_free_label),
            image_analysis: Some(analysis),
            method: "free_form".to_string(),
        })
    }
}

/// Trims decoration off an invented label and rejects anything too long.
fn clean_free_label(label: &str) -> Option<String> {
    let label: String = label.chars().filter(|c| *c != '[' && *c != ']').collect();
    let label = label
        .trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| c == '"' || c == '.' || c == ',')
        .trim();
    let words = label.split_whitespace().count();
    if label.is_empty()
        || words > MAX_FREE_LABEL_WORDS
        || label.chars().count() > MAX_FREE_LABEL_CHARS
    {
        return None;
    }
    Some(label.split_whitespace().collect::<Vec<_>>().join(" "))
}
