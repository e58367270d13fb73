use crate::core::error::StageError;
use crate::services::prompts::StylePrompts;
use crate::services::tags::library::{self, Tag, TagCandidate, TagNamespace};
use crate::services::tags::recommend::ImageAnalysis;
use crate::services::tags::TagRecommendation;
use crate::services::video::VideoDirection;
use crate::services::voice::VoiceRecommendation;
use crate::utils::image::InlineImage;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Original,
    Placeholder,
    Generated,
    Error,
    /// Copy of the original, used when the generator is unreachable.
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedImage {
    /// Slot index; 0 is the uploaded photo.
    pub id: usize,
    pub url: Option<String>,
    pub kind: ImageKind,
    pub prompt: Option<String>,
    pub duration_ms: u64,
    pub label: Option<String>,
    pub error: Option<String>,
}

impl GeneratedImage {
    pub fn original(image: &InlineImage) -> Self {
        Self {
            id: 0,
            url: Some(image.to_data_url()),
            kind: ImageKind::Original,
            prompt: None,
            duration_ms: 0,
            label: Some("Original".to_string()),
            error: None,
        }
    }

    pub fn placeholder(id: usize, prompt: &str, label: Option<&str>) -> Self {
        Self {
            id,
            url: None,
            kind: ImageKind::Placeholder,
            prompt: Some(prompt.to_string()),
            duration_ms: 0,
            label: label.map(str::to_string),
            error: None,
        }
    }

    pub fn generated(id: usize, url: String, prompt: &str, label: Option<&str>, duration_ms: u64) -> Self {
        Self {
            url: Some(url),
            kind: ImageKind::Generated,
            duration_ms,
            ..Self::placeholder(id, prompt, label)
        }
    }

    pub fn failed(id: usize, error: String, prompt: &str, label: Option<&str>, duration_ms: u64) -> Self {
        Self {
            kind: ImageKind::Error,
            duration_ms,
            error: Some(error),
            ..Self::placeholder(id, prompt, label)
        }
    }

    pub fn mock(id: usize, original: &GeneratedImage, prompt: &str, label: Option<&str>) -> Self {
        Self {
            url: original.url.clone(),
            kind: ImageKind::Mock,
            ..Self::placeholder(id, prompt, label)
        }
    }

    pub fn is_settled(&self) -> bool {
        self.kind != ImageKind::Placeholder
    }

    /// Whether the slot can be offered as a style choice.
    pub fn is_usable(&self) -> bool {
        self.url.is_some() && self.kind != ImageKind::Error
    }
}

/// Monotonic generation counter shared by the wizard and its running
/// image tasks. Advancing it invalidates every ticket issued before.
#[derive(Debug, Clone, Default)]
pub struct GenerationGuard {
    counter: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct GenerationTicket {
    generation: u64,
    counter: Arc<AtomicU64>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes any running generation and returns the new ticket.
    pub fn advance(&self) -> GenerationTicket {
        let generation = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationTicket {
            generation,
            counter: self.counter.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl GenerationTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

/// Everything the user has chosen so far. Lives for one wizard session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CharacterDraft {
    #[serde(skip)]
    pub image: Option<InlineImage>,
    /// Uploaded copy of `image`, reused across regenerations.
    pub reference_url: Option<String>,
    /// Persona tag ids.
    pub persona_tags: Vec<String>,
    /// Persona labels from outside the library, kept verbatim.
    pub custom_persona_labels: Vec<String>,
    pub relationship: Option<String>,
    pub targeting: Option<String>,
    /// Shown first in the candidate list, never selected on their own.
    pub recommended_labels: Vec<String>,
    pub image_analysis: Option<ImageAnalysis>,
    pub style_prompts: Option<StylePrompts>,
    pub selected_style: Option<usize>,
    pub images: Vec<GeneratedImage>,
    #[serde(skip)]
    generation: u64,
    pub voice_id: Option<String>,
    pub voice_recommendation: Option<VoiceRecommendation>,
    pub video: Option<VideoDirection>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub content_tags: Vec<String>,
}

impl CharacterDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new photo invalidates everything generated from the old one.
    pub fn set_image(&mut self, image: InlineImage) {
        self.image = Some(image);
        self.reference_url = None;
        self.images.clear();
        self.style_prompts = None;
        self.selected_style = None;
        self.image_analysis = None;
    }

    pub fn require_image(&self) -> Result<&InlineImage, StageError> {
        self.image
            .as_ref()
            .ok_or_else(|| StageError::resource("no character image uploaded"))
    }

    /// Keeps the recommended labels and returns the persona candidates,
    /// recommended entries first. Labels the library does not know become
    /// custom candidates. Selection is left untouched.
    pub fn merge_recommended(&mut self, rec: &TagRecommendation) -> Vec<TagCandidate> {
        self.recommended_labels = rec
            .persona_tags
            .iter()
            .chain(rec.relationship_tag.iter())
            .cloned()
            .collect();
        if rec.image_analysis.is_some() {
            self.image_analysis = rec.image_analysis.clone();
        }

        // invented labels only count as library tags on an exact match
        let free_form = rec.method == "free_form";
        let lookup = |label: &str| -> Option<&'static Tag> {
            if free_form {
                library::find_exact_label(label)
            } else {
                library::find_by_label(label)
            }
        };

        let mut candidates: Vec<TagCandidate> = Vec::new();
        let mut push = |candidate: TagCandidate| {
            let id = candidate.id();
            if !candidates.iter().any(|c| c.id().eq_ignore_ascii_case(&id)) {
                candidates.push(candidate);
            }
        };
        for label in &rec.persona_tags {
            match lookup(label) {
                Some(tag) if tag.namespace == TagNamespace::Persona => push(TagCandidate::Library(tag)),
                _ => push(TagCandidate::Custom(label.clone())),
            }
        }
        if let Some(label) = &rec.relationship_tag {
            if !lookup(label).is_some_and(|t| t.namespace == TagNamespace::Relationship) {
                push(TagCandidate::Custom(label.clone()));
            }
        }
        for tag in library::by_namespace(TagNamespace::Persona) {
            push(TagCandidate::Library(tag));
        }
        candidates
    }

    /// Selects tags by id, routing each to its namespace. Custom ids add a
    /// persona label; unknown ids are ignored. The single-select namespaces
    /// keep the last one given.
    pub fn select_tags<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.persona_tags.clear();
        self.custom_persona_labels.clear();
        self.relationship = None;
        self.targeting = None;
        for id in ids {
            if let Some(label) = library::custom_label(id.as_ref()) {
                if !self
                    .custom_persona_labels
                    .iter()
                    .any(|l| l.eq_ignore_ascii_case(label))
                {
                    self.custom_persona_labels.push(label.to_string());
                }
                continue;
            }
            let Some(tag) = library::find_by_id(id.as_ref()) else {
                continue;
            };
            match tag.namespace {
                TagNamespace::Persona => {
                    if !self.persona_tags.iter().any(|t| t == tag.id) {
                        self.persona_tags.push(tag.id.to_string());
                    }
                }
                TagNamespace::Relationship => self.relationship = Some(tag.id.to_string()),
                TagNamespace::Targeting => self.targeting = Some(tag.id.to_string()),
                TagNamespace::Basic => {}
            }
        }
    }

    /// Persona (library, then custom), relationship and targeting labels.
    pub fn selected_labels(&self) -> Vec<String> {
        let label_of = |id: &String| library::find_by_id(id).map(|t| t.label.to_string());
        let mut labels: Vec<String> = self.persona_tags.iter().filter_map(label_of).collect();
        labels.extend(self.custom_persona_labels.iter().cloned());
        labels.extend(
            self.relationship
                .iter()
                .chain(self.targeting.iter())
                .filter_map(label_of),
        );
        labels
    }

    pub fn has_tags(&self) -> bool {
        !self.persona_tags.is_empty()
            || !self.custom_persona_labels.is_empty()
            || self.relationship.is_some()
    }

    /// Slot 0 from the photo plus one placeholder per prompt, bound to `ticket`.
    pub fn begin_generation(&mut self, ticket: &GenerationTicket) -> Result<(), StageError> {
        let original = GeneratedImage::original(self.require_image()?);
        let prompts = self
            .style_prompts
            .as_ref()
            .ok_or_else(|| StageError::resource("no style prompts to generate from"))?;
        let mut images = vec![original];
        images.extend(prompts.prompts.iter().enumerate().map(|(i, p)| {
            GeneratedImage::placeholder(i + 1, p, prompts.style_labels.get(i).map(String::as_str))
        }));
        self.images = images;
        self.selected_style = None;
        self.generation = ticket.generation();
        Ok(())
    }

    /// Settles a placeholder exactly once. Results of a superseded run are
    /// refused, as is a second write to the same slot.
    pub fn settle_slot(
        &mut self,
        ticket: &GenerationTicket,
        image: GeneratedImage,
    ) -> Result<(), StageError> {
        if !ticket.is_current() || ticket.generation() != self.generation {
            return Err(StageError::validation(format!(
                "slot {} belongs to a superseded generation",
                image.id
            )));
        }
        if image.kind == ImageKind::Placeholder {
            return Err(StageError::validation("cannot settle a slot to a placeholder"));
        }
        let slot = self
            .images
            .get_mut(image.id)
            .ok_or_else(|| StageError::validation(format!("no slot {}", image.id)))?;
        if slot.is_settled() {
            return Err(StageError::validation(format!("slot {} already settled", image.id)));
        }
        *slot = image;
        Ok(())
    }

    /// Drops every slot except the original and the prompts that made them.
    pub fn discard_generated(&mut self) {
        self.images.truncate(1);
        self.style_prompts = None;
        self.selected_style = None;
    }

    pub fn success_count(&self) -> usize {
        self.images
            .iter()
            .filter(|i| i.kind == ImageKind::Generated)
            .count()
    }

    pub fn select_style(&mut self, slot: usize) -> Result<(), StageError> {
        match self.images.get(slot) {
            Some(img) if img.is_usable() => {
                self.selected_style = Some(slot);
                Ok(())
            }
            Some(_) => Err(StageError::validation(format!("slot {} has no image", slot))),
            None => Err(StageError::validation(format!("no slot {}", slot))),
        }
    }

    pub fn selected_image(&self) -> Option<&GeneratedImage> {
        self.images.get(self.selected_style?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompts::PromptVersion;
    use crate::services::tags::default_tag_recommendation;

    fn draft_with_prompts() -> CharacterDraft {
        let mut draft = CharacterDraft::new();
        draft.set_image(InlineImage::from_bytes(&[0xff, 0xd8, 0xff, 0xe0], None));
        draft.style_prompts = Some(StylePrompts {
            prompts: vec!["a".into(), "b".into(), "c".into()],
            style_labels: vec!["Scene 1".into(), "Scene 2".into(), "Scene 3".into()],
            version: PromptVersion::V0_6,
            method: "version_managed".into(),
        });
        draft
    }

    #[test]
    fn test_settle_slot_once() {
        let guard = GenerationGuard::new();
        let ticket = guard.advance();
        let mut draft = draft_with_prompts();
        draft.begin_generation(&ticket).unwrap();
        assert_eq!(draft.images.len(), 4);
        assert_eq!(draft.images[0].kind, ImageKind::Original);
        assert!(draft.images[1..].iter().all(|i| i.kind == ImageKind::Placeholder));

        let ok = GeneratedImage::generated(1, "https://x/1.jpg".into(), "a", Some("Scene 1"), 10);
        draft.settle_slot(&ticket, ok.clone()).unwrap();
        let again = GeneratedImage::failed(1, "boom".into(), "a", None, 5);
        assert!(draft.settle_slot(&ticket, again).is_err());
        assert_eq!(draft.images[1], ok);

        // slot 0 is born settled
        let original = draft.images[0].clone();
        assert!(draft.settle_slot(&ticket, original).is_err());
        assert!(draft
            .settle_slot(&ticket, GeneratedImage::failed(9, "x".into(), "a", None, 0))
            .is_err());
        assert_eq!(draft.success_count(), 1);
    }

    #[test]
    fn test_superseded_ticket_cannot_write() {
        let guard = GenerationGuard::new();
        let old = guard.advance();
        let mut draft = draft_with_prompts();
        draft.begin_generation(&old).unwrap();

        let new = guard.advance();
        assert!(!old.is_current());
        let late = GeneratedImage::generated(1, "https://x/old.jpg".into(), "a", None, 1);
        assert!(draft.settle_slot(&old, late.clone()).is_err());
        // a current ticket still cannot write into a draft begun under the old one
        assert!(draft.settle_slot(&new, late).is_err());

        draft.begin_generation(&new).unwrap();
        let fresh = GeneratedImage::generated(1, "https://x/new.jpg".into(), "a", None, 1);
        draft.settle_slot(&new, fresh).unwrap();
    }

    #[test]
    fn test_discard_keeps_original() {
        let ticket = GenerationGuard::new().advance();
        let mut draft = draft_with_prompts();
        draft.begin_generation(&ticket).unwrap();
        draft
            .settle_slot(&ticket, GeneratedImage::generated(2, "u".into(), "b", None, 1))
            .unwrap();
        draft.select_style(2).unwrap();
        assert!(draft.select_style(1).is_err());

        draft.discard_generated();
        assert_eq!(draft.images.len(), 1);
        assert_eq!(draft.images[0].kind, ImageKind::Original);
        assert!(draft.style_prompts.is_none());
        assert!(draft.selected_image().is_none());
    }

    #[test]
    fn test_merge_recommended_does_not_select() {
        let mut draft = CharacterDraft::new();
        let candidates = draft.merge_recommended(&default_tag_recommendation());
        let first: Vec<&str> = candidates.iter().take(6).map(|c| c.label()).collect();
        assert_eq!(first, vec!["Mysterious", "Prince", "Vampire", "CEO", "Artist", "Model"]);
        assert_eq!(
            candidates.len(),
            library::by_namespace(TagNamespace::Persona).len()
        );
        assert_eq!(draft.recommended_labels.last().map(String::as_str), Some("Secret-Admirer"));
        assert!(draft.persona_tags.is_empty());
        assert!(draft.relationship.is_none());
    }

    #[test]
    fn test_free_form_labels_become_custom_candidates() {
        let rec = TagRecommendation {
            persona_tags: vec![
                "Street Queen".to_string(),
                "vampire".to_string(),
                "Vampire Queen".to_string(),
            ],
            relationship_tag: Some("Partner in Crime".to_string()),
            image_analysis: None,
            method: "free_form".to_string(),
        };
        let mut draft = CharacterDraft::new();
        let candidates = draft.merge_recommended(&rec);

        let first: Vec<String> = candidates.iter().take(4).map(|c| c.id()).collect();
        assert_eq!(
            first,
            vec![
                "custom:Street Queen",
                "p46",
                "custom:Vampire Queen",
                "custom:Partner in Crime"
            ]
        );
        assert_eq!(
            candidates.len(),
            library::by_namespace(TagNamespace::Persona).len() + 3
        );

        draft.select_tags(&["custom:Street Queen", "p46", "custom:street queen", "r4"]);
        assert_eq!(draft.persona_tags, vec!["p46"]);
        assert_eq!(draft.custom_persona_labels, vec!["Street Queen"]);
        assert_eq!(
            draft.selected_labels(),
            vec!["Vampire", "Street Queen", "Secret-Admirer"]
        );

        draft.select_tags(&["custom:Red Storm"]);
        assert!(draft.has_tags());
        assert_eq!(draft.selected_labels(), vec!["Red Storm"]);
    }

    #[test]
    fn test_select_tags_routes_by_namespace() {
        let mut draft = CharacterDraft::new();
        draft.select_tags(&["p46", "p1", "p46", "r4", "t5", "nope"]);
        assert_eq!(draft.persona_tags, vec!["p46", "p1"]);
        assert_eq!(draft.relationship.as_deref(), Some("r4"));
        assert_eq!(draft.targeting.as_deref(), Some("t5"));
        assert_eq!(
            draft.selected_labels(),
            vec!["Vampire", "CEO", "Secret-Admirer", "Everyone"]
        );
    }

    #[test]
    fn test_missing_image_is_resource_error() {
        let mut draft = CharacterDraft::new();
        assert_eq!(draft.require_image().unwrap_err().kind(), "resource");
        let ticket = GenerationGuard::new().advance();
        assert_eq!(draft.begin_generation(&ticket).unwrap_err().kind(), "resource");
    }
}
