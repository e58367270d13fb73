//! The four-step character wizard: photo and tags, styles, voice, preview.
//!
//! Every stage hands back `Result<_, StageError>`; the wizard is the one
//! place that logs the failure and substitutes the stage default, so the
//! caller always gets usable content. Only a missing photo surfaces as an
//! error.

use crate::core::config::Config;
use crate::core::io::Storage;
use crate::core::state::{CharacterDraft, GeneratedImage, GenerationGuard};
use crate::services::envelope::Envelope;
use crate::services::image_gen::ImageGenerator;
use crate::services::images::{GenerationRun, ImageOrchestrator};
use crate::services::llm::LlmClient;
use crate::services::phrases::{completion_phrase_for, waiting_phrase_for};
use crate::services::prompts::{PromptSynthesizer, PromptVersion, StylePrompts};
use crate::services::tags::content::recommend_content_tags;
use crate::services::tags::library::TagCandidate;
use crate::services::tags::{default_tag_recommendation, TagRecommendation, TagRecommender};
use crate::services::video::{default_video_direction, VideoDirection, VideoDirector};
use crate::services::video_gen::{AnimateOptions, VideoAnimator, VideoJob};
use crate::services::voice::catalog::DEFAULT_VOICE_ID;
use crate::services::voice::elevenlabs::SpeechSynthesizer;
use crate::services::voice::{fallback_voice, VoiceEntry, VoiceLibrary, VoiceMatcher, VoiceRecommendation};
use crate::utils::image::InlineImage;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_IMAGE_DESCRIPTION: &str = "A stylized portrait";

/// Provider handles the wizard runs on. Any of the optional ones may be
/// missing, in which case the matching stage always takes its default.
pub struct WizardServices {
    pub llm: Option<Arc<dyn LlmClient>>,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
    pub voices: Arc<VoiceLibrary>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub animator: Option<Arc<dyn VideoAnimator>>,
    pub storage: Arc<dyn Storage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VoicePreview {
    /// The provider hosts a sample.
    Url(String),
    /// Sample synthesised and stored at this path.
    File(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterSummary {
    pub name: Option<String>,
    pub description: Option<String>,
    pub persona: Option<String>,
    pub tags: Vec<String>,
    pub content_tags: Vec<String>,
    pub image: Option<GeneratedImage>,
    pub voice_id: Option<String>,
    pub video: Option<VideoDirection>,
}

#[derive(Clone, Copy)]
enum PhraseKind {
    Waiting,
    Completion,
}

pub struct Wizard {
    config: Arc<Config>,
    tags: Option<TagRecommender>,
    prompts: Option<PromptSynthesizer>,
    prompt_version: PromptVersion,
    matcher: Option<VoiceMatcher>,
    director: Option<VideoDirector>,
    images: ImageOrchestrator,
    voices: Arc<VoiceLibrary>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    animator: Option<Arc<dyn VideoAnimator>>,
    storage: Arc<dyn Storage>,
    guard: GenerationGuard,
    draft: CharacterDraft,
}

impl Wizard {
    pub fn new(config: Arc<Config>, services: WizardServices) -> Self {
        let prompt_version = PromptVersion::resolve(&config.pipeline.prompt_version);
        let llm = services.llm;
        Self {
            tags: llm
                .clone()
                .map(|l| TagRecommender::new(l, config.pipeline.tag_strategy)),
            prompts: llm.clone().map(|l| PromptSynthesizer::new(l, prompt_version)),
            prompt_version,
            matcher: llm
                .clone()
                .map(|l| VoiceMatcher::new(l, config.voice.max_prompt_voices)),
            director: llm.map(VideoDirector::new),
            images: ImageOrchestrator::new(
                services.image_generator,
                Duration::from_millis(config.image.slot_delay_ms),
            ),
            voices: services.voices,
            speech: services.speech,
            animator: services.animator,
            storage: services.storage,
            guard: GenerationGuard::new(),
            draft: CharacterDraft::new(),
            config,
        }
    }

    pub fn draft(&self) -> &CharacterDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut CharacterDraft {
        &mut self.draft
    }

    pub fn upload_image(&mut self, image: InlineImage) {
        // anything still generating belongs to the old photo
        self.guard.advance();
        self.draft.set_image(image);
    }

    // --- Step 1: tags ---

    /// Recommends tags for the photo and returns the persona candidates,
    /// recommended first. When tags are already selected the voice match
    /// runs alongside.
    pub async fn recommend_tags(&mut self) -> Result<Vec<TagCandidate>> {
        let image = self.draft.require_image()?.clone();

        let rec = if self.draft.has_tags() {
            let labels = self.draft.selected_labels();
            let (rec, voice) = tokio::join!(
                self.run_tag_stage(&image),
                self.run_voice_stage(&labels, Some(&image))
            );
            self.apply_voice(voice);
            rec
        } else {
            self.run_tag_stage(&image).await
        };

        Ok(self.draft.merge_recommended(&rec))
    }

    async fn run_tag_stage(&self, image: &InlineImage) -> TagRecommendation {
        let Some(recommender) = &self.tags else {
            return default_tag_recommendation();
        };
        match recommender.recommend(image).await {
            Ok(rec) => {
                info!("Recommended tags: {}", rec.persona_tags.join(", "));
                rec
            }
            Err(e) => {
                warn!("Tag recommendation failed, using defaults: {}", e);
                default_tag_recommendation()
            }
        }
    }

    pub fn select_tags<S: AsRef<str>>(&mut self, ids: &[S]) {
        self.draft.select_tags(ids);
    }

    // --- Step 2: styles ---

    /// Synthesises style prompts and generates one image per prompt.
    /// `on_image_ready` sees every slot, the original first.
    pub async fn generate_styles<F>(&mut self, on_image_ready: F) -> Result<GenerationRun>
    where
        F: FnMut(&GeneratedImage),
    {
        let image = self.draft.require_image()?.clone();
        let labels = self.draft.selected_labels();
        let prompts = self.synthesize_prompts(&labels).await;
        self.draft.style_prompts = Some(prompts.clone());

        let ticket = self.guard.advance();
        self.draft.begin_generation(&ticket)?;
        let voice_id = self.phrase_voice();
        let reference = self.draft.reference_url.clone();

        let (run, _) = tokio::join!(
            self.images.generate_style_images(
                &image,
                reference,
                &prompts.prompts,
                &prompts.style_labels,
                ticket.clone(),
                on_image_ready,
            ),
            self.speak_phrase(PhraseKind::Waiting, &voice_id, ticket.generation())
        );

        for slot in run.images.iter().filter(|s| s.id > 0) {
            if let Err(e) = self.draft.settle_slot(&ticket, slot.clone()) {
                warn!("Dropped slot {}: {}", slot.id, e);
            }
        }
        if run.reference_url.is_some() {
            self.draft.reference_url = run.reference_url.clone();
        }
        if ticket.is_current() {
            self.speak_phrase(PhraseKind::Completion, &voice_id, ticket.generation())
                .await;
        }
        Ok(run)
    }

    /// Throws away every generated slot and the prompts behind them, then
    /// starts over. Never merges with the previous run.
    pub async fn regenerate<F>(&mut self, on_image_ready: F) -> Result<GenerationRun>
    where
        F: FnMut(&GeneratedImage),
    {
        info!("Regenerating styles");
        self.guard.advance();
        self.draft.discard_generated();
        self.generate_styles(on_image_ready).await
    }

    async fn synthesize_prompts(&self, labels: &[String]) -> StylePrompts {
        let Some(synth) = &self.prompts else {
            return StylePrompts::from_table(self.prompt_version, labels);
        };
        match synth.synthesize(labels).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "Prompt synthesis failed, using {} table: {}",
                    self.prompt_version, e
                );
                synth.fallback(labels)
            }
        }
    }

    pub fn select_style(&mut self, slot: usize) -> Result<()> {
        self.draft.select_style(slot)?;
        Ok(())
    }

    // --- Step 3: voice ---

    pub async fn voices(&self) -> Arc<Vec<VoiceEntry>> {
        self.voices.get_voices(false).await
    }

    /// Recommends a voice and selects it.
    pub async fn match_voice(&mut self) -> Result<VoiceRecommendation> {
        let labels = self.draft.selected_labels();
        let image = self.draft.image.clone();
        let rec = self.run_voice_stage(&labels, image.as_ref()).await;
        self.apply_voice(rec.clone());
        Ok(rec)
    }

    async fn run_voice_stage(&self, labels: &[String], image: Option<&InlineImage>) -> VoiceRecommendation {
        let catalog = self.voices.get_voices(false).await;
        // matching is meaningless without tags
        if labels.is_empty() {
            return fallback_voice(labels, &catalog);
        }
        let Some(matcher) = &self.matcher else {
            return fallback_voice(labels, &catalog);
        };
        match matcher.recommend(labels, &catalog, image).await {
            Ok(rec) => {
                info!("Recommended voice: {}", rec.voice_id);
                rec
            }
            Err(e) => {
                warn!("Voice matching failed, using tag overlap: {}", e);
                fallback_voice(labels, &catalog)
            }
        }
    }

    fn apply_voice(&mut self, rec: VoiceRecommendation) {
        self.draft.voice_id = Some(rec.voice_id.clone());
        self.draft.voice_recommendation = Some(rec);
    }

    pub async fn select_voice(&mut self, voice_id: &str) -> Result<()> {
        self.voices.get_voices(false).await;
        if self.voices.voice_by_id(voice_id).is_none() {
            return Err(anyhow!("Unknown voice: {}", voice_id));
        }
        self.draft.voice_id = Some(voice_id.to_string());
        Ok(())
    }

    /// Hosted sample when there is one, otherwise a short greeting spoken
    /// in that voice. A greeting already on disk is reused.
    pub async fn preview_voice(&self, voice_id: &str) -> Result<VoicePreview> {
        self.voices.get_voices(false).await;
        let voice = self
            .voices
            .voice_by_id(voice_id)
            .ok_or_else(|| anyhow!("Unknown voice: {}", voice_id))?;
        if let Some(url) = voice.preview_url.filter(|u| !u.is_empty()) {
            return Ok(VoicePreview::Url(url));
        }

        let path = format!("{}/previews/{}.mp3", self.config.output_folder, voice.id);
        if self.storage.exists(&path).await? {
            debug!("Reusing voice sample {}", path);
            return Ok(VoicePreview::File(path));
        }

        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| anyhow!("No speech provider configured"))?;
        let text = format!("Hi, I'm {}. Nice to meet you!", voice.name);
        let audio = speech.speak(&voice.id, &text).await.into_result()?;
        self.storage.write(&path, &audio).await?;
        Ok(VoicePreview::File(path))
    }

    // --- Step 4: preview ---

    pub async fn direct_video(&mut self) -> Result<VideoDirection> {
        self.draft.require_image()?;
        let description = self
            .draft
            .selected_image()
            .and_then(|i| i.prompt.clone())
            .or_else(|| self.draft.image_analysis.as_ref().map(|a| a.describe()))
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_DESCRIPTION.to_string());
        let voice_id = self
            .draft
            .voice_id
            .clone()
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());
        self.voices.get_voices(false).await;
        let voice = self.voices.voice_by_id(&voice_id);
        let labels = self.draft.selected_labels();

        let direction = match &self.director {
            None => default_video_direction(),
            Some(director) => match director.direct(&description, voice.as_ref(), &labels).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Video direction failed, using default intro: {}", e);
                    default_video_direction()
                }
            },
        };

        if let Some(name) = &direction.suggested_name {
            self.draft.name = Some(name.clone());
        }
        self.draft.description = Some(direction.script_text.clone());
        self.draft.video = Some(direction.clone());
        Ok(direction)
    }

    /// Submits the chosen image and motion prompt to the video backend.
    /// `None` when no backend is configured or the submission failed.
    pub async fn animate_preview(&self) -> Result<Option<VideoJob>> {
        let Some(animator) = &self.animator else {
            return Ok(None);
        };
        let frame = self
            .draft
            .selected_image()
            .and_then(|i| i.url.clone())
            .ok_or_else(|| anyhow!("No style selected"))?;
        let direction = self
            .draft
            .video
            .clone()
            .unwrap_or_else(default_video_direction);
        let options = AnimateOptions {
            duration_seconds: None,
            script_text: Some(direction.script_text.clone()),
        };

        match animator.animate(&frame, &direction.motion_prompt, &options).await {
            Envelope::Success { data, duration_ms } => {
                info!("Video submitted in {} ms: {:?}", duration_ms, data);
                Ok(Some(data))
            }
            Envelope::Failure { error, .. } => {
                warn!("Video submission failed: {}", error);
                Ok(None)
            }
        }
    }

    /// Fills in content tags and writes the run summary to the output folder.
    pub async fn finish(&mut self) -> Result<CharacterSummary> {
        let labels = self.draft.selected_labels();
        self.draft.content_tags = recommend_content_tags(&labels)
            .into_iter()
            .map(str::to_string)
            .collect();

        let persona = self.draft.name.as_ref().filter(|_| !labels.is_empty()).map(|name| {
            let traits: Vec<&str> = labels.iter().take(3).map(String::as_str).collect();
            format!("{} is {}.", name, traits.join(" and ").to_lowercase())
        });

        let summary = CharacterSummary {
            name: self.draft.name.clone(),
            description: self.draft.description.clone(),
            persona,
            tags: labels,
            content_tags: self.draft.content_tags.clone(),
            image: self.draft.selected_image().cloned(),
            voice_id: self.draft.voice_id.clone(),
            video: self.draft.video.clone(),
        };

        let path = format!("{}/character_summary.json", self.config.output_folder);
        self.storage
            .write(&path, serde_json::to_string_pretty(&summary)?.as_bytes())
            .await?;
        info!("Summary written to {}", path);
        Ok(summary)
    }

    fn phrase_voice(&self) -> String {
        self.draft
            .voice_id
            .clone()
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string())
    }

    async fn speak_phrase(&self, kind: PhraseKind, voice_id: &str, generation: u64) {
        if !self.config.pipeline.speak_phrases {
            return;
        }
        let Some(speech) = &self.speech else {
            return;
        };
        let mood = &self.config.pipeline.phrase_mood;
        let (text, name) = match kind {
            PhraseKind::Waiting => (waiting_phrase_for(mood), "waiting"),
            PhraseKind::Completion => (completion_phrase_for(mood), "completion"),
        };

        match speech.speak(voice_id, text).await {
            Envelope::Success { data, .. } => {
                let path = format!(
                    "{}/phrases/{}_{}.mp3",
                    self.config.output_folder, name, generation
                );
                match self.storage.write(&path, &data).await {
                    Ok(()) => info!("{}", text),
                    Err(e) => warn!("Failed to store {} phrase: {:#}", name, e),
                }
            }
            Envelope::Failure { error, .. } => warn!("Failed to speak {} phrase: {}", name, error),
        }
    }
}
