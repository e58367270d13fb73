use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::image_gen::{ImageConfig, SevenVerseConfig};
use crate::services::llm::{GeminiConfig, LlmConfig};
use crate::services::tags::TagStrategy;
use crate::services::video_gen::VideoConfig;
use crate::services::voice::elevenlabs::ElevenLabsConfig;
use crate::services::voice::VoiceConfig;

const CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Take every recommendation without prompting.
    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub tag_strategy: TagStrategy,
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    /// Mood used to pick the waiting/completion lines; anything unknown is random.
    #[serde(default = "default_phrase_mood")]
    pub phrase_mood: String,
    /// Speak waiting/completion lines while images generate.
    #[serde(default = "default_true")]
    pub speak_phrases: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tag_strategy: TagStrategy::default(),
            prompt_version: default_prompt_version(),
            phrase_mood: default_phrase_mood(),
            speak_phrases: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            unattended: false,
            llm: LlmConfig::default(),
            image: ImageConfig::default(),
            voice: VoiceConfig::default(),
            video: VideoConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_prompt_version() -> String {
    "v0.6".to_string()
}
fn default_phrase_mood() -> String {
    "random".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_PATH);
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_PATH))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    /// Credentials from the environment win over the file. A provider
    /// section is created on demand when only its key is supplied.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.llm.gemini.get_or_insert_with(GeminiConfig::default).api_key = key;
            info!("Using GEMINI_API_KEY from environment");
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            // no sensible model default, so only fill an existing section
            if let Some(openai) = self.llm.openai.as_mut() {
                openai.api_key = key;
                info!("Using OPENAI_API_KEY from environment");
            }
        }
        if let Some(token) = get("SEVENVERSE_TOKEN") {
            self.image
                .sevenverse
                .get_or_insert_with(SevenVerseConfig::default)
                .token = token;
            info!("Using SEVENVERSE_TOKEN from environment");
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.voice
                .elevenlabs
                .get_or_insert_with(ElevenLabsConfig::default)
                .api_key = key;
            info!("Using ELEVENLABS_API_KEY from environment");
        }
        if let Some(key) = get("VIDEO_API_KEY") {
            self.video.api_key = key;
            info!("Using VIDEO_API_KEY from environment");
        }
    }
}
