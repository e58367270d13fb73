pub mod cache;
pub mod catalog;
pub mod elevenlabs;
pub mod matcher;

pub use cache::{LibrarySource, LibraryStatus, VoiceLibrary};
pub use matcher::{fallback_voice, VoiceMatcher, VoiceRecommendation};

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_provider")]
    pub provider: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Fetch one remote collection instead of official + community.
    #[serde(default)]
    pub collection: Option<String>,
    /// Catalog entries shown to the model when matching.
    #[serde(default = "default_max_prompt_voices")]
    pub max_prompt_voices: usize,
    pub elevenlabs: Option<elevenlabs::ElevenLabsConfig>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: default_voice_provider(),
            cache_ttl_seconds: default_cache_ttl(),
            collection: None,
            max_prompt_voices: default_max_prompt_voices(),
            elevenlabs: None,
        }
    }
}

fn default_voice_provider() -> String {
    "elevenlabs".to_string()
}
fn default_cache_ttl() -> u64 {
    600
}
fn default_max_prompt_voices() -> usize {
    40
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSource {
    Official,
    Community,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub id: String,
    pub name: String,
    pub gender: String,
    #[serde(default)]
    pub accent: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub use_case: String,
    pub source: VoiceSource,
    #[serde(default)]
    pub recommended: bool,
}

impl VoiceEntry {
    /// Case-insensitive count of `tags` this voice carries.
    pub fn overlap<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        self.tags
            .iter()
            .filter(|own| tags.iter().any(|t| t.as_ref().eq_ignore_ascii_case(own)))
            .count()
    }
}
