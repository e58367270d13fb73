use super::{VoiceConfig, VoiceEntry, VoiceSource};
use crate::services::envelope::Envelope;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub voice_settings: VoiceSettings,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model_id: default_model_id(),
            timeout_seconds: default_timeout(),
            voice_settings: VoiceSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

fn default_base_url() -> String {
    "https://api.elevenlabs.io/v1/".to_string()
}
fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}
fn default_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceScope {
    /// Provider presets.
    Official,
    /// Voices shared by other users.
    Community,
    Collection(String),
}

#[async_trait]
pub trait VoiceCatalog: Send + Sync + Debug {
    async fn fetch_voices(&self, scope: &VoiceScope) -> Result<Vec<VoiceEntry>>;

    async fn list_voices(&self, scope: &VoiceScope) -> Envelope<Vec<VoiceEntry>> {
        Envelope::capture(self.fetch_voices(scope)).await
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + Debug {
    /// Returns encoded audio (MP3 for ElevenLabs).
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>>;

    async fn speak(&self, voice_id: &str, text: &str) -> Envelope<Vec<u8>> {
        Envelope::capture(self.synthesize(voice_id, text)).await
    }
}

/// One client serves both the catalog and speech.
pub fn create_voice_client(config: &VoiceConfig) -> Result<Arc<ElevenLabsClient>> {
    match config.provider.as_str() {
        "elevenlabs" => {
            let cfg = config
                .elevenlabs
                .clone()
                .context("ElevenLabs config missing")?;
            if cfg.api_key.is_empty() {
                bail!("ElevenLabs API key missing (voice.elevenlabs.api_key or ELEVENLABS_API_KEY)");
            }
            Ok(Arc::new(ElevenLabsClient::new(cfg)?))
        }
        other => Err(anyhow!("Unknown voice provider: {}", other)),
    }
}

#[derive(Debug)]
pub struct ElevenLabsClient {
    config: ElevenLabsConfig,
    base: Url,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid ElevenLabs base URL: {}", config.base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .client
            .get(url.clone())
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await
            .with_context(|| format!("ElevenLabs request to {} failed", url.path()))?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("ElevenLabs API error {}: {}", status, text);
        }
        serde_json::from_str(&text).context("Failed to parse ElevenLabs voice list")
    }
}

#[derive(Deserialize)]
struct VoicesResponse<T> {
    #[serde(default)]
    voices: Vec<T>,
}

#[derive(Deserialize, Debug, Default)]
struct OfficialVoice {
    voice_id: String,
    #[serde(default)]
    name: String,
    category: Option<String>,
    description: Option<String>,
    preview_url: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
struct SharedVoice {
    voice_id: String,
    #[serde(default)]
    name: String,
    gender: Option<String>,
    accent: Option<String>,
    age: Option<String>,
    descriptive: Option<String>,
    use_case: Option<String>,
    category: Option<String>,
    description: Option<String>,
    preview_url: Option<String>,
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn non_empty(values: [Option<&str>; 5]) -> Vec<String> {
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn description_or_default(description: Option<&str>, name: &str) -> String {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} voice", name))
}

fn official_entry(v: OfficialVoice) -> VoiceEntry {
    let label = |k: &str| v.labels.get(k).map(String::as_str);
    VoiceEntry {
        tags: non_empty([
            label("accent"),
            label("age"),
            label("descriptive"),
            label("use_case"),
            v.category.as_deref(),
        ]),
        gender: capitalize(label("gender").unwrap_or("unknown")),
        accent: label("accent").unwrap_or_default().to_string(),
        age: label("age").unwrap_or_default().to_string(),
        use_case: label("use_case").unwrap_or_default().to_string(),
        description: description_or_default(v.description.as_deref(), &v.name),
        category: v.category.clone().unwrap_or_else(|| "premade".to_string()),
        preview_url: v.preview_url.clone().filter(|u| !u.is_empty()),
        source: VoiceSource::Official,
        recommended: false,
        id: v.voice_id,
        name: v.name,
    }
}

fn community_entry(v: SharedVoice) -> VoiceEntry {
    VoiceEntry {
        tags: non_empty([
            v.accent.as_deref(),
            v.age.as_deref(),
            v.descriptive.as_deref(),
            v.use_case.as_deref(),
            v.category.as_deref(),
        ]),
        gender: capitalize(v.gender.as_deref().unwrap_or("unknown")),
        accent: v.accent.clone().unwrap_or_default(),
        age: v.age.clone().unwrap_or_default(),
        use_case: v.use_case.clone().unwrap_or_default(),
        description: description_or_default(v.description.as_deref(), &v.name),
        category: v.category.clone().unwrap_or_else(|| "shared".to_string()),
        preview_url: v.preview_url.clone().filter(|u| !u.is_empty()),
        source: VoiceSource::Community,
        recommended: false,
        id: v.voice_id,
        name: v.name,
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

#[async_trait]
impl VoiceCatalog for ElevenLabsClient {
    async fn fetch_voices(&self, scope: &VoiceScope) -> Result<Vec<VoiceEntry>> {
        let voices = match scope {
            VoiceScope::Official => {
                let resp: VoicesResponse<OfficialVoice> =
                    self.get_json(self.base.join("voices")?).await?;
                resp.voices
                    .into_iter()
                    .filter(|v| v.category.as_deref() == Some("premade"))
                    .map(official_entry)
                    .collect::<Vec<_>>()
            }
            VoiceScope::Community => {
                let resp: VoicesResponse<SharedVoice> =
                    self.get_json(self.base.join("shared-voices")?).await?;
                resp.voices.into_iter().map(community_entry).collect()
            }
            VoiceScope::Collection(id) => {
                let mut url = self.base.join("voices")?;
                url.query_pairs_mut().append_pair("collection_id", id);
                let resp: VoicesResponse<OfficialVoice> = self.get_json(url).await?;
                resp.voices.into_iter().map(official_entry).collect()
            }
        };
        info!("ElevenLabs {:?}: {} voices", scope, voices.len());
        Ok(voices)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
        let url = self.base.join(&format!("text-to-speech/{}", voice_id))?;
        debug!("TTS {} <- {:?}", voice_id, text);

        let resp = self
            .client
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.config.model_id,
                voice_settings: &self.config.voice_settings,
            })
            .send()
            .await
            .context("ElevenLabs TTS request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("ElevenLabs TTS error {}: {}", status, text);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            bail!("ElevenLabs TTS returned no audio");
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_official_voice_mapping() {
        let json = r#"{
            "voices": [
                {
                    "voice_id": "21m00Tcm4TlvDq8ikWAM",
                    "name": "Rachel",
                    "category": "premade",
                    "labels": {
                        "accent": "american",
                        "age": "young",
                        "gender": "FEMALE",
                        "descriptive": "calm",
                        "use_case": "narration"
                    },
                    "preview_url": "https://storage/rachel.mp3"
                },
                {
                    "voice_id": "abc",
                    "name": "Clone",
                    "category": "cloned",
                    "labels": {}
                }
            ]
        }"#;
        let resp: VoicesResponse<OfficialVoice> = serde_json::from_str(json).unwrap();
        let entries: Vec<VoiceEntry> = resp.voices.into_iter().map(official_entry).collect();

        let rachel = &entries[0];
        assert_eq!(rachel.gender, "Female");
        assert_eq!(
            rachel.tags,
            vec!["american", "young", "calm", "narration", "premade"]
        );
        assert_eq!(rachel.description, "Rachel voice");
        assert_eq!(rachel.source, VoiceSource::Official);
        assert_eq!(rachel.preview_url.as_deref(), Some("https://storage/rachel.mp3"));

        let clone = &entries[1];
        assert_eq!(clone.gender, "Unknown");
        assert_eq!(clone.tags, vec!["cloned"]);
    }

    #[test]
    fn test_shared_voice_mapping() {
        let json = r#"{
            "voices": [
                {
                    "voice_id": "s1",
                    "name": "Brooding Narrator",
                    "gender": "male",
                    "accent": "british",
                    "age": "middle_aged",
                    "descriptive": "deep",
                    "use_case": "characters",
                    "category": "professional",
                    "description": "A deep gravelly voice",
                    "preview_url": ""
                }
            ],
            "has_more": true
        }"#;
        let resp: VoicesResponse<SharedVoice> = serde_json::from_str(json).unwrap();
        let entry = community_entry(resp.voices.into_iter().next().unwrap());
        assert_eq!(entry.gender, "Male");
        assert_eq!(entry.source, VoiceSource::Community);
        assert_eq!(entry.description, "A deep gravelly voice");
        assert_eq!(entry.preview_url, None);
        assert_eq!(entry.tags.len(), 5);
    }

    #[test]
    fn test_speech_request_shape() {
        let settings = VoiceSettings::default();
        let body = serde_json::to_value(SpeechRequest {
            text: "Hi",
            model_id: "eleven_multilingual_v2",
            voice_settings: &settings,
        })
        .unwrap();
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
        assert_eq!(body["voice_settings"]["use_speaker_boost"], true);
    }

    #[test]
    fn test_factory() {
        let mut config = VoiceConfig::default();
        assert!(create_voice_client(&config).is_err());
        config.elevenlabs = Some(ElevenLabsConfig {
            api_key: "xi".to_string(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            ..Default::default()
        });
        let client = create_voice_client(&config).unwrap();
        assert_eq!(
            client.base.join("shared-voices").unwrap().as_str(),
            "https://api.elevenlabs.io/v1/shared-voices"
        );
    }
}
