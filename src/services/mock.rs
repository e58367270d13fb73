//! Hand-written provider doubles shared by the service tests.

use crate::services::image_gen::ImageGenerator;
use crate::services::llm::LlmClient;
use crate::services::voice::elevenlabs::{SpeechSynthesizer, VoiceCatalog, VoiceScope};
use crate::services::voice::VoiceEntry;
use crate::utils::image::InlineImage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub user: String,
    pub had_image: bool,
}

/// Answers from a queue, or from a route whose needle appears in the
/// system prompt. Routes win so concurrent stages stay deterministic.
#[derive(Debug, Default, Clone)]
pub struct MockLlm {
    pub replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    pub routes: Arc<Mutex<Vec<(String, Result<String, String>)>>>,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockLlm {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        for r in replies {
            mock.replies.lock().unwrap().push_back(Ok(r.into()));
        }
        mock
    }

    pub fn failing(message: &str) -> Self {
        let mock = Self::default();
        mock.route("", Err(message.to_string()));
        mock
    }

    pub fn route(&self, needle: &str, reply: Result<String, String>) {
        self.routes.lock().unwrap().push((needle.to_string(), reply));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(&self, system: &str, user: &str, image: Option<&InlineImage>) -> Result<String> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            user: user.to_string(),
            had_image: image.is_some(),
        });
        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| system.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());
        let reply = match routed {
            Some(r) => r,
            None => self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".to_string())),
        };
        reply.map_err(|e| anyhow!(e))
    }
}

/// Image generator that fails for chosen prompt indices (1-based slots).
#[derive(Debug, Default, Clone)]
pub struct MockImageGenerator {
    pub fail_slots: Vec<usize>,
    pub fail_upload: bool,
    pub uploads: Arc<Mutex<usize>>,
    pub prompts: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn upload_reference(&self, _image: &InlineImage) -> Result<String> {
        *self.uploads.lock().unwrap() += 1;
        if self.fail_upload {
            return Err(anyhow!("connection refused"));
        }
        Ok("https://cdn.example/ref.jpg".to_string())
    }

    async fn generate_image(&self, prompt: &str, reference_url: Option<&str>) -> Result<String> {
        let slot = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push((prompt.to_string(), reference_url.map(str::to_string)));
            prompts.len()
        };
        if self.fail_slots.contains(&slot) {
            return Err(anyhow!("content moderation rejected prompt {}", slot));
        }
        Ok(format!("https://cdn.example/generated-{}.jpg", slot))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockVoiceCatalog {
    pub official: Vec<VoiceEntry>,
    pub community: Vec<VoiceEntry>,
    pub fail: bool,
    pub fetches: Arc<Mutex<usize>>,
    pub delay_ms: u64,
}

#[async_trait]
impl VoiceCatalog for MockVoiceCatalog {
    async fn fetch_voices(&self, scope: &VoiceScope) -> Result<Vec<VoiceEntry>> {
        *self.fetches.lock().unwrap() += 1;
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(anyhow!("HTTP 401"));
        }
        Ok(match scope {
            VoiceScope::Official => self.official.clone(),
            VoiceScope::Community | VoiceScope::Collection(_) => self.community.clone(),
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockSpeech {
    pub spoken: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>> {
        self.spoken
            .lock()
            .unwrap()
            .push((voice_id.to_string(), text.to_string()));
        Ok(b"ID3mock".to_vec())
    }
}
