use crate::core::config::Config;
use crate::services::envelope::Envelope;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoConfig {
    /// Image-to-video job endpoint. Animation is skipped when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_video_duration")]
    pub duration_seconds: u32,
    #[serde(default = "default_video_timeout")]
    pub timeout_seconds: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            model: None,
            duration_seconds: default_video_duration(),
            timeout_seconds: default_video_timeout(),
        }
    }
}

fn default_video_duration() -> u32 {
    5
}
fn default_video_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimateOptions {
    /// Overrides the configured clip length.
    pub duration_seconds: Option<u32>,
    /// Line the character speaks, for backends that lip-sync.
    pub script_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum VideoJob {
    Ready(String),
    Queued(String),
}

#[async_trait]
pub trait VideoAnimator: Send + Sync + Debug {
    async fn submit(
        &self,
        first_frame_url: &str,
        motion_prompt: &str,
        options: &AnimateOptions,
    ) -> Result<VideoJob>;

    async fn animate(
        &self,
        first_frame_url: &str,
        motion_prompt: &str,
        options: &AnimateOptions,
    ) -> Envelope<VideoJob> {
        Envelope::capture(self.submit(first_frame_url, motion_prompt, options)).await
    }
}

/// `None` when no endpoint is configured.
pub fn create_video_animator(config: &Config) -> Result<Option<Box<dyn VideoAnimator>>> {
    let Some(endpoint) = config.video.endpoint.as_deref() else {
        return Ok(None);
    };
    if config.video.api_key.is_empty() {
        bail!("video api key missing (video.api_key or VIDEO_API_KEY)");
    }
    let endpoint =
        Url::parse(endpoint).with_context(|| format!("Invalid video endpoint: {}", endpoint))?;
    Ok(Some(Box::new(HttpVideoClient::new(
        config.video.clone(),
        endpoint,
    )?)))
}

#[derive(Debug)]
struct HttpVideoClient {
    config: VideoConfig,
    endpoint: Url,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct AnimateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    image_url: &'a str,
    prompt: &'a str,
    duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<&'a str>,
}

impl HttpVideoClient {
    fn new(config: VideoConfig, endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }
}

/// A finished clip URL wins over a task id.
fn parse_job(body: &Value) -> Option<VideoJob> {
    let scopes = [Some(body), body.get("data")];
    let field = |keys: &[&str]| {
        scopes.iter().flatten().find_map(|scope| {
            keys.iter()
                .find_map(|k| scope.get(*k).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    };
    field(&["video_url", "url"])
        .map(VideoJob::Ready)
        .or_else(|| field(&["task_id", "id"]).map(VideoJob::Queued))
}

#[async_trait]
impl VideoAnimator for HttpVideoClient {
    async fn submit(
        &self,
        first_frame_url: &str,
        motion_prompt: &str,
        options: &AnimateOptions,
    ) -> Result<VideoJob> {
        if !first_frame_url.starts_with("http") {
            bail!("video backend needs a fetchable first frame, got inline data");
        }
        let body = AnimateRequest {
            model: self.config.model.as_deref(),
            image_url: first_frame_url,
            prompt: motion_prompt,
            duration: options.duration_seconds.unwrap_or(self.config.duration_seconds),
            script: options.script_text.as_deref(),
        };
        info!("Submitting intro video ({}s)", body.duration);
        debug!("Video motion prompt: {}", motion_prompt);

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Video request failed")?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("Video API error {}: {}", status, text);
        }
        let json: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse video response: {}", text))?;
        parse_job(&json).ok_or_else(|| anyhow!("Video response had neither URL nor task: {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_job_shapes() {
        assert_eq!(
            parse_job(&json!({"video_url": "https://v/1.mp4"})),
            Some(VideoJob::Ready("https://v/1.mp4".to_string()))
        );
        assert_eq!(
            parse_job(&json!({"data": {"task_id": "t-9", "url": ""}})),
            Some(VideoJob::Queued("t-9".to_string()))
        );
        assert_eq!(
            parse_job(&json!({"id": "t-1", "data": {"url": "https://v/2.mp4"}})),
            Some(VideoJob::Ready("https://v/2.mp4".to_string()))
        );
        assert_eq!(parse_job(&json!({"ok": true})), None);
    }

    #[test]
    fn test_factory() {
        let mut config = Config::default();
        assert!(create_video_animator(&config).unwrap().is_none());

        config.video.endpoint = Some("https://video.example/api/jobs".to_string());
        assert!(create_video_animator(&config).is_err());

        config.video.api_key = "k".to_string();
        assert!(create_video_animator(&config).unwrap().is_some());

        config.video.endpoint = Some("not a url".to_string());
        assert!(create_video_animator(&config).is_err());
    }

    #[tokio::test]
    async fn test_inline_first_frame_is_refused() {
        let client = HttpVideoClient::new(
            VideoConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
            Url::parse("https://video.example/api/jobs").unwrap(),
        )
        .unwrap();
        let env = client
            .animate("data:image/png;base64,AA", "smile", &AnimateOptions::default())
            .await;
        assert!(!env.is_success());
        assert!(env.error().unwrap().contains("fetchable"));
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let body = serde_json::to_value(AnimateRequest {
            model: None,
            image_url: "https://i/1.jpg",
            prompt: "smile",
            duration: 5,
            script: None,
        })
        .unwrap();
        assert_eq!(body, json!({"image_url": "https://i/1.jpg", "prompt": "smile", "duration": 5}));
    }
}
