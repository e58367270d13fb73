use crate::core::config::Config;
use crate::services::envelope::Envelope;
use crate::utils::image::InlineImage;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_image_provider")]
    pub provider: String,
    /// Pause between two generation calls.
    #[serde(default = "default_slot_delay_ms")]
    pub slot_delay_ms: u64,
    pub sevenverse: Option<SevenVerseConfig>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            provider: default_image_provider(),
            slot_delay_ms: default_slot_delay_ms(),
            sevenverse: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SevenVerseConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_sevenverse_base_url")]
    pub base_url: String,
    #[serde(default = "default_vendor")]
    pub vendor: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_image_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SevenVerseConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_sevenverse_base_url(),
            vendor: default_vendor(),
            size: default_size(),
            timeout_seconds: default_image_timeout(),
        }
    }
}

fn default_image_provider() -> String {
    "7verse".to_string()
}
fn default_slot_delay_ms() -> u64 {
    300
}
fn default_sevenverse_base_url() -> String {
    "https://uat.7verse.ai/".to_string()
}
fn default_vendor() -> String {
    "IMAGE_VENDOR_SEEDREAM".to_string()
}
fn default_size() -> String {
    "2560x1440".to_string()
}
fn default_image_timeout() -> u64 {
    60
}

/// Image-to-image backend: a reference photo in, one stylised image URL out.
#[async_trait]
pub trait ImageGenerator: Send + Sync + Debug {
    /// Stores the reference photo and returns a URL the generator can fetch.
    async fn upload_reference(&self, image: &InlineImage) -> Result<String>;

    async fn generate_image(&self, prompt: &str, reference_url: Option<&str>) -> Result<String>;

    async fn generate(&self, prompt: &str, reference_url: Option<&str>) -> Envelope<String> {
        Envelope::capture(self.generate_image(prompt, reference_url)).await
    }
}

pub fn create_image_generator(config: &Config) -> Result<Box<dyn ImageGenerator>> {
    match config.image.provider.as_str() {
        "7verse" => {
            let cfg = config
                .image
                .sevenverse
                .clone()
                .context("7verse config missing")?;
            if cfg.token.is_empty() {
                bail!("7verse token missing (image.sevenverse.token or SEVENVERSE_TOKEN)");
            }
            Ok(Box::new(SevenVerseClient::new(cfg)?))
        }
        other => Err(anyhow!("Unknown image provider: {}", other)),
    }
}

#[derive(Debug)]
struct SevenVerseClient {
    config: SevenVerseConfig,
    base: Url,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    vendor: &'a str,
    image_prompt: &'a str,
    size: &'a str,
    count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_image_url_list: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    ok: bool,
    data: Option<UploadData>,
}

#[derive(Deserialize)]
struct UploadData {
    url: Option<String>,
    #[serde(default)]
    success: bool,
}

impl SevenVerseClient {
    fn new(config: SevenVerseConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid 7verse base URL: {}", config.base_url))?;
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

    fn request_body<'a>(&'a self, prompt: &'a str, reference_url: Option<&str>) -> GenerateRequest<'a> {
        GenerateRequest {
            vendor: &self.config.vendor,
            image_prompt: prompt,
            size: &self.config.size,
            count: 1,
            // the endpoint only takes fetchable URLs, never inline data
            ref_image_url_list: reference_url
                .filter(|u| u.starts_with("http"))
                .map(|u| vec![u.to_string()]),
        }
    }
}

/// Pulls the first image URL out of a generation response.
fn extract_image_url(body: &Value) -> Option<String> {
    let first_url = |list: &Value| -> Option<String> {
        let item = list.as_array()?.first()?;
        match item {
            Value::String(s) => Some(s.clone()),
            other => other
                .get("image_url")
                .or_else(|| other.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    };

    let data = body.get("data");
    [
        data.and_then(|d| d.get("image_list")),
        body.get("image_list"),
        data.and_then(|d| d.get("images")),
        body.get("images"),
    ]
    .into_iter()
    .flatten()
    .find_map(first_url)
    .or_else(|| {
        ["image_url", "url"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str).map(str::to_string))
    })
}

#[async_trait]
impl ImageGenerator for SevenVerseClient {
    async fn upload_reference(&self, image: &InlineImage) -> Result<String> {
        let url = self.base.join("api/v2/storage/file")?;
        let bytes = image.decode()?;
        info!("Uploading reference image ({} KB)", bytes.len() / 1024);

        let part = multipart::Part::bytes(bytes)
            .file_name(format!("character_image.{}", image.file_extension()))
            .mime_str(&image.mime_type)
            .context("Invalid mime type")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("mime_type", image.mime_type.clone());

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .multipart(form)
            .send()
            .await
            .context("7verse upload request failed")?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("7verse upload error {}: {}", status, text);
        }
        let result: UploadResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse 7verse upload response: {}", text))?;

        match result.data {
            Some(UploadData { url: Some(url), success }) if result.ok || success => Ok(url),
            _ => Err(anyhow!("7verse upload returned no URL: {}", text)),
        }
    }

    async fn generate_image(&self, prompt: &str, reference_url: Option<&str>) -> Result<String> {
        let url = self.base.join("api/v1/gen/images")?;
        debug!("7verse prompt: {}", prompt);

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&self.request_body(prompt, reference_url))
            .send()
            .await
            .context("7verse request failed")?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            bail!("7verse API error {}: {}", status, text);
        }
        let body: Value = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse 7verse response: {}", text))?;
        if body.get("ok").and_then(Value::as_bool) == Some(false) {
            bail!("7verse rejected the request: {}", text);
        }
        extract_image_url(&body).ok_or_else(|| anyhow!("7verse response had no image: {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> SevenVerseClient {
        SevenVerseClient::new(SevenVerseConfig {
            token: "t".to_string(),
            base_url: "https://uat.7verse.ai".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_extracts_standard_image_list() {
        let body = json!({
            "ok": true,
            "data": { "image_list": [ { "image_id": "img_1", "image_url": "https://cdn/x.png" } ] }
        });
        assert_eq!(extract_image_url(&body).as_deref(), Some("https://cdn/x.png"));
    }

    #[test]
    fn test_extracts_alternative_shapes() {
        assert_eq!(
            extract_image_url(&json!({"images": ["https://a"]})).as_deref(),
            Some("https://a")
        );
        assert_eq!(
            extract_image_url(&json!({"data": {"images": [{"url": "https://b"}]}})).as_deref(),
            Some("https://b")
        );
        assert_eq!(extract_image_url(&json!({"url": "https://c"})).as_deref(), Some("https://c"));
        assert_eq!(extract_image_url(&json!({"ok": true, "data": {"image_list": []}})), None);
    }

    #[test]
    fn test_request_body_only_sends_http_references() {
        let c = client();
        let body = serde_json::to_value(c.request_body("p", Some("https://ref/1.jpg"))).unwrap();
        assert_eq!(body["vendor"], "IMAGE_VENDOR_SEEDREAM");
        assert_eq!(body["size"], "2560x1440");
        assert_eq!(body["count"], 1);
        assert_eq!(body["ref_image_url_list"], json!(["https://ref/1.jpg"]));

        let body = serde_json::to_value(c.request_body("p", Some("data:image/png;base64,AA"))).unwrap();
        assert!(body.get("ref_image_url_list").is_none());
    }

    #[test]
    fn test_base_url_joins_api_paths() {
        let c = client();
        assert_eq!(
            c.base.join("api/v1/gen/images").unwrap().as_str(),
            "https://uat.7verse.ai/api/v1/gen/images"
        );
    }

    #[test]
    fn test_upload_response_parsing() {
        let ok: UploadResponse =
            serde_json::from_str(r#"{"ok": true, "data": {"url": "https://s/1.jpg"}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.data.unwrap().url.as_deref(), Some("https://s/1.jpg"));
    }

    #[test]
    fn test_factory_requires_token() {
        let mut config = Config::default();
        config.image.sevenverse = Some(SevenVerseConfig::default());
        assert!(create_image_generator(&config).is_err());
        config.image.sevenverse = Some(SevenVerseConfig {
            token: "abc".to_string(),
            ..Default::default()
        });
        assert!(create_image_generator(&config).is_ok());
    }
}
