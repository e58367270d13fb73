use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An image carried inline as base64, the way vision APIs want it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| sniff_mime(bytes).to_string());
        Self {
            mime_type,
            data: STANDARD.encode(bytes),
        }
    }

    /// Accepts both `data:image/png;base64,....` and a bare base64 string.
    pub fn from_data_url(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("data:") {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| anyhow!("Malformed data URL: missing ','"))?;
            let mime_type = header
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .unwrap_or("image/jpeg")
                .to_string();
            if !header.contains("base64") {
                return Err(anyhow!("Only base64 data URLs are supported"));
            }
            // Validate once so later decode() calls can't surprise us.
            STANDARD
                .decode(payload)
                .context("Data URL payload is not valid base64")?;
            Ok(Self {
                mime_type,
                data: payload.to_string(),
            })
        } else {
            let bytes = STANDARD
                .decode(input)
                .context("Image payload is not valid base64")?;
            Ok(Self::from_bytes(&bytes, None))
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        if bytes.is_empty() {
            return Err(anyhow!("Image file {} is empty", path.display()));
        }
        Ok(Self::from_bytes(&bytes, None))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .context("Image payload is not valid base64")
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }
}

/// Guesses the mime type from magic bytes, defaulting to JPEG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_round_trip() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let image = InlineImage::from_bytes(&png, None);
        assert_eq!(image.mime_type, "image/png");

        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));

        let parsed = InlineImage::from_data_url(&url).unwrap();
        assert_eq!(parsed, image);
        assert_eq!(parsed.decode().unwrap(), png.to_vec());
    }

    #[test]
    fn test_bare_base64_is_accepted() {
        let encoded = STANDARD.encode([0xff, 0xd8, 0xff, 0xe0]);
        let image = InlineImage::from_data_url(&encoded).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.file_extension(), "jpg");
    }

    #[test]
    fn test_invalid_payload_is_rejected() {
        assert!(InlineImage::from_data_url("data:image/png;base64,@@@").is_err());
        assert!(InlineImage::from_data_url("data:image/png,plain").is_err());
        assert!(InlineImage::from_data_url("not base64 at all!").is_err());
    }

    #[tokio::test]
    async fn test_from_path_rejects_empty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"")?;
        assert!(InlineImage::from_path(&path).await.is_err());

        let path = dir.path().join("photo.gif");
        std::fs::write(&path, b"GIF89a....")?;
        let image = InlineImage::from_path(&path).await?;
        assert_eq!(image.mime_type, "image/gif");
        Ok(())
    }
}
