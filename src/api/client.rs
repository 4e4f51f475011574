use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Local;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const OPENAI_URL: &str = "https://api.openai.com/v1/images/generations";
const STABILITY_URL: &str =
    "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";
const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent";

/// Errors from the provider APIs and the surrounding plumbing
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No API key configured. Set one in config.json or IMAGINE_API_KEY.")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Could not decode image payload: {0}")]
    Decode(String),

    #[error("Failed to save image: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the text-to-image provider APIs.
///
/// Cheap to clone; background tasks take their own copy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_key: Option<String>,
    provider: String,
    client: Client,
}

impl ApiClient {
    pub fn new(api_key: Option<String>, provider: Option<String>) -> Self {
        Self {
            api_key,
            provider: provider.unwrap_or_else(|| "openai".to_string()),
            client: Client::new(),
        }
    }

    /// The active provider identifier, used for size-table lookup
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn set_provider(&mut self, provider: &str) {
        self.provider = provider.to_string();
    }

    fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ApiError::MissingApiKey)
    }

    /// Generate an image from a prompt.
    ///
    /// `Ok(None)` means the provider answered successfully but produced no
    /// image; transport and provider failures are `Err`.
    pub async fn generate(
        &self,
        prompt: &str,
        size: (u32, u32),
        negative_prompt: Option<&str>,
    ) -> Result<Option<DynamicImage>, ApiError> {
        debug!(provider = %self.provider, width = size.0, height = size.1, "requesting generation");

        let payload = match self.provider.to_lowercase().as_str() {
            "openai" => self.generate_openai(prompt, size, negative_prompt).await?,
            "stability" => self.generate_stability(prompt, size, negative_prompt).await?,
            "gemini" => self.generate_gemini(prompt, negative_prompt).await?,
            other => return Err(ApiError::UnknownProvider(other.to_string())),
        };

        match payload {
            Some(bytes) => {
                let img = image::load_from_memory(&bytes)
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(Some(img))
            }
            None => Ok(None),
        }
    }

    /// Save a generated image as a PNG under `dir`, deriving the filename
    /// from the prompt and the current time. Returns the full path.
    pub fn save_image(
        &self,
        image: &DynamicImage,
        dir: &Path,
        prompt: &str,
    ) -> Result<PathBuf, ApiError> {
        std::fs::create_dir_all(dir)?;

        let stem = format!(
            "{}_{}",
            prompt_slug(prompt),
            Local::now().format("%Y%m%d_%H%M%S")
        );

        // Same-second saves of the same prompt get a numeric suffix
        let mut path = dir.join(format!("{}.png", stem));
        let mut counter = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.png", stem, counter));
            counter += 1;
        }

        image
            .save(&path)
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        debug!("saved image to {}", path.display());
        Ok(path)
    }

    async fn generate_openai(
        &self,
        prompt: &str,
        size: (u32, u32),
        negative_prompt: Option<&str>,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        // The OpenAI endpoint has no negative prompt; fold it into the text
        let full_prompt = match negative_prompt {
            Some(neg) => format!("{}. Avoid: {}", prompt, neg),
            None => prompt.to_string(),
        };

        // Small sizes are only accepted by the older model
        let model = if size.0 <= 512 && size.1 <= 512 {
            "dall-e-2"
        } else {
            "dall-e-3"
        };

        let request = OpenAiRequest {
            model,
            prompt: &full_prompt,
            n: 1,
            size: format!("{}x{}", size.0, size.1),
            response_format: "b64_json",
        };

        let response = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let body: OpenAiResponse = read_json(response).await?;

        if let Some(error) = body.error {
            return Err(ApiError::Provider(error.message));
        }

        let b64 = body
            .data
            .unwrap_or_default()
            .into_iter()
            .find_map(|img| img.b64_json);

        decode_payload(b64)
    }

    async fn generate_stability(
        &self,
        prompt: &str,
        size: (u32, u32),
        negative_prompt: Option<&str>,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        let mut text_prompts = vec![TextPrompt {
            text: prompt,
            weight: 1.0,
        }];
        if let Some(neg) = negative_prompt {
            text_prompts.push(TextPrompt {
                text: neg,
                weight: -1.0,
            });
        }

        let request = StabilityRequest {
            text_prompts,
            width: size.0,
            height: size.1,
            samples: 1,
        };

        let response = self
            .client
            .post(STABILITY_URL)
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let body: StabilityResponse = read_json(response).await?;

        let b64 = body
            .artifacts
            .unwrap_or_default()
            .into_iter()
            .find_map(|a| a.base64);

        decode_payload(b64)
    }

    async fn generate_gemini(
        &self,
        prompt: &str,
        negative_prompt: Option<&str>,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        // Gemini takes no negative prompt parameter either
        let full_prompt = match negative_prompt {
            Some(neg) => format!("{}. Do not include: {}", prompt, neg),
            None => prompt.to_string(),
        };

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        };

        let url = format!("{}?key={}", GEMINI_URL, self.api_key()?);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let body: GeminiResponse = read_json(response).await?;

        if let Some(error) = body.error {
            return Err(ApiError::Provider(error.message));
        }

        let b64 = body
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.content)
            .filter_map(|c| c.parts)
            .flatten()
            .find_map(|p| p.inline_data.map(|d| d.data));

        decode_payload(b64)
    }
}

/// Check the HTTP status and deserialize the body, keeping the raw text
/// in the error message when something goes wrong.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(ApiError::Provider(format!("HTTP {}: {}", status, text)));
    }

    serde_json::from_str(&text)
        .map_err(|e| ApiError::Decode(format!("{} (body: {})", e, text)))
}

fn decode_payload(b64: Option<String>) -> Result<Option<Vec<u8>>, ApiError> {
    match b64 {
        Some(data) => BASE64
            .decode(data)
            .map(Some)
            .map_err(|e| ApiError::Decode(e.to_string())),
        None => Ok(None),
    }
}

/// Turn a prompt into a short filesystem-safe filename stem
fn prompt_slug(prompt: &str) -> String {
    let slug: String = prompt
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let mut slug: String = slug.chars().take(40).collect();
    slug = slug.trim_matches('_').to_string();

    if slug.is_empty() {
        "image".to_string()
    } else {
        slug
    }
}

// Request/response bodies

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: String,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Option<Vec<OpenAiImage>>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImage {
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

#[derive(Debug, Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: f32,
}

#[derive(Debug, Serialize)]
struct StabilityRequest<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    width: u32,
    height: u32,
    samples: u32,
}

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    artifacts: Option<Vec<StabilityArtifact>>,
}

#[derive(Debug, Deserialize)]
struct StabilityArtifact {
    base64: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
struct GeminiInlineData {
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prompt_slug() {
        assert_eq!(prompt_slug("A red fox, in the snow!"), "a_red_fox_in_the_snow");
        assert_eq!(prompt_slug("   "), "image");
        assert_eq!(prompt_slug("日本語のみ"), "image");

        let long = "x".repeat(100);
        assert_eq!(prompt_slug(&long).len(), 40);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let client = ApiClient::new(Some("key".to_string()), Some("midjourney".to_string()));
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let result = rt.block_on(client.generate("a fox", (512, 512), None));
        assert!(matches!(result, Err(ApiError::UnknownProvider(_))));
    }

    #[test]
    fn test_missing_api_key_is_rejected_before_any_request() {
        let client = ApiClient::new(None, Some("stability".to_string()));
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let result = rt.block_on(client.generate("a fox", (1024, 1024), None));
        assert!(matches!(result, Err(ApiError::MissingApiKey)));
    }

    #[test]
    fn test_save_image_writes_png_and_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let client = ApiClient::new(None, None);
        let img = DynamicImage::new_rgba8(4, 4);

        let first = client.save_image(&img, dir.path(), "tiny test").unwrap();
        let second = client.save_image(&img, dir.path(), "tiny test").unwrap();

        assert!(first.exists());
        assert!(second.exists());
        assert_ne!(first, second);
        assert_eq!(first.extension().unwrap(), "png");
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("tiny_test_"));
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(None).unwrap(), None);

        let encoded = BASE64.encode(b"hello");
        assert_eq!(decode_payload(Some(encoded)).unwrap().unwrap(), b"hello");

        assert!(decode_payload(Some("not base64!!".to_string())).is_err());
    }

    #[test]
    fn test_gemini_response_parsing() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
                    ]
                }
            }]
        }"#;

        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let data = parsed
            .candidates
            .unwrap()
            .into_iter()
            .filter_map(|c| c.content)
            .filter_map(|c| c.parts)
            .flatten()
            .find_map(|p| p.inline_data.map(|d| d.data));

        assert_eq!(data.as_deref(), Some("QUJD"));
    }
}
