//! Illustrative image generation with caching and placeholder fallback.

pub mod cache;
pub mod huggingface;
pub mod placeholder;

pub use cache::{sniff_mime, ImageCache};
pub use huggingface::HfImageBackend;
pub use placeholder::{render_placeholder, PLACEHOLDER_MIME};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ImagesConfig;
use crate::error::Result;

const VISUALIZATION_KEYWORDS: [&str; 8] = [
    "financial planning",
    "investment",
    "savings",
    "loan",
    "budget",
    "vehicle purchase",
    "decision making",
    "growth",
];

const MAX_VISUALIZATION_PROMPTS: usize = 3;

const GENERIC_VISUALIZATION_PROMPT: &str =
    "Modern financial analysis dashboard with data visualization, professional design";

/// A text-to-image model.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Generate one image and return its encoded bytes
    async fn generate(&self, prompt: &str, steps: u32, guidance_scale: f32) -> Result<Vec<u8>>;
}

/// Where a returned image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    Generated,
    Cached,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub origin: ImageOrigin,
}

impl GeneratedImage {
    fn placeholder(prompt: &str) -> Self {
        Self {
            bytes: render_placeholder(prompt),
            mime_type: PLACEHOLDER_MIME.to_string(),
            origin: ImageOrigin::Placeholder,
        }
    }

    fn from_bytes(bytes: Vec<u8>, origin: ImageOrigin) -> Self {
        Self {
            mime_type: sniff_mime(&bytes).to_string(),
            bytes,
            origin,
        }
    }
}

/// Generates images from prompts. Never fails once a prompt is given:
/// backend errors degrade to a placeholder image.
pub struct ImageGenerator {
    backend: Option<Box<dyn ImageBackend>>,
    cache: ImageCache,
    model_id: String,
}

impl ImageGenerator {
    pub fn new(backend: Option<Box<dyn ImageBackend>>, cache: ImageCache, model_id: &str) -> Self {
        Self {
            backend,
            cache,
            model_id: model_id.to_string(),
        }
    }

    /// Build from config. A disabled or unbuildable backend leaves the
    /// generator in placeholder mode.
    pub fn from_config(config: &ImagesConfig) -> Self {
        let backend: Option<Box<dyn ImageBackend>> = if !config.enabled {
            log::info!("Image generation disabled, using placeholder images");
            None
        } else {
            match HfImageBackend::from_config(config) {
                Ok(backend) => {
                    log::info!("Image backend ready: {}", config.model_id);
                    Some(Box::new(backend))
                }
                Err(e) => {
                    log::warn!("Falling back to placeholder images: {}", e);
                    None
                }
            }
        };
        let cache = ImageCache::new(config.disk_cache_dir(), config.cache_capacity);
        Self::new(backend, cache, &config.model_id)
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Generate an image for `prompt`. Returns `None` for a blank prompt.
    pub async fn generate_image(
        &self,
        prompt: &str,
        steps: u32,
        guidance_scale: f32,
    ) -> Option<GeneratedImage> {
        if prompt.trim().is_empty() {
            return None;
        }

        let key = ImageCache::key(&self.model_id, prompt, steps, guidance_scale);
        if let Some(bytes) = self.cache.get(&key).await {
            return Some(GeneratedImage::from_bytes(bytes, ImageOrigin::Cached));
        }

        let Some(backend) = &self.backend else {
            return Some(GeneratedImage::placeholder(prompt));
        };

        log::info!("Generating image from prompt: {}", prompt);
        match backend.generate(prompt, steps, guidance_scale).await {
            Ok(bytes) => {
                self.cache.put(&key, &bytes).await;
                Some(GeneratedImage::from_bytes(bytes, ImageOrigin::Generated))
            }
            Err(e) => {
                log::warn!("Image generation failed, using placeholder: {}", e);
                Some(GeneratedImage::placeholder(prompt))
            }
        }
    }

    /// Generate one image per prompt, skipping blank prompts.
    pub async fn generate_batch(
        &self,
        prompts: &[String],
        steps: u32,
        guidance_scale: f32,
    ) -> Vec<(String, GeneratedImage)> {
        let mut images = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            if let Some(image) = self.generate_image(prompt, steps, guidance_scale).await {
                images.push((prompt.clone(), image));
            }
        }
        images
    }
}

/// Suggest up to three image prompts from the topics a query answer covers.
pub fn visualization_prompts(response: &str) -> Vec<String> {
    let lowered = response.to_lowercase();
    let mut prompts: Vec<String> = VISUALIZATION_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .take(MAX_VISUALIZATION_PROMPTS)
        .map(|kw| {
            format!(
                "Professional infographic about {} with charts, graphs, and icons, \
                 clean design, minimalist",
                kw
            )
        })
        .collect();

    if prompts.is_empty() {
        prompts.push(GENERIC_VISUALIZATION_PROMPT.to_string());
    }
    prompts
}
