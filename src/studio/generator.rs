//! Image generation against the image models.

use tracing::{info, warn};

use crate::studio::error::StudioError;
use crate::studio::gemini::{
    ApiError, Content, GenerateRequest, GenerationSettings, ImageConfig, ModelApi, Part,
};
use crate::studio::types::{AspectRatio, DesignStyle, ImagePart};

/// Output resolution requested from the high-quality model.
pub const HQ_IMAGE_SIZE: &str = "1K";

const GENERIC_FAILURE: &str = "Image generation failed. Please try again later.";

/// Messages the API uses when the key is rejected or the project can't see the model.
const EXPIRED_SESSION_MARKERS: [&str; 2] = ["Requested entity was not found", "API key not valid"];

/// Model names for each image tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageModels {
    pub standard: String,
    pub high_quality: String,
}

impl ImageModels {
    pub fn pick(&self, high_quality: bool) -> &str {
        if high_quality {
            &self.high_quality
        } else {
            &self.standard
        }
    }
}

/// One variation to render.
#[derive(Debug, Clone)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub style: DesignStyle,
    pub ratio: AspectRatio,
    pub high_quality: bool,
    pub reference: Option<&'a ImagePart>,
    pub seed: u32,
}

/// Build the request body. The reference image goes before the text.
pub fn build_image_request(req: &ImageRequest<'_>) -> GenerateRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some(reference) = req.reference {
        parts.push(Part::inline(reference.mime_type.clone(), reference.data.clone()));
    }
    parts.push(Part::text(req.prompt));

    GenerateRequest {
        contents: vec![Content::user(parts)],
        generation_config: Some(GenerationSettings {
            seed: Some(req.seed),
            image_config: Some(ImageConfig {
                aspect_ratio: req.ratio.as_str().to_string(),
                image_size: req.high_quality.then(|| HQ_IMAGE_SIZE.to_string()),
            }),
        }),
        ..GenerateRequest::default()
    }
}

/// Map an API failure onto the error taxonomy. No retry happens here.
pub fn classify_failure(err: ApiError) -> StudioError {
    if EXPIRED_SESSION_MARKERS.iter().any(|m| err.message.contains(m)) {
        return StudioError::SessionExpired;
    }
    if err.message.trim().is_empty() {
        return StudioError::Transport(GENERIC_FAILURE.to_string());
    }
    StudioError::Transport(err.message)
}

/// Render one image and return it as a PNG data URI.
///
/// Recovery on auth failures is left to the caller.
pub async fn generate_image(
    api: &dyn ModelApi,
    api_key: Option<&str>,
    models: &ImageModels,
    req: &ImageRequest<'_>,
) -> Result<String, StudioError> {
    let api_key = api_key.ok_or(StudioError::AuthRequired)?;
    let model = models.pick(req.high_quality);

    info!("🎨 Generating {} image ({}, seed {}) with {model}", req.ratio, req.style, req.seed);
    let response = api
        .generate_content(model, api_key, &build_image_request(req))
        .await
        .map_err(|e| {
            warn!("Image generation failed: {e}");
            classify_failure(e)
        })?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(StudioError::EmptyResponse)?;

    let finish_reason = candidate.finish_reason;
    // The model's mime type is ignored: data URIs are always labelled PNG.
    candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .map(|inline| format!("data:image/png;base64,{}", inline.data))
        .ok_or_else(|| {
            warn!(
                "{model} returned no image (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            );
            StudioError::MissingImageData
        })
}
