//! Maps-grounded place context for a prompt.

use tracing::{info, warn};

use crate::studio::error::StudioError;
use crate::studio::gemini::{
    GenerateRequest, LatLng, ModelApi, RetrievalConfig, Tool, ToolConfig,
};
use crate::studio::types::{Coordinates, GroundingLink, PlaceContext};

/// Title used for a maps citation that comes back without one.
pub const UNTITLED_PLACE: &str = "Place on map";

/// Ask the model about `prompt` around `coords` with the maps tool enabled.
///
/// Without a key this fails straight away; it never runs key recovery.
pub async fn get_place_context(
    api: &dyn ModelApi,
    api_key: Option<&str>,
    model: &str,
    prompt: &str,
    coords: Coordinates,
) -> Result<PlaceContext, StudioError> {
    let api_key = api_key.ok_or(StudioError::AuthRequired)?;

    let request = GenerateRequest {
        tools: Some(vec![Tool::google_maps()]),
        tool_config: Some(ToolConfig {
            retrieval_config: RetrievalConfig {
                lat_lng: LatLng {
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                },
            },
        }),
        ..GenerateRequest::from_text(format!(
            "Describe the places near me that relate to this idea, with the visual details \
             a designer would need (architecture, landmarks, colors, atmosphere): {prompt}"
        ))
    };

    let response = api
        .generate_content(model, api_key, &request)
        .await
        .map_err(|e| {
            warn!("Place context lookup failed: {e}");
            StudioError::PlaceContext { message: e.message }
        })?;

    let text = response.text().unwrap_or_default();
    let links: Vec<GroundingLink> = response
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
        .map(|meta| {
            meta.grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.maps.as_ref())
                .filter_map(|maps| {
                    let uri = maps.uri.clone()?;
                    let title = maps
                        .title
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| UNTITLED_PLACE.to_string());
                    Some(GroundingLink { title, uri })
                })
                .collect()
        })
        .unwrap_or_default();

    info!("🗺️ Place context: {} chars, {} links", text.chars().count(), links.len());
    Ok(PlaceContext { text, links })
}
