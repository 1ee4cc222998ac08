//! Generation orchestration: input → place context → enhancement → images → history.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::studio::credentials::CredentialGate;
use crate::studio::enhance::enhance_prompt;
use crate::studio::error::StudioError;
use crate::studio::gemini::ModelApi;
use crate::studio::generator::{generate_image, ImageModels, ImageRequest};
use crate::studio::history::History;
use crate::studio::input::combine_input;
use crate::studio::location::{resolve_location, LocationProvider};
use crate::studio::places::get_place_context;
use crate::studio::types::{
    truncate_chars, GeneratedImage, GenerationConfig, ImagePart, PlaceContext,
    IMAGE_ONLY_DISPLAY_PROMPT, MAX_DISPLAY_PROMPT_CHARS,
};

/// Place-context query when only an image was attached.
const PLACES_FALLBACK_QUERY: &str = "Places around me";

/// Enhancer input when only an image was attached.
const ENHANCE_FALLBACK_PROMPT: &str = "Visual masterpiece";

/// Seeds are drawn from `0..SEED_RANGE`, independently per variation.
pub const SEED_RANGE: u32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Models {
    /// Prompt enhancement.
    pub text: String,
    /// Maps-grounded place lookup.
    pub maps: String,
    pub image: ImageModels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Which step of a run failed; decides the credential follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Prepare,
    Places,
    Images,
}

pub struct Studio {
    gate: CredentialGate,
    api: Arc<dyn ModelApi>,
    location: Option<Arc<dyn LocationProvider>>,
    models: Models,
    history: Mutex<History>,
    place_context: Mutex<Option<PlaceContext>>,
    state: std::sync::Mutex<RunState>,
}

impl Studio {
    pub fn new(
        gate: CredentialGate,
        api: Arc<dyn ModelApi>,
        location: Option<Arc<dyn LocationProvider>>,
        models: Models,
        history: History,
    ) -> Self {
        Self {
            gate,
            api,
            location,
            models,
            history: Mutex::new(history),
            place_context: Mutex::new(None),
            state: std::sync::Mutex::new(RunState::Idle),
        }
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().expect("run state lock poisoned")
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().expect("run state lock poisoned") = state;
    }

    pub async fn history(&self) -> Vec<GeneratedImage> {
        self.history.lock().await.snapshot()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Place context from the most recent maps-grounded run.
    pub async fn place_context(&self) -> Option<PlaceContext> {
        self.place_context.lock().await.clone()
    }

    /// Run one generation attempt from a config snapshot.
    ///
    /// All variations succeed or nothing is added to history.
    pub async fn run_generation(
        &self,
        config: &GenerationConfig,
        image: Option<&ImagePart>,
        document_text: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, StudioError> {
        self.set_state(RunState::Running);
        match self.run_stages(config, image, document_text).await {
            Ok(batch) => {
                self.set_state(RunState::Succeeded);
                Ok(batch)
            }
            Err((stage, err)) => {
                warn!("Generation failed at {stage:?}: {err}");
                self.after_failure(stage, &err).await;
                self.set_state(RunState::Failed);
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        config: &GenerationConfig,
        image: Option<&ImagePart>,
        document_text: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, (Stage, StudioError)> {
        config.validate().map_err(|e| (Stage::Prepare, e))?;
        let combined = combine_input(&config.prompt, document_text, image.is_some())
            .map_err(|e| (Stage::Prepare, e))?;
        *self.place_context.lock().await = None;

        info!(
            "🚀 Generation started: {} variation(s), style {}, ratio {}, maps {}",
            config.variations, config.style, config.ratio, config.use_maps
        );

        let place = if config.use_maps {
            let place = self
                .lookup_place(&combined)
                .await
                .map_err(|e| (Stage::Places, e))?;
            *self.place_context.lock().await = Some(place.clone());
            Some(place)
        } else {
            None
        };

        let api_key = self.gate.current_key();
        let raw = if combined.is_empty() { ENHANCE_FALLBACK_PROMPT } else { combined.as_str() };
        let enhanced = enhance_prompt(
            self.api.as_ref(),
            api_key.as_deref(),
            &self.models.text,
            raw,
            config.style,
            image.is_some(),
            place.as_ref().map(|p| p.text.as_str()),
        )
        .await;

        let seeds = draw_seeds(config.variations);
        let requests: Vec<ImageRequest<'_>> = seeds
            .into_iter()
            .map(|seed| ImageRequest {
                prompt: &enhanced,
                style: config.style,
                ratio: config.ratio,
                high_quality: config.high_quality,
                reference: image,
                seed,
            })
            .collect();

        let urls = try_join_all(requests.iter().map(|req| {
            generate_image(self.api.as_ref(), api_key.as_deref(), &self.models.image, req)
        }))
        .await
        .map_err(|e| (Stage::Images, e))?;

        let display = if combined.is_empty() {
            IMAGE_ONLY_DISPLAY_PROMPT
        } else {
            truncate_chars(&combined, MAX_DISPLAY_PROMPT_CHARS)
        };
        let links = place.map(|p| p.links).filter(|links| !links.is_empty());
        let batch: Vec<GeneratedImage> = urls
            .into_iter()
            .map(|url| GeneratedImage {
                id: Uuid::new_v4(),
                url,
                prompt: display.to_string(),
                timestamp: Utc::now(),
                style: config.style,
                ratio: config.ratio,
                grounding_links: links.clone(),
            })
            .collect();

        let evicted = self.history.lock().await.prepend_batch(batch.clone());
        info!("✅ Generation finished: {} image(s), {evicted} evicted from history", batch.len());
        Ok(batch)
    }

    async fn lookup_place(&self, combined: &str) -> Result<PlaceContext, StudioError> {
        let coords = resolve_location(self.location.as_deref()).await?;
        let query = if combined.is_empty() { PLACES_FALLBACK_QUERY } else { combined };
        get_place_context(
            self.api.as_ref(),
            self.gate.current_key().as_deref(),
            &self.models.maps,
            query,
            coords,
        )
        .await
    }

    /// Credential follow-up once a run has failed.
    ///
    /// Auth failures close the gate. Only the image step reopens the host
    /// key flow; other failures leave the gate alone.
    async fn after_failure(&self, stage: Stage, err: &StudioError) {
        if !err.is_auth() {
            return;
        }
        if stage == Stage::Images && self.gate.has_provider() {
            info!("🔑 Asking the host for a new key");
            self.gate.recover().await;
        }
        self.gate.mark_unsatisfied();
    }
}

/// One seed per variation, drawn independently. Duplicates are allowed.
fn draw_seeds(count: u8) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..SEED_RANGE)).collect()
}
