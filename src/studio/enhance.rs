//! Prompt enhancement. Best effort: every failure falls back to the raw prompt.

use tracing::{debug, warn};

use crate::studio::gemini::{Content, GenerateRequest, ModelApi};
use crate::studio::types::DesignStyle;

fn system_instruction(style: DesignStyle, has_image: bool, extra_context: Option<&str>) -> String {
    let mut instruction = format!("You are a professional visual prompt engineer. Style: {style}.\n");
    instruction.push_str(if has_image {
        "Enhance based on the reference image.\n"
    } else {
        "Create from scratch.\n"
    });
    if let Some(context) = extra_context.map(str::trim).filter(|c| !c.is_empty()) {
        instruction.push_str("Include this geographic context in the scene: ");
        instruction.push_str(context);
        instruction.push('\n');
    }
    instruction.push_str(
        "Translate any non-English input into English. \
         Focus on composition, lighting, and high-quality artistic terms.",
    );
    instruction
}

/// Rewrite `raw` into a richer generation prompt.
pub async fn enhance_prompt(
    api: &dyn ModelApi,
    api_key: Option<&str>,
    model: &str,
    raw: &str,
    style: DesignStyle,
    has_image: bool,
    extra_context: Option<&str>,
) -> String {
    let Some(api_key) = api_key else {
        return raw.to_string();
    };

    let request = GenerateRequest {
        system_instruction: Some(Content::system(system_instruction(style, has_image, extra_context))),
        ..GenerateRequest::from_text(format!("User Input: \"{raw}\""))
    };

    match api.generate_content(model, api_key, &request).await {
        Ok(response) => match response.text() {
            Some(text) if !text.trim().is_empty() => {
                debug!("Enhanced prompt: {text}");
                text.trim().to_string()
            }
            _ => {
                warn!("Prompt enhancement returned no text, using original");
                raw.to_string()
            }
        },
        Err(e) => {
            warn!("Prompt enhancement failed, using original: {e}");
            raw.to_string()
        }
    }
}
