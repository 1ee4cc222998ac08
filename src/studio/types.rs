//! Data model shared by the generation pipeline and the front-end.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::studio::error::StudioError;

/// Max chars kept from the combined input on a history record.
pub const MAX_DISPLAY_PROMPT_CHARS: usize = 100;

/// Shown on history records when only a reference image was supplied.
pub const IMAGE_ONLY_DISPLAY_PROMPT: &str = "Visual design";

/// Allowed range for `GenerationConfig::variations`.
pub const MAX_VARIATIONS: u8 = 4;

/// Visual style of the generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesignStyle {
    #[default]
    #[serde(rename = "3d")]
    ThreeD,
    Infographic,
    Illustration,
    Realistic,
    ModernFlat,
}

impl DesignStyle {
    /// Label used inside model instructions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ThreeD => "3D",
            Self::Infographic => "infographic",
            Self::Illustration => "illustration",
            Self::Realistic => "realistic",
            Self::ModernFlat => "modern flat",
        }
    }
}

impl fmt::Display for DesignStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DesignStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "3d" | "three-d" => Ok(Self::ThreeD),
            "infographic" => Ok(Self::Infographic),
            "illustration" => Ok(Self::Illustration),
            "realistic" => Ok(Self::Realistic),
            "modern-flat" | "flat" => Ok(Self::ModernFlat),
            other => Err(format!(
                "unknown style '{other}' (expected 3d, infographic, illustration, realistic or modern-flat)"
            )),
        }
    }
}

/// Output aspect ratio, passed through to the image model verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Wide,
    #[serde(rename = "3:4")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Landscape,
        Self::Portrait,
        Self::Wide,
        Self::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Wide => "4:3",
            Self::Tall => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown aspect ratio '{s}' (expected 1:1, 16:9, 9:16, 4:3 or 3:4)"))
    }
}

/// Snapshot of the user's options for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub prompt: String,
    pub style: DesignStyle,
    pub ratio: AspectRatio,
    pub high_quality: bool,
    pub variations: u8,
    pub use_maps: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            style: DesignStyle::default(),
            ratio: AspectRatio::default(),
            high_quality: false,
            variations: 1,
            use_maps: false,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), StudioError> {
        if !(1..=MAX_VARIATIONS).contains(&self.variations) {
            return Err(StudioError::Validation(format!(
                "variations must be between 1 and {MAX_VARIATIONS}, got {}",
                self.variations
            )));
        }
        Ok(())
    }
}

/// Uploaded reference image, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub data: String,
    pub mime_type: String,
}

impl ImagePart {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingLink {
    pub title: String,
    pub uri: String,
}

/// Result of one maps-grounded lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceContext {
    pub text: String,
    pub links: Vec<GroundingLink>,
}

/// One finished image in the session history.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub id: Uuid,
    /// `data:image/png;base64,...`
    pub url: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
    pub style: DesignStyle,
    pub ratio: AspectRatio,
    pub grounding_links: Option<Vec<GroundingLink>>,
}

/// Truncate to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parses_cli_spellings() {
        assert_eq!("3d".parse::<DesignStyle>().unwrap(), DesignStyle::ThreeD);
        assert_eq!("Modern Flat".parse::<DesignStyle>().unwrap(), DesignStyle::ModernFlat);
        assert_eq!("modern_flat".parse::<DesignStyle>().unwrap(), DesignStyle::ModernFlat);
        assert!("watercolor".parse::<DesignStyle>().is_err());
    }

    #[test]
    fn test_ratio_roundtrips_through_display() {
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.to_string().parse::<AspectRatio>().unwrap(), ratio);
        }
        assert!("2:1".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_ratio_serializes_as_wire_value() {
        let json = serde_json::to_string(&AspectRatio::Landscape).unwrap();
        assert_eq!(json, r#""16:9""#);
        let json = serde_json::to_string(&DesignStyle::ThreeD).unwrap();
        assert_eq!(json, r#""3d""#);
    }

    #[test]
    fn test_variations_range() {
        let mut config = GenerationConfig::default();
        assert!(config.validate().is_ok());
        config.variations = 4;
        assert!(config.validate().is_ok());
        config.variations = 0;
        assert!(matches!(config.validate(), Err(StudioError::Validation(_))));
        config.variations = 5;
        assert!(matches!(config.validate(), Err(StudioError::Validation(_))));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        let arabic = "مرحبا".repeat(30);
        let cut = truncate_chars(&arabic, MAX_DISPLAY_PROMPT_CHARS);
        assert_eq!(cut.chars().count(), MAX_DISPLAY_PROMPT_CHARS);
    }

    #[test]
    fn test_image_part_from_bytes() {
        let part = ImagePart::from_bytes(b"abc", "image/png");
        assert_eq!(part.data, "YWJj");
        assert_eq!(part.mime_type, "image/png");
    }
}
