//! Saving generated images to disk in a chosen raster format.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::studio::types::{AspectRatio, DesignStyle, GeneratedImage, GroundingLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unknown export format '{other}' (expected png, jpeg or webp)")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("image encoder task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One line of a batch manifest: the record's metadata plus the file it was saved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: Uuid,
    pub file: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
    pub style: DesignStyle,
    pub ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_links: Option<Vec<GroundingLink>>,
}

/// Paths written by [`save_batch`], files in batch order.
#[derive(Debug, Clone)]
pub struct SavedBatch {
    pub files: Vec<PathBuf>,
    pub manifest: PathBuf,
}

/// Split `data:<mime>;base64,<payload>` into the mime type and decoded bytes.
pub fn decode_data_uri(url: &str) -> Result<(String, Vec<u8>), ExportError> {
    let rest = url.strip_prefix("data:").ok_or(ExportError::NotDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(ExportError::NotDataUri)?;
    let mime = header.strip_suffix(";base64").ok_or(ExportError::NotDataUri)?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok((mime.to_string(), bytes))
}

/// Decode any supported raster and encode it as `format`.
///
/// JPEG has no alpha channel, so transparent pixels are laid over white.
pub fn reencode(bytes: &[u8], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let source = image::load_from_memory(bytes)?;
    let prepared = match format {
        ExportFormat::Jpeg => DynamicImage::ImageRgb8(flatten_on_white(&source.to_rgba8())),
        ExportFormat::Png | ExportFormat::Webp => DynamicImage::ImageRgba8(source.to_rgba8()),
    };
    let mut out = Cursor::new(Vec::new());
    prepared.write_to(&mut out, format.image_format())?;
    Ok(out.into_inner())
}

fn flatten_on_white(rgba: &RgbaImage) -> image::RgbImage {
    image::RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let blend = |c: u8| -> u8 {
            let alpha = u16::from(a);
            ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

pub fn file_name(image: &GeneratedImage, format: ExportFormat) -> String {
    format!("cairo-vision-{}.{}", image.id, format.extension())
}

pub fn manifest_file_name(batch: &[GeneratedImage]) -> String {
    let id = batch.first().map_or_else(Uuid::new_v4, |image| image.id);
    format!("cairo-vision-batch-{id}.json")
}

/// Write `image` into `dir` as `format`, returning the written path.
pub async fn save(image: &GeneratedImage, dir: &Path, format: ExportFormat) -> Result<PathBuf, ExportError> {
    let (_, bytes) = decode_data_uri(&image.url)?;
    let encoded = tokio::task::spawn_blocking(move || reencode(&bytes, format)).await??;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name(image, format));
    tokio::fs::write(&path, &encoded).await?;
    info!("💾 Saved {} ({} bytes)", path.display(), encoded.len());
    Ok(path)
}

/// Save every image of a batch, then a JSON manifest describing them.
pub async fn save_batch(
    batch: &[GeneratedImage],
    dir: &Path,
    format: ExportFormat,
) -> Result<SavedBatch, ExportError> {
    let mut files = Vec::with_capacity(batch.len());
    let mut entries = Vec::with_capacity(batch.len());
    for image in batch {
        let path = save(image, dir, format).await?;
        entries.push(ManifestEntry {
            id: image.id,
            file: file_name(image, format),
            prompt: image.prompt.clone(),
            timestamp: image.timestamp,
            style: image.style,
            ratio: image.ratio,
            grounding_links: image.grounding_links.clone(),
        });
        files.push(path);
    }

    tokio::fs::create_dir_all(dir).await?;
    let manifest = dir.join(manifest_file_name(batch));
    tokio::fs::write(&manifest, serde_json::to_vec_pretty(&entries)?).await?;
    info!("🧾 Wrote manifest {} ({} entries)", manifest.display(), entries.len());
    Ok(SavedBatch { files, manifest })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(alpha: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, alpha]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn as_data_uri(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_format_parsing_and_extension() {
        assert_eq!("JPG".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
        assert_eq!(ExportFormat::Webp.extension(), "webp");
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_decode_data_uri() {
        let (mime, bytes) = decode_data_uri("data:image/png;base64,YWJj").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"abc");
        assert!(matches!(decode_data_uri("https://x/y.png"), Err(ExportError::NotDataUri)));
        assert!(matches!(decode_data_uri("data:image/png,raw"), Err(ExportError::NotDataUri)));
        assert!(matches!(decode_data_uri("data:image/png;base64,@@"), Err(ExportError::Base64(_))));
    }

    #[test]
    fn test_jpeg_flattens_transparency_on_white() {
        let jpeg = reencode(&tiny_png(0), ExportFormat::Jpeg).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        let px = decoded.get_pixel(0, 0);
        assert!(px.0.iter().all(|c| *c > 240), "expected white, got {px:?}");
    }

    #[test]
    fn test_reencode_webp_and_png() {
        let png = tiny_png(255);
        let webp = reencode(&png, ExportFormat::Webp).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), ImageFormat::WebP);
        let back = reencode(&webp, ExportFormat::Png).unwrap();
        assert_eq!(image::guess_format(&back).unwrap(), ImageFormat::Png);
    }

    fn red_square(prompt: &str) -> GeneratedImage {
        GeneratedImage {
            id: Uuid::new_v4(),
            url: as_data_uri(&tiny_png(255)),
            prompt: prompt.into(),
            timestamp: Utc::now(),
            style: DesignStyle::ModernFlat,
            ratio: AspectRatio::Square,
            grounding_links: None,
        }
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = red_square("red square");

        let path = save(&image, dir.path(), ExportFormat::Jpeg).await.unwrap();
        assert!(path.ends_with(format!("cairo-vision-{}.jpg", image.id)));
        let written = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_save_batch_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut second = red_square("red square by the Nile");
        second.grounding_links = Some(vec![GroundingLink {
            title: "Corniche".into(),
            uri: "https://maps.google.com/?cid=1".into(),
        }]);
        let batch = vec![red_square("red square"), second];

        let saved = save_batch(&batch, dir.path(), ExportFormat::Webp).await.unwrap();
        assert_eq!(saved.files.len(), 2);
        assert!(saved.files.iter().all(|p| p.exists()));
        assert!(saved.manifest.ends_with(format!("cairo-vision-batch-{}.json", batch[0].id)));

        let raw = std::fs::read_to_string(&saved.manifest).unwrap();
        let entries: Vec<ManifestEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, batch[0].id);
        assert_eq!(entries[0].file, format!("cairo-vision-{}.webp", batch[0].id));
        assert_eq!(entries[1].prompt, "red square by the Nile");
        assert_eq!(entries[1].timestamp, batch[1].timestamp);
        assert_eq!(entries[1].grounding_links, batch[1].grounding_links);
        assert!(entries[0].grounding_links.is_none());
        // Image payloads stay out of the manifest.
        assert!(!raw.contains("base64"));
        assert!(raw.contains("\"ratio\": \"1:1\""));
    }
}
