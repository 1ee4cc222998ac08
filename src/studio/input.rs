//! Input aggregation and attachment loading.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::studio::docx::{self, DocxError};
use crate::studio::error::StudioError;
use crate::studio::types::ImagePart;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Combine the typed prompt and any extracted document text.
///
/// Prompt first, document second, separated by a blank line. Fails when
/// there is neither text nor a reference image to work from.
pub fn combine_input(
    prompt: &str,
    document_text: Option<&str>,
    has_image: bool,
) -> Result<String, StudioError> {
    let sources: Vec<&str> = [Some(prompt), document_text]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let combined = sources.join("\n\n");

    if combined.is_empty() && !has_image {
        return Err(StudioError::Validation(
            "Please enter a description or attach an image to start.".into(),
        ));
    }
    Ok(combined)
}

/// A file the user attached to the next generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Image(ImagePart),
    Document { name: String, text: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read document '{}': {source}", .path.display())]
    Document { path: PathBuf, source: DocxError },
    #[error("unsupported attachment '{}' (expected an image, .docx or .txt)", .path.display())]
    Unsupported { path: PathBuf },
}

impl Attachment {
    pub async fn load(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let attachment = if mime.type_() == mime_guess::mime::IMAGE {
            Self::Image(ImagePart::from_bytes(&bytes, mime.essence_str()))
        } else if mime.essence_str() == DOCX_MIME || extension == "docx" {
            let text = docx::extract_text(&bytes).map_err(|source| AttachmentError::Document {
                path: path.to_path_buf(),
                source,
            })?;
            Self::Document { name, text }
        } else if mime.essence_str() == "text/plain" || extension == "txt" {
            Self::Document {
                name,
                text: String::from_utf8_lossy(&bytes).into_owned(),
            }
        } else {
            return Err(AttachmentError::Unsupported {
                path: path.to_path_buf(),
            });
        };

        match &attachment {
            Self::Image(part) => info!("📎 Attached image {} ({})", path.display(), part.mime_type),
            Self::Document { text, .. } => {
                info!("📎 Attached document {} ({} chars)", path.display(), text.chars().count())
            }
        }
        Ok(attachment)
    }
}
