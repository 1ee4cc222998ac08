//! Plain-text extraction from Word documents.
//!
//! A .docx file is a ZIP archive; the body lives in `word/document.xml`
//! as `<w:p>` paragraphs made of `<w:t>` text runs. Formatting, tables
//! and images are discarded.

use std::io::{Cursor, Read};

use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("not a valid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("document archive has no word/document.xml")]
    MissingBody,
    #[error("failed to read document body: {0}")]
    Read(#[from] std::io::Error),
    #[error("document contains no text")]
    Empty,
}

pub fn extract_text(data: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut xml = String::new();
    match archive.by_name(DOCUMENT_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingBody),
        Err(e) => return Err(e.into()),
    }

    let text = body_text(&xml);
    if text.is_empty() {
        return Err(DocxError::Empty);
    }
    Ok(text)
}

/// Walk the body XML tag by tag, collecting run text per paragraph.
fn body_text(xml: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut in_run_text = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_run_text {
            if let Some(p) = current.as_mut() {
                p.push_str(&decode_entities(&rest[..open]));
            }
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        rest = &rest[open + close + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();

        match (name, closing) {
            ("w:p", false) if self_closing => paragraphs.push(String::new()),
            ("w:p", false) => current = Some(String::new()),
            ("w:p", true) => {
                if let Some(p) = current.take() {
                    paragraphs.push(p);
                }
            }
            ("w:t", false) => in_run_text = !self_closing,
            ("w:t", true) => in_run_text = false,
            ("w:tab", false) => {
                if let Some(p) = current.as_mut() {
                    p.push('\t');
                }
            }
            ("w:br" | "w:cr", false) => {
                if let Some(p) = current.as_mut() {
                    p.push('\n');
                }
            }
            _ => {}
        }
    }
    if let Some(p) = current {
        paragraphs.push(p);
    }

    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';') else {
            out.push_str(&rest[amp..]);
            return out;
        };
        let entity = &after[..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => {
                out.push('&');
                out.push_str(entity);
                out.push(';');
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// First `max_chars` characters of a document, with an ellipsis if cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
