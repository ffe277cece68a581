//! Plain-text extraction from PDF, DOCX and TXT files.
//!
//! The format is chosen by the lowercased file extension. PDF pages and
//! DOCX paragraphs are joined with `\n`.


use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{DocvecError, Result};

/// File formats text can be extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
}

impl FileKind {
    /// Detect the format of `path`, or fail with the offending extension
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = file_extension(path);
        match extension.as_str() {
            ".pdf" => Ok(Self::Pdf),
            ".docx" => Ok(Self::Docx),
            ".txt" => Ok(Self::Txt),
            _ => Err(DocvecError::UnsupportedFileType(extension)),
        }
    }
}

impl fmt::Display for FileKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("PDF"),
            Self::Docx => f.write_str("DOCX"),
            Self::Txt => f.write_str("TXT"),
        }
    }
}

/// Lowercased extension including the leading dot, or "" when there is none
#[inline]
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Extract the text of the file at `path`
#[inline]
pub fn extract_text(path: &Path) -> Result<String> {
    let kind = FileKind::from_path(path)?;
    debug!("Extracting {} text from {}", kind, path.display());

    let text = match kind {
        FileKind::Pdf => extract_pdf(&read_bytes(path)?)?,
        FileKind::Docx => extract_docx(&read_bytes(path)?)?,
        FileKind::Txt => std::fs::read_to_string(path).map_err(|e| {
            DocvecError::Extraction(format!("Failed to read {}: {}", path.display(), e))
        })?,
    };

    debug!(
        "Extracted {} characters from {}",
        text.chars().count(),
        path.display()
    );
    Ok(text)
}

/// [`extract_text`] on the blocking thread pool
#[inline]
pub async fn extract_text_blocking(path: PathBuf) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text(&path))
        .await
        .map_err(|e| DocvecError::Extraction(format!("Extraction task failed: {}", e)))?
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| DocvecError::Extraction(format!("Failed to read {}: {}", path.display(), e)))
}

/// Per-page text joined with newlines; pages without text contribute ""
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| DocvecError::Extraction(format!("Failed to parse PDF: {}", e)))?;
    if pages.iter().all(|page| page.trim().is_empty()) {
        warn!("PDF with {} pages has no extractable text", pages.len());
    }
    Ok(pages.join("\n"))
}

/// Body paragraph text joined with newlines
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| DocvecError::Extraction(format!("Failed to parse DOCX: {}", e)))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    push_children_text(&para.children, &mut text);
    text
}

/// Runs inside hyperlinks count as paragraph text too
fn push_children_text(children: &[docx_rs::ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    if let docx_rs::RunChild::Text(t) = run_child {
                        text.push_str(&t.text);
                    }
                }
            }
            docx_rs::ParagraphChild::Hyperlink(link) => push_children_text(&link.children, text),
            _ => {}
        }
    }
}
