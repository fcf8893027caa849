//! Text extraction for knowledge-base source files.
//!
//! The indexer hands this module a path; it returns plain UTF-8 text plus
//! the detected [`SourceType`]. PDF extraction goes through `pdf-extract`;
//! `.txt` and `.md` files are read as-is. Unsupported extensions return
//! [`ExtractError::UnsupportedExtension`] so the indexer can skip the file
//! with a warning instead of failing the run.

use std::path::Path;

use crate::models::SourceType;

/// Extraction error. Extraction never panics; the indexer logs the error
/// and moves on to the next file.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedExtension(String),
    Pdf(String),
    Io(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file extension: {}", ext)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Load a knowledge file and return its text and source type.
pub fn load_document(path: &Path) -> Result<(String, SourceType), ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => Ok((load_pdf(path)?, SourceType::Pdf)),
        "txt" | "md" => Ok((load_text(path)?, SourceType::Text)),
        other => Err(ExtractError::UnsupportedExtension(other.to_string())),
    }
}

fn load_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn load_text(path: &Path) -> Result<String, ExtractError> {
    std::fs::read_to_string(path).map_err(|e| ExtractError::Io(e.to_string()))
}
