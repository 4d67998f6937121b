//! PDF text extraction backed by lopdf, with a plain-text fallback.

use tracing::warn;

use crate::error::ExtractError;

use super::Extractor;

/// Extracts embedded text from PDF bytes page by page. Bytes that do
/// not carry the `%PDF` magic are treated as plain UTF-8 text, which
/// keeps non-PDF sources (and fixtures) usable without a second
/// extractor implementation.
#[derive(Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let _span = tracing::info_span!("extract").entered();

        let text = if bytes.starts_with(b"%PDF") {
            extract_pdf_text(bytes)?
        } else {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| ExtractError::InvalidEncoding(e.to_string()))?
        };

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyText);
        }

        Ok(text)
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::PdfParse(e.to_string()))?;

    let mut out = String::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                out.push_str(&page_text);
                out.push('\n');
            }
            Err(e) => {
                // A single undecodable page should not sink the whole
                // document; the empty-text guard below still catches
                // documents where nothing survives.
                warn!("Failed to extract text from page {}: {}", page_num, e);
            }
        }
    }

    Ok(out)
}
