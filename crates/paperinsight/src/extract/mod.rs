pub mod pdf;

pub use pdf::PdfExtractor;

use crate::error::ExtractError;

/// Converts raw document bytes into plain text.
///
/// Implementations must treat text that is empty after trimming as a
/// hard failure: an empty prompt produces meaningless model output, so
/// there is no such thing as an empty-but-successful extraction.
pub trait Extractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}
