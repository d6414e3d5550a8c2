//! Metadata stripping and compacted re-serialization

use crate::document::{PdfDocument, SaveOptions};
use crate::error::Result;

/// Clear document metadata and save compacted.
///
/// Returns whichever of the compacted and plain serializations is smaller,
/// so the result is never larger than an uncompacted save.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::load(bytes)?;
    doc.clear_metadata();

    let plain = doc.clone().save()?;
    let compacted = doc.save_with(SaveOptions { compact: true })?;
    tracing::debug!(
        input = bytes.len(),
        plain = plain.len(),
        compacted = compacted.len(),
        "compressed document"
    );

    Ok(if compacted.len() <= plain.len() {
        compacted
    } else {
        plain
    })
}
