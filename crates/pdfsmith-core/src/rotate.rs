//! Whole-document or page-subset rotation

use crate::document::PdfDocument;
use crate::error::{PdfSmithError, Result};
use lopdf::ObjectId;

/// Add `angle` (90, 180 or 270) to the rotation of the targeted pages.
///
/// `indices` defaults to every page. Indices past the end are skipped
/// rather than rejected.
pub fn rotate(bytes: &[u8], angle: i32, indices: Option<&[usize]>) -> Result<Vec<u8>> {
    if !matches!(angle, 90 | 180 | 270) {
        return Err(PdfSmithError::InvalidRotation(angle));
    }

    let mut doc = PdfDocument::load(bytes)?;
    let page_ids = doc.page_ids();
    let targets: Vec<ObjectId> = match indices {
        Some(indices) => indices.iter().filter_map(|&i| page_ids.get(i).copied()).collect(),
        None => page_ids,
    };

    for &page_id in &targets {
        doc.rotate_page_of(page_id, angle)?;
    }
    tracing::debug!(angle, pages = targets.len(), "rotated pages");

    doc.save()
}
