//! PDF Split algorithm
//!
//! Extracts pages from a PDF by copying them into a fresh document.

use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use std::collections::BTreeSet;

/// Build a new document from the pages at `indices` (0-based), in the given
/// order. Duplicate indices produce duplicate, independent pages.
pub fn extract_pages(bytes: &[u8], indices: &[usize]) -> Result<Vec<u8>> {
    if indices.is_empty() {
        return Err(PdfSmithError::EmptySelection);
    }

    let source = PdfDocument::load(bytes)?;
    let mut dest = PdfDocument::create_empty();
    for handle in dest.copy_pages(&source, indices)? {
        dest.append_page(handle)?;
    }
    tracing::debug!(pages = indices.len(), "extracted pages");

    dest.save_with(SaveOptions { compact: true })
}

/// Extract a set of 1-based page numbers, always in ascending order
pub fn extract_selection(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
    let selection: BTreeSet<u32> = pages.iter().copied().collect();
    if selection.contains(&0) {
        return Err(PdfSmithError::InvalidRange(
            "Page numbers must be >= 1".into(),
        ));
    }

    let indices: Vec<usize> = selection.into_iter().map(|p| p as usize - 1).collect();
    extract_pages(bytes, &indices)
}

/// Split into one single-page document per page
pub fn split_each(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let source = PdfDocument::load(bytes)?;
    if source.page_count() == 0 {
        return Err(PdfSmithError::EmptySelection);
    }

    (0..source.page_count())
        .map(|index| {
            let mut dest = PdfDocument::create_empty();
            for handle in dest.copy_pages(&source, &[index])? {
                dest.append_page(handle)?;
            }
            dest.save_with(SaveOptions { compact: true })
        })
        .collect()
}
