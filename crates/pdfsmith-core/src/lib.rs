//! Client-side PDF manipulation
//!
//! Structural transforms (merge, extract, rotate, organize, watermark,
//! compress, images to PDF) run on an in-memory `lopdf` document. The
//! `crypto` module implements the Standard Security Handler for password
//! protection. Rendering is delegated to the traits in [`raster`].
//!
//! Every operation takes input bytes and returns fresh output bytes.

pub mod command;
pub mod compress;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
mod fonts;
pub mod html;
pub mod images;
pub mod merge;
pub mod organize;
pub mod raster;
pub mod rotate;
pub mod split;
pub mod watermark;

#[cfg(test)]
mod test_support;

pub use command::{execute, PdfCommand, ProcessMetrics, ProcessResult};
pub use compress::compress;
pub use config::Config;
pub use crypto::{
    decrypt, detect_encryption, encrypt, EncryptOptions, EncryptionAlgorithm,
    EncryptionDescriptor, EncryptionStatus, Permissions,
};
pub use document::{DocumentMetadata, OpenOutcome, PdfDocument, PdfInfo, SaveOptions};
pub use error::{PdfSmithError, Result};
pub use html::{html_to_pdf, HtmlOptions, Orientation, PaperFormat};
pub use images::{images_to_pdf, ImageInput, ImagesToPdf};
pub use merge::merge;
pub use organize::{organize, PageOrder, PageOrderEntry};
pub use raster::{
    decrypt_rasterized, pdf_to_images, CancellationToken, DomRasterizer, PageRasterizer,
    RasterImage, RenderOptions, RenderedPage,
};
pub use rotate::rotate;
pub use split::{extract_pages, extract_selection, split_each};
pub use watermark::{watermark, WatermarkOptions};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| PdfSmithError::Load(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers
pub fn parse_ranges(input: &str) -> Result<Vec<u32>> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfSmithError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfSmithError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfSmithError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }

            pages.extend(start..=end);
        } else {
            // Single page like "5"
            let page: u32 = part
                .parse()
                .map_err(|_| PdfSmithError::InvalidRange(format!("Invalid page: {}", part)))?;
            pages.insert(page);
        }
    }

    if pages.is_empty() {
        return Err(PdfSmithError::EmptySelection);
    }
    Ok(pages.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, PageSpec};

    #[test]
    fn test_get_page_count() {
        let pdf = build_pdf(&[PageSpec::default(), PageSpec::default()]);
        assert_eq!(get_page_count(&pdf).unwrap(), 2);
        assert!(matches!(get_page_count(b"not a pdf"), Err(PdfSmithError::Load(_))));
    }

    #[test]
    fn test_parse_ranges_single() {
        let result = parse_ranges("5").unwrap();
        assert_eq!(result, vec![5]);
    }

    #[test]
    fn test_parse_ranges_range() {
        let result = parse_ranges("1-3").unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_ranges_complex() {
        let result = parse_ranges("1-3, 5, 8-10").unwrap();
        assert_eq!(result, vec![1, 2, 3, 5, 8, 9, 10]);
    }

    #[test]
    fn test_parse_ranges_deduplicates() {
        let result = parse_ranges("1-3, 2-4").unwrap();
        assert_eq!(result, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_ranges_rejects_garbage() {
        assert!(matches!(parse_ranges("4-2"), Err(PdfSmithError::InvalidRange(_))));
        assert!(matches!(parse_ranges("x"), Err(PdfSmithError::InvalidRange(_))));
        assert!(matches!(parse_ranges(" , "), Err(PdfSmithError::EmptySelection)));
    }
}
