//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. Create a new destination document
/// 3. For each source document, in input order:
///    a. Load it, naming the source on failure
///    b. Deep-copy every page with remapped object ids
///    c. Append the copies to the destination page tree
/// 4. Compact and return the merged result
///
/// Page rotation and content are carried over untouched.
pub fn merge(documents: &[Vec<u8>]) -> Result<Vec<u8>> {
    if documents.is_empty() {
        return Err(PdfSmithError::EmptyInput);
    }

    let mut dest = PdfDocument::create_empty();

    for (i, bytes) in documents.iter().enumerate() {
        let source = PdfDocument::load(bytes)
            .map_err(|e| PdfSmithError::Load(format!("document {}: {}", i, e)))?;

        let all_pages: Vec<usize> = (0..source.page_count()).collect();
        for handle in dest.copy_pages(&source, &all_pages)? {
            dest.append_page(handle)?;
        }
        tracing::debug!(source = i, pages = all_pages.len(), "merged document");
    }

    dest.save_with(SaveOptions { compact: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, numbered_pdf, PageSpec};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_empty_fails() {
        let result = merge(&[]);
        assert!(matches!(result, Err(PdfSmithError::EmptyInput)));
        assert_eq!(result.unwrap_err().to_string(), "No documents provided");
    }

    #[test]
    fn test_merge_single_document_keeps_pages() {
        let pdf = numbered_pdf(2, "Single");

        let result = merge(&[pdf.clone()]).unwrap();

        let merged = PdfDocument::load(&result).unwrap();
        let original = PdfDocument::load(&pdf).unwrap();
        assert_eq!(merged.page_count(), 2);
        assert_eq!(merged.page_content(1).unwrap(), original.page_content(1).unwrap());
    }

    #[test]
    fn test_merge_names_failing_source() {
        let good = numbered_pdf(1, "Good");
        let err = merge(&[good, b"not a pdf".to_vec()]).unwrap_err();
        match err {
            PdfSmithError::Load(message) => assert!(message.starts_with("document 1:")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_merge_keeps_rotation() {
        let a = build_pdf(&[PageSpec::rotated(90)]);
        let b = build_pdf(&[PageSpec::default(), PageSpec::rotated(270)]);

        let merged = PdfDocument::load(&merge(&[a, b]).unwrap()).unwrap();
        let rotations: Vec<i32> = (0..3).map(|i| merged.rotation(i).unwrap()).collect();
        assert_eq!(rotations, vec![90, 0, 270]);
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let doc_a = numbered_pdf(2, "DocA");
        let doc_b = numbered_pdf(3, "DocB");

        let merged = merge(&[doc_a, doc_b]).unwrap();

        // Verify the merged document has 5 pages
        let doc = Document::load_mem(&merged).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_multiple_documents() {
        let docs: Vec<Vec<u8>> = (0..5)
            .map(|i| numbered_pdf(1, &format!("Doc{}", i)))
            .collect();

        let merged = merge(&docs).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_preserves_page_order() {
        // Create 3 documents with different page counts
        let doc1 = numbered_pdf(2, "First");
        let doc2 = numbered_pdf(1, "Second");
        let doc3 = numbered_pdf(2, "Third");

        let merged = merge(&[doc1, doc2, doc3]).unwrap();

        let doc = PdfDocument::load(&merged).unwrap();
        assert_eq!(doc.page_count(), 5, "Merged document should have 5 pages");

        let labels: Vec<String> = (0..5)
            .map(|i| String::from_utf8(doc.page_content(i).unwrap()).unwrap())
            .collect();
        let expected = [
            "(First Page 1)",
            "(First Page 2)",
            "(Second Page 1)",
            "(Third Page 1)",
            "(Third Page 2)",
        ];
        for (content, label) in labels.iter().zip(expected) {
            assert!(content.contains(label), "{content} should contain {label}");
        }
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        // Test merging documents with varying page counts
        let doc1 = numbered_pdf(10, "Large");
        let doc2 = numbered_pdf(1, "Small");
        let doc3 = numbered_pdf(5, "Medium");

        let merged = merge(&[doc1, doc2, doc3]).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 16, "Merged document should have 16 pages");
    }

    #[test]
    fn test_merged_document_is_valid_pdf() {
        let doc1 = numbered_pdf(2, "Valid1");
        let doc2 = numbered_pdf(2, "Valid2");

        let merged = merge(&[doc1, doc2]).unwrap();

        // Should be able to load the merged document without errors
        let doc = Document::load_mem(&merged);
        assert!(doc.is_ok(), "Merged document should be valid PDF");

        // Should be able to get pages
        let doc = doc.unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 4);
    }
}
