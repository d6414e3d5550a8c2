//! Page reordering, rotation and deletion
//!
//! A [`PageOrder`] holds one [`PageOrderEntry`] per source page. Entries keep
//! their `original_index` for their whole life; list position alone decides
//! the output order, so deleting or moving entries never invalidates another
//! entry's reference to its source page.

use crate::document::{normalize_angle, PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOrderEntry {
    /// 0-based page index in the source document
    pub original_index: usize,
    /// Degrees added on top of the page's own rotation
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub deleted: bool,
}

impl PageOrderEntry {
    pub fn new(original_index: usize) -> Self {
        Self {
            original_index,
            rotation: 0,
            deleted: false,
        }
    }
}

/// Editable page order for one source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrder {
    entries: Vec<PageOrderEntry>,
}

impl PageOrder {
    /// Identity order: one entry per page, unrotated, nothing deleted
    pub fn identity(page_count: usize) -> Self {
        Self {
            entries: (0..page_count).map(PageOrderEntry::new).collect(),
        }
    }

    pub fn entries(&self) -> &[PageOrderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn move_up(&mut self, position: usize) -> Result<()> {
        self.check(position)?;
        if position > 0 {
            self.entries.swap(position, position - 1);
        }
        Ok(())
    }

    pub fn move_down(&mut self, position: usize) -> Result<()> {
        self.check(position)?;
        if position + 1 < self.entries.len() {
            self.entries.swap(position, position + 1);
        }
        Ok(())
    }

    /// Remove the entry at `from` and reinsert it at `to`
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(())
    }

    /// Quarter turn clockwise
    pub fn rotate(&mut self, position: usize) -> Result<()> {
        self.rotate_by(position, 90)
    }

    pub fn rotate_by(&mut self, position: usize, delta: i32) -> Result<()> {
        self.check(position)?;
        if delta % 90 != 0 {
            return Err(PdfSmithError::InvalidRotation(delta));
        }
        let entry = &mut self.entries[position];
        entry.rotation = normalize_angle(entry.rotation as i64 + delta as i64);
        Ok(())
    }

    pub fn delete(&mut self, position: usize) -> Result<()> {
        self.check(position)?;
        self.entries[position].deleted = true;
        Ok(())
    }

    pub fn restore(&mut self, position: usize) -> Result<()> {
        self.check(position)?;
        self.entries[position].deleted = false;
        Ok(())
    }

    pub fn apply(self, bytes: &[u8]) -> Result<Vec<u8>> {
        organize(bytes, &self.entries)
    }

    fn check(&self, position: usize) -> Result<()> {
        if position < self.entries.len() {
            Ok(())
        } else {
            Err(PdfSmithError::IndexOutOfRange {
                index: position,
                page_count: self.entries.len(),
            })
        }
    }
}

/// Build a document from `entries` in list order, skipping deleted ones.
///
/// Each entry's rotation is added to the source page's own rotation.
pub fn organize(bytes: &[u8], entries: &[PageOrderEntry]) -> Result<Vec<u8>> {
    let kept: Vec<&PageOrderEntry> = entries.iter().filter(|e| !e.deleted).collect();
    if kept.is_empty() {
        return Err(PdfSmithError::EmptySelection);
    }
    if let Some(entry) = kept.iter().find(|e| e.rotation % 90 != 0) {
        return Err(PdfSmithError::InvalidRotation(entry.rotation));
    }

    let source = PdfDocument::load(bytes)?;
    let indices: Vec<usize> = kept.iter().map(|e| e.original_index).collect();

    let mut dest = PdfDocument::create_empty();
    for (handle, entry) in dest.copy_pages(&source, &indices)?.into_iter().zip(&kept) {
        let page_id = handle.id();
        dest.append_page(handle)?;
        if entry.rotation != 0 {
            dest.rotate_page_of(page_id, entry.rotation)?;
        }
    }
    tracing::debug!(
        pages = kept.len(),
        deleted = entries.len() - kept.len(),
        "organized pages"
    );

    dest.save_with(SaveOptions { compact: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, PageSpec};
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<u8> {
        build_pdf(&[
            PageSpec::labeled("one"),
            PageSpec {
                rotation: 90,
                ..PageSpec::labeled("two")
            },
            PageSpec::labeled("three"),
        ])
    }

    fn describe(bytes: &[u8]) -> Vec<(String, i32)> {
        let doc = PdfDocument::load(bytes).unwrap();
        (0..doc.page_count())
            .map(|i| {
                let content = String::from_utf8(doc.page_content(i).unwrap()).unwrap();
                let label = ["one", "two", "three"]
                    .into_iter()
                    .find(|l| content.contains(&format!("({})", l)))
                    .unwrap_or("?")
                    .to_string();
                (label, doc.rotation(i).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_identity_order_reproduces_document() {
        let pdf = sample();
        let output = PageOrder::identity(3).apply(&pdf).unwrap();
        assert_eq!(
            describe(&output),
            vec![("one".into(), 0), ("two".into(), 90), ("three".into(), 0)]
        );
    }

    #[test]
    fn test_duplicated_entries_rotate_independently() {
        let pdf = sample();
        let entries = [
            PageOrderEntry {
                rotation: 90,
                ..PageOrderEntry::new(1)
            },
            PageOrderEntry::new(1),
        ];
        assert_eq!(
            describe(&organize(&pdf, &entries).unwrap()),
            vec![("two".into(), 180), ("two".into(), 90)]
        );
    }

    #[test]
    fn test_reorder_rotate_delete() {
        let pdf = sample();
        let mut order = PageOrder::identity(3);
        order.move_to(2, 0).unwrap(); // three, one, two
        order.rotate(2).unwrap(); // two gets +90 on top of its own 90
        order.delete(1).unwrap(); // drop one

        assert_eq!(
            describe(&order.apply(&pdf).unwrap()),
            vec![("three".into(), 0), ("two".into(), 180)]
        );
    }

    #[test]
    fn test_move_up_and_down_at_edges() {
        let mut order = PageOrder::identity(3);
        order.move_up(0).unwrap();
        order.move_down(2).unwrap();
        assert_eq!(order, PageOrder::identity(3));

        order.move_down(0).unwrap();
        let indices: Vec<usize> = order.entries().iter().map(|e| e.original_index).collect();
        assert_eq!(indices, vec![1, 0, 2]);
        assert!(order.move_up(3).is_err());
    }

    #[test]
    fn test_restore_undoes_delete() {
        let mut order = PageOrder::identity(2);
        order.delete(0).unwrap();
        order.restore(0).unwrap();
        assert_eq!(order, PageOrder::identity(2));
    }

    #[test]
    fn test_all_deleted_fails() {
        let pdf = sample();
        let mut order = PageOrder::identity(3);
        for position in 0..3 {
            order.delete(position).unwrap();
        }
        assert!(matches!(order.apply(&pdf), Err(PdfSmithError::EmptySelection)));
    }

    #[test]
    fn test_entry_beyond_source_fails() {
        let pdf = sample();
        let entries = [PageOrderEntry::new(0), PageOrderEntry::new(5)];
        assert!(matches!(
            organize(&pdf, &entries),
            Err(PdfSmithError::IndexOutOfRange {
                index: 5,
                page_count: 3
            })
        ));
    }

    #[test]
    fn test_entry_rotation_must_be_quarter_turns() {
        let pdf = sample();
        let entries = [PageOrderEntry {
            rotation: 30,
            ..PageOrderEntry::new(0)
        }];
        assert!(matches!(
            organize(&pdf, &entries),
            Err(PdfSmithError::InvalidRotation(30))
        ));
    }

    #[test]
    fn test_entries_deserialize_with_defaults() {
        let entries: Vec<PageOrderEntry> =
            serde_json::from_str(r#"[{"original_index":2},{"original_index":0,"rotation":270,"deleted":true}]"#)
                .unwrap();
        assert_eq!(entries[0], PageOrderEntry::new(2));
        assert_eq!(entries[1].rotation, 270);
        assert!(entries[1].deleted);
    }
}
