//! Text watermark stamped on every page
//!
//! The text is centered horizontally, placed at half the page height and
//! rotated about its origin. One font and one graphics state object are
//! shared by all pages; each page gets its own resource dictionary naming
//! them, and its existing content is wrapped in `q`/`Q` first.

use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use crate::fonts::{self, WATERMARK_FONT};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};

/// Gray level of the watermark fill
const FILL_GRAY: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    pub font_size: f32,
    /// Fill and stroke alpha, 0.0 to 1.0
    pub opacity: f32,
    /// Degrees counter-clockwise
    pub rotation: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            font_size: 48.0,
            opacity: 0.3,
            rotation: -45.0,
        }
    }
}

impl WatermarkOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(PdfSmithError::InvalidOption(format!(
                "font size must be positive, got {}",
                self.font_size
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PdfSmithError::InvalidOption(format!(
                "opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        if !self.rotation.is_finite() {
            return Err(PdfSmithError::InvalidOption("rotation must be finite".into()));
        }
        Ok(())
    }
}

/// Stamp `text` on every page of the document
pub fn watermark(bytes: &[u8], text: &str, options: &WatermarkOptions) -> Result<Vec<u8>> {
    if text.trim().is_empty() {
        return Err(PdfSmithError::EmptyText);
    }
    options.validate()?;
    let encoded = fonts::encode_win_ansi(text)?;
    let text_width = fonts::text_width(&encoded, options.font_size);

    let mut doc = PdfDocument::load(bytes)?;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => WATERMARK_FONT,
        "Encoding" => "WinAnsiEncoding",
    });
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => options.opacity,
        "CA" => options.opacity,
    });
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let page_ids = doc.page_ids();
    for &page_id in &page_ids {
        let size = doc.page_size_of(page_id);
        let mut resources = page_resources(&doc, page_id);
        let font_name = attach(&doc, &mut resources, b"Font", "FWm", font_id);
        let gs_name = attach(&doc, &mut resources, b"ExtGState", "GSwm", gs_id);

        let x = size.x + (size.width - text_width) / 2.0;
        let y = size.y + size.height / 2.0;
        let stamp = stamp_content(&encoded, options, &font_name, &gs_name, x, y)?;
        let stamp_id = doc.add_object(Stream::new(Dictionary::new(), stamp));

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(existing_contents(&doc, page_id));
        contents.push(Object::Reference(stamp_id));

        let page = doc.as_lopdf_mut().get_dictionary_mut(page_id)?;
        page.set("Resources", resources);
        page.set("Contents", contents);
    }
    tracing::debug!(pages = page_ids.len(), text_width, "applied watermark");

    doc.save_with(SaveOptions::default())
}

fn stamp_content(
    encoded: &[u8],
    options: &WatermarkOptions,
    font_name: &str,
    gs_name: &str,
    x: f32,
    y: f32,
) -> Result<Vec<u8>> {
    let (sin, cos) = options.rotation.to_radians().sin_cos();
    let content = Content {
        operations: vec![
            // Balances the `q` placed before the original content
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(gs_name.as_bytes().to_vec())]),
            Operation::new("g", vec![FILL_GRAY.into()]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.as_bytes().to_vec()), options.font_size.into()],
            ),
            Operation::new(
                "Tm",
                vec![cos.into(), sin.into(), (-sin).into(), cos.into(), x.into(), y.into()],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encoded.to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    Ok(content.encode()?)
}

/// Effective resources of a page as a direct, page-owned dictionary
fn page_resources(doc: &PdfDocument, page_id: ObjectId) -> Dictionary {
    doc.inherited(page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Register `id` under a fresh name in the `category` sub-dictionary
fn attach(
    doc: &PdfDocument,
    resources: &mut Dictionary,
    category: &[u8],
    base: &str,
    id: ObjectId,
) -> String {
    let mut entries = resources
        .get(category)
        .ok()
        .map(|obj| doc.resolve(obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut name = base.to_string();
    let mut suffix = 1;
    while entries.has(name.as_bytes()) {
        name = format!("{}{}", base, suffix);
        suffix += 1;
    }
    entries.set(name.as_bytes().to_vec(), Object::Reference(id));
    resources.set(category.to_vec(), entries);
    name
}

/// Content stream references of a page, flattening an indirect array
fn existing_contents(doc: &PdfDocument, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.as_lopdf().get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.as_lopdf().get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
