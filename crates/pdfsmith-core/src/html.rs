//! HTML to PDF through a [`DomRasterizer`]
//!
//! The markup is rendered to one tall raster, scaled to the page width and
//! cut into page-height bands. Each band becomes an image page anchored at
//! the top edge.

use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use crate::images::add_top_anchored_page;
use crate::raster::DomRasterizer;
use serde::{Deserialize, Serialize};

pub const MAX_HTML_CHARS: usize = 500_000;
pub const MAX_RASTER_HEIGHT_PX: u32 = 16_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    #[default]
    A4,
    Letter,
}

impl PaperFormat {
    /// Portrait size in points
    pub fn size(self) -> (f32, f32) {
        match self {
            PaperFormat::A4 => (595.28, 841.89),
            PaperFormat::Letter => (612.0, 792.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    pub format: PaperFormat,
    pub orientation: Orientation,
    /// Height of each band in points; `None` or 0 uses the full page, larger
    /// values are clamped to it
    pub max_height_per_page: Option<f32>,
    /// Device pixel ratio handed to the renderer
    pub scale: f32,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            orientation: Orientation::Portrait,
            max_height_per_page: None,
            scale: 1.0,
        }
    }
}

impl HtmlOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(PdfSmithError::InvalidOption(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if let Some(height) = self.max_height_per_page {
            if !height.is_finite() || height < 0.0 {
                return Err(PdfSmithError::InvalidOption(format!(
                    "max height per page must be non-negative, got {}",
                    height
                )));
            }
        }
        Ok(())
    }

    /// Page width and height in points after orientation
    pub fn page_size(&self) -> (f32, f32) {
        let (width, height) = self.format.size();
        match self.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        }
    }

    fn band_height(&self, page_height: f32) -> f32 {
        match self.max_height_per_page {
            Some(height) if height > 0.0 => height.min(page_height),
            _ => page_height,
        }
    }
}

/// Render `html` and lay the raster out over as many pages as it needs
pub fn html_to_pdf<R: DomRasterizer + ?Sized>(
    html: &str,
    renderer: &R,
    options: &HtmlOptions,
) -> Result<Vec<u8>> {
    if html.chars().count() > MAX_HTML_CHARS {
        return Err(PdfSmithError::ContentTooLarge(format!(
            "HTML exceeds {} characters",
            MAX_HTML_CHARS
        )));
    }
    options.validate()?;

    let raster = renderer.render_markup(html, options.scale)?;
    if raster.height() > MAX_RASTER_HEIGHT_PX {
        return Err(PdfSmithError::ContentTooLarge(format!(
            "rendered document is {} px tall (limit {})",
            raster.height(), MAX_RASTER_HEIGHT_PX
        )));
    }

    let (page_width, page_height) = options.page_size();
    let points_per_px = page_width as f64 / raster.width() as f64;
    let band_points = options.band_height(page_height) as f64;
    let total_points = raster.height() as f64 * points_per_px;
    let band_count = (total_points / band_points).ceil() as u32;

    let mut doc = PdfDocument::create_empty();
    for band in 0..band_count {
        let top = (band as f64 * band_points / points_per_px).round() as u32;
        let bottom = (((band + 1) as f64 * band_points / points_per_px).round() as u32).min(raster.height());
        let Some(slice) = raster.band(top, bottom.saturating_sub(top)) else {
            break;
        };
        let drawn = (slice.height() as f64 * points_per_px) as f32;
        add_top_anchored_page(&mut doc, slice.into_embedded()?, page_width, page_height, drawn)?;
    }

    tracing::debug!(
        width = raster.width(),
        height = raster.height(),
        pages = doc.page_count(),
        "laid out HTML raster"
    );
    doc.save_with(SaveOptions { compact: true })
}
