//! Rasterization bridge
//!
//! Rendering itself belongs to an external collaborator behind
//! [`PageRasterizer`] and [`DomRasterizer`]. This module owns the glue:
//! sequential page loops that keep a single raster alive, cooperative
//! cancellation between pages, PNG encoding and the rasterized rebuild used
//! by [`decrypt_rasterized`].

use crate::crypto;
use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use crate::images::{add_image_page, EmbeddedImage};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Scale used when rebuilding a document from page rasters
pub const DECRYPT_RENDER_SCALE: f32 = 2.0;

/// 8-bit RGB pixel buffer, rows top to bottom.
///
/// Only [`RasterImage::new`] builds one, so every raster is non-empty and
/// holds exactly `width * height * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PdfSmithError::Render(format!(
                "empty raster ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(PdfSmithError::Render(format!(
                "raster of {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy `rows` rows starting at `top`, clamped to the raster.
    /// `None` when nothing of the band lies inside it.
    pub(crate) fn band(&self, top: u32, rows: u32) -> Option<RasterImage> {
        let rows = rows.min(self.height.saturating_sub(top));
        if rows == 0 {
            return None;
        }
        let stride = self.width as usize * 3;
        let start = top as usize * stride;
        let pixels = self.pixels.get(start..start + rows as usize * stride)?;
        Some(RasterImage {
            width: self.width,
            height: rows,
            pixels: pixels.to_vec(),
        })
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().map_err(png_error)?;
            writer.write_image_data(&self.pixels).map_err(png_error)?;
        }
        Ok(bytes)
    }

    pub(crate) fn into_embedded(self) -> Result<EmbeddedImage> {
        EmbeddedImage::from_rgb(self.width, self.height, &self.pixels)
    }
}

fn png_error(err: png::EncodingError) -> PdfSmithError {
    PdfSmithError::Render(format!("PNG encoding failed: {}", err))
}

/// Renders one page of an open document to pixels
pub trait PageRasterizer {
    fn render_page(&self, doc: &PdfDocument, index: usize, scale: f32) -> Result<RasterImage>;
}

/// Renders an HTML fragment to pixels; sanitizing the markup is up to the implementor
pub trait DomRasterizer {
    fn render_markup(&self, html: &str, scale: f32) -> Result<RasterImage>;
}

/// Shared flag a caller flips to stop a raster loop before its next page
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lazily renders the pages of a document in order.
///
/// Each call to `next` renders exactly one page, so only the raster the
/// caller is holding stays alive. Once cancelled, or after the first error,
/// the iterator yields that error and then ends.
pub struct PageRasters<'a, R: ?Sized> {
    doc: PdfDocument,
    rasterizer: &'a R,
    scale: f32,
    cancel: CancellationToken,
    next: usize,
    finished: bool,
}

impl<'a, R: PageRasterizer + ?Sized> PageRasters<'a, R> {
    pub fn new(
        doc: PdfDocument,
        rasterizer: &'a R,
        scale: f32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            doc,
            rasterizer,
            scale,
            cancel,
            next: 0,
            finished: false,
        }
    }
}

impl<R: PageRasterizer + ?Sized> Iterator for PageRasters<'_, R> {
    type Item = Result<(usize, RasterImage)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next >= self.doc.page_count() {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return Some(Err(PdfSmithError::Cancelled));
        }

        let index = self.next;
        self.next += 1;
        match self.rasterizer.render_page(&self.doc, index, self.scale) {
            Ok(raster) => {
                tracing::debug!(
                    page = index + 1,
                    width = raster.width,
                    height = raster.height,
                    "rendered page"
                );
                Some(Ok((index, raster)))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub scale: f32,
    pub format: ImageFormat,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            format: ImageFormat::Png,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(PdfSmithError::InvalidOption(format!(
                "render scale must be positive, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// One encoded page image
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Render every page of an unencrypted PDF to an encoded image, one page per step
pub fn pdf_to_images<'a, R: PageRasterizer + ?Sized>(
    bytes: &[u8],
    rasterizer: &'a R,
    options: &RenderOptions,
    cancel: CancellationToken,
) -> Result<impl Iterator<Item = Result<RenderedPage>> + 'a> {
    options.validate()?;
    let doc = PdfDocument::load(bytes)?;
    let format = options.format;
    let pages = PageRasters::new(doc, rasterizer, options.scale, cancel);
    Ok(pages.map(move |rendered| {
        let (index, raster) = rendered?;
        let encoded = match format {
            ImageFormat::Png => raster.to_png()?,
        };
        Ok(RenderedPage {
            page_number: index + 1,
            width: raster.width,
            height: raster.height,
            png: encoded,
        })
    }))
}

/// Decrypt by rebuilding every page from a raster of the authenticated document.
///
/// The output is a visual copy: text, vector content and metadata are not
/// carried over. Each page keeps the displayed size of its original.
pub fn decrypt_rasterized<R: PageRasterizer + ?Sized>(
    bytes: &[u8],
    password: &str,
    rasterizer: &R,
    cancel: CancellationToken,
) -> Result<Vec<u8>> {
    let raw = PdfDocument::load_raw(bytes).map_err(|e| PdfSmithError::Decryption(e.to_string()))?;
    if !crypto::is_encrypted(&raw) {
        return Err(PdfSmithError::NotEncrypted);
    }
    let source = PdfDocument::load_with_password(bytes, password).map_err(|err| match err {
        PdfSmithError::IncorrectPassword => err,
        other => PdfSmithError::Decryption(other.to_string()),
    })?;

    let mut sizes = Vec::with_capacity(source.page_count());
    for index in 0..source.page_count() {
        let size = source.page_size(index)?;
        sizes.push(match source.rotation(index)? {
            90 | 270 => (size.height, size.width),
            _ => (size.width, size.height),
        });
    }

    let mut rebuilt = PdfDocument::create_empty();
    for rendered in PageRasters::new(source, rasterizer, DECRYPT_RENDER_SCALE, cancel) {
        let (index, raster) = rendered?;
        let (width, height) = sizes[index];
        add_image_page(&mut rebuilt, raster.into_embedded()?, width, height)?;
    }
    tracing::debug!(pages = rebuilt.page_count(), "rebuilt document from rasters");
    rebuilt.save_with(SaveOptions { compact: true })
}
