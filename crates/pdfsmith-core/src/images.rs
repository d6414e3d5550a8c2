//! Images to PDF
//!
//! Each supported image becomes one page sized to its pixel dimensions with
//! the image filling the page.
//!
//! - **PNG**: decoded, alpha split into a soft mask, Flate-compressed
//! - **JPEG**: passed through with the `DCTDecode` filter

use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfSmithError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    /// File name, reported back when the image is skipped
    pub name: String,
    #[serde(with = "crate::command::base64_bytes")]
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. `image/png`
    pub media_type: String,
}

#[derive(Debug, Clone)]
pub struct ImagesToPdf {
    pub pdf: Vec<u8>,
    /// Names of the inputs that were not converted, in input order
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
}

impl ColorSpace {
    fn from_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(ColorSpace::DeviceGray),
            3 => Some(ColorSpace::DeviceRGB),
            4 => Some(ColorSpace::DeviceCMYK),
            _ => None,
        }
    }

    fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Image ready to be written as an XObject
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    color_space: ColorSpace,
    /// Stream filter, `FlateDecode` or `DCTDecode`
    filter: &'static str,
    data: Vec<u8>,
    soft_mask: Option<Vec<u8>>,
}

impl EmbeddedImage {
    /// Wrap raw 8-bit RGB pixels
    pub(crate) fn from_rgb(width: u32, height: u32, pixels: &[u8]) -> Result<Self> {
        Ok(Self {
            width,
            height,
            color_space: ColorSpace::DeviceRGB,
            filter: "FlateDecode",
            data: deflate(pixels)?,
            soft_mask: None,
        })
    }

    fn from_png(bytes: &[u8]) -> std::result::Result<Self, String> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
        let mut buffer = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buffer).map_err(|e| e.to_string())?;
        buffer.truncate(info.buffer_size());

        let (color_space, channels) = match info.color_type {
            png::ColorType::Grayscale => (ColorSpace::DeviceGray, 1),
            png::ColorType::GrayscaleAlpha => (ColorSpace::DeviceGray, 2),
            png::ColorType::Rgb => (ColorSpace::DeviceRGB, 3),
            png::ColorType::Rgba => (ColorSpace::DeviceRGB, 4),
            png::ColorType::Indexed => return Err("palette was not expanded".into()),
        };

        let (pixels, alpha) = if channels % 2 == 0 {
            let color = channels - 1;
            let mut pixels = Vec::with_capacity(buffer.len() / channels * color);
            let mut alpha = Vec::with_capacity(buffer.len() / channels);
            for pixel in buffer.chunks_exact(channels) {
                pixels.extend_from_slice(&pixel[..color]);
                alpha.push(pixel[color]);
            }
            (pixels, Some(alpha))
        } else {
            (buffer, None)
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            color_space,
            filter: "FlateDecode",
            data: deflate(&pixels).map_err(|e| e.to_string())?,
            soft_mask: alpha
                .map(|a| deflate(&a))
                .transpose()
                .map_err(|e| e.to_string())?,
        })
    }

    fn from_jpeg(bytes: &[u8]) -> std::result::Result<Self, String> {
        let header = parse_jpeg_header(bytes)?;
        let color_space = ColorSpace::from_components(header.components)
            .ok_or_else(|| format!("{} color components", header.components))?;
        if header.width == 0 || header.height == 0 {
            return Err("zero-sized image".into());
        }
        Ok(Self {
            width: header.width as u32,
            height: header.height as u32,
            color_space,
            filter: "DCTDecode",
            data: bytes.to_vec(),
            soft_mask: None,
        })
    }

    /// Add the image (and its soft mask) as XObjects, returning the image id
    pub(crate) fn add_to(self, doc: &mut PdfDocument) -> lopdf::ObjectId {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => self.color_space.pdf_name(),
            "BitsPerComponent" => 8,
            "Filter" => self.filter,
        };
        // Adobe CMYK JPEGs store inverted components
        if self.color_space == ColorSpace::DeviceCMYK {
            dict.set(
                "Decode",
                vec![1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into()],
            );
        }
        if let Some(mask) = self.soft_mask {
            let mask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                mask,
            ));
            dict.set("SMask", mask_id);
        }
        doc.add_object(Stream::new(dict, self.data).with_compression(false))
    }
}

/// Append a page of `width` x `height` points with `image` stretched over it
pub(crate) fn add_image_page(
    doc: &mut PdfDocument,
    image: EmbeddedImage,
    width: f32,
    height: f32,
) -> Result<()> {
    add_top_anchored_page(doc, image, width, height, height)
}

/// Append a page with `image` spanning the full width and `drawn_height`
/// points down from the top edge
pub(crate) fn add_top_anchored_page(
    doc: &mut PdfDocument,
    image: EmbeddedImage,
    width: f32,
    height: f32,
    drawn_height: f32,
) -> Result<()> {
    let image_id = image.add_to(doc);
    let bottom = height - drawn_height;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    drawn_height.into(),
                    0.into(),
                    bottom.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let resources = dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    };
    doc.add_page(width, height, resources, content.encode()?)
}

/// Convert images into a PDF with one page per supported image
pub fn images_to_pdf(images: &[ImageInput]) -> Result<ImagesToPdf> {
    let mut doc = PdfDocument::create_empty();
    let mut skipped = Vec::new();

    for input in images {
        let decoded = match ImageKind::from_media_type(&input.media_type) {
            Some(ImageKind::Png) => EmbeddedImage::from_png(&input.bytes),
            Some(ImageKind::Jpeg) => EmbeddedImage::from_jpeg(&input.bytes),
            None => Err(format!("unsupported media type {}", input.media_type)),
        };
        match decoded {
            Ok(image) => {
                let (width, height) = (image.width as f32, image.height as f32);
                add_image_page(&mut doc, image, width, height)?;
            }
            Err(reason) => {
                tracing::debug!(name = %input.name, %reason, "skipped image");
                skipped.push(input.name.clone());
            }
        }
    }

    if doc.page_count() == 0 {
        return Err(PdfSmithError::NoConvertibleImages { skipped });
    }
    let pdf = doc.save_with(SaveOptions::default())?;
    Ok(ImagesToPdf { pdf, skipped })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfSmithError::Operation(format!("Flate compression failed: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u16,
    height: u16,
    components: u8,
}

/// Walk JPEG markers up to the first start-of-frame segment
fn parse_jpeg_header(data: &[u8]) -> std::result::Result<JpegHeader, String> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err("missing JPEG start-of-image marker".into());
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return Err(format!("expected marker at offset {}", pos));
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let segment = data
                .get(pos + 4..pos + 4 + 6)
                .ok_or("truncated start-of-frame segment")?;
            return Ok(JpegHeader {
                height: u16::from_be_bytes([segment[1], segment[2]]),
                width: u16::from_be_bytes([segment[3], segment[4]]),
                components: segment[5],
            });
        }
        if marker == 0xD9 || marker == 0xDA {
            break;
        }
        pos += 2 + length;
    }
    Err("no start-of-frame marker".into())
}
