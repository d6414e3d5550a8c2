//! Fixture builders shared by the unit tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

#[derive(Debug, Clone)]
pub struct PageSpec {
    pub label: String,
    pub width: f32,
    pub height: f32,
    pub rotation: i64,
    /// Put the `/MediaBox` on the page tree root instead of the page
    pub inherit_media_box: bool,
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            label: "Page".to_string(),
            width: 612.0,
            height: 792.0,
            rotation: 0,
            inherit_media_box: false,
        }
    }
}

impl PageSpec {
    pub fn labeled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn rotated(rotation: i64) -> Self {
        Self {
            rotation,
            ..Self::default()
        }
    }
}

/// `count` pages labeled "<prefix> Page 1", "<prefix> Page 2" and so on
pub fn numbered_pdf(count: usize, prefix: &str) -> Vec<u8> {
    let pages: Vec<PageSpec> = (1..=count)
        .map(|n| PageSpec::labeled(&format!("{} Page {}", prefix, n)))
        .collect();
    build_pdf(&pages)
}

/// Build a PDF whose pages each draw their label with Helvetica
pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    build_pdf_with_title(pages, None)
}

pub fn build_pdf_with_title(pages: &[PageSpec], title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for spec in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        spec.label.as_bytes().to_vec(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        if !spec.inherit_media_box {
            page.set(
                "MediaBox",
                vec![0.into(), 0.into(), spec.width.into(), spec.height.into()],
            );
        }
        if spec.rotation != 0 {
            page.set("Rotate", spec.rotation);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Count" => pages.len() as i64,
        "Kids" => kids,
    };
    if let Some(first) = pages.iter().find(|p| p.inherit_media_box) {
        tree.set(
            "MediaBox",
            vec![0.into(), 0.into(), first.width.into(), first.height.into()],
        );
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal("Fixture Author"),
            "Producer" => Object::string_literal("Fixture Producer"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// An 8-bit RGB or RGBA PNG filled with a repeating gradient
pub fn png_fixture(width: u32, height: u32, with_alpha: bool) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        let channels = if with_alpha {
            encoder.set_color(png::ColorType::Rgba);
            4
        } else {
            encoder.set_color(png::ColorType::Rgb);
            3
        };
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let data: Vec<u8> = (0..width * height * channels).map(|i| (i * 37 % 256) as u8).collect();
        writer.write_image_data(&data).unwrap();
    }
    bytes
}

/// Minimal JPEG header: SOI, one SOF0 segment, EOI
pub fn jpeg_fixture(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    bytes.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
    let length = 8 + 3 * components as u16;
    bytes.extend_from_slice(&[0xFF, 0xC0]);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(8);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.push(components);
    for id in 1..=components {
        bytes.extend_from_slice(&[id, 0x11, 0x00]);
    }
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}
