//! Fixtures shared by the integration tests

#![allow(dead_code)]

use lopdf::{content::Content, content::Operation, dictionary, Dictionary, Document, Object, Stream};
use pdfsmith_core::PdfDocument;

/// Create a synthetic PDF whose pages read "<prefix> Page <n>"
pub fn synthetic_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    synthetic_pdf_with_info(num_pages, prefix, None)
}

/// Same as [`synthetic_pdf`], with an info dictionary carrying `title`
pub fn synthetic_pdf_with_info(num_pages: u32, prefix: &str, title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        page_label(prefix, i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => num_pages as i64,
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("pdfsmith tests"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn page_label(prefix: &str, number: u32) -> String {
    format!("{} Page {}", prefix, number)
}

/// Decoded content of every page, in order
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = PdfDocument::load(pdf).unwrap();
    (0..doc.page_count())
        .map(|i| String::from_utf8_lossy(&doc.page_content(i).unwrap()).into_owned())
        .collect()
}

/// Index of the first page whose content mentions `label`
pub fn find_label(texts: &[String], label: &str) -> Option<usize> {
    let needle = format!("({})", label);
    texts.iter().position(|t| t.contains(&needle))
}

/// A small RGB PNG
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&vec![128; (width * height * 3) as usize])
            .unwrap();
    }
    bytes
}
