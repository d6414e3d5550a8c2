//! Serializable commands and their dispatcher
//!
//! File payloads travel as base64 strings so a command can be read from JSON
//! as-is. [`execute`] never fails: errors are folded into the returned
//! [`ProcessResult`] as user-facing text.

use crate::crypto::{self, EncryptOptions, EncryptionDescriptor, EncryptionStatus};
use crate::document::PdfDocument;
use crate::error::{PdfSmithError, Result};
use crate::images::{images_to_pdf, ImageInput};
use crate::organize::PageOrderEntry;
use crate::watermark::WatermarkOptions;
use crate::{compress, merge, organize, rotate, split, watermark};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Merge {
        #[serde(with = "base64_list")]
        files: Vec<Vec<u8>>,
    },
    /// Keep the pages named by a range list such as `"1-3, 5"`
    Extract {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        pages: String,
    },
    Rotate {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        angle: i32,
        /// Range list; every page when absent
        #[serde(default)]
        pages: Option<String>,
    },
    Organize {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        entries: Vec<PageOrderEntry>,
    },
    Compress {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
    },
    Watermark {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        text: String,
        #[serde(default)]
        options: WatermarkOptions,
    },
    ImagesToPdf {
        images: Vec<ImageInput>,
    },
    Encrypt {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        user_password: String,
        #[serde(default)]
        owner_password: Option<String>,
        #[serde(default)]
        options: EncryptOptions,
    },
    Decrypt {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        password: String,
    },
    Detect {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
    },
    Info {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        #[serde(default)]
        password: Option<String>,
    },
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Extract { .. } => "extract",
            PdfCommand::Rotate { .. } => "rotate",
            PdfCommand::Organize { .. } => "organize",
            PdfCommand::Compress { .. } => "compress",
            PdfCommand::Watermark { .. } => "watermark",
            PdfCommand::ImagesToPdf { .. } => "images_to_pdf",
            PdfCommand::Encrypt { .. } => "encrypt",
            PdfCommand::Decrypt { .. } => "decrypt",
            PdfCommand::Detect { .. } => "detect",
            PdfCommand::Info { .. } => "info",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            PdfCommand::Merge { files } => files.iter().map(Vec::len).sum(),
            PdfCommand::ImagesToPdf { images } => images.iter().map(|i| i.bytes.len()).sum(),
            PdfCommand::Extract { file, .. }
            | PdfCommand::Rotate { file, .. }
            | PdfCommand::Organize { file, .. }
            | PdfCommand::Compress { file }
            | PdfCommand::Watermark { file, .. }
            | PdfCommand::Encrypt { file, .. }
            | PdfCommand::Decrypt { file, .. }
            | PdfCommand::Detect { file }
            | PdfCommand::Info { file, .. } => file.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    /// JSON report for commands that inspect rather than produce a PDF
    pub report: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Inputs left out of the output, by name
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    fn failure(err: &PdfSmithError) -> Self {
        Self {
            success: false,
            data: None,
            report: None,
            error: Some(err.to_string()),
            skipped: Vec::new(),
            metrics: None,
        }
    }

    /// Decode the PDF payload
    pub fn pdf_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.data
            .as_deref()
            .map(|data| {
                STANDARD
                    .decode(data)
                    .map_err(|e| PdfSmithError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

enum Output {
    Pdf { bytes: Vec<u8>, skipped: Vec<String> },
    Report { value: serde_json::Value, page_count: u32 },
}

impl Output {
    fn pdf(bytes: Vec<u8>) -> Self {
        Output::Pdf {
            bytes,
            skipped: Vec::new(),
        }
    }
}

/// Run a command to completion
pub fn execute(command: PdfCommand) -> ProcessResult {
    let started = Instant::now();
    let name = command.name();
    let input_size_bytes = command.input_size();

    let result = run(command).and_then(|output| {
        let elapsed = started.elapsed().as_millis() as u64;
        Ok(match output {
            Output::Pdf { bytes, skipped } => ProcessResult {
                success: true,
                report: None,
                error: None,
                skipped,
                metrics: Some(ProcessMetrics {
                    input_size_bytes,
                    output_size_bytes: bytes.len(),
                    page_count: crate::get_page_count(&bytes)?,
                    processing_time_ms: elapsed,
                }),
                data: Some(STANDARD.encode(&bytes)),
            },
            Output::Report { value, page_count } => ProcessResult {
                success: true,
                data: None,
                report: Some(value),
                error: None,
                skipped: Vec::new(),
                metrics: Some(ProcessMetrics {
                    input_size_bytes,
                    output_size_bytes: 0,
                    page_count,
                    processing_time_ms: elapsed,
                }),
            },
        })
    });

    match result {
        Ok(result) => {
            tracing::debug!(command = name, input_size_bytes, "command finished");
            result
        }
        Err(err) => ProcessResult::failure(&err),
    }
}

fn run(command: PdfCommand) -> Result<Output> {
    match command {
        PdfCommand::Merge { files } => merge::merge(&files).map(Output::pdf),
        PdfCommand::Extract { file, pages } => {
            let pages = crate::parse_ranges(&pages)?;
            split::extract_selection(&file, &pages).map(Output::pdf)
        }
        PdfCommand::Rotate { file, angle, pages } => {
            let indices = pages.as_deref().map(page_indices).transpose()?;
            rotate::rotate(&file, angle, indices.as_deref()).map(Output::pdf)
        }
        PdfCommand::Organize { file, entries } => organize::organize(&file, &entries).map(Output::pdf),
        PdfCommand::Compress { file } => compress::compress(&file).map(Output::pdf),
        PdfCommand::Watermark {
            file,
            text,
            options,
        } => watermark::watermark(&file, &text, &options).map(Output::pdf),
        PdfCommand::ImagesToPdf { images } => {
            let converted = images_to_pdf(&images)?;
            Ok(Output::Pdf {
                bytes: converted.pdf,
                skipped: converted.skipped,
            })
        }
        PdfCommand::Encrypt {
            file,
            user_password,
            owner_password,
            options,
        } => {
            let descriptor = EncryptionDescriptor {
                user_password,
                owner_password,
            };
            crypto::encrypt(&file, &descriptor, &options).map(Output::pdf)
        }
        PdfCommand::Decrypt { file, password } => crypto::decrypt(&file, &password).map(Output::pdf),
        PdfCommand::Detect { file } => {
            let status = crypto::detect_encryption(&file);
            let page_count = match status {
                EncryptionStatus::NotEncrypted => crate::get_page_count(&file)?,
                _ => 0,
            };
            Ok(Output::Report {
                value: serde_json::json!({ "status": status }),
                page_count,
            })
        }
        PdfCommand::Info { file, password } => {
            let doc = PdfDocument::open(&file, password.as_deref()).into_result()?;
            let mut info = doc.summary(file.len());
            info.encrypted = crypto::detect_encryption(&file) == EncryptionStatus::Encrypted;
            Ok(Output::Report {
                page_count: info.page_count as u32,
                value: to_json(&info)?,
            })
        }
    }
}

/// 1-based range list to 0-based indices
fn page_indices(ranges: &str) -> Result<Vec<usize>> {
    let pages = crate::parse_ranges(ranges)?;
    if pages.contains(&0) {
        return Err(PdfSmithError::InvalidRange("Page numbers must be >= 1".into()));
    }
    Ok(pages.into_iter().map(|p| p as usize - 1).collect())
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| PdfSmithError::Serialization(e.to_string()))
}

/// Serde adapter storing bytes as a standard base64 string
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) mod base64_list {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|encoded| STANDARD.decode(encoded.trim()))
            .collect::<Result<_, _>>()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, build_pdf_with_title, png_fixture, PageSpec};
    use pretty_assertions::assert_eq;

    fn encoded(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    fn three_pages() -> Vec<u8> {
        build_pdf(&[
            PageSpec::labeled("a"),
            PageSpec::labeled("b"),
            PageSpec::labeled("c"),
        ])
    }

    #[test]
    fn test_command_deserializes_merge() {
        let json = format!(r#"{{"type":"Merge","files":["{}"]}}"#, encoded(b"%PDF"));
        let cmd: PdfCommand = serde_json::from_str(&json).unwrap();
        match cmd {
            PdfCommand::Merge { files } => assert_eq!(files, vec![b"%PDF".to_vec()]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_command_deserializes_with_defaults() {
        let json = r#"{"type":"Watermark","file":"","text":"DRAFT"}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        match cmd {
            PdfCommand::Watermark { options, .. } => assert_eq!(options, WatermarkOptions::default()),
            other => panic!("unexpected command: {other:?}"),
        }

        let json = r#"{"type":"Organize","file":"","entries":[{"original_index":2}]}"#;
        let cmd: PdfCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, PdfCommand::Organize { ref entries, .. } if entries[0] == PageOrderEntry::new(2)));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let json = r#"{"type":"Compress","file":"***"}"#;
        assert!(serde_json::from_str::<PdfCommand>(json).is_err());
    }

    #[test]
    fn test_execute_merge_reports_metrics() {
        let first = three_pages();
        let second = build_pdf(&[PageSpec::labeled("d")]);
        let input_size = first.len() + second.len();

        let result = execute(PdfCommand::Merge {
            files: vec![first, second],
        });

        assert!(result.success, "{:?}", result.error);
        let metrics = result.metrics.clone().unwrap();
        assert_eq!(metrics.page_count, 4);
        assert_eq!(metrics.input_size_bytes, input_size);
        let pdf = result.pdf_bytes().unwrap().unwrap();
        assert_eq!(metrics.output_size_bytes, pdf.len());
        assert_eq!(PdfDocument::load(&pdf).unwrap().page_count(), 4);
    }

    #[test]
    fn test_execute_extract_uses_ranges() {
        let result = execute(PdfCommand::Extract {
            file: three_pages(),
            pages: "3, 1".into(),
        });
        assert!(result.success);
        assert_eq!(result.metrics.unwrap().page_count, 2);
    }

    #[test]
    fn test_execute_rotate_subset() {
        let result = execute(PdfCommand::Rotate {
            file: three_pages(),
            angle: 90,
            pages: Some("2".into()),
        });
        let doc = PdfDocument::load(&result.pdf_bytes().unwrap().unwrap()).unwrap();
        let rotations: Vec<i32> = (0..3).map(|i| doc.rotation(i).unwrap()).collect();
        assert_eq!(rotations, vec![0, 90, 0]);
    }

    #[test]
    fn test_execute_failure_carries_message() {
        let result = execute(PdfCommand::Merge { files: vec![] });
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No documents provided"));
        assert!(result.data.is_none());
        assert!(result.metrics.is_none());
    }

    #[test]
    fn test_execute_images_reports_skipped() {
        let result = execute(PdfCommand::ImagesToPdf {
            images: vec![
                ImageInput {
                    name: "ok.png".into(),
                    bytes: png_fixture(4, 4, false),
                    media_type: "image/png".into(),
                },
                ImageInput {
                    name: "readme.txt".into(),
                    bytes: b"hello".to_vec(),
                    media_type: "text/plain".into(),
                },
            ],
        });
        assert!(result.success);
        assert_eq!(result.skipped, vec!["readme.txt".to_string()]);
        assert_eq!(result.metrics.unwrap().page_count, 1);
    }

    #[test]
    fn test_execute_encrypt_then_detect_and_decrypt() {
        let encrypted = execute(PdfCommand::Encrypt {
            file: three_pages(),
            user_password: "secret".into(),
            owner_password: None,
            options: EncryptOptions::default(),
        })
        .pdf_bytes()
        .unwrap()
        .unwrap();

        let detected = execute(PdfCommand::Detect {
            file: encrypted.clone(),
        });
        assert_eq!(detected.report, Some(serde_json::json!({ "status": "encrypted" })));

        let wrong = execute(PdfCommand::Decrypt {
            file: encrypted.clone(),
            password: "guess".into(),
        });
        assert_eq!(wrong.error.as_deref(), Some("Incorrect password"));

        let decrypted = execute(PdfCommand::Decrypt {
            file: encrypted,
            password: "secret".into(),
        });
        assert_eq!(decrypted.metrics.unwrap().page_count, 3);
    }

    #[test]
    fn test_execute_info_report() {
        let pdf = build_pdf_with_title(&[PageSpec::default(), PageSpec::rotated(90)], Some("Quarterly"));
        let result = execute(PdfCommand::Info {
            file: pdf,
            password: None,
        });

        let report = result.report.unwrap();
        assert_eq!(report["page_count"], 2);
        assert_eq!(report["encrypted"], false);
        assert_eq!(report["metadata"]["title"], "Quarterly");
        assert_eq!(report["pages"][1]["rotation"], 90);
    }

    #[test]
    fn test_page_indices_are_zero_based() {
        assert_eq!(page_indices("1-2, 4").unwrap(), vec![0, 1, 3]);
        assert!(matches!(page_indices("0"), Err(PdfSmithError::InvalidRange(_))));
    }
}
