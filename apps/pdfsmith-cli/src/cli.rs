use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use pdfsmith_core::{EncryptionAlgorithm, PageOrderEntry};

/// Merge, split, rotate, watermark and password-protect PDF files locally.
#[derive(Debug, Parser)]
#[command(name = "pdfsmith", about, version)]
pub struct Cli {
    /// TOML file with default options; flags take precedence
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Concatenate PDFs in the order given
    Merge {
        #[arg(value_name = "FILES", required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Keep only the selected pages
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5')
        #[arg(long)]
        pages: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write every page to its own PDF
    Split {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory for the `<name>-page-<n>.pdf` files
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },

    /// Rotate pages clockwise by 90, 180 or 270 degrees
    Rotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        angle: i32,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Reorder, rotate and drop pages
    Organize {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// New page order, e.g. '3,1:90,2'; `:deg` adds rotation and
        /// pages left out are dropped
        #[arg(long, value_parser = parse_order)]
        order: OrderArg,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Strip metadata and compact the file
    Compress {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Stamp diagonal text on every page
    Watermark {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        text: String,

        #[arg(long)]
        font_size: Option<f32>,

        /// 0.0 (invisible) to 1.0 (opaque)
        #[arg(long)]
        opacity: Option<f32>,

        /// Degrees counter-clockwise
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f32>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build a PDF with one page per PNG or JPEG image
    Images {
        #[arg(value_name = "IMAGES", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Password-protect a PDF
    Encrypt {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        user_password: String,

        /// Defaults to the user password
        #[arg(long)]
        owner_password: Option<String>,

        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,

        /// Deny printing
        #[arg(long)]
        no_print: bool,

        /// Deny copying text and images
        #[arg(long)]
        no_copy: bool,

        /// Deny modifying content
        #[arg(long)]
        no_modify: bool,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove password protection
    Decrypt {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        password: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Report whether a PDF is password protected
    Detect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print page count, page sizes and metadata as JSON
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Password for encrypted PDFs
        #[arg(long)]
        password: Option<String>,
    },

    /// Run a JSON command file and print the result
    Exec {
        #[arg(value_name = "COMMAND")]
        command: PathBuf,

        /// Write the resulting PDF here instead of embedding it in the output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    /// RC4, 128-bit key
    Rc4,
    /// AES-128
    Aes,
}

impl From<AlgorithmArg> for EncryptionAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Rc4 => EncryptionAlgorithm::Rc4_128,
            AlgorithmArg::Aes => EncryptionAlgorithm::Aes128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArg(pub Vec<PageOrderEntry>);

/// Parse '3,1:90,2' into 0-based entries
fn parse_order(input: &str) -> Result<OrderArg, String> {
    let mut entries = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (page, rotation) = match part.split_once(':') {
            Some((page, rotation)) => (page.trim(), Some(rotation.trim())),
            None => (part, None),
        };
        let page: usize = page
            .parse()
            .map_err(|_| format!("invalid page number: '{page}'"))?;
        if page == 0 {
            return Err("page 0 is invalid (pages start at 1)".to_string());
        }
        let mut entry = PageOrderEntry::new(page - 1);
        if let Some(rotation) = rotation {
            entry.rotation = rotation
                .parse()
                .map_err(|_| format!("invalid rotation: '{rotation}'"))?;
        }
        entries.push(entry);
    }
    if entries.is_empty() {
        return Err("at least one page is required".to_string());
    }
    Ok(OrderArg(entries))
}
