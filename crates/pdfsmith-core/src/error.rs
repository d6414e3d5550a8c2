use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfSmithError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("PDF is password protected")]
    PasswordRequired,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("PDF is not encrypted")]
    NotEncrypted,

    #[error("Page index {index} is out of range (document has {page_count} pages)")]
    IndexOutOfRange { index: usize, page_count: usize },

    #[error("No documents provided")]
    EmptyInput,

    #[error("Must select at least one page")]
    EmptySelection,

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Invalid rotation {0}: must be a multiple of 90 degrees")]
    InvalidRotation(i32),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Watermark text must not be empty")]
    EmptyText,

    #[error("Character {0:?} cannot be encoded with the standard font")]
    UnsupportedCharacter(char),

    #[error("No convertible images (skipped: {})", .skipped.join(", "))]
    NoConvertibleImages { skipped: Vec<String> },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Content too large: {0}")]
    ContentTooLarge(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PdfSmithError {
    /// Whether the failure concerns authentication rather than the document itself
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            PdfSmithError::PasswordRequired | PdfSmithError::IncorrectPassword
        )
    }
}

impl From<lopdf::Error> for PdfSmithError {
    fn from(err: lopdf::Error) -> Self {
        PdfSmithError::Operation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfSmithError>;
