use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuickSignError {
    #[error("Not a PDF file: {0}")]
    NotPdf(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to decode signature image: {0}")]
    ImageDecode(String),

    #[error("Signature is empty")]
    EmptySignature,

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    InvalidPage { page: u32, page_count: u32 },

    #[error("No document loaded")]
    NoDocument,

    #[error("An export is already in progress")]
    ExportInProgress,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for QuickSignError {
    fn from(e: serde_json::Error) -> Self {
        QuickSignError::SerializationError(e.to_string())
    }
}
