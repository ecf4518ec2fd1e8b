//! Place text, date and signature annotations on a PDF and bake them in
//!
//! Annotations are captured in editor space, the fixed-width raster the
//! user edits on, and kept in an [`AnnotationStore`]. Export maps each one
//! into its page's native coordinates and appends the drawing to the page
//! content with lopdf.
//!
//! - [`store`]: ordered annotation set with total, id-addressed mutations
//! - [`transform`]: editor space to PDF space
//! - [`export`]: compositing and serialization
//! - [`gate`]: single in-flight export guard

pub mod annotation;
pub mod config;
pub mod error;
pub mod export;
pub mod gate;
pub mod signature;
pub mod store;
pub mod transform;
pub mod validation;

pub use annotation::{
    Annotation, AnnotationBody, AnnotationContent, AnnotationId, AnnotationKind, Point, Size,
};
pub use config::ExportConfig;
pub use error::QuickSignError;
pub use export::{export_document, suggested_file_name, ExportJob, PDF_MIME_TYPE};
pub use gate::{ExportGate, ExportTicket};
pub use signature::{capture_signature, SignatureImage, SignatureSource};
pub use store::{AnnotationStore, StoreCommand};
pub use transform::{PageGeometry, Placement};
pub use validation::{check_upload, validate_pdf, PdfInfo};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, QuickSignError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| QuickSignError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}
