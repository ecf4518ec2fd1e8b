//! Upload checks and document info

use crate::error::QuickSignError;
use crate::export::{page_geometry, PDF_MIME_TYPE};
use lopdf::Document;
use serde::Serialize;

/// Basic facts about a loaded document
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PdfInfo {
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    /// True page sizes in PDF units, in page order
    pub pages: Vec<PageSize>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Reject a file selection whose declared type is not PDF.
///
/// Some platforms report an empty type; those are accepted only when the
/// bytes carry the `%PDF-` header.
pub fn check_upload(declared_type: &str, bytes: &[u8]) -> Result<(), QuickSignError> {
    let declared = declared_type.trim();
    if declared.eq_ignore_ascii_case(PDF_MIME_TYPE) {
        return Ok(());
    }
    if declared.is_empty() && bytes.starts_with(b"%PDF-") {
        return Ok(());
    }
    let shown = if declared.is_empty() { "unknown" } else { declared };
    Err(QuickSignError::NotPdf(format!(
        "Selected file has type {}, expected {}",
        shown, PDF_MIME_TYPE
    )))
}

/// Parse the document and collect its page sizes
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, QuickSignError> {
    if bytes.len() < 8 {
        return Err(QuickSignError::ParseError(
            "File too small to be a valid PDF".to_string(),
        ));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(QuickSignError::ParseError(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }

    let document =
        Document::load_mem(bytes).map_err(|e| QuickSignError::ParseError(e.to_string()))?;

    let page_ids = document.get_pages();
    if page_ids.is_empty() {
        return Err(QuickSignError::ParseError("PDF has no pages".to_string()));
    }

    let pages = page_ids
        .values()
        .map(|id| {
            page_geometry(&document, *id).map(|g| PageSize {
                width: g.width,
                height: g.height,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PdfInfo {
        page_count: page_ids.len() as u32,
        version: extract_version(bytes),
        encrypted: document.is_encrypted(),
        size_bytes: bytes.len(),
        pages,
    })
}

/// Header format: %PDF-1.7
fn extract_version(bytes: &[u8]) -> String {
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object};

    fn two_page_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let letter = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let a4 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(595.5), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(letter), Object::Reference(a4)],
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_check_upload_accepts_pdf_type() {
        assert!(check_upload("application/pdf", b"").is_ok());
        assert!(check_upload("Application/PDF", b"").is_ok());
    }

    #[test]
    fn test_check_upload_rejects_other_types() {
        let err = check_upload("image/png", b"%PDF-1.7").unwrap_err();
        assert!(matches!(err, QuickSignError::NotPdf(_)));
    }

    #[test]
    fn test_check_upload_sniffs_untyped_files() {
        assert!(check_upload("", b"%PDF-1.7\n").is_ok());
        assert!(check_upload("", b"PK\x03\x04").is_err());
    }

    #[test]
    fn test_validate_reports_page_sizes() {
        let info = validate_pdf(&two_page_pdf()).unwrap();
        assert_eq!(info.page_count, 2);
        assert_eq!(info.version, "1.5");
        assert_eq!(
            info.pages,
            vec![
                PageSize {
                    width: 612.0,
                    height: 792.0
                },
                PageSize {
                    width: 595.5,
                    height: 842.0
                },
            ]
        );
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(validate_pdf(b"hello").is_err());
        assert!(validate_pdf(b"%PDF-1.7 truncated").is_err());
    }
}
