//! WASM bindings for the QuickSign annotator
//!
//! The document, the annotation store and the export pipeline all live in
//! Rust. JavaScript renders pages at the editor width, draws the overlay
//! and forwards user input.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { SigningSession } from './pkg/quicksign_wasm.js';
//!
//! await init();
//!
//! const session = new SigningSession();
//! session.loadDocument(file.name, file.type, bytes);
//! const id = session.addText(40, 30, "Jane Doe");
//! session.moveAnnotation(id, 60, 90);
//! session.addSignature(pad, 300, 600);
//!
//! const signed = await session.exportPdf();
//! downloadBlob(signed, session.exportFileName(), pdfMimeType());
//! ```

pub mod session;
pub mod signature_pad;

use wasm_bindgen::prelude::*;

pub use session::SigningSession;
pub use signature_pad::SignaturePad;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("quicksign-wasm {} ready", get_version()).into());
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Check a file selection before loading it
#[wasm_bindgen]
pub fn quick_validate(mime_type: &str, bytes: &[u8]) -> Result<(), JsValue> {
    quicksign_core::check_upload(mime_type, bytes)
        .and_then(|_| quicksign_core::validate_pdf(bytes).map(|_| ()))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Document info without creating a session
#[wasm_bindgen]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = quicksign_core::validate_pdf(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Content type for the exported download
#[wasm_bindgen(js_name = pdfMimeType)]
pub fn pdf_mime_type() -> String {
    quicksign_core::PDF_MIME_TYPE.to_string()
}
