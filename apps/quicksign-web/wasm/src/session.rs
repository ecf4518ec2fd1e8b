//! Stateful signing session
//!
//! Holds the loaded document and its annotation store in Rust. JavaScript
//! forwards toolbar, drag and keyboard events as plain method calls and
//! renders the overlay from `getPageAnnotationsJson`.

use crate::signature_pad::SignaturePad;
use chrono::{DateTime, Utc};
use quicksign_core::{
    capture_signature, check_upload, suggested_file_name, validate_pdf, AnnotationContent,
    AnnotationId, AnnotationStore, ExportConfig, ExportGate, ExportJob, ExportTicket, PdfInfo,
    Point, QuickSignError, SignatureImage, Size, StoreCommand,
};
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

fn to_js(e: QuickSignError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

struct LoadedDocument {
    name: String,
    bytes: Arc<[u8]>,
    info: PdfInfo,
}

/// Editing session for one document at a time
#[wasm_bindgen]
pub struct SigningSession {
    config: ExportConfig,
    document: Option<LoadedDocument>,
    store: AnnotationStore,
    current_page: u32,
    gate: ExportGate,
}

impl SigningSession {
    fn with_config(config: ExportConfig) -> Self {
        let store = AnnotationStore::with_signature_size(Size::new(
            config.signature_width,
            config.signature_height,
        ));
        Self {
            config,
            document: None,
            store,
            current_page: 1,
            gate: ExportGate::new(),
        }
    }

    /// Replace the current document after the upload checks pass.
    /// On failure nothing changes.
    fn load_document_internal(
        &mut self,
        name: &str,
        declared_type: &str,
        bytes: &[u8],
    ) -> Result<PdfInfo, QuickSignError> {
        check_upload(declared_type, bytes)?;
        let info = validate_pdf(bytes)?;

        self.store.clear();
        self.current_page = 1;
        self.document = Some(LoadedDocument {
            name: name.to_string(),
            bytes: Arc::from(bytes),
            info: info.clone(),
        });
        Ok(info)
    }

    fn set_current_page_internal(&mut self, page: u32) -> Result<(), QuickSignError> {
        let page_count = self.page_count();
        if self.document.is_none() {
            return Err(QuickSignError::NoDocument);
        }
        if page == 0 || page > page_count {
            return Err(QuickSignError::InvalidPage { page, page_count });
        }
        self.current_page = page;
        Ok(())
    }

    /// New annotations always land on the page being viewed
    fn create_internal(
        &mut self,
        x: f64,
        y: f64,
        content: AnnotationContent,
    ) -> Result<AnnotationId, QuickSignError> {
        if self.document.is_none() {
            return Err(QuickSignError::NoDocument);
        }
        Ok(self.store.create(self.current_page, Point::new(x, y), content))
    }

    fn add_signature_internal(
        &mut self,
        image: SignatureImage,
        x: f64,
        y: f64,
    ) -> Result<AnnotationId, QuickSignError> {
        self.create_internal(x, y, AnnotationContent::Signature(image))
    }

    fn page_annotations_json_internal(&self, page: u32) -> Result<String, QuickSignError> {
        Ok(serde_json::to_string(&self.store.list_for_page(page))?)
    }

    /// Claim the export gate and snapshot the store
    fn begin_export_internal(&self) -> Result<(ExportTicket, ExportJob), QuickSignError> {
        let document = self.document.as_ref().ok_or(QuickSignError::NoDocument)?;
        let ticket = self.gate.try_begin()?;
        let job = ExportJob::new(
            Arc::clone(&document.bytes),
            self.store.snapshot(),
            self.config.clone(),
        );
        Ok((ticket, job))
    }

    fn export_file_name_internal(&self, now: DateTime<Utc>) -> String {
        let name = self
            .document
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or("document.pdf");
        suggested_file_name(name, now)
    }
}

#[wasm_bindgen]
impl SigningSession {
    /// Create a session. `config_json` overrides any `ExportConfig` fields.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<SigningSession, JsValue> {
        let config = match config_json {
            Some(json) => ExportConfig::from_json(&json).map_err(to_js)?,
            None => ExportConfig::default(),
        };
        Ok(Self::with_config(config))
    }

    /// Load a PDF chosen by the user, clearing all annotations.
    /// Returns document info (page count, page sizes) on success.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(
        &mut self,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<JsValue, JsValue> {
        let info = self
            .load_document_internal(name, mime_type, bytes)
            .map_err(to_js)?;
        serde_wasm_bindgen::to_value(&info)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    #[wasm_bindgen(getter, js_name = hasDocument)]
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map(|d| d.info.page_count).unwrap_or(0)
    }

    #[wasm_bindgen(getter, js_name = documentName)]
    pub fn document_name(&self) -> Option<String> {
        self.document.as_ref().map(|d| d.name.clone())
    }

    /// Source bytes for the page renderer
    #[wasm_bindgen(js_name = getDocumentBytes)]
    pub fn get_document_bytes(&self) -> Option<js_sys::Uint8Array> {
        self.document
            .as_ref()
            .map(|d| js_sys::Uint8Array::from(&d.bytes[..]))
    }

    /// Fixed width the renderer must rasterize every page at
    #[wasm_bindgen(getter, js_name = editorWidth)]
    pub fn editor_width(&self) -> f64 {
        self.config.editor_width
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[wasm_bindgen(js_name = setCurrentPage)]
    pub fn set_current_page(&mut self, page: u32) -> Result<(), JsValue> {
        self.set_current_page_internal(page).map_err(to_js)
    }

    #[wasm_bindgen(js_name = addText)]
    pub fn add_text(&mut self, x: f64, y: f64, text: &str) -> Result<u64, JsValue> {
        self.create_internal(x, y, AnnotationContent::Text(text.to_string()))
            .map_err(to_js)
    }

    /// Add a date annotation pre-filled with today's date
    #[wasm_bindgen(js_name = addDate)]
    pub fn add_date(&mut self, x: f64, y: f64) -> Result<u64, JsValue> {
        let today = self.config.today();
        self.create_internal(x, y, AnnotationContent::Date(today))
            .map_err(to_js)
    }

    /// Capture the pad's drawing as a signature. Rejects an empty pad.
    #[wasm_bindgen(js_name = addSignature)]
    pub fn add_signature(&mut self, pad: &SignaturePad, x: f64, y: f64) -> Result<u64, JsValue> {
        let image = capture_signature(pad).map_err(to_js)?;
        self.add_signature_internal(image, x, y).map_err(to_js)
    }

    /// Add a signature from a canvas `toDataURL("image/png")` string
    #[wasm_bindgen(js_name = addSignatureDataUrl)]
    pub fn add_signature_data_url(&mut self, data_url: &str, x: f64, y: f64) -> Result<u64, JsValue> {
        let image = SignatureImage::from_data_url(data_url).map_err(to_js)?;
        self.add_signature_internal(image, x, y).map_err(to_js)
    }

    #[wasm_bindgen(js_name = moveAnnotation)]
    pub fn move_annotation(&mut self, id: u64, x: f64, y: f64) {
        self.store.move_to(id, x, y);
    }

    #[wasm_bindgen(js_name = setText)]
    pub fn set_text(&mut self, id: u64, value: &str) {
        self.store.set_content(id, value);
    }

    #[wasm_bindgen(js_name = resizeSignature)]
    pub fn resize_signature(&mut self, id: u64, width: f64, height: f64) {
        self.store.resize(id, width, height);
    }

    #[wasm_bindgen(js_name = growSignature)]
    pub fn grow_signature(&mut self, id: u64) {
        self.store.grow(id);
    }

    #[wasm_bindgen(js_name = shrinkSignature)]
    pub fn shrink_signature(&mut self, id: u64) {
        self.store.shrink(id);
    }

    #[wasm_bindgen(js_name = removeAnnotation)]
    pub fn remove_annotation(&mut self, id: u64) -> bool {
        self.store.remove(id)
    }

    /// Apply a JSON-encoded `StoreCommand`, e.g. `{"type":"Move","id":0,"x":1,"y":2}`
    #[wasm_bindgen(js_name = applyCommand)]
    pub fn apply_command(&mut self, command_json: &str) -> Result<(), JsValue> {
        let command: StoreCommand = serde_json::from_str(command_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid command JSON: {}", e)))?;
        self.store.execute(command);
        Ok(())
    }

    #[wasm_bindgen(js_name = getAnnotationCount)]
    pub fn get_annotation_count(&self) -> usize {
        self.store.len()
    }

    /// Annotations on `page` in insertion order, as JSON, for drawing the overlay
    #[wasm_bindgen(js_name = getPageAnnotationsJson)]
    pub fn get_page_annotations_json(&self, page: u32) -> Result<String, JsValue> {
        self.page_annotations_json_internal(page).map_err(to_js)
    }

    #[wasm_bindgen(getter, js_name = isExporting)]
    pub fn is_exporting(&self) -> bool {
        self.gate.is_exporting()
    }

    /// Export the annotated PDF. Resolves to a `Uint8Array`.
    ///
    /// Rejects immediately if another export is still pending. Errors from
    /// the export itself reject the promise; the session is left unchanged.
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self) -> Result<js_sys::Promise, JsValue> {
        let (ticket, job) = self.begin_export_internal().map_err(to_js)?;
        Ok(future_to_promise(async move {
            let _ticket = ticket;
            // Let the page repaint its "exporting" state before the CPU-bound work
            yield_to_event_loop().await?;
            let bytes = job.run().map_err(|e| {
                web_sys::console::error_1(&format!("Export failed: {}", e).into());
                to_js(e)
            })?;
            Ok(js_sys::Uint8Array::from(&bytes[..]).into())
        }))
    }

    /// Download name with a timestamp suffix
    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self) -> String {
        self.export_file_name_internal(Utc::now())
    }
}

async fn yield_to_event_loop() -> Result<(), JsValue> {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}
