//! Binding to the page's signature drawing widget
//!
//! Any JS object with `isEmpty(): boolean` and `exportAsImage(): Uint8Array`
//! (PNG bytes) can be passed where a `SignaturePad` is expected.

use quicksign_core::SignatureSource;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    pub type SignaturePad;

    #[wasm_bindgen(method, js_name = isEmpty)]
    fn pad_is_empty(this: &SignaturePad) -> bool;

    #[wasm_bindgen(method, js_name = exportAsImage)]
    fn pad_export_as_image(this: &SignaturePad) -> js_sys::Uint8Array;
}

impl SignatureSource for SignaturePad {
    fn is_empty(&self) -> bool {
        self.pad_is_empty()
    }

    fn export_as_image(&self) -> Vec<u8> {
        self.pad_export_as_image().to_vec()
    }
}
