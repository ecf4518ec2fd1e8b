//! End-to-end export checks: build a PDF, place annotations, export, then
//! read the page content stream back and compare operand values.

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quicksign_core::signature::encode_png;
use quicksign_core::{
    export_document, AnnotationContent, AnnotationStore, ExportConfig, ExportGate, ExportJob,
    Point, QuickSignError, SignatureImage,
};
use regex::Regex;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn create_pdf(page_sizes: &[(f64, f64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = page_sizes
        .iter()
        .map(|(w, h)| {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                b"BT /F1 9 Tf 10 10 Td (original) Tj ET\n".to_vec(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(*w as f32), Object::Real(*h as f32)],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => dictionary! {
                            "Type" => "Font",
                            "Subtype" => "Type1",
                            "BaseFont" => "Courier",
                        },
                    },
                },
            });
            Object::Reference(page_id)
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_sizes.len() as i64,
            "Kids" => kids,
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

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("quicksign_core=debug"))
        .with_test_writer()
        .try_init();
}

fn letter_pdf(pages: usize) -> Vec<u8> {
    create_pdf(&vec![(612.0, 792.0); pages])
}

fn signature() -> SignatureImage {
    let png = encode_png(1, 1, png::ColorType::Rgba, &[0, 0, 0, 255]).unwrap();
    SignatureImage::from_png(png).unwrap()
}

fn page_content(pdf: &[u8], page: u32) -> String {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).to_string()
}

/// `(x, y)` operands of every `Td` in the overlay
fn text_anchors(content: &str) -> Vec<(f64, f64)> {
    let re = Regex::new(r"(-?[\d.]+) (-?[\d.]+) Td").unwrap();
    re.captures_iter(content)
        .map(|c| (c[1].parse().unwrap(), c[2].parse().unwrap()))
        .filter(|&(x, y)| !(x == 10.0 && y == 10.0))
        .collect()
}

/// `(w, h, x, y)` operands of every image `cm`
fn image_boxes(content: &str) -> Vec<(f64, f64, f64, f64)> {
    let re = Regex::new(r"(-?[\d.]+) 0 0 (-?[\d.]+) (-?[\d.]+) (-?[\d.]+) cm\n/QSIm\d+ Do").unwrap();
    re.captures_iter(content)
        .map(|c| {
            (
                c[1].parse().unwrap(),
                c[2].parse().unwrap(),
                c[3].parse().unwrap(),
                c[4].parse().unwrap(),
            )
        })
        .collect()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.001,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn us_letter_text_scenario() {
    let pdf = letter_pdf(1);
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(50.0, 50.0), AnnotationContent::Text("Signed".into()));

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    let anchors = text_anchors(&page_content(&out, 1));
    assert_eq!(anchors.len(), 1);
    assert_close(anchors[0].0, 51.0);
    assert_close(anchors[0].1, 726.72);
}

#[test]
fn original_content_survives() {
    let pdf = letter_pdf(1);
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(0.0, 0.0), AnnotationContent::Text("x".into()));

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    let content = page_content(&out, 1);
    assert!(content.contains("(original) Tj"));

    // The page's own F1 font must still be reachable next to the overlay font
    let doc = Document::load_mem(&out).unwrap();
    let page_id = doc.get_pages()[&1];
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let fonts = page
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Font")
        .unwrap()
        .as_dict()
        .unwrap();
    assert!(fonts.has(b"F1"));
    assert!(fonts.has(b"QSF0"));
}

#[test]
fn stale_page_is_skipped_and_others_exported() {
    init_tracing();
    let pdf = letter_pdf(3);
    let mut store = AnnotationStore::new();
    store.create(5, Point::new(10.0, 10.0), AnnotationContent::Text("gone".into()));
    store.create(1, Point::new(10.0, 10.0), AnnotationContent::Text("one".into()));
    store.create(3, Point::new(10.0, 10.0), AnnotationContent::Signature(signature()));

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    assert!(page_content(&out, 1).contains("(one) Tj"));
    assert_eq!(image_boxes(&page_content(&out, 3)).len(), 1);
    assert!(text_anchors(&page_content(&out, 2)).is_empty());
    assert_eq!(Document::load_mem(&out).unwrap().get_pages().len(), 3);
}

#[test]
fn repeated_exports_are_identical() {
    let pdf = create_pdf(&[(612.0, 792.0), (842.0, 595.0)]);
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(10.0, 20.0), AnnotationContent::Text("a".into()));
    store.create(2, Point::new(30.0, 40.0), AnnotationContent::Signature(signature()));
    store.create(1, Point::new(50.0, 60.0), AnnotationContent::Date("03/04/2026".into()));

    let config = ExportConfig::default();
    let first = export_document(&pdf, &store.snapshot(), &config).unwrap();
    let second = export_document(&pdf, &store.snapshot(), &config).unwrap();
    for page in 1..=2 {
        assert_eq!(page_content(&first, page), page_content(&second, page));
    }
}

#[test]
fn storage_order_is_drawing_order() {
    let pdf = letter_pdf(1);
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(0.0, 0.0), AnnotationContent::Text("first".into()));
    store.create(1, Point::new(0.0, 0.0), AnnotationContent::Text("second".into()));

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    let content = page_content(&out, 1);
    assert!(content.find("(first)").unwrap() < content.find("(second)").unwrap());
}

#[test]
fn only_final_position_is_exported() {
    let pdf = create_pdf(&[(600.0, 800.0)]);
    let mut store = AnnotationStore::new();
    let id = store.create(1, Point::new(0.0, 0.0), AnnotationContent::Text("moved".into()));
    store.move_to(id, 100.0, 100.0);
    store.move_to(id, 200.0, 300.0);

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    let anchors = text_anchors(&page_content(&out, 1));
    assert_eq!(anchors, vec![(200.0, 800.0 - 300.0 - 14.0)]);
}

#[test]
fn deleted_annotation_is_omitted() {
    let pdf = letter_pdf(1);
    let mut store = AnnotationStore::new();
    let id = store.create(1, Point::new(5.0, 5.0), AnnotationContent::Text("ghost".into()));
    store.remove(id);
    assert!(store.list_for_page(1).is_empty());

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    assert!(!page_content(&out, 1).contains("ghost"));
}

#[test]
fn resized_signature_exports_compounded_size() {
    let pdf = create_pdf(&[(600.0, 800.0)]);
    let mut store = AnnotationStore::new();
    let id = store.create(1, Point::new(100.0, 100.0), AnnotationContent::Signature(signature()));
    store.shrink(id);
    store.shrink(id);

    let out = export_document(&pdf, &store.snapshot(), &ExportConfig::default()).unwrap();
    let boxes = image_boxes(&page_content(&out, 1));
    assert_eq!(boxes.len(), 1);
    let (w, h, x, y) = boxes[0];
    assert_close(w, 97.2);
    assert_close(h, 48.6);
    assert_close(x, 100.0);
    assert_close(y, 800.0 - 100.0 - 48.6);
}

#[test]
fn failed_export_emits_nothing_and_leaves_store_intact() {
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(5.0, 5.0), AnnotationContent::Text("keep".into()));
    let before = store.clone();

    let result = export_document(b"%PDF-1.7 broken", &store.snapshot(), &ExportConfig::default());
    assert!(matches!(result, Err(QuickSignError::ParseError(_))));
    assert_eq!(store, before);
}

#[test]
fn gate_reopens_after_failed_export() {
    let gate = ExportGate::new();
    let ticket = gate.try_begin().unwrap();
    let job = ExportJob::new(Arc::from(&b"not a pdf"[..]), Vec::new(), ExportConfig::default());

    let result = job.run();
    drop(ticket);
    assert!(result.is_err());
    assert!(!gate.is_exporting());
    assert!(gate.try_begin().is_ok());
}

#[tokio::test]
async fn second_export_is_rejected_while_first_runs() {
    let pdf: Arc<[u8]> = letter_pdf(1).into();
    let mut store = AnnotationStore::new();
    store.create(1, Point::new(5.0, 5.0), AnnotationContent::Text("async".into()));

    let gate = ExportGate::new();
    let ticket = gate.try_begin().unwrap();
    let job = ExportJob::new(Arc::clone(&pdf), store.snapshot(), ExportConfig::default());

    let (start_tx, start_rx) = std::sync::mpsc::channel::<()>();
    let handle = tokio::task::spawn_blocking(move || {
        start_rx.recv().unwrap();
        let result = job.run();
        drop(ticket);
        result
    });

    // The blocking task owns the ticket, so the gate stays closed until it finishes
    assert!(gate.is_exporting());
    assert_eq!(gate.try_begin().unwrap_err(), QuickSignError::ExportInProgress);
    start_tx.send(()).unwrap();

    let out = handle.await.unwrap().unwrap();
    assert!(page_content(&out, 1).contains("(async) Tj"));
    assert!(!gate.is_exporting());
    assert!(gate.try_begin().is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Exported anchors follow the transform formulas for any page size and editor width
    #[test]
    fn exported_anchor_matches_formula(
        page_w in 100.0f64..2000.0,
        page_h in 100.0f64..2000.0,
        editor_w in 200.0f64..1200.0,
        x_pct in 0.0f64..0.9,
        y_pct in 0.0f64..0.9,
    ) {
        let pdf = create_pdf(&[(page_w, page_h)]);
        // The MediaBox is stored as f32
        let page_w = page_w as f32 as f64;
        let page_h = page_h as f32 as f64;
        let config = ExportConfig { editor_width: editor_w, ..ExportConfig::default() };

        let editor_x = x_pct * editor_w;
        let editor_y = y_pct * editor_w;
        let mut store = AnnotationStore::new();
        store.create(1, Point::new(editor_x, editor_y), AnnotationContent::Text("p".into()));

        let out = export_document(&pdf, &store.snapshot(), &config).unwrap();
        let anchors = text_anchors(&page_content(&out, 1));
        prop_assert_eq!(anchors.len(), 1);

        let scale = page_w / editor_w;
        let expected_x = editor_x * scale;
        let expected_y = page_h - editor_y * scale - config.text_line_height * scale;
        prop_assert!((anchors[0].0 - expected_x).abs() < 0.001, "x {} vs {}", anchors[0].0, expected_x);
        prop_assert!((anchors[0].1 - expected_y).abs() < 0.001, "y {} vs {}", anchors[0].1, expected_y);
    }
}
