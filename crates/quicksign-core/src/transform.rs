//! Editor space to PDF space
//!
//! The editor shows every page at the same fixed width with a top-left
//! origin. A page's own width fixes the scale factor, and the Y axis flips
//! around the page height. Text and images anchor at their bottom-left
//! corner, so the annotation's own height is subtracted before the flip.

use crate::annotation::{Annotation, AnnotationBody};
use crate::config::ExportConfig;

/// True page box in PDF units (from the page's MediaBox)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
        }
    }

    /// From a `[x0 y0 x1 y1]` box; corners may be given in either order
    pub fn from_box(rect: [f64; 4]) -> Self {
        let [x0, y0, x1, y1] = rect;
        Self {
            origin_x: x0.min(x1),
            origin_y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    pub fn scale_factor(&self, editor_width: f64) -> f64 {
        self.width / editor_width
    }
}

/// Where and how large an annotation is drawn, in PDF units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    /// Bottom-left anchor
    pub x: f64,
    pub y: f64,
    pub kind: PlacementKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementKind {
    Text { font_size: f64 },
    Image { width: f64, height: f64 },
}

/// Map an editor-space point and rendered height to the PDF bottom-left
/// anchor on `page`
pub fn to_pdf_point(
    editor_x: f64,
    editor_y: f64,
    rendered_height: f64,
    page: &PageGeometry,
    editor_width: f64,
) -> (f64, f64) {
    let scale = page.scale_factor(editor_width);
    let pdf_x = editor_x * scale;
    let pdf_y = page.height - (editor_y * scale) - (rendered_height * scale);
    (page.origin_x + pdf_x, page.origin_y + pdf_y)
}

/// Inverse of [`to_pdf_point`], used by hosts to map stored PDF positions
/// back onto the editor surface
pub fn to_editor_point(
    pdf_x: f64,
    pdf_y: f64,
    rendered_height: f64,
    page: &PageGeometry,
    editor_width: f64,
) -> (f64, f64) {
    let scale = page.scale_factor(editor_width);
    let editor_x = (pdf_x - page.origin_x) / scale;
    let editor_y = (page.height - (pdf_y - page.origin_y)) / scale - rendered_height;
    (editor_x, editor_y)
}

pub fn place(annotation: &Annotation, page: &PageGeometry, config: &ExportConfig) -> Placement {
    let scale = page.scale_factor(config.editor_width);
    let rendered_height = annotation.rendered_height(config.text_line_height);
    let (x, y) = to_pdf_point(
        annotation.position.x,
        annotation.position.y,
        rendered_height,
        page,
        config.editor_width,
    );

    let kind = match &annotation.body {
        AnnotationBody::Text { .. } | AnnotationBody::Date { .. } => PlacementKind::Text {
            font_size: config.font_size * scale,
        },
        AnnotationBody::Signature { size, .. } => PlacementKind::Image {
            width: size.width * scale,
            height: size.height * scale,
        },
    };

    Placement { scale, x, y, kind }
}
