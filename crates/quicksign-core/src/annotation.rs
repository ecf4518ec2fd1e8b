//! Placed annotations
//!
//! Positions and sizes are in editor space: top-left origin, units of the
//! fixed-width page raster the user edits on.

use crate::signature::SignatureImage;
use serde::{Deserialize, Serialize};

pub type AnnotationId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Text,
    Date,
    Signature,
}

/// Kind-specific payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnotationBody {
    Text { value: String },
    Date { value: String },
    Signature { image: SignatureImage, size: Size },
}

/// Initial content handed to `AnnotationStore::create`
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationContent {
    Text(String),
    Date(String),
    Signature(SignatureImage),
}

impl AnnotationContent {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationContent::Text(_) => AnnotationKind::Text,
            AnnotationContent::Date(_) => AnnotationKind::Date,
            AnnotationContent::Signature(_) => AnnotationKind::Signature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    /// 1-based page index, fixed at creation
    pub page: u32,
    pub position: Point,
    #[serde(flatten)]
    pub body: AnnotationBody,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self.body {
            AnnotationBody::Text { .. } => AnnotationKind::Text,
            AnnotationBody::Date { .. } => AnnotationKind::Date,
            AnnotationBody::Signature { .. } => AnnotationKind::Signature,
        }
    }

    /// String content of a text or date annotation
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            AnnotationBody::Text { value } | AnnotationBody::Date { value } => Some(value),
            AnnotationBody::Signature { .. } => None,
        }
    }

    pub fn size(&self) -> Option<Size> {
        match self.body {
            AnnotationBody::Signature { size, .. } => Some(size),
            _ => None,
        }
    }

    /// Height used to anchor the annotation's bottom edge: the signature's
    /// own height, or the fixed text line height
    pub fn rendered_height(&self, text_line_height: f64) -> f64 {
        match self.body {
            AnnotationBody::Signature { size, .. } => size.height,
            _ => text_line_height,
        }
    }
}
