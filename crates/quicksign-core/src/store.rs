//! Annotation store
//!
//! Ordered, in-memory set of placed annotations. Every mutation is total:
//! commands addressed to a missing id are ignored, since a late drag event
//! can arrive after the annotation was deleted.

use crate::annotation::{
    Annotation, AnnotationBody, AnnotationContent, AnnotationId, Point, Size,
};
use crate::config::{DEFAULT_SIGNATURE_HEIGHT, DEFAULT_SIGNATURE_WIDTH};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Smallest signature edge a resize can produce, in editor units
pub const MIN_SIGNATURE_EDGE: f64 = 10.0;

/// Toolbar resize steps
pub const GROW_FACTOR: f64 = 1.1;
pub const SHRINK_FACTOR: f64 = 0.9;

/// A store mutation addressed by annotation id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StoreCommand {
    Move { id: AnnotationId, x: f64, y: f64 },
    SetContent { id: AnnotationId, value: String },
    Resize { id: AnnotationId, width: f64, height: f64 },
    Scale { id: AnnotationId, factor: f64 },
    Remove { id: AnnotationId },
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "StoredAnnotations")]
pub struct AnnotationStore {
    next_id: AnnotationId,
    default_signature_size: Size,
    annotations: Vec<Annotation>,
}

/// Wire form of a store, normalized on the way in
#[derive(Deserialize)]
struct StoredAnnotations {
    next_id: AnnotationId,
    default_signature_size: Size,
    annotations: Vec<Annotation>,
}

impl From<StoredAnnotations> for AnnotationStore {
    /// Later entries sharing an id are dropped, the counter is moved past
    /// every stored id and signature sizes are clamped
    fn from(stored: StoredAnnotations) -> Self {
        let mut seen = HashSet::new();
        let mut annotations = stored.annotations;
        annotations.retain(|a| seen.insert(a.id));
        for annot in &mut annotations {
            if let AnnotationBody::Signature { size, .. } = &mut annot.body {
                *size = clamp_size(*size);
            }
        }

        let next_id = annotations
            .iter()
            .map(|a| a.id.saturating_add(1))
            .fold(stored.next_id, AnnotationId::max);

        Self {
            next_id,
            default_signature_size: clamp_size(stored.default_signature_size),
            annotations,
        }
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::with_signature_size(Size::new(DEFAULT_SIGNATURE_WIDTH, DEFAULT_SIGNATURE_HEIGHT))
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signature_size(size: Size) -> Self {
        Self {
            next_id: 0,
            default_signature_size: clamp_size(size),
            annotations: Vec::new(),
        }
    }

    /// Append an annotation and return its freshly assigned id.
    /// A non-finite coordinate is placed at 0.
    pub fn create(&mut self, page: u32, position: Point, content: AnnotationContent) -> AnnotationId {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let position = Point::new(finite(position.x), finite(position.y));
        let id = self.next_id;
        self.next_id += 1;

        let body = match content {
            AnnotationContent::Text(value) => AnnotationBody::Text { value },
            AnnotationContent::Date(value) => AnnotationBody::Date { value },
            AnnotationContent::Signature(image) => AnnotationBody::Signature {
                image,
                size: self.default_signature_size,
            },
        };

        self.annotations.push(Annotation {
            id,
            page,
            position,
            body,
        });
        id
    }

    /// Non-finite targets are ignored
    pub fn move_to(&mut self, id: AnnotationId, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        if let Some(annot) = self.get_mut(id) {
            annot.position = Point::new(x, y);
        }
    }

    /// Replace the string of a text or date annotation
    pub fn set_content(&mut self, id: AnnotationId, value: &str) {
        if let Some(annot) = self.get_mut(id) {
            match &mut annot.body {
                AnnotationBody::Text { value: current } | AnnotationBody::Date { value: current } => {
                    *current = value.to_string();
                }
                AnnotationBody::Signature { .. } => {}
            }
        }
    }

    pub fn resize(&mut self, id: AnnotationId, width: f64, height: f64) {
        if let Some(size) = self.signature_size_mut(id) {
            *size = clamp_size(Size::new(width, height));
        }
    }

    /// Multiply a signature's current size; repeated calls compound
    pub fn scale_signature(&mut self, id: AnnotationId, factor: f64) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        if let Some(size) = self.signature_size_mut(id) {
            *size = clamp_size(Size::new(size.width * factor, size.height * factor));
        }
    }

    pub fn grow(&mut self, id: AnnotationId) {
        self.scale_signature(id, GROW_FACTOR);
    }

    pub fn shrink(&mut self, id: AnnotationId) {
        self.scale_signature(id, SHRINK_FACTOR);
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        if let Some(pos) = self.annotations.iter().position(|a| a.id == id) {
            self.annotations.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drop every annotation. Ids keep counting up, so none is ever reused.
    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    fn signature_size_mut(&mut self, id: AnnotationId) -> Option<&mut Size> {
        match self.get_mut(id) {
            Some(Annotation {
                body: AnnotationBody::Signature { size, .. },
                ..
            }) => Some(size),
            _ => None,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations on `page`, in insertion order
    pub fn list_for_page(&self, page: u32) -> Vec<&Annotation> {
        self.annotations.iter().filter(|a| a.page == page).collect()
    }

    /// Owned copy of every annotation in storage order, for export
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Apply a command in place
    pub fn execute(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::Move { id, x, y } => self.move_to(id, x, y),
            StoreCommand::SetContent { id, value } => self.set_content(id, &value),
            StoreCommand::Resize { id, width, height } => self.resize(id, width, height),
            StoreCommand::Scale { id, factor } => self.scale_signature(id, factor),
            StoreCommand::Remove { id } => {
                self.remove(id);
            }
            StoreCommand::Clear => self.clear(),
        }
    }

    /// `(store, command) -> store`
    pub fn apply(mut self, command: StoreCommand) -> Self {
        self.execute(command);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn clamp_size(size: Size) -> Size {
    let edge = |v: f64| {
        if v.is_finite() {
            v.max(MIN_SIGNATURE_EDGE)
        } else {
            MIN_SIGNATURE_EDGE
        }
    };
    Size::new(edge(size.width), edge(size.height))
}
