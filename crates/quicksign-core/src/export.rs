//! Bake annotations into page content
//!
//! Unlike an annotation layer, the overlay is appended to each page's
//! content stream, so every viewer renders it and it cannot be edited away.

use crate::annotation::{Annotation, AnnotationBody};
use crate::config::ExportConfig;
use crate::error::QuickSignError;
use crate::signature::DecodedImage;
use crate::transform::{place, PageGeometry, Placement, PlacementKind};
use chrono::{DateTime, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Standard Type1 face used for every text and date annotation
pub const TEXT_FONT: &str = "Helvetica";

const FONT_PREFIX: &str = "QSF";
const IMAGE_PREFIX: &str = "QSIm";

/// Guards against cyclic Parent chains in malformed page trees
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Owned snapshot of everything an export needs
#[derive(Debug, Clone)]
pub struct ExportJob {
    source: Arc<[u8]>,
    annotations: Vec<Annotation>,
    config: ExportConfig,
}

impl ExportJob {
    pub fn new(source: Arc<[u8]>, annotations: Vec<Annotation>, config: ExportConfig) -> Self {
        Self {
            source,
            annotations,
            config,
        }
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn run(&self) -> Result<Vec<u8>, QuickSignError> {
        export_document(&self.source, &self.annotations, &self.config)
    }
}

/// Render every in-bounds annotation into its page and serialize the result.
///
/// Annotations referencing a page the document does not have are skipped.
/// Any parse or decode failure aborts the whole export.
pub fn export_document(
    pdf_bytes: &[u8],
    annotations: &[Annotation],
    config: &ExportConfig,
) -> Result<Vec<u8>, QuickSignError> {
    config.validate()?;

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| QuickSignError::ParseError(e.to_string()))?;
    let pages = doc.get_pages();
    info!(
        "Exporting {} annotations onto {} pages",
        annotations.len(),
        pages.len()
    );

    // Group by page, keeping storage order within each page
    let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
    for annot in annotations {
        if pages.contains_key(&annot.page) {
            by_page.entry(annot.page).or_default().push(annot);
        } else {
            debug!(
                "Skipping annotation {} on page {} (document has {} pages)",
                annot.id,
                annot.page,
                pages.len()
            );
        }
    }

    let mut font_id: Option<ObjectId> = None;
    for (page_num, page_annots) in &by_page {
        let page_id = pages[page_num];
        apply_page_overlay(&mut doc, page_id, page_annots, config, &mut font_id).map_err(|e| {
            warn!("Export failed on page {}: {}", page_num, e);
            e
        })?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| QuickSignError::OperationError(e.to_string()))?;

    info!("Export produced {} bytes", output.len());
    Ok(output)
}

/// Timestamped download name for an export of `source_name`
pub fn suggested_file_name(source_name: &str, now: DateTime<Utc>) -> String {
    let trimmed = source_name.trim();
    let split = trimmed
        .len()
        .checked_sub(4)
        .and_then(|i| trimmed.get(i..).map(|ext| (i, ext)));
    let stem = match split {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".pdf") => &trimmed[..i],
        _ => trimmed,
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_control() || "/\\:*?\"<>|".contains(c) { '_' } else { c })
        .collect();
    let stem = if stem.is_empty() { "document".to_string() } else { stem };
    format!("{}-signed-{}.pdf", stem, now.timestamp_millis())
}

fn apply_page_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    annotations: &[&Annotation],
    config: &ExportConfig,
    font_id: &mut Option<ObjectId>,
) -> Result<(), QuickSignError> {
    let geometry = page_geometry(doc, page_id)?;
    let mut resources = effective_resources(doc, page_id)?;
    let mut fonts = resource_subdict(doc, &resources, b"Font")?;
    let mut xobjects = resource_subdict(doc, &resources, b"XObject")?;

    let mut font_name: Option<String> = None;
    let mut content = String::new();

    for annot in annotations {
        let placement = place(annot, &geometry, config);
        if !(placement.x.is_finite() && placement.y.is_finite()) {
            return Err(QuickSignError::OperationError(format!(
                "Annotation {} has a non-finite position",
                annot.id
            )));
        }
        debug!(
            "Annotation {} on page {}: scale {:.4}, anchor ({:.2}, {:.2})",
            annot.id, annot.page, placement.scale, placement.x, placement.y
        );

        match &annot.body {
            AnnotationBody::Text { value } | AnnotationBody::Date { value } => {
                let name = match &font_name {
                    Some(name) => name.clone(),
                    None => {
                        let id = *font_id.get_or_insert_with(|| doc.add_object(font_dictionary()));
                        let name = unique_name(&fonts, FONT_PREFIX);
                        fonts.set(name.as_bytes(), Object::Reference(id));
                        font_name = Some(name.clone());
                        name
                    }
                };
                write_text(&mut content, &name, value, &placement, config);
            }
            AnnotationBody::Signature { image, .. } => {
                let decoded = image.decode()?;
                let image_id = add_image_xobject(doc, &decoded)?;
                let name = unique_name(&xobjects, IMAGE_PREFIX);
                xobjects.set(name.as_bytes(), Object::Reference(image_id));
                write_image(&mut content, &name, &placement);
            }
        }
    }

    if content.is_empty() {
        return Ok(());
    }

    if !fonts.is_empty() {
        resources.set("Font", Object::Dictionary(fonts));
    }
    if !xobjects.is_empty() {
        resources.set("XObject", Object::Dictionary(xobjects));
    }

    append_overlay_content(doc, page_id, content, resources)
}

fn font_dictionary() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => TEXT_FONT,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn write_text(
    content: &mut String,
    font_name: &str,
    value: &str,
    placement: &Placement,
    config: &ExportConfig,
) {
    let font_size = match placement.kind {
        PlacementKind::Text { font_size } => font_size,
        PlacementKind::Image { .. } => return,
    };
    let leading = config.text_line_height * placement.scale;

    content.push_str("q\n0 0 0 rg\nBT\n");
    let _ = writeln!(content, "/{} {} Tf", font_name, num(font_size));
    let _ = writeln!(content, "{} TL", num(leading));
    let _ = writeln!(content, "{} {} Td", num(placement.x), num(placement.y));
    for (i, line) in value.lines().enumerate() {
        if i > 0 {
            content.push_str("T*\n");
        }
        let _ = writeln!(content, "({}) Tj", escape_pdf_string(line));
    }
    content.push_str("ET\nQ\n");
}

fn write_image(content: &mut String, image_name: &str, placement: &Placement) {
    let (width, height) = match placement.kind {
        PlacementKind::Image { width, height } => (width, height),
        PlacementKind::Text { .. } => return,
    };
    let _ = writeln!(
        content,
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ",
        num(width),
        num(height),
        num(placement.x),
        num(placement.y),
        image_name
    );
}

/// Escape a string for a PDF literal in WinAnsiEncoding.
/// Characters outside the encoding become `?`.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            '\t' | '\r' => out.push(' '),
            ' '..='~' => out.push(c),
            _ => match win_ansi_byte(c) {
                Some(byte) => {
                    let _ = write!(out, "\\{:03o}", byte);
                }
                None => out.push('?'),
            },
        }
    }
    out
}

/// WinAnsi code for a non-ASCII character. 0xA0-0xFF match Latin-1;
/// 0x80-0x9F hold the Windows-1252 punctuation and letters.
fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(byte)
}

/// Compact decimal form for content-stream operands
fn num(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, QuickSignError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| QuickSignError::OperationError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| QuickSignError::OperationError(e.to_string()))
}

fn add_image_xobject(doc: &mut Document, image: &DecodedImage) -> Result<ObjectId, QuickSignError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => Object::Name(image.color_space.pdf_name().to_vec()),
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        );
        let smask_id = doc.add_object(Object::Stream(smask));
        dict.set("SMask", Object::Reference(smask_id));
    }

    let stream = Stream::new(dict, deflate(&image.color)?);
    Ok(doc.add_object(Object::Stream(stream)))
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, QuickSignError> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| QuickSignError::ParseError(e.to_string())),
        other => Ok(other),
    }
}

fn page_dict(doc: &Document, id: ObjectId) -> Result<&Dictionary, QuickSignError> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .map_err(|e| QuickSignError::ParseError(e.to_string()))
}

/// Look up a page attribute, following the Parent chain for inherited keys
fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, QuickSignError> {
    let mut node = page_dict(doc, page_id)?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value).map(Some);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node = page_dict(doc, *parent_id)?,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

pub(crate) fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry, QuickSignError> {
    if let Some(Object::Array(arr)) = inherited(doc, page_id, b"MediaBox")? {
        let values: Vec<f64> = arr
            .iter()
            .filter_map(|o| resolve(doc, o).ok().and_then(as_number))
            .collect();
        if let [x0, y0, x1, y1] = values[..] {
            let geometry = PageGeometry::from_box([x0, y0, x1, y1]);
            if geometry.width > 0.0 && geometry.height > 0.0 {
                return Ok(geometry);
            }
        }
    }
    warn!("Page {:?} has no usable MediaBox, assuming US Letter", page_id);
    Ok(PageGeometry::letter())
}

/// The page's resource dictionary, inline or inherited, as an owned copy
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, QuickSignError> {
    match inherited(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

fn resource_subdict(
    doc: &Document,
    resources: &Dictionary,
    key: &[u8],
) -> Result<Dictionary, QuickSignError> {
    match resources.get(key) {
        Ok(obj) => match resolve(doc, obj)? {
            Object::Dictionary(dict) => Ok(dict.clone()),
            _ => Ok(Dictionary::new()),
        },
        Err(_) => Ok(Dictionary::new()),
    }
}

fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Append `content` after the page's existing streams.
///
/// The original content is bracketed by `q`/`Q` so that a CTM it leaves
/// behind cannot displace the overlay.
fn append_overlay_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: String,
    resources: Dictionary,
) -> Result<(), QuickSignError> {
    let existing: Vec<Object> = {
        let dict = page_dict(doc, page_id)?;
        match dict.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(arr)) => arr.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let overlay = if existing.is_empty() {
        content
    } else {
        let save_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"q\n".to_vec(),
        )));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        format!("Q\n{}", content)
    };
    let overlay_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        overlay.into_bytes(),
    )));
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| QuickSignError::OperationError(e.to_string()))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}
