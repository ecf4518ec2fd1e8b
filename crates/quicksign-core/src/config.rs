//! Export and editor configuration
//!
//! Every value has a default, so hosts only pass the fields they want to
//! override. Nothing here is persisted.

use crate::error::QuickSignError;
use serde::{Deserialize, Serialize};

/// Width at which every page is rasterized for on-screen editing.
pub const DEFAULT_EDITOR_WIDTH: f64 = 600.0;

/// Approximate rendered height of a text line in editor units, used to move
/// the top-left editor anchor to the bottom-left PDF baseline.
pub const DEFAULT_TEXT_LINE_HEIGHT: f64 = 14.0;

pub const DEFAULT_FONT_SIZE: f64 = 12.0;

pub const DEFAULT_SIGNATURE_WIDTH: f64 = 120.0;
pub const DEFAULT_SIGNATURE_HEIGHT: f64 = 60.0;

pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Editor raster width in editor units
    pub editor_width: f64,
    /// Line height for text and date annotations, in editor units
    pub text_line_height: f64,
    /// Font size for text and date annotations, in editor units
    pub font_size: f64,
    /// Initial size of a newly placed signature
    pub signature_width: f64,
    pub signature_height: f64,
    /// `chrono` format string for the initial value of date annotations
    pub date_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            editor_width: DEFAULT_EDITOR_WIDTH,
            text_line_height: DEFAULT_TEXT_LINE_HEIGHT,
            font_size: DEFAULT_FONT_SIZE,
            signature_width: DEFAULT_SIGNATURE_WIDTH,
            signature_height: DEFAULT_SIGNATURE_HEIGHT,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl ExportConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults
    pub fn from_json(json: &str) -> Result<Self, QuickSignError> {
        let config: ExportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), QuickSignError> {
        let positive = [
            ("editor_width", self.editor_width),
            ("text_line_height", self.text_line_height),
            ("font_size", self.font_size),
            ("signature_width", self.signature_width),
            ("signature_height", self.signature_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(QuickSignError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Today's date rendered with `date_format`, used as the initial value of
    /// a date annotation
    pub fn today(&self) -> String {
        chrono::Local::now()
            .date_naive()
            .format(&self.date_format)
            .to_string()
    }
}
