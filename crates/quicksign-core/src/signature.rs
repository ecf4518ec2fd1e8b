//! Captured signature images
//!
//! The signature pad hands over an opaque PNG buffer. It is validated when
//! captured and only decoded into raw samples at export time.

use crate::error::QuickSignError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Drawing widget that produced the signature
pub trait SignatureSource {
    fn is_empty(&self) -> bool;
    fn export_as_image(&self) -> Vec<u8>;
}

/// Take the current drawing from a signature pad.
///
/// An empty pad is rejected here, so it never reaches the store.
pub fn capture_signature<S: SignatureSource + ?Sized>(
    source: &S,
) -> Result<SignatureImage, QuickSignError> {
    if source.is_empty() {
        return Err(QuickSignError::EmptySignature);
    }
    SignatureImage::from_png(source.export_as_image())
}

/// PNG-encoded signature raster, immutable once captured
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureImage {
    png: Vec<u8>,
}

impl std::fmt::Debug for SignatureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureImage")
            .field("png_len", &self.png.len())
            .finish()
    }
}

impl SignatureImage {
    pub fn from_png(bytes: Vec<u8>) -> Result<Self, QuickSignError> {
        if bytes.is_empty() {
            return Err(QuickSignError::EmptySignature);
        }
        if bytes.len() < PNG_MAGIC.len() || !bytes.starts_with(&PNG_MAGIC) {
            return Err(QuickSignError::ImageDecode(
                "Invalid PNG magic bytes".to_string(),
            ));
        }
        Ok(Self { png: bytes })
    }

    /// Accepts the `data:image/png;base64,...` form produced by
    /// `HTMLCanvasElement.toDataURL()`
    pub fn from_data_url(url: &str) -> Result<Self, QuickSignError> {
        let payload = url.trim().strip_prefix(PNG_DATA_URL_PREFIX).ok_or_else(|| {
            QuickSignError::ImageDecode("Expected a data:image/png;base64 URL".to_string())
        })?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| QuickSignError::ImageDecode(format!("Invalid base64: {}", e)))?;
        Self::from_png(bytes)
    }

    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    /// Decode to 8-bit samples with the alpha channel split out
    pub fn decode(&self) -> Result<DecodedImage, QuickSignError> {
        decode_png(&self.png)
    }
}

impl Serialize for SignatureImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.png))
    }
}

impl<'de> Deserialize<'de> for SignatureImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        SignatureImage::from_png(bytes).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static [u8] {
        match self {
            ColorSpace::Gray => b"DeviceGray",
            ColorSpace::Rgb => b"DeviceRGB",
        }
    }
}

/// Raw samples ready to be written as an image XObject
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    /// Colour samples, 8 bits per component, no alpha
    pub color: Vec<u8>,
    /// One 8-bit alpha sample per pixel, `None` when the PNG is opaque
    pub alpha: Option<Vec<u8>>,
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, QuickSignError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| QuickSignError::ImageDecode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| QuickSignError::ImageDecode(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.width == 0 || info.height == 0 {
        return Err(QuickSignError::ImageDecode("Image has no pixels".to_string()));
    }
    if info.bit_depth != png::BitDepth::Eight {
        return Err(QuickSignError::ImageDecode(format!(
            "Unsupported bit depth {:?}",
            info.bit_depth
        )));
    }

    let (color_space, channels, has_alpha) = match info.color_type {
        png::ColorType::Grayscale => (ColorSpace::Gray, 1, false),
        png::ColorType::GrayscaleAlpha => (ColorSpace::Gray, 2, true),
        png::ColorType::Rgb => (ColorSpace::Rgb, 3, false),
        png::ColorType::Rgba => (ColorSpace::Rgb, 4, true),
        png::ColorType::Indexed => {
            return Err(QuickSignError::ImageDecode(
                "Indexed PNG was not expanded".to_string(),
            ))
        }
    };

    // Rows are tightly packed at 8 bits per sample after the transformations
    let pixels = info.width as usize * info.height as usize;
    if buf.len() < pixels * channels {
        return Err(QuickSignError::ImageDecode("Truncated image data".to_string()));
    }

    if !has_alpha {
        buf.truncate(pixels * channels);
        return Ok(DecodedImage {
            width: info.width,
            height: info.height,
            color_space,
            color: buf,
            alpha: None,
        });
    }

    let color_channels = channels - 1;
    let mut color = Vec::with_capacity(pixels * color_channels);
    let mut alpha = Vec::with_capacity(pixels);
    for px in buf.chunks_exact(channels).take(pixels) {
        color.extend_from_slice(&px[..color_channels]);
        alpha.push(px[color_channels]);
    }

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        color_space,
        color,
        alpha: Some(alpha),
    })
}

/// Encode raw samples as PNG. Used by tests and demo hosts to fabricate pad output.
pub fn encode_png(
    width: u32,
    height: u32,
    color_type: png::ColorType,
    data: &[u8],
) -> Result<Vec<u8>, QuickSignError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color_type);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| QuickSignError::ImageDecode(e.to_string()))?;
        writer
            .write_image_data(data)
            .map_err(|e| QuickSignError::ImageDecode(e.to_string()))?;
    }
    Ok(out)
}
