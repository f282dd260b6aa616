//! Request input normalization.
//!
//! Inference entry points accept an uploaded (already decoded) image, a
//! base64 data URL, or nothing at all. The shape is decided once, at the
//! transport boundary, into an [`ImageRequest`]; [`normalize`] then turns it
//! into a canonical RGB raster.

use crate::types::CanonicalImage;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use thiserror::Error;

/// Prefix that marks a string input as an inline image.
pub const DATA_URL_PREFIX: &str = "data:image";

#[derive(Error, Debug)]
pub enum InputError {
    #[error("data URL has no ',' separating header and payload")]
    MissingSeparator,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// One inbound inference payload.
#[derive(Debug, Clone)]
pub enum ImageRequest {
    /// Image decoded by the transport layer (e.g. a multipart upload).
    Decoded(DynamicImage),
    /// A `data:image/<subtype>;base64,<payload>` string.
    DataUrl(String),
    /// No input was provided.
    Empty,
    /// Input was present but of a shape no service understands.
    Unsupported(String),
}

impl ImageRequest {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageRequest::Decoded(_) => "decoded_image",
            ImageRequest::DataUrl(_) => "data_url",
            ImageRequest::Empty => "empty",
            ImageRequest::Unsupported(_) => "unsupported",
        }
    }
}

impl From<Value> for ImageRequest {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ImageRequest::Empty,
            Value::String(s) if s.starts_with(DATA_URL_PREFIX) => ImageRequest::DataUrl(s),
            Value::String(_) => ImageRequest::Unsupported("string".into()),
            Value::Bool(_) => ImageRequest::Unsupported("bool".into()),
            Value::Number(_) => ImageRequest::Unsupported("number".into()),
            Value::Array(_) => ImageRequest::Unsupported("array".into()),
            Value::Object(_) => ImageRequest::Unsupported("object".into()),
        }
    }
}

impl From<DynamicImage> for ImageRequest {
    fn from(image: DynamicImage) -> Self {
        ImageRequest::Decoded(image)
    }
}

/// Outcome of normalizing a request that did not fail outright.
#[derive(Debug)]
pub enum Normalized {
    Image(CanonicalImage),
    Empty,
    Unsupported,
}

/// Convert a request into a canonical RGB image.
///
/// Only malformed data URLs fail; absent and unrecognized inputs are
/// reported as [`Normalized::Empty`] and [`Normalized::Unsupported`].
pub fn normalize(request: ImageRequest) -> Result<Normalized, InputError> {
    match request {
        ImageRequest::DataUrl(url) => decode_data_url(&url).map(Normalized::Image),
        ImageRequest::Decoded(image) => Ok(Normalized::Image(image.into_rgb8())),
        ImageRequest::Empty => Ok(Normalized::Empty),
        ImageRequest::Unsupported(kind) => {
            tracing::debug!(kind = %kind, "unsupported input shape");
            Ok(Normalized::Unsupported)
        }
    }
}

/// Decode a base64 data URL into an RGB raster.
///
/// Only the text after the first comma is used; the media-type header is
/// ignored and the image format is sniffed from the bytes. ASCII whitespace
/// inside the payload (line-wrapped data URLs) is skipped.
pub fn decode_data_url(url: &str) -> Result<RgbImage, InputError> {
    let (_header, payload) = url.split_once(',').ok_or(InputError::MissingSeparator)?;
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact)?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.into_rgb8())
}

/// Encode an RGB raster as a `data:image/png;base64,...` URL.
pub fn encode_png_data_url(image: &RgbImage) -> Result<String, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(buf.into_inner())
    ))
}
