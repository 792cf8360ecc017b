use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_IMAGE_FORMAT: &str = "png";

const DATA_URL_PREFIX: &str = "data:image";

/// Standard alphabet, but padding is optional on decode. Prompts pasted by
/// users routinely lose their trailing `=`.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("data URL header is malformed: {0}")]
    MalformedHeader(String),
    #[error("payload decoded to zero bytes")]
    EmptyPayload,
}

/// Raw image bytes plus the declared format label (`png`, `jpeg`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub bytes: Vec<u8>,
    pub format: String,
}

impl ImageRef {
    pub fn new(bytes: impl Into<Vec<u8>>, format: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            format: format.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.format)
    }

    pub fn to_encoded(&self) -> EncodedImage {
        encode(&self.bytes, &self.format)
    }

    pub fn digest(&self) -> String {
        image_digest(&self.bytes)
    }
}

/// A data-URL style string: `data:image/<format>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn format(&self) -> Option<&str> {
        split_data_url(&self.0).ok().and_then(|(_, format)| format)
    }

    pub fn decode(&self) -> Result<ImageRef, CodecError> {
        decode(&self.0)
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    DataUrl,
    Bare,
}

impl PayloadSource {
    pub fn of(encoded: &str) -> Self {
        if encoded.trim_start().starts_with(DATA_URL_PREFIX) {
            Self::DataUrl
        } else {
            Self::Bare
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataUrl => "data_url",
            Self::Bare => "base64_string",
        }
    }
}

pub fn encode(bytes: &[u8], format: &str) -> EncodedImage {
    EncodedImage(format!(
        "{DATA_URL_PREFIX}/{format};base64,{}",
        BASE64.encode(bytes)
    ))
}

pub fn encode_bare(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes either a data URL or a bare base64 string.
///
/// A bare payload has no declared format, so the format is sniffed from the
/// magic bytes and falls back to [`DEFAULT_IMAGE_FORMAT`].
pub fn decode(encoded: &str) -> Result<ImageRef, CodecError> {
    let (payload, declared) = split_data_url(encoded.trim())?;
    let bytes = LENIENT_BASE64
        .decode(payload.trim())
        .map_err(|err| CodecError::InvalidBase64(err.to_string()))?;
    if bytes.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let format = match declared {
        Some(format) => format.to_string(),
        None => sniff_format(&bytes)
            .unwrap_or(DEFAULT_IMAGE_FORMAT)
            .to_string(),
    };
    Ok(ImageRef { bytes, format })
}

pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    match format {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpeg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::Bmp => Some("bmp"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Tiff => Some("tiff"),
        ImageFormat::Ico => Some("ico"),
        _ => None,
    }
}

pub fn image_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn split_data_url(raw: &str) -> Result<(&str, Option<&str>), CodecError> {
    if !raw.starts_with(DATA_URL_PREFIX) {
        return Ok((raw, None));
    }
    let Some((header, body)) = raw.split_once(',') else {
        return Ok((raw, None));
    };
    if body.contains(',') {
        return Ok((raw, None));
    }
    let format = header
        .split_once('/')
        .map(|(_, rest)| rest.split(';').next().unwrap_or(rest).trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CodecError::MalformedHeader(header.to_string()))?;
    Ok((body, Some(format)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn encode_then_decode_preserves_bytes_and_format() -> anyhow::Result<()> {
        let samples: [&[u8]; 3] = [b"x", &[0, 1, 2, 3, 254, 255], PNG_HEADER];
        for format in ["jpeg", "png", "gif", "bmp"] {
            for bytes in samples {
                let encoded = encode(bytes, format);
                let decoded = decode(encoded.as_str())?;
                assert_eq!(decoded.bytes, bytes);
                assert_eq!(decoded.format, format);
            }
        }
        Ok(())
    }

    #[test]
    fn encoded_image_reports_declared_format() {
        let encoded = encode(b"abc", "gif");
        assert!(encoded.as_str().starts_with("data:image/gif;base64,"));
        assert_eq!(encoded.format(), Some("gif"));
    }

    #[test]
    fn bare_payload_defaults_to_png_when_format_is_unknown() -> anyhow::Result<()> {
        let decoded = decode(&BASE64.encode(b"not an image at all"))?;
        assert_eq!(decoded.format, DEFAULT_IMAGE_FORMAT);
        Ok(())
    }

    #[test]
    fn bare_payload_format_is_sniffed_from_magic_bytes() -> anyhow::Result<()> {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[1, 0, 1, 0, 0, 0, 0]);
        let decoded = decode(&BASE64.encode(&gif))?;
        assert_eq!(decoded.format, "gif");
        Ok(())
    }

    #[test]
    fn missing_padding_is_tolerated() -> anyhow::Result<()> {
        let padded = BASE64.encode(b"hello world");
        assert!(padded.ends_with('='));
        let decoded = decode(padded.trim_end_matches('='))?;
        assert_eq!(decoded.bytes, b"hello world");
        Ok(())
    }

    #[test]
    fn invalid_base64_is_a_distinguishable_failure() {
        assert!(matches!(
            decode("data:image/png;base64,@@@@"),
            Err(CodecError::InvalidBase64(_))
        ));
        assert!(matches!(decode("abcde"), Err(CodecError::InvalidBase64(_))));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(decode(""), Err(CodecError::EmptyPayload));
    }

    #[test]
    fn header_without_format_is_rejected() {
        assert!(matches!(
            decode("data:image;base64,aGVsbG8="),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn payload_source_labels() {
        assert_eq!(PayloadSource::of("data:image/png;base64,AA==").as_str(), "data_url");
        assert_eq!(PayloadSource::of("AAAA").as_str(), "base64_string");
    }
}
