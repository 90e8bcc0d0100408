use base64::{engine::general_purpose, Engine};
use studio_core::EncodedAsset;
use studio_logging::{studio_debug, studio_warn};

use crate::fetch::{content_type_matches, Fetcher, ReqwestFetcher};

const IMAGE_TYPES: &[&str] = &["image/*", "application/octet-stream", "binary/octet-stream"];

/// Turns a reference URL into an embeddable asset.
///
/// Implementations fail soft: any failure yields `None` so ingestion carries on
/// with the remaining slots and rows.
#[async_trait::async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Option<EncodedAsset>;
}

pub struct HttpAssetResolver<F = ReqwestFetcher> {
    fetcher: F,
}

impl<F: Fetcher> HttpAssetResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl<F: Fetcher> AssetResolver for HttpAssetResolver<F> {
    async fn resolve(&self, url: &str) -> Option<EncodedAsset> {
        let output = match self.fetcher.fetch(url, IMAGE_TYPES).await {
            Ok(output) => output,
            Err(err) => {
                studio_warn!("Reference {} unavailable: {}", url, err);
                return None;
            }
        };
        if output.bytes.is_empty() {
            studio_warn!("Reference {} returned an empty body", url);
            return None;
        }
        let declared = output
            .metadata
            .content_type
            .as_deref()
            .filter(|ct| content_type_matches(ct, &["image/*"]))
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());
        let Some(mime) = sniff_image_mime(&output.bytes)
            .map(str::to_string)
            .or(declared)
        else {
            studio_warn!("Reference {} is not a recognisable image", url);
            return None;
        };
        studio_debug!(
            "Resolved reference {} ({}, {} bytes)",
            url,
            mime,
            output.metadata.byte_len
        );
        Some(encode_asset(&mime, &output.bytes))
    }
}

/// Base64-encode raw image bytes into a data-url asset.
pub fn encode_asset(mime: &str, bytes: &[u8]) -> EncodedAsset {
    EncodedAsset::from_parts(mime, &general_purpose::STANDARD.encode(bytes))
}

/// Decode the payload of an asset back into raw bytes.
pub fn decode_asset(asset: &EncodedAsset) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(asset.payload())
}

/// Identify common raster formats by their magic bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_signatures() {
        assert_eq!(sniff_image_mime(b"\x89PNG\r\n\x1a\nrest"), Some("image/png"));
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_mime(b"GIF89a..."), Some("image/gif"));
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_mime(b"<html>"), None);
    }

    #[test]
    fn encode_and_decode_are_inverse() {
        let asset = encode_asset("image/png", b"\x89PNG\r\n\x1a\n");
        assert_eq!(asset.mime(), "image/png");
        assert_eq!(decode_asset(&asset).unwrap(), b"\x89PNG\r\n\x1a\n");
    }
}
