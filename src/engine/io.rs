// src/engine/io.rs
//
// I/O operations: Source enum, upload request parsing, base64 payloads

use crate::engine::fetch::{CancelToken, HttpFetcher, ValidatedUrl};
use crate::error::IngestError;
use crate::ops::ImageFormat;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::borrow::Cow;
use tracing::debug;

type IoResult<T> = std::result::Result<T, IngestError>;

/// Where the image bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Remote image, downloaded with a bounded GET
    Url(ValidatedUrl),
    /// Inline base64 payload, optionally with a data-URI prefix
    Base64(String),
}

impl Source {
    /// Fetch or decode the raw bytes, never holding more than `max_bytes`.
    pub fn acquire(
        &self,
        fetcher: &HttpFetcher,
        max_bytes: u64,
        cancel: &CancelToken,
    ) -> IoResult<Vec<u8>> {
        match self {
            Source::Url(url) => fetcher.fetch(url, max_bytes, cancel),
            Source::Base64(payload) => decode_base64_payload(payload, max_bytes),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Source::Url(_) => "url",
            Source::Base64(_) => "base64",
        }
    }
}

/// Upload request body: exactly one of `url` / `image`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl UploadRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            image: None,
        }
    }

    pub fn from_base64(image: impl Into<String>) -> Self {
        Self {
            url: None,
            image: Some(image.into()),
        }
    }

    pub fn from_json(body: &str) -> IoResult<Self> {
        serde_json::from_str(body).map_err(|e| IngestError::invalid_request_body(e.to_string()))
    }

    /// Resolve into a `Source`. Blank strings count as absent. URL validation
    /// happens here, before anything touches the network.
    pub fn into_source(self) -> IoResult<Source> {
        let url = self.url.filter(|u| !u.trim().is_empty());
        let image = self.image.filter(|i| !i.trim().is_empty());
        match (url, image) {
            (Some(_), Some(_)) => Err(IngestError::ambiguous_source()),
            (None, None) => Err(IngestError::missing_source()),
            (Some(url), None) => Ok(Source::Url(ValidatedUrl::parse(&url)?)),
            (None, Some(image)) => Ok(Source::Base64(image)),
        }
    }
}

/// One-shot acquisition with a default fetcher and no cancellation.
pub fn acquire(source: &Source, max_bytes: u64) -> IoResult<Vec<u8>> {
    source.acquire(&HttpFetcher::new(), max_bytes, &CancelToken::new())
}

/// Decode a base64 image payload, stripping an optional
/// `data:<mime>;base64,` prefix first. Line breaks and other ASCII
/// whitespace inside the payload (MIME-style wrapping) are ignored.
pub fn decode_base64_payload(payload: &str, max_bytes: u64) -> IoResult<Vec<u8>> {
    let encoded = strip_ascii_whitespace(strip_data_uri_prefix(payload.trim())?);

    // Decoded size is within 2 bytes of len/4*3; refuse before allocating.
    let estimated = (encoded.len() / 4 * 3) as u64;
    if estimated > max_bytes.saturating_add(2) {
        return Err(IngestError::payload_too_large(estimated, max_bytes));
    }

    let data = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| IngestError::invalid_base64(e.to_string()))?;

    if data.len() as u64 > max_bytes {
        return Err(IngestError::payload_too_large(data.len() as u64, max_bytes));
    }
    debug!(bytes = data.len(), "decoded base64 artwork payload");
    Ok(data)
}

fn strip_ascii_whitespace(encoded: &str) -> Cow<'_, str> {
    if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(encoded)
    }
}

fn strip_data_uri_prefix(payload: &str) -> IoResult<&str> {
    let has_scheme = payload
        .get(..5)
        .is_some_and(|s| s.eq_ignore_ascii_case("data:"));
    if !has_scheme {
        return Ok(payload);
    }

    // data:[<mediatype>][;base64],<data>
    let (header, data) = payload
        .split_once(',')
        .ok_or_else(|| IngestError::invalid_base64("data URI has no ',' separator"))?;
    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|enc| enc.trim().eq_ignore_ascii_case("base64"));
    if !is_base64 {
        return Err(IngestError::invalid_base64(
            "data URI is not base64 encoded",
        ));
    }

    // An explicit image media type must name an accepted format; an empty or
    // generic one defers to magic-byte detection.
    let media_type = header[5..].split(';').next().unwrap_or_default().trim();
    let declares_image = media_type
        .get(..6)
        .is_some_and(|s| s.eq_ignore_ascii_case("image/"));
    if declares_image && ImageFormat::from_mime(media_type).is_none() {
        return Err(IngestError::unsupported_format(media_type.to_string()));
    }
    Ok(data.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod request_tests {
        use super::*;

        #[test]
        fn url_only_becomes_url_source() {
            let src = UploadRequest::from_url("https://example.com/a.jpg")
                .into_source()
                .unwrap();
            assert!(matches!(src, Source::Url(_)));
            assert_eq!(src.kind(), "url");
        }

        #[test]
        fn image_only_becomes_base64_source() {
            let src = UploadRequest::from_base64("AAAA").into_source().unwrap();
            assert_eq!(src, Source::Base64("AAAA".to_string()));
        }

        #[test]
        fn both_sources_is_ambiguous() {
            let req = UploadRequest {
                url: Some("https://example.com/a.jpg".into()),
                image: Some("AAAA".into()),
            };
            assert_eq!(req.into_source().unwrap_err(), IngestError::AmbiguousSource);
        }

        #[test]
        fn neither_source_is_missing() {
            assert_eq!(
                UploadRequest::default().into_source().unwrap_err(),
                IngestError::MissingSource
            );
            let blank = UploadRequest {
                url: Some("   ".into()),
                image: Some(String::new()),
            };
            assert_eq!(blank.into_source().unwrap_err(), IngestError::MissingSource);
        }

        #[test]
        fn bad_scheme_rejected_at_parse_time() {
            let err = UploadRequest::from_url("file:///etc/passwd")
                .into_source()
                .unwrap_err();
            assert!(matches!(err, IngestError::InvalidUrl { .. }));
        }

        #[test]
        fn parses_json_body() {
            let req = UploadRequest::from_json(r#"{"image":"AAAA"}"#).unwrap();
            assert_eq!(req.image.as_deref(), Some("AAAA"));
            assert!(req.url.is_none());

            let err = UploadRequest::from_json("{not json").unwrap_err();
            assert!(matches!(err, IngestError::InvalidRequestBody { .. }));
        }
    }

    mod base64_tests {
        use super::*;

        #[test]
        fn decodes_plain_payload() {
            let data = decode_base64_payload("aGVsbG8=", 1024).unwrap();
            assert_eq!(data, b"hello");
        }

        #[test]
        fn strips_data_uri_prefix() {
            let data = decode_base64_payload("data:image/png;base64,aGVsbG8=", 1024).unwrap();
            assert_eq!(data, b"hello");
            let data = decode_base64_payload("DATA:image/jpeg;BASE64,aGVsbG8=", 1024).unwrap();
            assert_eq!(data, b"hello");
        }

        #[test]
        fn invalid_base64_is_validation_error() {
            let err = decode_base64_payload("not-valid-base64!!", 1024).unwrap_err();
            assert!(matches!(err, IngestError::InvalidBase64 { .. }));
        }

        #[test]
        fn non_base64_data_uri_rejected() {
            let err = decode_base64_payload("data:image/png,rawbytes", 1024).unwrap_err();
            assert!(matches!(err, IngestError::InvalidBase64 { .. }));
            let err = decode_base64_payload("data:image/png;base64", 1024).unwrap_err();
            assert!(matches!(err, IngestError::InvalidBase64 { .. }));
        }

        #[test]
        fn line_wrapped_payload_decodes() {
            let data = decode_base64_payload("aGVs\nbG8=", 1024).unwrap();
            assert_eq!(data, b"hello");
            let data = decode_base64_payload("data:image/png;base64,aGVs\r\nbG8=\n", 1024).unwrap();
            assert_eq!(data, b"hello");
        }

        #[test]
        fn mime_wrapped_payload_matches_unwrapped() {
            let raw: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
            let flat = STANDARD.encode(&raw);
            let wrapped = flat
                .as_bytes()
                .chunks(76)
                .map(|line| std::str::from_utf8(line).unwrap())
                .collect::<Vec<_>>()
                .join("\r\n");
            assert!(wrapped.len() > flat.len());
            assert_eq!(decode_base64_payload(&flat, 1000).unwrap(), raw);
            assert_eq!(decode_base64_payload(&wrapped, 1000).unwrap(), raw);
            // the cap applies to decoded bytes, not to the wrapped text
            assert!(matches!(
                decode_base64_payload(&wrapped, 999),
                Err(IngestError::PayloadTooLarge { max: 999, .. })
            ));
        }

        #[test]
        fn data_uri_image_media_type_must_be_accepted_format() {
            for header in ["data:image/png", "data:image/JPEG", "data:image/jpg", "data:"] {
                let payload = format!("{header};base64,aGVsbG8=");
                assert_eq!(decode_base64_payload(&payload, 64).unwrap(), b"hello", "{header}");
            }
            let data = decode_base64_payload("data:application/octet-stream;base64,aGVsbG8=", 64);
            assert_eq!(data.unwrap(), b"hello");

            let err = decode_base64_payload("data:image/gif;base64,R0lGODlh", 64).unwrap_err();
            assert_eq!(err, IngestError::unsupported_format("image/gif"));
            assert_eq!(err.http_status(), 400);
        }

        #[test]
        fn oversized_payload_rejected_before_decode() {
            let payload = "A".repeat(4000);
            let err = decode_base64_payload(&payload, 100).unwrap_err();
            assert!(matches!(err, IngestError::PayloadTooLarge { max: 100, .. }));
        }

        #[test]
        fn exact_cap_accepted() {
            // 6 bytes encode to 8 chars without padding
            let data = decode_base64_payload("aGVsbG8h", 6).unwrap();
            assert_eq!(data, b"hello!");
            let err = decode_base64_payload("aGVsbG8h", 5).unwrap_err();
            assert!(matches!(err, IngestError::PayloadTooLarge { size: 6, max: 5 }));
        }

        #[test]
        fn source_acquire_dispatches_base64() {
            let src = Source::Base64("aGVsbG8=".into());
            assert_eq!(acquire(&src, 64).unwrap(), b"hello");
        }
    }
}
