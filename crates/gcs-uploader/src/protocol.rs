//! Resumable upload wire protocol: request headers and response interpretation

use crate::{Chunk, Result, TransportResponse, UploadError};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::fmt;

/// "Resume Incomplete", the endpoint has persisted part of the upload
pub const RESUME_INCOMPLETE: u16 = 308;

/// `Content-Range` descriptor of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentRange {
    /// No bytes in this request, total size known
    Unspecified { total: u64 },
    /// Inclusive byte range of this request
    Bytes { start: u64, end: u64, total: u64 },
}

impl ContentRange {
    /// Range for a chunk; empty chunks only carry the total
    pub fn for_chunk(chunk: &Chunk, total: u64) -> Self {
        match chunk.size() {
            0 => Self::Unspecified { total },
            size => Self::Bytes {
                start: chunk.offset,
                end: chunk.offset + size - 1,
                total,
            },
        }
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified { total } => write!(f, "bytes */{}", total),
            Self::Bytes { start, end, total } => write!(f, "bytes {}-{}/{}", start, end, total),
        }
    }
}

/// A single PUT against the session URI
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// Range descriptor, `None` for a status probe
    pub content_range: Option<ContentRange>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Bytes>,
}

impl UploadRequest {
    /// A zero-byte status probe: no `Content-*` headers, no body
    pub fn probe() -> Self {
        Self {
            content_range: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// A data request for `chunk`. An empty chunk becomes a finalization
    /// request carrying only the total size.
    pub fn data(chunk: Chunk, total: u64, content_type: &str) -> Result<Self> {
        let range = ContentRange::for_chunk(&chunk, total);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(chunk.size()));
        headers.insert(header::CONTENT_RANGE, header_value(&range.to_string())?);
        if chunk.size() > 0 {
            headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
        }

        Ok(Self {
            content_range: Some(range),
            headers,
            body: Some(chunk.data),
        })
    }

    /// Check if this request is a status probe
    pub fn is_probe(&self) -> bool {
        self.content_range.is_none()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| UploadError::Config(format!("invalid header value: {}", value)))
}

/// What the endpoint reported after a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The object is complete
    Complete,
    /// The endpoint persisted this many bytes and expects the rest
    Partial(u64),
}

/// Interpret an endpoint response
pub fn interpret_response(response: &TransportResponse, total: u64) -> Result<ExchangeOutcome> {
    match response.status {
        200 | 201 => Ok(ExchangeOutcome::Complete),
        RESUME_INCOMPLETE => {
            let range = response
                .header("range")
                .ok_or_else(|| UploadError::InvalidRange("missing".to_string()))?;
            let end = parse_range_end(range)
                .ok_or_else(|| UploadError::InvalidRange(range.to_string()))?;
            // `Range` is inclusive: bytes=0-999 means 1000 bytes persisted.
            let persisted = end
                .checked_add(1)
                .ok_or_else(|| UploadError::InvalidRange(range.to_string()))?;
            if persisted > total {
                return Err(UploadError::InvalidRange(format!(
                    "{} exceeds total size {}",
                    range, total
                )));
            }
            Ok(ExchangeOutcome::Partial(persisted))
        }
        status => Err(UploadError::UnexpectedStatus { status }),
    }
}

/// Parse the last confirmed byte from a `Range` value such as `bytes=0-999`
/// or `bytes 0-999`.
pub fn parse_range_end(value: &str) -> Option<u64> {
    let (_, end) = value.trim().split_once('-')?;
    end.trim().parse().ok()
}
