//! HTTP transport used to talk to the session URI

use crate::{Result, UploadConfig, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use reqwest::{header, Body, Client};
use std::sync::Arc;
use tracing::debug;

/// Size of the pieces a request body is streamed in
pub const SEND_PIECE_SIZE: usize = 64 * 1024;

/// Callback receiving the number of body bytes handed to the connection so far
pub type SendProgress = Arc<dyn Fn(u64) + Send + Sync>;

/// Status and headers of an endpoint response
#[derive(Clone, Debug)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: header::HeaderMap,
}

impl TransportResponse {
    /// Create a response with no headers
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: header::HeaderMap::new(),
        }
    }

    /// Look up a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends PUT requests to a resumable upload endpoint.
///
/// Implementations return every status code they receive; only failures to
/// send the request or read the response are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a PUT request with the given headers and optional body
    async fn put(
        &self,
        url: &str,
        headers: header::HeaderMap,
        body: Option<Bytes>,
    ) -> Result<TransportResponse>;

    /// Like [`put`](Self::put), reporting body bytes as they are sent.
    ///
    /// The default sends the body in one piece and reports nothing.
    async fn put_with_progress(
        &self,
        url: &str,
        headers: header::HeaderMap,
        body: Option<Bytes>,
        on_sent: SendProgress,
    ) -> Result<TransportResponse> {
        let _ = on_sent;
        self.put(url, headers, body).await
    }
}

/// [`HttpTransport`] backed by `reqwest`
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Build a client from the upload configuration
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let user_agent = config.user_agent.parse().map_err(|_| {
            UploadError::Config(format!("invalid user agent: {}", config.user_agent))
        })?;
        headers.insert(header::USER_AGENT, user_agent);

        // 308 means "resume incomplete" here, never a redirect to follow.
        let mut builder = Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(UploadError::Http)?;

        Ok(Self { http })
    }

    /// Wrap an existing client
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn put(
        &self,
        url: &str,
        headers: header::HeaderMap,
        body: Option<Bytes>,
    ) -> Result<TransportResponse> {
        let mut req = self.http.put(url).headers(headers);
        if let Some(data) = body {
            req = req.body(data);
        }

        debug!("Sending PUT request to {}", url);
        read_response(req.send().await?)
    }

    async fn put_with_progress(
        &self,
        url: &str,
        headers: header::HeaderMap,
        body: Option<Bytes>,
        on_sent: SendProgress,
    ) -> Result<TransportResponse> {
        let mut req = self.http.put(url).headers(headers);
        match body {
            Some(data) if !data.is_empty() => req = req.body(streamed(data, on_sent)),
            Some(data) => req = req.body(data),
            None => {}
        }

        debug!("Sending PUT request to {} with streamed body", url);
        read_response(req.send().await?)
    }
}

fn read_response(response: reqwest::Response) -> Result<TransportResponse> {
    Ok(TransportResponse {
        status: response.status().as_u16(),
        headers: response.headers().clone(),
    })
}

/// Stream `data` in [`SEND_PIECE_SIZE`] pieces, reporting the running total
/// each time the connection takes a piece. `Content-Length` must be set by
/// the caller.
fn streamed(data: Bytes, on_sent: SendProgress) -> Body {
    Body::wrap_stream(pieces(data, on_sent))
}

fn pieces(
    data: Bytes,
    on_sent: SendProgress,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let pieces: Vec<Bytes> = (0..data.len())
        .step_by(SEND_PIECE_SIZE)
        .map(|start| data.slice(start..(start + SEND_PIECE_SIZE).min(data.len())))
        .collect();

    let mut sent = 0u64;
    stream::iter(pieces).map(move |piece| {
        sent += piece.len() as u64;
        on_sent(sent);
        Ok(piece)
    })
}
