//! In-process resumable endpoint used by the unit tests

use crate::{HttpTransport, Result, SendProgress, TransportResponse, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::VecDeque;
use std::sync::Arc;

/// A failure injected instead of the endpoint's normal answer
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fault {
    Network,
    Status(u16),
    MissingRange,
    /// 308 with this `Range` value
    Range(&'static str),
}

/// A request as the endpoint saw it
#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub content_range: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body_len: usize,
    pub at: tokio::time::Instant,
}

impl Recorded {
    pub fn is_probe(&self) -> bool {
        self.content_range.is_none()
    }

    /// First byte of a data request
    pub fn start(&self) -> Option<u64> {
        parse_content_range(self.content_range.as_deref()?).map(|(start, _)| start)
    }
}

type Hook = Arc<dyn Fn(&Recorded) + Send + Sync>;

struct FakeState {
    total: u64,
    persisted: u64,
    finalized: bool,
    faults: VecDeque<Fault>,
    requests: Vec<Recorded>,
    hook: Option<Hook>,
    send_steps: u64,
}

/// Emulates a resumable upload session: tracks persisted bytes, answers 308
/// with a `Range` header until the last byte arrives, then 200.
pub(crate) struct FakeEndpoint {
    state: Mutex<FakeState>,
}

impl FakeEndpoint {
    pub fn new(total: u64) -> Arc<Self> {
        Self::with_persisted(total, 0)
    }

    /// Start as if `persisted` bytes were already received
    pub fn with_persisted(total: u64, persisted: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                total,
                persisted,
                finalized: false,
                faults: VecDeque::new(),
                requests: Vec::new(),
                hook: None,
                send_steps: 0,
            }),
        })
    }

    pub fn fail_next(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Called with every request before it is answered
    pub fn on_request(&self, hook: impl Fn(&Recorded) + Send + Sync + 'static) {
        self.state.lock().hook = Some(Arc::new(hook));
    }

    /// Report each data body as sent in `steps` equal parts before answering
    pub fn report_sends(&self, steps: u64) {
        self.state.lock().send_steps = steps;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    pub fn persisted(&self) -> u64 {
        self.state.lock().persisted
    }
}

fn header(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parse `bytes s-e/t`; `bytes */t` yields `None`
fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let range = value.strip_prefix("bytes ")?;
    let (span, _total) = range.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn state_response(state: &FakeState) -> TransportResponse {
    if state.finalized {
        return TransportResponse::new(200);
    }
    let mut response = TransportResponse::new(308);
    if state.persisted > 0 {
        let range = format!("bytes=0-{}", state.persisted - 1);
        if let Ok(value) = HeaderValue::from_str(&range) {
            response.headers.insert(header::RANGE, value);
        }
    }
    response
}

#[async_trait]
impl HttpTransport for FakeEndpoint {
    async fn put(
        &self,
        _url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<TransportResponse> {
        let recorded = Recorded {
            content_range: header(&headers, header::CONTENT_RANGE),
            content_length: header(&headers, header::CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            content_type: header(&headers, header::CONTENT_TYPE),
            body_len: body.as_ref().map_or(0, Bytes::len),
            at: tokio::time::Instant::now(),
        };

        let hook = {
            let mut state = self.state.lock();
            state.requests.push(recorded.clone());
            state.hook.clone()
        };
        if let Some(hook) = hook {
            hook(&recorded);
        }

        let mut state = self.state.lock();
        if let Some(fault) = state.faults.pop_front() {
            return match fault {
                Fault::Network => Err(UploadError::Transport("connection reset by peer".to_string())),
                Fault::Status(status) => Ok(TransportResponse::new(status)),
                Fault::MissingRange => Ok(TransportResponse::new(308)),
                Fault::Range(range) => {
                    let mut response = TransportResponse::new(308);
                    response
                        .headers
                        .insert(header::RANGE, HeaderValue::from_static(range));
                    Ok(response)
                }
            };
        }

        let Some(range) = recorded.content_range.as_deref() else {
            return Ok(state_response(&state));
        };

        match parse_content_range(range) {
            Some((start, end)) if start == state.persisted => {
                state.persisted = end + 1;
            }
            Some(_) => return Ok(state_response(&state)),
            None => {}
        }
        if state.persisted == state.total {
            state.finalized = true;
        }
        Ok(state_response(&state))
    }

    async fn put_with_progress(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        on_sent: SendProgress,
    ) -> Result<TransportResponse> {
        let steps = self.state.lock().send_steps;
        let len = body.as_ref().map_or(0, Bytes::len) as u64;
        if steps > 0 && len > 0 {
            for step in 1..=steps {
                on_sent(len * step / steps);
            }
        }
        self.put(url, headers, body).await
    }
}
