//! Network-free transports for unit tests

use super::fetcher::{FetchKind, RawResponse, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

type Response = Result<RawResponse, TransportError>;

/// Answers requests from a fixed script, then with 404
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Response>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Response>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, _url: &Url, _kind: FetchKind, _timeout: Duration) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(404, "")))
    }
}

/// Answers every request by calling a function of the URL
pub(crate) struct FnTransport<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> FnTransport<F>
where
    F: Fn(&Url) -> Response + Send + Sync,
{
    pub(crate) fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> Transport for FnTransport<F>
where
    F: Fn(&Url) -> Response + Send + Sync,
{
    async fn get(&self, url: &Url, _kind: FetchKind, _timeout: Duration) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(url)
    }
}
