//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::StreamBody;
use hyper::body::{Frame, Incoming};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use service_lifecycle::{lifecycle_fn, BoxError, LifecycleFn, Runner};

/// Ordered record of every start/stop call made during a test.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

/// A runner that records calls and can be told to fail or to stop slowly.
pub struct MockRunner {
    name: String,
    log: EventLog,
    fail_start: bool,
    fail_stop: bool,
    stop_delay: Duration,
}

impl MockRunner {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_start: false,
            fail_stop: false,
            stop_delay: Duration::ZERO,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn slow_stop(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn shared(self) -> Arc<dyn Runner> {
        Arc::new(self)
    }
}

#[async_trait]
impl Runner for MockRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.push(format!("start:{}", self.name));
        if self.fail_start {
            return Err(format!("{} refused to start", self.name).into());
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.push(format!("stop:{}", self.name));
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.log.push(format!("stopped:{}", self.name));
        if self.fail_stop {
            return Err(format!("{} failed to stop", self.name).into());
        }
        Ok(())
    }
}

/// Records start and stop calls around any runner, real servers included.
pub struct Recorded {
    inner: Arc<dyn Runner>,
    log: EventLog,
}

impl Recorded {
    pub fn wrap(inner: Arc<dyn Runner>, log: &EventLog) -> Arc<dyn Runner> {
        Arc::new(Self {
            inner,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Runner for Recorded {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn start(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.push(format!("start:{}", self.name()));
        self.inner.start(ctx).await
    }

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.push(format!("stop:{}", self.name()));
        let result = self.inner.stop(ctx).await;
        self.log.push(format!("stopped:{}", self.name()));
        result
    }
}

/// A lifecycle function that records `label` and optionally fails.
pub fn recording_fn(log: &EventLog, label: &str, fail: bool) -> LifecycleFn {
    let log = log.clone();
    let label = label.to_string();
    lifecycle_fn(move |_| {
        let log = log.clone();
        let label = label.clone();
        async move {
            log.push(label.clone());
            if fail {
                Err::<(), BoxError>(format!("{} failed", label).into())
            } else {
                Ok(())
            }
        }
    })
}

/// Poll `lookup` until it yields an address or `timeout` elapses.
pub async fn wait_for_addr<F>(lookup: F, timeout: Duration) -> SocketAddr
where
    F: Fn() -> Option<SocketAddr>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(addr) = lookup() {
            return addr;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "server did not bind within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until `condition` holds or `timeout` elapses.
pub async fn eventually<F, Fut>(condition: F, timeout: Duration)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Send a raw HTTP/1.1 request and return the connection without reading
/// the response. Used to hold a request in flight.
pub async fn send_raw_request(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Read whatever the server sends until it closes the connection.
pub async fn read_to_close(mut stream: TcpStream) -> String {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

type PendingBody = StreamBody<futures_util::stream::Pending<Result<Frame<Bytes>, Infallible>>>;

/// A reflection stream held open by the client, with the client that owns
/// its connection.
pub struct HungGrpcStream {
    pub response: hyper::Response<Incoming>,
    _client: Client<HttpConnector, PendingBody>,
}

/// Open a bidirectional reflection stream whose request side never ends.
/// Returns once the server has answered with headers.
pub async fn open_hung_grpc_stream(addr: SocketAddr) -> HungGrpcStream {
    let client = Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build_http::<PendingBody>();
    let request = hyper::Request::builder()
        .method("POST")
        .uri(format!(
            "http://{}/grpc.reflection.v1.ServerReflection/ServerReflectionInfo",
            addr
        ))
        .header("content-type", "application/grpc")
        .header("te", "trailers")
        .body(StreamBody::new(futures_util::stream::pending()))
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(5), client.request(request))
        .await
        .expect("response headers")
        .unwrap();
    HungGrpcStream {
        response,
        _client: client,
    }
}
