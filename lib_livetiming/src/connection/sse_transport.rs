//! reqwest-backed `text/event-stream` transport.
//!
//! Each `open` spawns one task that performs the GET, feeds the body through
//! an [`SseDecoder`] and forwards decoded events to the sink. Any request
//! error, non-2xx status, body error or end of body is reported once as a
//! stream failure; the task then exits.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use super::sse_decoder::SseDecoder;
use super::transport::{StreamHandle, StreamSink, Transport};
use crate::error::TransportError;

/// # SSE Transport
///
/// Production [`Transport`] over HTTP. Cheap to clone; the inner reqwest
/// client pools connections.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
}

impl SseTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Uses a caller-configured client (proxies, TLS roots, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn parse_url(url: &str) -> Result<Url, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(TransportError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

impl Transport for SseTransport {
    fn open(&self, url: &str, sink: StreamSink) -> Result<Box<dyn StreamHandle>, TransportError> {
        let url = Self::parse_url(url)?;
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let client = self.client.clone();

        let task = runtime.spawn(async move {
            let response = client
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    sink.failed(&format!("request failed: {}", e));
                    return;
                }
            };
            if !response.status().is_success() {
                sink.failed(&format!("unexpected HTTP status {}", response.status()));
                return;
            }

            sink.opened();

            let mut decoder = SseDecoder::new();
            let mut body = response.bytes_stream();
            while let Some(item) = body.next().await {
                let chunk: Bytes = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        sink.failed(&format!("stream read error: {}", e));
                        return;
                    }
                };
                for event in decoder.feed(&chunk) {
                    if !sink.is_active() {
                        return;
                    }
                    sink.event(&event.event, &event.data);
                }
            }

            decoder.finish();
            sink.failed("stream closed by server");
        });

        Ok(Box::new(SseStreamHandle { task: Some(task) }))
    }
}

struct SseStreamHandle {
    task: Option<JoinHandle<()>>,
}

impl StreamHandle for SseStreamHandle {
    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SseStreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            SseTransport::parse_url("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(matches!(
            SseTransport::parse_url("ftp://example.com/feed"),
            Err(TransportError::InvalidUrl { .. })
        ));
        assert!(SseTransport::parse_url("http://localhost:8080/livetiming/api/realtime").is_ok());
    }
}
