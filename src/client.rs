//! HTTP client for streaming chat endpoints.
//!
//! The endpoint contract is a single `POST {base}chat` carrying a JSON
//! payload, answered with a raw incremental `text/plain` body. The body is
//! not event-framed; every read is literal response text.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CHUNKS, STREAM_ERRORS,
};

const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The JSON payload for one chat invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Developer/system instruction establishing the channel's behavior.
    pub developer_message: String,
    /// The user's message text.
    pub user_message: String,
    /// Model identifier to run the request against.
    pub model: String,
    /// Access token, serialized as `null` when absent.
    pub hf_token: Option<String>,
}

/// A stream of decoded response-text chunks.
///
/// Each item is the text decoded from one body read, not the cumulative
/// response; wrap with [`crate::CumulativeStream`] for full-text-so-far
/// snapshots.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The seam between the orchestration layer and the wire.
///
/// [`ChatClient`] is the production implementation; tests substitute
/// scripted backends to drive the channels deterministically.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens one streaming chat invocation.
    async fn open_stream(&self, request: ChatRequest) -> Result<TextStream>;
}

/// Client for a streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: String,
    connect_timeout: Duration,
}

impl ChatClient {
    /// Create a new client against the default local endpoint.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with a custom base URL and connect timeout.
    ///
    /// Only the connect phase is bounded; a whole-request timeout would
    /// sever long generations mid-stream.
    pub fn with_options(base_url: Option<String>, connect_timeout: Option<Duration>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    /// Returns the base URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain"));
        headers
    }

    /// Process API response errors and convert to our Error type.
    ///
    /// The endpoint returns error details as a plain-text body; surface it
    /// verbatim alongside the status code.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };
        Error::api(status_code, body)
    }

    /// Open a streaming chat invocation against the endpoint.
    ///
    /// On success, returns a stream of decoded text chunks read
    /// incrementally from the response body. A non-success status, a
    /// transport failure, or a decode failure all surface as `Err`; no
    /// chunk is ever delivered for a failed request.
    pub async fn stream(&self, request: ChatRequest) -> Result<TextStream> {
        let url = format!("{}chat", self.base_url);

        CLIENT_REQUESTS.click();
        let response = self
            .client
            .post(&url)
            .headers(self.default_headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.connect_timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let byte_stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        });

        Ok(Box::pin(decode_text(byte_stream)))
    }

    /// Probe the endpoint's health check, returning its reported status.
    pub async fn health(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct HealthResponse {
            status: String,
        }

        let url = format!("{}health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let health: HealthResponse = response.json().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse health response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Ok(health.status)
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn open_stream(&self, request: ChatRequest) -> Result<TextStream> {
        self.stream(request).await
    }
}

/// Validates the base URL and guarantees a trailing slash so endpoint
/// paths can be appended directly.
fn normalize_base_url(base_url: &str) -> Result<String> {
    Url::parse(base_url)?;
    if base_url.ends_with('/') {
        Ok(base_url.to_string())
    } else {
        Ok(format!("{}/", base_url))
    }
}

/// Decode a stream of bytes into a stream of text chunks.
///
/// Bytes accumulate in a pending buffer and the longest valid UTF-8 prefix
/// is emitted per read, so a code point split across reads is held back
/// until its remaining bytes arrive. An invalid byte inside the buffer, or
/// a body that ends inside a code point, yields a terminal error and the
/// stream ends; no further chunks follow an error.
fn decode_text<S>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
{
    let pending: Vec<u8> = Vec::new();

    stream::unfold(
        Some((byte_stream, pending)),
        move |state| async move {
            let (mut byte_stream, mut pending) = state?;
            loop {
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        pending.extend_from_slice(&bytes);
                        let valid = match std::str::from_utf8(&pending) {
                            Ok(_) => pending.len(),
                            Err(e) if e.error_len().is_some() => {
                                STREAM_ERRORS.click();
                                return Some((
                                    Err(Error::encoding(
                                        "Invalid UTF-8 in response stream",
                                        None,
                                    )),
                                    None,
                                ));
                            }
                            // Truncated code point at the end of the buffer.
                            Err(e) => e.valid_up_to(),
                        };
                        if valid == 0 {
                            continue;
                        }
                        let rest = pending.split_off(valid);
                        let chunk = std::mem::replace(&mut pending, rest);
                        match String::from_utf8(chunk) {
                            Ok(text) => {
                                STREAM_CHUNKS.click();
                                return Some((Ok(text), Some((byte_stream, pending))));
                            }
                            Err(e) => {
                                STREAM_ERRORS.click();
                                return Some((
                                    Err(Error::encoding(
                                        format!("Invalid UTF-8 in response stream: {}", e),
                                        Some(Box::new(e)),
                                    )),
                                    None,
                                ));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), None));
                    }
                    None => {
                        if !pending.is_empty() {
                            STREAM_ERRORS.click();
                            return Some((
                                Err(Error::encoding(
                                    "Response body ended inside a UTF-8 sequence",
                                    None,
                                )),
                                None,
                            ));
                        }
                        return None;
                    }
                }
            }
        },
    )
    .fuse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_chunks(chunks: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(stream: impl Stream<Item = Result<String>>) -> Vec<Result<String>> {
        futures::pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    #[test]
    fn client_creation() {
        let client = ChatClient::new().unwrap();
        assert_eq!(client.base_url(), DEFAULT_API_URL);
        assert_eq!(client.connect_timeout, DEFAULT_CONNECT_TIMEOUT);

        let client = ChatClient::with_options(
            Some("https://chat.example.com/api".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://chat.example.com/api/");
        assert_eq!(client.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = ChatClient::with_options(Some("not a url".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn request_serializes_missing_token_as_null() {
        let request = ChatRequest {
            developer_message: "dev".to_string(),
            user_message: "hi".to_string(),
            model: "some/model".to_string(),
            hf_token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["hf_token"].is_null());
        assert_eq!(value["user_message"], "hi");
    }

    #[tokio::test]
    async fn decode_passes_chunks_through() {
        let chunks = byte_chunks(vec![&b"Hel"[..], &b"lo"[..], &b" world"[..]]);
        let items = collect(decode_text(chunks)).await;
        let texts: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(texts, vec!["Hel", "lo", " world"]);
    }

    #[tokio::test]
    async fn decode_holds_back_split_code_point() {
        // "é" is 0xC3 0xA9; split it across two reads.
        let chunks = byte_chunks(vec![&b"caf\xc3"[..], &b"\xa9 time"[..]]);
        let items = collect(decode_text(chunks)).await;
        let texts: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(texts, vec!["caf", "é time"]);
    }

    #[tokio::test]
    async fn decode_rejects_invalid_byte() {
        let chunks = byte_chunks(vec![&b"ok"[..], &b"\xff\xfe"[..]]);
        let items = collect(decode_text(chunks)).await;
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(items[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn decode_ends_after_error() {
        // Valid bytes after the bad one must never surface: the error is
        // terminal and the stream is fused.
        let chunks = byte_chunks(vec![&b"ok"[..], &b"\xff"[..], &b"more text"[..]]);
        let stream = decode_text(chunks);
        futures::pin_mut!(stream);
        assert_eq!(stream.next().await.unwrap().unwrap(), "ok");
        assert!(stream.next().await.unwrap().unwrap_err().is_streaming());
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn decode_rejects_truncated_tail() {
        let chunks = byte_chunks(vec![&b"fin\xc3"[..]]);
        let items = collect(decode_text(chunks)).await;
        assert_eq!(items[0].as_ref().unwrap(), "fin");
        assert!(items[1].as_ref().unwrap_err().is_streaming());
        assert_eq!(items.len(), 2);
    }
}
