//! Accumulates streaming text chunks into full-text-so-far snapshots.

use std::pin::Pin;

use futures::Stream;

use crate::error::{Error, Result};

/// A stream wrapper that turns per-read text chunks into cumulative
/// snapshots.
///
/// Every yielded item is the entire response text received so far, never a
/// delta, so a consumer can replace its rendered copy wholesale on each
/// update and later snapshots are always a superset-or-equal of earlier
/// ones. When the inner stream is fully drained, the final text is sent
/// via the oneshot channel returned by `new()`.
pub struct CumulativeStream {
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
    final_tx: Option<tokio::sync::oneshot::Sender<Result<String>>>,
    buffer: String,
    failed: bool,
}

impl CumulativeStream {
    /// Wraps a chunk stream to yield cumulative snapshots.
    ///
    /// Returns the stream and a receiver that resolves to the complete
    /// response text once the stream is drained, or to the terminal error
    /// if the stream failed partway.
    pub fn new<S>(stream: S) -> (Self, tokio::sync::oneshot::Receiver<Result<String>>)
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let this = Self {
            inner: Box::pin(stream),
            final_tx: Some(tx),
            buffer: String::new(),
            failed: false,
        };
        (this, rx)
    }

    /// Returns the text accumulated so far.
    pub fn text_so_far(&self) -> &str {
        &self.buffer
    }

    fn finalize(&self) -> Result<String> {
        if self.failed {
            Err(Error::streaming("stream failed before completion", None))
        } else {
            Ok(self.buffer.clone())
        }
    }
}

impl Stream for CumulativeStream {
    type Item = Result<String>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            std::task::Poll::Ready(Some(Ok(chunk))) => {
                self.buffer.push_str(&chunk);
                std::task::Poll::Ready(Some(Ok(self.buffer.clone())))
            }
            std::task::Poll::Ready(Some(Err(e))) => {
                self.failed = true;
                if let Some(tx) = self.final_tx.take() {
                    let _ = tx.send(Err(e.clone()));
                }
                std::task::Poll::Ready(Some(Err(e)))
            }
            std::task::Poll::Ready(None) => {
                if let Some(tx) = self.final_tx.take() {
                    let _ = tx.send(self.finalize());
                }
                std::task::Poll::Ready(None)
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
