//! Cancellable text streams.
//!
//! Every client hands back a [`ResponseStream`]: a single-consumer stream of
//! text chunks paired with a [`CancelHandle`]. Cancelling trips a token the
//! stream watches and fires the transport's teardown callback exactly once.

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Raw chunk stream produced by a transport.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

// ─────────────────────────────────────────────────────────────────────────────
// Cancel Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Out-of-band cancellation for an in-flight response.
///
/// Clones share state: cancelling any clone cancels all of them, and the
/// registered callback runs at most once no matter how often `cancel` is called.
#[derive(Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    callback: Arc<Mutex<Option<CancelCallback>>>,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the teardown callback, replacing any previous one.
    ///
    /// If the handle is already cancelled the callback runs immediately.
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        let mut slot = self.callback.lock();
        if self.token.is_cancelled() {
            drop(slot);
            f();
            return;
        }
        *slot = Some(Box::new(f));
    }

    /// Cancel the response and run the teardown callback if one is registered.
    pub fn cancel(&self) {
        let callback = {
            let mut slot = self.callback.lock();
            self.token.cancel();
            slot.take()
        };
        if let Some(callback) = callback {
            tracing::debug!("Running stream cancel callback");
            callback();
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the stream and, optionally, by the transport.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Stream
// ─────────────────────────────────────────────────────────────────────────────

/// A single-consumer stream of response text that ends early on cancel.
pub struct ResponseStream {
    inner: TextStream,
    handle: CancelHandle,
}

impl ResponseStream {
    /// Wrap a transport stream with a fresh cancel handle.
    pub fn new(inner: TextStream) -> Self {
        Self::with_handle(inner, CancelHandle::new())
    }

    /// Wrap a transport stream with an existing handle.
    pub fn with_handle(inner: TextStream, handle: CancelHandle) -> Self {
        let stopped = handle.token().cancelled_owned();
        Self {
            inner: Box::pin(inner.take_until(stopped)),
            handle,
        }
    }

    /// Stream that yields the given chunks and ends.
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Result<String>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(Box::pin(futures::stream::iter(items)))
    }

    /// Handle that cancels this stream.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Cancel the stream and tear down its transport.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Drain the stream into a single string.
    ///
    /// Stops at the first error. A cancelled stream returns what arrived
    /// before cancellation.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut output = String::new();
        while let Some(chunk) = self.next().await {
            output.push_str(&chunk?);
        }
        Ok(output)
    }
}

impl Stream for ResponseStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_collect_text() {
        let stream = ResponseStream::from_chunks(["Hel", "lo", "!"]);
        assert_eq!(stream.collect_text().await.unwrap(), "Hello!");
    }

    #[tokio::test]
    async fn test_collect_text_stops_on_error() {
        let items: Vec<Result<String>> = vec![
            Ok("partial".to_string()),
            Err(LlmError::transport("connection reset")),
            Ok("never".to_string()),
        ];
        let stream = ResponseStream::new(Box::pin(futures::stream::iter(items)));
        let err = stream.collect_text().await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_)));
    }

    #[tokio::test]
    async fn test_cancel_ends_pending_stream() {
        let inner = futures::stream::iter(vec![Ok("first".to_string())])
            .chain(futures::stream::pending());
        let mut stream = ResponseStream::new(Box::pin(inner));
        let handle = stream.cancel_handle();

        assert_eq!(stream.next().await.unwrap().unwrap(), "first");

        let waiter = tokio::spawn(async move { stream.next().await.is_none() });
        handle.cancel();
        assert!(waiter.await.unwrap());
    }

    #[test]
    fn test_callback_runs_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        let counter = calls.clone();
        handle.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let clone = handle.clone();
        handle.cancel();
        handle.cancel();
        clone.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_callback_registered_after_cancel_runs_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        handle.cancel();

        let counter = calls.clone();
        handle.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
