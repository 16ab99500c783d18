//! Upstream response bodies bounded by the exchange deadline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Bytes;
use axum::BoxError;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::time::{Instant, Sleep};

use crate::error::ProxyError;
use crate::load_balancer::Backend;

/// When the upstream exchange must be finished. Attached to proxied
/// responses as an extension so buffering callers can tell a deadline
/// expiry apart from other body errors.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamDeadline(pub Instant);

impl UpstreamDeadline {
    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Streams an upstream body until the deadline, then fails the stream and
/// records the stall against the backend.
pub struct DeadlineBody<B> {
    inner: B,
    sleep: Pin<Box<Sleep>>,
    timeout: Duration,
    backend: Arc<Backend>,
    expired: bool,
}

impl<B> DeadlineBody<B> {
    pub fn new(inner: B, deadline: Instant, timeout: Duration, backend: Arc<Backend>) -> Self {
        Self {
            inner,
            sleep: Box::pin(tokio::time::sleep_until(deadline)),
            timeout,
            backend,
            expired: false,
        }
    }
}

impl<B> HttpBody for DeadlineBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = &mut *self;
        if this.expired {
            return Poll::Ready(None);
        }

        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            return Poll::Ready(frame.map(|res| res.map_err(Into::into)));
        }

        if this.sleep.as_mut().poll(cx).is_ready() {
            this.expired = true;
            this.backend.set_alive(false);
            this.backend.record_failure();
            tracing::warn!(
                backend = %this.backend.id(),
                timeout = ?this.timeout,
                "Upstream body stalled past the backend timeout"
            );
            return Poll::Ready(Some(Err(ProxyError::Timeout(this.timeout).into())));
        }
        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
