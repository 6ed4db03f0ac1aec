//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the wait for every chunk of a streamed body
//! - Make idle timeouts recognizable once wrapped by hyper's errors
//!
//! # Design Decisions
//! - Idle, not total: a 2 GiB upload may take longer than any fixed
//!   deadline, but it never stalls for longer than the configured window
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::BoxError;
use futures_util::{stream, StreamExt};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
#[error("body stalled for more than {0:?}")]
pub struct IdleTimeout(pub Duration);

/// Wrap `body` so that waiting longer than `idle` for the next chunk fails it.
pub fn idle_timeout_body(body: Body, idle: Duration) -> Body {
    watch_body(body, idle, None)
}

/// Like [`idle_timeout_body`], signalling `progress` for every chunk.
pub fn tracked_idle_timeout_body(body: Body, idle: Duration, progress: Arc<Notify>) -> Body {
    watch_body(body, idle, Some(progress))
}

fn watch_body(body: Body, idle: Duration, progress: Option<Arc<Notify>>) -> Body {
    let chunks = stream::unfold(Some(body.into_data_stream()), move |state| {
        let progress = progress.clone();
        async move {
            let mut inner = state?;
            match tokio::time::timeout(idle, inner.next()).await {
                Ok(Some(Ok(chunk))) => {
                    if let Some(progress) = &progress {
                        progress.notify_one();
                    }
                    Some((Ok(chunk), Some(inner)))
                }
                Ok(Some(Err(e))) => Some((Err(BoxError::from(e)), None)),
                Ok(None) => None,
                Err(_) => Some((Err(BoxError::from(IdleTimeout(idle))), None)),
            }
        }
    });
    Body::from_stream(chunks)
}

/// Await `fut`, failing with `None` after `idle` without either completion
/// or a `progress` signal.
///
/// Used for the response head: while a large upload is still flowing the
/// upstream cannot be expected to answer, so every uploaded chunk restarts
/// the wait.
pub async fn await_with_progress<F: Future>(fut: F, idle: Duration, progress: &Notify) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return Some(out),
            _ = progress.notified() => continue,
            _ = tokio::time::sleep(idle) => return None,
        }
    }
}

/// Whether `err`, or anything it wraps, is an [`IdleTimeout`].
pub fn is_idle_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<IdleTimeout>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}
