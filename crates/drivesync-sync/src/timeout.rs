//! Idle timeout and progress tracking for streamed transfers
//!
//! A transfer is cancelled once no bytes have moved for the configured
//! duration. Activity is recorded by [`ActivityReader`], which wraps the
//! content stream; a watchdog checks it every [`TIMEOUT_CHECK_INTERVAL`].

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use drivesync_core::ports::ProgressFn;

use crate::SyncError;

/// How often the watchdog looks at the last activity
pub const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// IdleTimeout
// ============================================================================

/// Tracks transfer activity and cancels a stalled transfer
///
/// A zero timeout disables the watchdog.
#[derive(Debug, Clone)]
pub struct IdleTimeout {
    timeout: Duration,
    started: Instant,
    /// Milliseconds after `started` at which data last moved
    last_activity: Arc<AtomicU64>,
    token: CancellationToken,
}

impl IdleTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            started: Instant::now(),
            last_activity: Arc::new(AtomicU64::new(0)),
            token: CancellationToken::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Record that data moved just now
    pub fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_activity.store(now, Ordering::Relaxed);
    }

    /// Time since data last moved
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// Token cancelled when the timeout fires
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a reader so every read that yields data counts as activity
    pub fn wrap<R>(&self, reader: R) -> ActivityReader<R> {
        ActivityReader {
            inner: reader,
            timeout: self.clone(),
        }
    }

    /// Run `fut` until it completes or the transfer goes idle
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.is_enabled() {
            return fut.await;
        }

        let watchdog = async {
            loop {
                tokio::time::sleep(TIMEOUT_CHECK_INTERVAL).await;
                if self.idle_for() > self.timeout {
                    self.token.cancel();
                    return;
                }
            }
        };

        tokio::select! {
            biased;
            res = fut => res,
            _ = watchdog => {
                warn!(timeout_secs = self.timeout.as_secs(), "Transfer idle, cancelling");
                Err(SyncError::Timeout { timeout: self.timeout }.into())
            }
        }
    }
}

// ============================================================================
// Readers
// ============================================================================

/// Reader that reports activity to an [`IdleTimeout`]
///
/// Fails with [`io::ErrorKind::TimedOut`] once the timeout has fired.
#[derive(Debug)]
pub struct ActivityReader<R> {
    inner: R,
    timeout: IdleTimeout,
}

impl<R: AsyncRead + Unpin> AsyncRead for ActivityReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.timeout.token.is_cancelled() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "transfer cancelled after idle timeout",
            )));
        }

        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        if matches!(res, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            self.timeout.touch();
        }
        res
    }
}

/// Reader that reports cumulative bytes read to a [`ProgressFn`]
pub struct ProgressReader<R> {
    inner: R,
    transferred: u64,
    total: u64,
    progress: ProgressFn,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, progress: ProgressFn) -> Self {
        Self {
            inner,
            transferred: 0,
            total,
            progress,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        let read = (buf.filled().len() - before) as u64;
        if read > 0 {
            self.transferred += read;
            (self.progress)(self.transferred, self.total);
        }
        res
    }
}
