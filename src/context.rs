//! Request contexts and cancellation guards.
//!
//! A [`Context`] is a cheap, cloneable handle describing how long a call may
//! live. Contexts form a tree: a derived context ends when its own deadline
//! passes, when its [`CancelFn`] runs, or when any ancestor ends.
//!
//! # Cancellation guards
//!
//! [`Context::with_timeout`] returns a `(Context, CancelFn)` pair. The cancel
//! function must eventually run exactly once; running it again is a no-op.
//! Request builders defer it until the response body is closed (see
//! [`Body::close`](crate::Body::close)) and invoke it immediately when the
//! call fails before a response exists.
//!
//! # Examples
//!
//! ```
//! use streamline_http::Context;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let root = Context::background();
//! let (ctx, cancel) = root.with_timeout(Duration::from_secs(5));
//! assert!(ctx.err().is_none());
//!
//! cancel.cancel();
//! assert!(ctx.err().unwrap().is_cancellation());
//! # }
//! ```

use crate::error::Error;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// A bounded-lifetime execution context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    parent: Option<Context>,
    deadline: Option<Instant>,
    canceled: watch::Sender<bool>,
}

impl Context {
    /// The root context: never canceled, no deadline.
    pub fn background() -> Self {
        Self::derive(None, None)
    }

    fn derive(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let (canceled, _) = watch::channel(false);
        Context {
            inner: Arc::new(Inner {
                parent,
                deadline,
                canceled,
            }),
        }
    }

    /// Derive a child context that ends when the returned [`CancelFn`] runs.
    pub fn with_cancel(&self) -> (Context, CancelFn) {
        let child = Self::derive(Some(self.clone()), None);
        let cancel = child.cancel_fn();
        (child, cancel)
    }

    /// Derive a child context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelFn) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that expires at `deadline`.
    ///
    /// The effective deadline is never later than the parent's.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelFn) {
        let child = Self::derive(Some(self.clone()), Some(deadline));
        let cancel = child.cancel_fn();
        (child, cancel)
    }

    fn cancel_fn(&self) -> CancelFn {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        CancelFn::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.canceled.send_replace(true);
            }
        })
    }

    /// Returns true for the root context, which can never end.
    pub fn is_background(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// The earliest deadline along the ancestor chain.
    pub fn deadline(&self) -> Option<Instant> {
        let parent = self.inner.parent.as_ref().and_then(Context::deadline);
        match (self.inner.deadline, parent) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// Why this context ended, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if *self.inner.canceled.borrow() {
            return Some(Error::Canceled);
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Some(Error::DeadlineExceeded);
            }
        }
        self.inner.parent.as_ref().and_then(Context::err)
    }

    /// Returns true once the context has ended.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// A future that resolves with the reason once this context ends.
    ///
    /// The future owns a clone of the context, so it can be stored in
    /// long-lived values such as response bodies.
    pub fn done(&self) -> BoxFuture<'static, Error> {
        let ctx = self.clone();
        Box::pin(async move {
            let canceled = ctx.inner.canceled.subscribe();
            let deadline = ctx.inner.deadline;
            let parent = ctx.inner.parent.clone();

            tokio::select! {
                _ = wait_canceled(canceled) => Error::Canceled,
                _ = sleep_until(deadline) => Error::DeadlineExceeded,
                err = wait_parent(parent) => err,
            }
        })
    }
}

async fn wait_canceled(mut canceled: watch::Receiver<bool>) {
    // The sender lives in the context owning this receiver, so an error
    // here means nothing can cancel it anymore.
    if canceled.wait_for(|canceled| *canceled).await.is_err() {
        futures::future::pending::<()>().await;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

async fn wait_parent(parent: Option<Context>) -> Error {
    match parent {
        Some(parent) => parent.done().await,
        None => futures::future::pending().await,
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline())
            .field("err", &self.err())
            .finish()
    }
}

/// Release function of a cancellation guard.
///
/// Clones share the same underlying function, which runs at most once no
/// matter how many clones call [`CancelFn::cancel`].
#[derive(Clone)]
pub struct CancelFn {
    release: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl CancelFn {
    /// Wrap an arbitrary release function.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        CancelFn {
            release: Arc::new(Mutex::new(Some(Box::new(release)))),
        }
    }

    /// Run the release function if it has not run yet.
    pub fn cancel(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Returns true once the release function has run.
    pub fn is_released(&self) -> bool {
        self.release.lock().is_none()
    }

    /// Combine two guards so one call releases both, `self` first.
    pub fn and(self, other: CancelFn) -> CancelFn {
        CancelFn::new(move || {
            self.cancel();
            other.cancel();
        })
    }
}

impl fmt::Debug for CancelFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelFn")
            .field("released", &self.is_released())
            .finish()
    }
}
