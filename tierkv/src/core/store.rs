//! Store contract shared by every storage tier
//!
//! `get` and `list` are synchronous. `set` and `flush` return a [`Completion`]
//! right away while the work runs on its own task; callers may await it or
//! simply drop it.

use super::error::{KvError, Result};
use super::item::Item;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::debug;

/// Item handed to a store; shared so eviction can pass it on without copying
pub type SharedItem = Arc<dyn Item>;

/// Completion signal of an asynchronous store operation
///
/// Dropping a completion does not cancel the operation it tracks.
pub struct Completion {
    inner: BoxFuture<'static, Result<()>>,
}

impl Completion {
    /// Already-resolved completion
    pub fn ready(result: Result<()>) -> Self {
        Self {
            inner: Box::pin(std::future::ready(result)),
        }
    }

    /// Already-resolved, successful completion
    pub fn ok() -> Self {
        Self::ready(Ok(()))
    }

    /// Completion resolved by the sending half of a oneshot channel
    ///
    /// A sender dropped without reporting resolves to [`KvError::TaskAborted`].
    pub fn from_receiver(rx: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            inner: Box::pin(async move { rx.await.unwrap_or(Err(KvError::TaskAborted)) }),
        }
    }

    /// Treat [`KvError::KeyNotFound`] as success
    pub fn ignore_missing(self) -> Self {
        Self {
            inner: Box::pin(async move {
                match self.await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                }
            }),
        }
    }

    /// Resolve once the operation finishes, reporting success either way
    ///
    /// Used where a failure belongs to someone other than the caller; it is
    /// still logged by the store that produced it.
    pub fn settle(self) -> Self {
        Self {
            inner: Box::pin(async move {
                if let Err(e) = self.await {
                    debug!("Settled completion discarded error: {}", e);
                }
                Ok(())
            }),
        }
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Basic get/set/list/flush contract of a key-value store
///
/// Implemented by on-disk persistent stores and by in-memory caches, so a cache
/// can sit in front of either.
pub trait Store: Send + Sync {
    /// Fill `item` with the value stored under `key`
    ///
    /// Returns `false` when the key is missing or reading it failed in any way;
    /// the two cases are deliberately indistinguishable.
    fn get_into(&self, key: &str, item: &mut dyn Item) -> bool;

    /// Write `item` under `key`, or remove the key when `item` is `None`
    fn set(&self, key: &str, item: Option<SharedItem>) -> Completion;

    /// Keys starting with `prefix`; an empty prefix lists every key
    fn list(&self, prefix: &str) -> Vec<String>;

    /// Wait for all writes issued so far, then make them durable
    fn flush(&self) -> Completion;
}

/// Typed conveniences on top of [`Store`]
pub trait StoreExt: Store {
    /// Read `key` into `template`, handing the filled template back on success
    fn get<I: Item>(&self, key: &str, mut template: I) -> Option<I> {
        self.get_into(key, &mut template).then_some(template)
    }

    /// Store `item` under `key`
    fn put<I: Item + 'static>(&self, key: &str, item: I) -> Completion {
        self.set(key, Some(Arc::new(item)))
    }

    /// Remove `key`
    fn delete(&self, key: &str) -> Completion {
        self.set(key, None)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
