// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live query subscriptions.

use crate::db::Document;
use crate::error::Result;
use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SUBSCRIPTION_BUFFER: usize = 16;

/// Handle to a running live query.
///
/// Yields full result snapshots. The background task is aborted when the
/// handle is dropped, so a subscription never outlives its owner.
pub struct Subscription {
    rx: mpsc::Receiver<Result<Vec<Document>>>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Spawn the task that feeds this subscription.
    pub(crate) fn spawn<F, Fut>(feed: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<Vec<Document>>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let handle = tokio::spawn(feed(tx));
        Self { rx, handle }
    }

    /// Wait for the next snapshot. `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<Result<Vec<Document>>> {
        self.rx.recv().await
    }

    /// Stop the subscription explicitly (same as dropping it).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Stream for Subscription {
    type Item = Result<Vec<Document>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
