//! Graceful drain of open sockets.
//!
//! `axum::serve(..).with_graceful_shutdown(..)` stops accepting connections but
//! does not wait for upgraded WebSockets. The coordinator fills that gap: each
//! socket task holds a [`ConnectionGuard`], listens for the shutdown flag, flushes
//! its outbound queue and closes. The server then waits until every guard is
//! dropped or the drain timeout elapses.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

pub struct ShutdownCoordinator {
    triggered: watch::Sender<bool>,
    active: watch::Sender<usize>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            triggered: watch::Sender::new(false),
            active: watch::Sender::new(0),
            drain_timeout,
        }
    }

    /// Flip the shutdown flag. Idempotent.
    pub fn trigger(&self) {
        self.triggered.send_if_modified(|flag| !std::mem::replace(flag, true));
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.triggered.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener(self.triggered.subscribe())
    }

    /// Count a socket as open until the guard is dropped.
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        ConnectionGuard {
            coordinator: Arc::clone(self),
        }
    }

    pub fn active_connections(&self) -> usize {
        *self.active.borrow()
    }

    /// Wait for every tracked socket to close.
    ///
    /// Returns `false` if the drain timeout elapsed first.
    pub async fn wait_for_drain(&self) -> bool {
        let mut active = self.active.subscribe();
        let drained = active.wait_for(|n| *n == 0);
        match tokio::time::timeout(self.drain_timeout, drained).await {
            Ok(_) => true,
            Err(_) => false,
        }
    }
}

/// Receiving half of the shutdown flag.
#[derive(Clone)]
pub struct ShutdownListener(watch::Receiver<bool>);

impl ShutdownListener {
    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // coordinator dropped without triggering
                std::future::pending::<()>().await;
            }
        }
    }
}

pub struct ConnectionGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.coordinator
            .active
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}
