// Copyright 2023 Trestle Network
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use tokio::sync::watch;

/// A stop signal that can be raised once and observed by many tasks.
///
/// Every long-running loop checks its [`ShutdownListener`] at the head of
/// each iteration; in-flight RPC calls are allowed to complete.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// A new, lowered signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raises the signal. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    /// A new listener observing this signal.
    pub fn listen(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's view of the stop signal.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Non-blocking check, used at loop heads.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the signal is raised. A dropped [`ShutdownSignal`]
    /// counts as raised.
    pub async fn recv(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_lowered() {
        let signal = ShutdownSignal::new();
        assert!(!signal.listen().is_shutdown());
    }

    #[test]
    fn raise_is_idempotent_and_seen_by_all_listeners() {
        let signal = ShutdownSignal::new();
        let a = signal.listen();
        let b = signal.listen();
        signal.shutdown();
        signal.shutdown();
        assert!(a.is_shutdown());
        assert!(b.is_shutdown());
        // listeners created after the raise see it too
        assert!(signal.listen().is_shutdown());
    }

    #[tokio::test]
    async fn recv_completes_once_raised() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.listen();
        let waiter = tokio::spawn(async move {
            listener.recv().await;
        });
        signal.shutdown();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn recv_returns_immediately_when_already_raised() {
        let signal = ShutdownSignal::new();
        signal.shutdown();
        let mut listener = signal.listen();
        listener.recv().await;
    }
}
