//! One-shot readiness signals and toggleable backpressure gates.
//!
//! Both primitives are single-writer, multi-reader notifications built on
//! [`tokio::sync::watch`]: waiters subscribe to the current value and resume as
//! soon as it satisfies their predicate.
//!
//! - [`ReadySignal`] fires exactly once and can never be re-armed. It backs the
//!   per-request "headers-ready" and "body-ready" notifications.
//! - [`Gate`] is opened and closed any number of times. It backs the
//!   writable/readable flags toggled by transport pause/resume notifications.

use std::sync::Arc;
use tokio::sync::watch;

/// A notification that fires at most once.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    state: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self { state: Arc::new(watch::Sender::new(false)) }
    }

    /// Fires the signal, waking every waiter.
    ///
    /// Returns `false` if the signal had already fired, in which case nothing changes.
    pub fn fire(&self) -> bool {
        self.state.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    #[inline]
    pub fn is_fired(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the signal has fired; returns immediately if it already did.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // the sender lives in `self`, so the channel can't close while we wait
        let _ = receiver.wait_for(|fired| *fired).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A gate that suspends waiters while closed.
///
/// Gates start open.
#[derive(Debug, Clone)]
pub struct Gate {
    state: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        Self { state: Arc::new(watch::Sender::new(true)) }
    }

    pub fn open(&self) {
        self.state.send_if_modified(|open| !std::mem::replace(open, true));
    }

    pub fn close(&self) {
        self.state.send_if_modified(|open| std::mem::replace(open, false));
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the gate is open.
    pub async fn wait_open(&self) {
        let mut receiver = self.state.subscribe();
        let _ = receiver.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn ready_signal_fires_once() {
        let signal = ReadySignal::new();
        assert!(!signal.is_fired());

        assert!(signal.fire());
        assert!(signal.is_fired());

        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn ready_signal_wakes_every_waiter() {
        let signal = ReadySignal::new();

        let first = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });
        let second = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });

        tokio::task::yield_now().await;
        signal.fire();

        timeout(Duration::from_secs(1), first).await.unwrap().unwrap();
        timeout(Duration::from_secs(1), second).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn ready_signal_already_fired_returns_immediately() {
        let signal = ReadySignal::new();
        signal.fire();
        timeout(Duration::from_millis(100), signal.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn gate_blocks_while_closed() {
        let gate = Gate::new();
        assert!(gate.is_open());

        gate.close();
        assert!(!gate.is_open());
        assert!(timeout(Duration::from_millis(50), gate.wait_open()).await.is_err());

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait_open().await }
        });
        tokio::task::yield_now().await;

        gate.open();
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();

        // closing and reopening is allowed any number of times
        gate.close();
        gate.open();
        assert!(gate.is_open());
    }
}
