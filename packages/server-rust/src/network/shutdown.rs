//! Health state and graceful-shutdown bookkeeping.
//!
//! Health transitions are lock-free via `ArcSwap`; in-flight ruler requests
//! are counted with RAII guards so shutdown can wait for them to finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server health, in lifecycle order: Starting -> Ready -> Draining -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
pub struct ShutdownController {
    health: ArcSwap<HealthState>,
    in_flight: Arc<AtomicU64>,
    drained: watch::Sender<u64>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        let (drained, _) = watch::channel(0);
        Self {
            health: ArcSwap::from_pointee(HealthState::Starting),
            in_flight: Arc::new(AtomicU64::new(0)),
            drained,
        }
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health.load()
    }

    pub fn set_ready(&self) {
        self.health.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining`; readiness probes fail from here on.
    pub fn trigger_shutdown(&self) {
        self.health.store(Arc::new(HealthState::Draining));
    }

    pub fn set_stopped(&self) {
        self.health.store(Arc::new(HealthState::Stopped));
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Counts one request as in flight until the guard drops.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { controller: self }
    }

    /// Waits until no request is in flight or `timeout` passes.
    ///
    /// Returns `true` if every request finished in time.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut rx = self.drained.subscribe();
        let drained = tokio::time::timeout(timeout, async {
            while self.in_flight_count() > 0 {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .is_ok();
        drained && self.in_flight_count() == 0
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    controller: &'a ShutdownController,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.controller.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.controller.drained.send_replace(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let ctrl = ShutdownController::new();
        assert_eq!(ctrl.health_state(), HealthState::Starting);
        ctrl.set_ready();
        assert_eq!(ctrl.health_state(), HealthState::Ready);
        ctrl.trigger_shutdown();
        assert_eq!(ctrl.health_state(), HealthState::Draining);
        ctrl.set_stopped();
        assert_eq!(ctrl.health_state().as_str(), "stopped");
    }

    #[test]
    fn guards_track_in_flight_requests() {
        let ctrl = ShutdownController::new();
        let a = ctrl.in_flight_guard();
        let b = ctrl.in_flight_guard();
        assert_eq!(ctrl.in_flight_count(), 2);
        drop(a);
        assert_eq!(ctrl.in_flight_count(), 1);
        drop(b);
        assert_eq!(ctrl.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let ctrl = ShutdownController::new();
        assert!(ctrl.wait_for_drain(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn drain_waits_for_guard_release() {
        let ctrl = Arc::new(ShutdownController::new());
        let worker = {
            let ctrl = Arc::clone(&ctrl);
            tokio::spawn(async move {
                let _guard = ctrl.in_flight_guard();
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(ctrl.wait_for_drain(Duration::from_secs(2)).await);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn drain_times_out_with_request_in_flight() {
        let ctrl = ShutdownController::new();
        let _guard = ctrl.in_flight_guard();
        assert!(!ctrl.wait_for_drain(Duration::from_millis(20)).await);
    }
}
