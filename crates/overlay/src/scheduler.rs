//! Paint-cycle scheduling for the playback loop.
//!
//! The loop draws once per displayed frame. Hosts with a real paint
//! callback drive it through [`VsyncScheduler`]; otherwise
//! [`RefreshTicker`] approximates the display refresh rate.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

#[async_trait]
pub trait FrameScheduler: Send {
    /// Resolve when the next frame is about to be displayed.
    async fn next_frame(&mut self);

    /// Drop any frame signal already queued for the loop.
    fn cancel_pending(&mut self) {}
}

/// Fixed-rate ticker at the display refresh rate.
pub struct RefreshTicker {
    interval: Interval,
    period: Duration,
}

impl RefreshTicker {
    pub fn new(refresh_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1)));
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl FrameScheduler for RefreshTicker {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }

    fn cancel_pending(&mut self) {
        self.interval.reset();
    }
}

/// Scheduler fed by a host paint callback through a [`VsyncTrigger`].
pub struct VsyncScheduler {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sending half of a [`VsyncScheduler`]; call [`VsyncTrigger::frame`] once
/// per displayed frame.
#[derive(Clone)]
pub struct VsyncTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl VsyncScheduler {
    pub fn new() -> (Self, VsyncTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, VsyncTrigger { tx })
    }
}

impl VsyncTrigger {
    /// Signal one displayed frame. Returns `false` once the scheduler is gone.
    pub fn frame(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl FrameScheduler for VsyncScheduler {
    async fn next_frame(&mut self) {
        if self.rx.recv().await.is_none() {
            // Host went away: no more frames will be displayed.
            std::future::pending::<()>().await;
        }
    }

    fn cancel_pending(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
