// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock and ticker abstractions.
//!
//! Both the Event Router and Queue Processor run on a periodic poll (spec
//! §4.4, §4.5). Rather than `tokio::time::sleep` in a loop, they drive an
//! injected `Ticker` so tests can fire ticks deterministically instead of
//! racing the clock (Design Notes: "background polling ... expressed as an
//! interface `ticker(interval, stopSignal)` so tests can drive ticks").

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;

/// Wall-clock access, abstracted so tests can inject a fixed instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A signal that can be waited on to stop a ticker loop.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

impl StopSignal {
    pub async fn stopped(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Fires every `interval` until the stop signal trips. `on_tick` runs
/// sequentially — the next tick never starts before the previous one
/// finishes, which is how the Event Router's single-flight gate (§4.4) and
/// the Queue Processor's serialized claim step (§5) are upheld.
pub async fn run_ticker<F, Fut>(interval: Duration, mut stop: StopSignal, mut on_tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                on_tick().await;
            }
            _ = stop.stopped() => {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let (handle, stop) = stop_signal();
        let c = count.clone();
        let task = tokio::spawn(run_ticker(Duration::from_millis(10), stop, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));
        tokio::time::advance(Duration::from_millis(35)).await;
        handle.stop();
        task.await.unwrap();
        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
