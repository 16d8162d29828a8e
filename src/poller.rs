//! # Poller Module
//!
//! Periodic sampling of every [`InputSource`] and reference-counted lifecycle
//! of the polling timer.
//!
//! ## Lifecycle
//!
//! - [`Poller::open`] increments the user count; the first user arms the tick.
//! - Every tick samples all sources, reports the changes, and re-arms.
//! - [`Poller::close`] decrements the user count; the last user disarms the
//!   tick and waits until it has stopped.
//!
//! The tick is armed exactly while the user count is above zero.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, WiiuPadError};
use crate::gamepad::device::InputSink;
use crate::gamepad::PadState;
use crate::source::InputSource;

/// Default refresh period (HZ/100).
pub const DEFAULT_REFRESH_MS: u64 = 10;

/// Samples sources and forwards the changes to an input sink.
///
/// Sources are dropped before the sink, so hardware lines are released
/// before the input device is unregistered.
pub struct PadDriver {
    sources: Vec<Box<dyn InputSource>>,
    sink: Box<dyn InputSink>,
    reported: PadState,
    ticks: u64,
}

impl std::fmt::Debug for PadDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("PadDriver")
            .field("sources", &sources)
            .field("reported", &self.reported)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl PadDriver {
    /// Creates a driver reporting to `sink` with no sources.
    #[must_use]
    pub fn new(sink: Box<dyn InputSink>) -> Self {
        Self {
            sources: Vec::new(),
            sink,
            reported: PadState::default(),
            ticks: 0,
        }
    }

    /// Adds a source sampled on every tick, after those already added.
    pub fn add_source(&mut self, source: Box<dyn InputSource>) {
        debug!("Added input source {}", source.name());
        self.sources.push(source);
    }

    /// Number of sources polled per tick.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Last state successfully reported to the sink.
    #[must_use]
    pub fn reported(&self) -> &PadState {
        &self.reported
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one tick: sample every source, report what changed.
    ///
    /// Source errors are logged and do not stop the other sources. The
    /// reported state only advances when the sink accepts the events, so a
    /// failed emission is retried on the next tick.
    ///
    /// Returns the number of events reported.
    pub fn poll_once(&mut self) -> usize {
        self.ticks += 1;

        let mut next = self.reported.clone();
        for source in &mut self.sources {
            if let Err(e) = source.sample(&mut next) {
                warn!("Failed to sample {}: {}", source.name(), e);
            }
        }

        let events = self.reported.diff(&next);
        if events.is_empty() {
            return 0;
        }

        match self.sink.emit(&events) {
            Ok(()) => {
                self.reported = next;
                events.len()
            }
            Err(e) => {
                warn!("Failed to report {} events: {}", events.len(), e);
                0
            }
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    users: usize,
    tick: Option<JoinHandle<()>>,
}

/// Reference-counted owner of the polling tick.
///
/// # Examples
///
/// ```no_run
/// use wiiu_gamepad::gamepad::device::{DeviceIdentity, UinputGamepad};
/// use wiiu_gamepad::gamepad::PadLayout;
/// use wiiu_gamepad::poller::{PadDriver, Poller};
/// use tokio::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let pad = UinputGamepad::register(&DeviceIdentity::default(), &PadLayout::default())?;
///     let poller = Poller::new(PadDriver::new(Box::new(pad)), Duration::from_millis(10));
///
///     poller.open().await;
///     // ... events are reported every 10ms ...
///     poller.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Poller {
    driver: Arc<Mutex<PadDriver>>,
    lifecycle: Mutex<Lifecycle>,
    period: Duration,
}

impl Poller {
    /// Creates a poller for `driver` ticking every `period`. Nothing runs
    /// until the first [`Poller::open`].
    #[must_use]
    pub fn new(driver: PadDriver, period: Duration) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            lifecycle: Mutex::new(Lifecycle::default()),
            period,
        }
    }

    /// Registers a user; the first one arms the tick.
    pub async fn open(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        if lifecycle.users == 0 {
            lifecycle.tick = Some(self.arm());
            info!("Polling started every {:?}", self.period);
        }
        lifecycle.users += 1;
        debug!("Device opened ({} users)", lifecycle.users);
    }

    /// Unregisters a user; the last one disarms the tick and waits for it
    /// to stop.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` if there is no user left to close.
    pub async fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        if lifecycle.users == 0 {
            return Err(WiiuPadError::NotOpen);
        }
        lifecycle.users -= 1;
        debug!("Device closed ({} users)", lifecycle.users);

        if lifecycle.users == 0 {
            if let Some(tick) = lifecycle.tick.take() {
                tick.abort();
                match tick.await {
                    Err(e) if !e.is_cancelled() => warn!("Polling tick ended abnormally: {}", e),
                    _ => {}
                }
            }
            info!("Polling stopped");
        }
        Ok(())
    }

    /// Current number of users.
    pub async fn users(&self) -> usize {
        self.lifecycle.lock().await.users
    }

    /// Whether the tick is armed.
    pub async fn is_active(&self) -> bool {
        self.lifecycle.lock().await.tick.is_some()
    }

    /// Shared handle to the driver, for inspection.
    #[must_use]
    pub fn driver(&self) -> Arc<Mutex<PadDriver>> {
        Arc::clone(&self.driver)
    }

    fn arm(&self) -> JoinHandle<()> {
        let driver = Arc::clone(&self.driver);
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                driver.lock().await.poll_once();
            }
        })
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        if let Some(tick) = lifecycle.tick.take() {
            tick.abort();
            debug!("Polling aborted on drop ({} users)", lifecycle.users);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::device::mocks::MockSink;
    use crate::gamepad::{PadButton, PadEvent};
    use crate::source::mocks::MockButton;
    use tokio_test::{assert_err, assert_ok};

    fn driver_with(sink: &MockSink, button: &MockButton) -> PadDriver {
        let mut driver = PadDriver::new(Box::new(sink.clone()));
        driver.add_source(Box::new(button.clone()));
        driver
    }

    #[test]
    fn test_default_refresh_period() {
        // HZ/100
        assert_eq!(DEFAULT_REFRESH_MS, 10);
    }

    #[test]
    fn test_poll_once_reports_changes_only() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::ThumbL);
        let mut driver = driver_with(&sink, &button);

        // Nothing changed yet
        assert_eq!(driver.poll_once(), 0);
        assert!(sink.batches().is_empty());

        button.press(true);
        assert_eq!(driver.poll_once(), 1);
        assert_eq!(driver.poll_once(), 0, "Held button must not repeat");

        button.press(false);
        assert_eq!(driver.poll_once(), 1);

        assert_eq!(
            sink.events(),
            vec![
                PadEvent::Key { button: PadButton::ThumbL, pressed: true },
                PadEvent::Key { button: PadButton::ThumbL, pressed: false },
            ]
        );
        assert_eq!(driver.ticks(), 4);
    }

    #[test]
    fn test_poll_once_without_sources() {
        let sink = MockSink::new();
        let mut driver = PadDriver::new(Box::new(sink.clone()));

        assert_eq!(driver.source_count(), 0);
        assert_eq!(driver.poll_once(), 0);
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn test_failed_emit_is_retried() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::A);
        let mut driver = driver_with(&sink, &button);

        sink.set_fail(true);
        button.press(true);
        assert_eq!(driver.poll_once(), 0);
        assert!(!driver.reported().button(PadButton::A));

        sink.set_fail(false);
        assert_eq!(driver.poll_once(), 1);
        assert!(driver.reported().button(PadButton::A));
    }

    #[test]
    fn test_source_error_does_not_stop_other_sources() {
        let sink = MockSink::new();
        let broken = MockButton::new(PadButton::B);
        let working = MockButton::new(PadButton::Y);
        broken.set_fail(true);
        working.press(true);

        let mut driver = PadDriver::new(Box::new(sink.clone()));
        driver.add_source(Box::new(broken.clone()));
        driver.add_source(Box::new(working.clone()));

        assert_eq!(driver.poll_once(), 1);
        assert_eq!(broken.samples(), 1);
        assert_eq!(
            sink.events(),
            vec![PadEvent::Key { button: PadButton::Y, pressed: true }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_arms_tick() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::ThumbL);
        let poller = Poller::new(driver_with(&sink, &button), Duration::from_millis(10));

        assert!(!poller.is_active().await);
        poller.open().await;
        assert!(poller.is_active().await);
        assert_eq!(poller.users().await, 1);

        button.press(true);
        tokio::time::sleep(Duration::from_millis(35)).await;

        assert!(button.samples() >= 3, "Expected ~3 ticks, got {}", button.samples());
        assert_eq!(
            sink.events(),
            vec![PadEvent::Key { button: PadButton::ThumbL, pressed: true }]
        );

        assert_ok!(poller.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_close_disarms_tick() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::ThumbL);
        let poller = Poller::new(driver_with(&sink, &button), Duration::from_millis(10));

        poller.open().await;
        poller.open().await;
        assert_eq!(poller.users().await, 2);

        assert_ok!(poller.close().await);
        assert!(poller.is_active().await, "One user left, tick must stay armed");

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_ok!(poller.close().await);
        assert!(!poller.is_active().await);
        assert_eq!(poller.users().await, 0);

        let samples = button.samples();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(button.samples(), samples, "No ticks after the last close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_rearms_tick() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::Start);
        let poller = Poller::new(driver_with(&sink, &button), Duration::from_millis(10));

        poller.open().await;
        assert_ok!(poller.close().await);

        button.press(true);
        poller.open().await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(
            sink.events(),
            vec![PadEvent::Key { button: PadButton::Start, pressed: true }]
        );
        assert_ok!(poller.close().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_while_open_stops_tick() {
        let sink = MockSink::new();
        let button = MockButton::new(PadButton::ThumbL);
        let poller = Poller::new(driver_with(&sink, &button), Duration::from_millis(10));

        poller.open().await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(poller);

        // Let the aborted task wind down
        tokio::task::yield_now().await;
        let samples = button.samples();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(button.samples(), samples, "No ticks after the poller is dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_still_closes() {
        struct PanickingSource;

        impl InputSource for PanickingSource {
            fn name(&self) -> &str {
                "panicking"
            }

            fn sample(&mut self, _state: &mut PadState) -> Result<()> {
                panic!("sample blew up");
            }
        }

        let mut driver = PadDriver::new(Box::new(MockSink::new()));
        driver.add_source(Box::new(PanickingSource));
        let poller = Poller::new(driver, Duration::from_millis(10));

        poller.open().await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_ok!(poller.close().await);
        assert!(!poller.is_active().await);
    }

    #[tokio::test]
    async fn test_close_without_open_fails() {
        let poller = Poller::new(
            PadDriver::new(Box::new(MockSink::new())),
            Duration::from_millis(10),
        );

        let result = poller.close().await;
        assert!(matches!(result, Err(WiiuPadError::NotOpen)));

        poller.open().await;
        assert_ok!(poller.close().await);
        assert_err!(poller.close().await);
    }
}
