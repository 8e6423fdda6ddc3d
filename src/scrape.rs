//! Scrape delivery: continuous serving or a one-shot snapshot.
//!
//! In continuous mode every HTTP request runs one resolution pass. In one-shot
//! mode exactly two passes run: the first only primes counter baselines and
//! its output is thrown away, then the configured delay elapses, then the
//! second pass is emitted once. Counters reported on a first observation are
//! always zero, so emitting the first pass would be wrong rather than early.

use anyhow::Result;
use prometheus::Registry;
use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::collector::ProcessCollector;
use crate::error::CollectError;
use crate::metrics::encode_registry;

/// One resolution pass followed by encoding.
pub trait Scraper: Send + Sync {
    fn scrape(&self) -> Result<String, CollectError>;
}

/// Runs the process collector and encodes its registry.
///
/// Each pass resets and refills the group series, so a pass and its encoding
/// run under one lock; a concurrent request never sees another pass's reset.
pub struct RegistryScraper {
    collector: Arc<ProcessCollector>,
    registry: Registry,
    pass: Mutex<()>,
}

impl RegistryScraper {
    pub fn new(collector: Arc<ProcessCollector>, registry: Registry) -> Self {
        Self {
            collector,
            registry,
            pass: Mutex::new(()),
        }
    }
}

impl Scraper for RegistryScraper {
    fn scrape(&self) -> Result<String, CollectError> {
        let _pass = self.pass.lock().unwrap_or_else(PoisonError::into_inner);
        // A failed pass is still reported through namedprocess_scrape_errors.
        if let Err(e) = self.collector.collect() {
            warn!("Collection pass failed: {}", e);
        }
        encode_registry(&self.registry)
    }
}

impl<S: Scraper + ?Sized> Scraper for Arc<S> {
    fn scrape(&self) -> Result<String, CollectError> {
        (**self).scrape()
    }
}

/// How scrape output is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    ContinuousServing,
    OneShot { delay: Duration },
}

impl DeliveryMode {
    /// A zero delay selects continuous serving.
    pub fn from_delay(delay: Duration) -> Self {
        if delay.is_zero() {
            DeliveryMode::ContinuousServing
        } else {
            DeliveryMode::OneShot { delay }
        }
    }
}

/// One-shot phases. Each transition consumes the previous phase.
pub mod phase {
    pub struct Idle;
    pub struct Primed;
}

/// Two-pass one-shot protocol: `Idle -> Primed -> emitted`.
pub struct OneShot<'a, S: ?Sized, P> {
    scraper: &'a S,
    delay: Duration,
    _phase: P,
}

impl<'a, S: Scraper + ?Sized> OneShot<'a, S, phase::Idle> {
    pub fn new(scraper: &'a S, delay: Duration) -> Self {
        Self {
            scraper,
            delay,
            _phase: phase::Idle,
        }
    }

    /// Runs the baseline pass and discards its output.
    pub fn prime(self) -> OneShot<'a, S, phase::Primed> {
        match self.scraper.scrape() {
            Ok(discarded) => debug!("Baseline pass done, discarded {} bytes", discarded.len()),
            Err(e) => warn!("Baseline pass failed: {}", e),
        }
        OneShot {
            scraper: self.scraper,
            delay: self.delay,
            _phase: phase::Primed,
        }
    }
}

impl<'a, S: Scraper + ?Sized> OneShot<'a, S, phase::Primed> {
    /// Waits out the full delay, then runs and returns the reported pass.
    pub async fn emit(self) -> Result<String, CollectError> {
        debug!("Waiting {:?} before the reported pass", self.delay);
        tokio::time::sleep(self.delay).await;
        self.scraper.scrape()
    }
}

/// Runs the complete one-shot protocol.
pub async fn run_once<S: Scraper + ?Sized>(
    scraper: &S,
    delay: Duration,
) -> Result<String, CollectError> {
    OneShot::new(scraper, delay).prime().emit().await
}

/// Observable driver states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    ContinuousServing,
    OneShot,
    Terminated,
}

/// Chooses between serving and the one-shot snapshot.
#[derive(Debug)]
pub struct ScrapeDriver {
    mode: DeliveryMode,
    state: DriverState,
}

impl ScrapeDriver {
    pub fn new(mode: DeliveryMode) -> Self {
        Self {
            mode,
            state: DriverState::Idle,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Drives `scraper` until the process should exit.
    ///
    /// `serve` is only invoked in continuous mode and owns the transport; the
    /// one-shot snapshot is written to `out`.
    pub async fn run<S, W, F, Fut>(&mut self, scraper: Arc<S>, out: &mut W, serve: F) -> Result<()>
    where
        S: Scraper + 'static,
        W: Write,
        F: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let result = match self.mode {
            DeliveryMode::ContinuousServing => {
                self.state = DriverState::ContinuousServing;
                serve(scraper).await
            }
            DeliveryMode::OneShot { delay } => {
                self.state = DriverState::OneShot;
                info!("One-shot mode: printing metrics to stdout after {:?}", delay);
                let output = run_once(&*scraper, delay).await?;
                out.write_all(output.as_bytes())?;
                out.flush()?;
                Ok(())
            }
        };
        self.state = DriverState::Terminated;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Records when each pass ran and returns "pass N".
    #[derive(Default)]
    struct CountingScraper {
        calls: AtomicUsize,
        at: Mutex<Vec<Instant>>,
    }

    impl Scraper for CountingScraper {
        fn scrape(&self) -> Result<String, CollectError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.at.lock().unwrap().push(Instant::now());
            Ok(format!("pass {}\n", n))
        }
    }

    #[test]
    fn test_delivery_mode_from_delay() {
        assert_eq!(
            DeliveryMode::from_delay(Duration::ZERO),
            DeliveryMode::ContinuousServing
        );
        assert_eq!(
            DeliveryMode::from_delay(Duration::from_secs(2)),
            DeliveryMode::OneShot {
                delay: Duration::from_secs(2)
            }
        );
    }

    #[tokio::test]
    async fn test_run_once_emits_second_pass_only() {
        let scraper = CountingScraper::default();
        let delay = Duration::from_millis(30);

        let output = run_once(&scraper, delay).await.unwrap();

        assert_eq!(output, "pass 2\n");
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 2);
        let at = scraper.at.lock().unwrap();
        assert!(at[1].duration_since(at[0]) >= delay);
    }

    #[tokio::test]
    async fn test_priming_happens_before_emit() {
        let scraper = CountingScraper::default();
        let primed = OneShot::new(&scraper, Duration::from_millis(1)).prime();
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(primed.emit().await.unwrap(), "pass 2\n");
    }

    #[tokio::test]
    async fn test_driver_one_shot_writes_once() {
        let scraper = Arc::new(CountingScraper::default());
        let mut driver = ScrapeDriver::new(DeliveryMode::OneShot {
            delay: Duration::from_millis(5),
        });
        let mut out = Vec::new();

        driver
            .run(scraper.clone(), &mut out, |_| async {
                Err(anyhow::anyhow!("one-shot mode must not serve"))
            })
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "pass 2\n");
        assert_eq!(driver.state(), DriverState::Terminated);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_driver_continuous_delegates_to_server() {
        let scraper = Arc::new(CountingScraper::default());
        let mut driver = ScrapeDriver::new(DeliveryMode::ContinuousServing);
        assert_eq!(driver.state(), DriverState::Idle);
        let mut out = Vec::new();

        driver
            .run(scraper.clone(), &mut out, |s| async move {
                s.scrape()?;
                s.scrape()?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(out.is_empty());
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 2);
        assert_eq!(driver.state(), DriverState::Terminated);
    }
}
