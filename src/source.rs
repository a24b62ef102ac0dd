//! Background METAR acquisition
//!
//! A [`SourcePoller`] owns the fetch/parse cycle and publishes complete
//! snapshots through a mutex boundary; a worker thread drives it and a
//! [`PollerHandle`] is what the render loop consumes. Fetch and parse happen
//! entirely outside the lock, so readers never observe a partial snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::metar::Metar;
use crate::parser::parse_metar_xml;
use crate::Result;

/// The complete set of latest-known reports, published atomically.
/// Consumers receive clones and must treat them as immutable.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the poller captured this data
    pub captured_at: DateTime<Utc>,
    /// Station id → report; stations missing from the response are absent
    pub reports: HashMap<String, Metar>,
}

/// A METAR data source the render loop can pull from
pub trait MetarSource {
    /// Whether an unconsumed snapshot is available
    fn new_data(&self) -> bool;

    /// Acknowledge the current snapshot; lowers the new-data flag
    fn clear_new_data(&self);

    /// Latest published snapshot, if any
    fn live_data(&self) -> Option<Snapshot>;

    /// Whether the source's data has exceeded its validity tolerance
    fn data_is_stale(&self) -> bool;

    /// Whether the source is still producing data
    fn is_running(&self) -> bool;
}

/// Raw report transport consumed by the poller
pub trait ReportFetcher {
    /// Cheap reachability probe of the remote source
    fn check_connection(&self) -> bool;

    /// Fetch the raw response document for the configured stations
    fn fetch_raw(&self) -> Result<String>;
}

/// HTTP client for the aviationweather.gov dataserver
pub struct AviationWeatherClient {
    client: Client,
    /// Server root used for the connectivity probe
    connectivity_url: String,
    /// Full query URL for the joined station list
    query_url: String,
}

impl AviationWeatherClient {
    pub fn new(config: &SourceConfig, stations: &[String]) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let connectivity_url = config
            .base_url
            .split('?')
            .next()
            .unwrap_or(config.base_url.as_str())
            .to_string();

        // Station ids are joined with a URL-safe separator
        let joined = stations.join(" ");
        let query_url = format!(
            "{}stationString={}",
            config.base_url,
            urlencoding::encode(&joined)
        );

        Ok(Self {
            client,
            connectivity_url,
            query_url,
        })
    }
}

impl ReportFetcher for AviationWeatherClient {
    fn check_connection(&self) -> bool {
        match self.client.get(&self.connectivity_url).send() {
            Ok(_) => {
                debug!("weather dataserver reachable");
                true
            }
            Err(err) => {
                warn!(error = %err, "unable to reach weather dataserver");
                false
            }
        }
    }

    fn fetch_raw(&self) -> Result<String> {
        debug!(url = %self.query_url, "fetching METAR data");
        let text = self
            .client
            .get(&self.query_url)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(text)
    }
}

#[derive(Debug, Default)]
struct Published {
    snapshot: Option<Snapshot>,
    new_data: bool,
    stale: bool,
    running: bool,
}

/// Mutex boundary between the poller thread and its consumers
#[derive(Debug, Default)]
struct SharedState {
    inner: Mutex<Published>,
}

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, Published> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Polls a [`ReportFetcher`] on an interval and publishes snapshots.
///
/// Plain data type with a `poll_once` operation; the thread driving it is a
/// separate adapter (see [`SourcePoller::spawn`]).
pub struct SourcePoller<F> {
    fetcher: F,
    shared: Arc<SharedState>,
    update_interval: Duration,
    stale_after: Duration,
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
}

impl<F: ReportFetcher> SourcePoller<F> {
    pub fn new(fetcher: F, update_interval: Duration, stale_after: Duration) -> Self {
        Self {
            fetcher,
            shared: Arc::new(SharedState::default()),
            update_interval,
            stale_after,
            last_attempt: None,
            last_success: None,
        }
    }

    /// One poll iteration: interval gate, connectivity check, fetch, parse,
    /// publish, then the staleness check.
    ///
    /// Every failure mode keeps the previously published snapshot; only the
    /// stale tolerance clears it.
    pub fn poll_once(&mut self) {
        let due = self
            .last_attempt
            .map_or(true, |attempt| attempt.elapsed() >= self.update_interval);

        if due {
            self.last_attempt = Some(Instant::now());
            if self.fetcher.check_connection() {
                match self.try_update() {
                    Ok(count) => {
                        self.last_success = Some(Instant::now());
                        info!(stations = count, "published new METAR snapshot");
                    }
                    Err(err) => {
                        warn!(error = %err, "METAR update failed, keeping previous snapshot");
                    }
                }
            } else {
                warn!("weather dataserver unreachable, keeping previous snapshot");
            }
        }

        // Staleness is evaluated independently of the fetch outcome. Before
        // the first success there is nothing to go stale.
        if let Some(success) = self.last_success {
            if success.elapsed() > self.stale_after {
                let mut guard = self.shared.lock();
                if !guard.stale {
                    warn!("METAR data exceeded its stale tolerance, clearing snapshot");
                }
                guard.stale = true;
                guard.snapshot = None;
            }
        }
    }

    fn try_update(&mut self) -> Result<usize> {
        // Fetch and parse happen entirely outside the lock
        let xml = self.fetcher.fetch_raw()?;
        let reports = parse_metar_xml(&xml)?;
        let count = reports.len();
        let snapshot = Snapshot {
            captured_at: Utc::now(),
            reports,
        };

        let mut guard = self.shared.lock();
        guard.snapshot = Some(snapshot);
        guard.new_data = true;
        guard.stale = false;
        Ok(count)
    }

    /// Move the poller onto its own thread, returning the consumer handle
    pub fn spawn(mut self) -> Result<PollerHandle>
    where
        F: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("metar-poller".to_string())
            .spawn(move || {
                self.shared.lock().running = true;
                info!("METAR source poller started");
                while !stop_flag.load(Ordering::Relaxed) {
                    self.poll_once();
                    // Sleep in short slices so stop requests are honored
                    // promptly, not just at the top of a full wait
                    for _ in 0..10 {
                        if stop_flag.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(100));
                    }
                }
                self.shared.lock().running = false;
                info!("METAR source poller stopped");
            })?;

        Ok(PollerHandle {
            shared,
            stop,
            thread: Some(thread),
        })
    }
}

/// Consumer-side handle to a running poller thread.
/// Stops the worker cooperatively on drop.
pub struct PollerHandle {
    shared: Arc<SharedState>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Request the worker to stop and wait for it to exit
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("METAR poller thread panicked");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl MetarSource for PollerHandle {
    fn new_data(&self) -> bool {
        self.shared.lock().new_data
    }

    fn clear_new_data(&self) {
        self.shared.lock().new_data = false;
    }

    fn live_data(&self) -> Option<Snapshot> {
        self.shared.lock().snapshot.clone()
    }

    fn data_is_stale(&self) -> bool {
        self.shared.lock().stale
    }

    fn is_running(&self) -> bool {
        self.shared.lock().running
    }
}

/// In-memory source serving canned reports, for demos and tests
#[derive(Debug, Default)]
pub struct StaticSource {
    inner: Mutex<Published>,
}

impl StaticSource {
    #[must_use]
    pub fn new(reports: HashMap<String, Metar>) -> Self {
        let source = Self::default();
        source.set_reports(reports);
        source
    }

    fn lock(&self) -> MutexGuard<'_, Published> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the served reports and raise the new-data flag
    pub fn set_reports(&self, reports: HashMap<String, Metar>) {
        let mut guard = self.lock();
        guard.snapshot = Some(Snapshot {
            captured_at: Utc::now(),
            reports,
        });
        guard.new_data = true;
        guard.stale = false;
    }

    /// Force the stale state, clearing the served snapshot
    pub fn set_stale(&self) {
        let mut guard = self.lock();
        guard.stale = true;
        guard.snapshot = None;
    }
}

impl MetarSource for StaticSource {
    fn new_data(&self) -> bool {
        self.lock().new_data
    }

    fn clear_new_data(&self) {
        self.lock().new_data = false;
    }

    fn live_data(&self) -> Option<Snapshot> {
        self.lock().snapshot.clone()
    }

    fn data_is_stale(&self) -> bool {
        self.lock().stale
    }

    fn is_running(&self) -> bool {
        true
    }
}
