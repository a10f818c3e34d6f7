// ── Coordinator ──
//
// Periodic aggregation for one device: every tick fans out one request
// per catalog endpoint, joins them, reduces the bodies into a snapshot and
// publishes it if every required endpoint produced data.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use xstorage_api::SessionClient;

use crate::catalog::EndpointCatalog;
use crate::config::{DeviceConfig, host_identity};
use crate::cycle::{CycleResult, CycleState};
use crate::error::CoreError;
use crate::snapshot::{DeviceInfo, Snapshot};

type CycleOutcome = Result<Arc<Snapshot>, CoreError>;

/// Polling coordinator for a single device.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Readers call
/// [`snapshot()`](Self::snapshot) without locking; one-off writes go
/// straight through [`client()`](Self::client).
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    client: Arc<SessionClient>,
    catalog: EndpointCatalog,
    poll_interval: Duration,
    configuration_url: String,
    snapshot: ArcSwapOption<Snapshot>,
    state: watch::Sender<CycleState>,
    /// Held for the duration of a cycle; keeps the last outcome so
    /// coalesced callers can share it.
    cycle: Mutex<Option<CycleOutcome>>,
    /// Number of cycles completed so far.
    completed: AtomicU64,
    cancel: CancellationToken,
    /// Child token for the running periodic task, replaced on `start()`.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the session client and catalog for `config`. Does not touch
    /// the network; call [`connect()`](Self::connect) or
    /// [`first_refresh()`](Self::first_refresh) next.
    pub fn new(config: &DeviceConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let client = SessionClient::new(
            config.base_url()?,
            config.credentials.clone(),
            &config.transport(),
            config.token_store(),
        )?;
        Ok(Self::with_client(Arc::new(client), config.poll_interval))
    }

    /// Coordinate an existing client. The catalog follows the client's
    /// account type.
    pub fn with_client(client: Arc<SessionClient>, poll_interval: Duration) -> Self {
        let catalog = EndpointCatalog::for_account(client.credentials().account_type);
        let configuration_url = configuration_url(client.base_url());
        let (state, _) = watch::channel(CycleState::Idle);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(CoordinatorInner {
                client,
                catalog,
                poll_interval,
                configuration_url,
                snapshot: ArcSwapOption::empty(),
                state,
                cycle: Mutex::new(None),
                completed: AtomicU64::new(0),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.inner.client
    }

    pub fn catalog(&self) -> &EndpointCatalog {
        &self.inner.catalog
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Make sure the client holds a usable session.
    ///
    /// Reuses a restored, unexpired session; otherwise signs in (or
    /// refreshes) and surfaces a classified authentication error.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.client.ensure_valid().await?;
        info!(url = %self.inner.client.base_url(), "connected to device");
        Ok(())
    }

    /// Authenticate and run the initial cycle, returning its failure.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, CoreError> {
        self.connect().await?;
        self.refresh().await
    }

    /// Spawn the periodic refresh task. No-op if it is already running or
    /// the poll interval is zero.
    pub async fn start(&self) {
        let period = self.inner.poll_interval;
        if period.is_zero() {
            debug!("poll interval is zero; periodic refresh disabled");
            return;
        }

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }

        // Fresh child token so a stopped coordinator can be started again.
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        handles.push(tokio::spawn(refresh_task(self.clone(), period, child)));
        debug!(interval_secs = period.as_secs(), "periodic refresh started");
    }

    /// Stop the periodic task and wait for it to finish its current cycle.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator stopped");
    }

    // ── Cycles ───────────────────────────────────────────────────

    /// Run one cycle now.
    ///
    /// Exactly one cycle runs at a time. A caller arriving while a cycle is
    /// in flight waits for it and receives its outcome instead of starting
    /// another. On failure the previously published snapshot stays.
    pub async fn refresh(&self) -> CycleOutcome {
        let seen = self.inner.completed.load(Ordering::Acquire);
        let mut last = self.inner.cycle.lock().await;

        if self.inner.completed.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                debug!("joined an in-flight cycle");
                return outcome.clone();
            }
        }

        let outcome = self.run_cycle().await;
        *last = Some(outcome.clone());
        self.inner.completed.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Query every catalog endpoint concurrently and reduce the results.
    /// Publishes nothing.
    pub async fn collect(&self) -> CycleResult {
        let client = &self.inner.client;
        let entries = self.inner.catalog.entries();

        let responses = join_all(entries.iter().map(|entry| client.fetch(entry.name))).await;

        CycleResult::from_outcomes(entries.iter().zip(responses).collect(), Utc::now())
    }

    async fn run_cycle(&self) -> CycleOutcome {
        self.inner.state.send_replace(CycleState::Fetching);
        let cycle = self.collect().await;
        let at = cycle.snapshot.fetched_at();

        if let Some(err) = cycle.error() {
            let endpoints = cycle.failed_required.iter().map(|e| e.name().to_owned()).collect();
            self.inner.state.send_replace(CycleState::Failed { at, endpoints });
            return Err(err);
        }

        if !cycle.degraded.is_empty() {
            debug!(endpoints = ?cycle.degraded, "optional endpoints returned no data");
        }

        let snapshot = Arc::new(cycle.snapshot);
        self.inner.snapshot.store(Some(Arc::clone(&snapshot)));
        self.inner.state.send_replace(CycleState::Succeeded { at });
        info!(battery_level = ?snapshot.battery_level(), "snapshot updated");
        Ok(snapshot)
    }

    // ── Readers ──────────────────────────────────────────────────

    /// The last published snapshot, if any cycle has succeeded.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.load_full()
    }

    pub fn state(&self) -> CycleState {
        self.inner.state.borrow().clone()
    }

    /// Watch cycle state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.inner.state.subscribe()
    }

    /// Device identity from the current snapshot, or the generic defaults
    /// before the first successful cycle.
    pub fn device_info(&self) -> DeviceInfo {
        let url = self.inner.configuration_url.clone();
        match self.snapshot() {
            Some(snapshot) => snapshot.device_info(url),
            None => DeviceInfo::from_device(None, url),
        }
    }

    pub fn battery_level(&self) -> Option<f64> {
        self.snapshot().and_then(|s| s.battery_level())
    }
}

fn configuration_url(base_url: &Url) -> String {
    format!("https://{}", host_identity(base_url).unwrap_or_default())
}

// ── Background tasks ─────────────────────────────────────────────

async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = coordinator.refresh().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use xstorage_api::{AccountType, Credentials};

    use super::*;

    fn config(host: &str) -> DeviceConfig {
        DeviceConfig::new(
            host,
            Credentials::customer("owner", SecretString::from("pw".to_owned())),
        )
    }

    #[test]
    fn new_builds_customer_catalog_without_network() {
        let coordinator = Coordinator::new(&config("192.168.1.50")).ok();
        let coordinator = coordinator.as_ref();

        assert_eq!(
            coordinator.map(|c| c.catalog().account_type()),
            Some(AccountType::Customer)
        );
        assert!(coordinator.is_some_and(|c| c.snapshot().is_none()));
        assert_eq!(coordinator.map(Coordinator::state), Some(CycleState::Idle));
    }

    #[test]
    fn device_info_before_first_cycle_uses_host() {
        let coordinator = Coordinator::new(&config("http://10.0.0.2:8080")).ok();
        let info = coordinator.map(|c| Coordinator::device_info(&c));
        assert_eq!(
            info.map(|i| (i.model, i.configuration_url)),
            Some(("xStorage Home".to_owned(), "https://10.0.0.2:8080".to_owned()))
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config("xstorage.local");
        cfg.credentials.account_type = AccountType::Technician;
        assert!(matches!(Coordinator::new(&cfg), Err(CoreError::Config { .. })));
    }
}
