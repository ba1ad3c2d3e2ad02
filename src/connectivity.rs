use crate::config::NetworkConfig;
use crate::error::LinkError;
use crate::hardware::Radio;
use crate::recovery::BackoffPolicy;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Wireless link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the link state and the reconnect sequence
pub struct ConnectivityMonitor {
    radio: Arc<dyn Radio>,
    ssid: String,
    password: String,
    backoff: BackoffPolicy,
    max_attempts: Option<u32>,
    health_interval: Duration,
    state: RwLock<LinkState>,
    last_check: Mutex<Option<Instant>>,
    // Held for the whole reconnect sequence; later callers queue behind it
    reconnect: tokio::sync::Mutex<()>,
    connect_attempts: AtomicU64,
}

impl ConnectivityMonitor {
    pub fn new(radio: Arc<dyn Radio>, config: &NetworkConfig) -> Self {
        Self {
            radio,
            ssid: config.ssid.clone(),
            password: config.password.clone(),
            backoff: BackoffPolicy::new(config.reconnect_base(), config.reconnect_cap()),
            max_attempts: config.max_reconnect_attempts,
            health_interval: config.health_check_interval(),
            state: RwLock::new(LinkState::Disconnected),
            last_check: Mutex::new(None),
            reconnect: tokio::sync::Mutex::new(()),
            connect_attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Total radio connect calls issued since boot
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: LinkState) {
        let mut current = self.state.write();
        if *current != state {
            debug!("Link state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Make sure the link is up, reconnecting with backoff if it is not.
    ///
    /// Blocks the caller for as long as the radio keeps failing; only returns
    /// an error when `max_reconnect_attempts` is configured and exhausted.
    pub async fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.state() == LinkState::Connected {
            if self.radio.connected().await {
                return Ok(());
            }
            warn!("Radio reports link lost");
            self.set_state(LinkState::Disconnected);
        }

        let _sequence = match self.reconnect.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Reconnect already in flight, waiting for it");
                let guard = self.reconnect.lock().await;
                if self.state() == LinkState::Connected {
                    return Ok(());
                }
                guard
            }
        };

        self.run_reconnect().await
    }

    async fn run_reconnect(&self) -> Result<(), LinkError> {
        self.set_state(LinkState::Connecting);
        let mut backoff = self.backoff.start();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            self.connect_attempts.fetch_add(1, Ordering::Relaxed);
            info!("Connecting to Wi-Fi '{}' (attempt {})", self.ssid, attempts);

            match self.radio.connect(&self.ssid, &self.password).await {
                Ok(()) => {
                    self.set_state(LinkState::Connected);
                    info!("Connected to Wi-Fi '{}' after {} attempt(s)", self.ssid, attempts);
                    return Ok(());
                }
                Err(e) => {
                    if let Some(max) = self.max_attempts {
                        if attempts >= max {
                            self.set_state(LinkState::Disconnected);
                            warn!("Giving up on Wi-Fi after {} attempts: {}", attempts, e);
                            return Err(LinkError::Exhausted { attempts });
                        }
                    }

                    let delay = backoff.next_delay();
                    warn!("Wi-Fi connection failed: {}; retrying in {:?}", e, delay);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Cheap per-iteration check; reconnects at most once per health interval
    pub async fn poll_health(&self, now: Instant) {
        {
            let mut last = self.last_check.lock();
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) <= self.health_interval {
                    return;
                }
            }
            *last = Some(now);
        }

        if self.radio.connected().await {
            if self.state() != LinkState::Connected {
                self.set_state(LinkState::Connected);
            }
            return;
        }

        warn!("Wi-Fi lost, attempting to reconnect");
        self.set_state(LinkState::Disconnected);
        if let Err(e) = self.ensure_connected().await {
            warn!("Health check reconnect failed: {}", e);
        }
    }
}

/// One-shot TCP reachability probe (DNS port of a public resolver by default)
pub async fn probe_internet(addr: &str, probe_timeout: Duration) -> bool {
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid probe address '{}': {}", addr, e);
            return false;
        }
    };

    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Internet probe to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Internet probe to {} timed out after {:?}", addr, probe_timeout);
            false
        }
    }
}
