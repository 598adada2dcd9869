//! Background driver for the sync queue and cache maintenance.
//!
//! The platform layer owns connectivity detection and reports transitions
//! over an `mpsc` channel. The scheduler reacts to those signals and to its
//! own timers:
//! - every `sync_interval` while online: drain the queue
//! - on offline -> online: after `reconnect_delay`, prefetch critical data
//!   and drain once
//! - every `cleanup_interval`: run a cleanup pass
//!
//! Dropping every sender stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::SyncQueue;
use crate::cache::ContentRepository;
use crate::prefetch::CriticalDataPrefetcher;

/// Messages from the platform's connectivity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    Restored,
    Lost,
}

/// Timer periods. `sync_interval` and `cleanup_interval` must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub sync_interval: Duration,
    pub cleanup_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

pub struct SyncScheduler {
    queue: Arc<SyncQueue>,
    repo: Arc<ContentRepository>,
    prefetcher: Option<Arc<CriticalDataPrefetcher>>,
    settings: SchedulerSettings,
    online: bool,
}

impl SyncScheduler {
    pub fn new(queue: Arc<SyncQueue>, repo: Arc<ContentRepository>, settings: SchedulerSettings) -> Self {
        Self {
            queue,
            repo,
            prefetcher: None,
            settings,
            online: false,
        }
    }

    pub fn with_prefetcher(mut self, prefetcher: Arc<CriticalDataPrefetcher>) -> Self {
        self.prefetcher = Some(prefetcher);
        self
    }

    /// Connectivity assumed before the first signal arrives.
    pub fn starting_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn spawn(self, signals: mpsc::Receiver<ConnectivitySignal>) -> JoinHandle<()> {
        tokio::spawn(self.run(signals))
    }

    pub async fn run(mut self, mut signals: mpsc::Receiver<ConnectivitySignal>) {
        info!(online = self.online, "Sync scheduler started");

        let start = Instant::now();
        let mut sync_timer = interval_at(start + self.settings.sync_interval, self.settings.sync_interval);
        sync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup_timer = interval_at(start + self.settings.cleanup_interval, self.settings.cleanup_interval);
        cleanup_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reconnect = sleep(Duration::ZERO);
        tokio::pin!(reconnect);
        let mut reconnect_armed = false;

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(ConnectivitySignal::Restored) => {
                        if !self.online {
                            info!("Connectivity restored");
                            self.online = true;
                            reconnect.as_mut().reset(Instant::now() + self.settings.reconnect_delay);
                            reconnect_armed = true;
                        }
                    }
                    Some(ConnectivitySignal::Lost) => {
                        if self.online {
                            info!("Connectivity lost");
                        }
                        self.online = false;
                        reconnect_armed = false;
                    }
                    None => break,
                },
                () = &mut reconnect, if reconnect_armed => {
                    reconnect_armed = false;
                    self.on_reconnect().await;
                }
                _ = sync_timer.tick() => {
                    if self.online {
                        self.queue.process_sync_queue().await;
                    } else {
                        debug!("Offline, skipping scheduled drain");
                    }
                }
                _ = cleanup_timer.tick() => {
                    if let Err(e) = self.repo.cleanup().await {
                        error!(error = %e, "Scheduled cleanup failed");
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    async fn on_reconnect(&self) {
        if let Some(prefetcher) = &self.prefetcher {
            prefetcher.prefetch().await;
        }
        self.queue.process_sync_queue().await;
    }
}
