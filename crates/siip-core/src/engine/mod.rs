//! Update controller
//!
//! The UpdateController is responsible for:
//! - Verifying its dependencies (resolver and provider) at startup
//! - Creating the address record when it does not exist yet
//! - Polling the public IP and upserting the record when it drifts
//!
//! ## State machine
//!
//! ```text
//! Init ──► DependencyCheck ──► RecordInit ──► Polling ──► Stopped
//!                 │                 │
//!                 └──────► Failed ◄─┘
//! ```
//!
//! Startup failures (dependency check, record creation) are fatal and
//! returned from [`UpdateController::run()`]. Once polling, no error stops
//! the loop: each failed iteration is logged and the next one runs on
//! schedule.
//!
//! ## Pacing
//!
//! Each iteration records its start time. After the work completes the
//! loop sleeps for `max(0, interval - elapsed)`, so iterations start on a
//! steady cadence. An iteration that overruns the interval is followed
//! immediately by the next one.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpResolver};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the controller event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the UpdateController
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Startup checks passed, polling is about to begin
    Started { record_name: String },

    /// The record did not exist and was created
    RecordCreated { record_name: String, ip: Ipv4Addr },

    /// Published and resolved addresses differ
    IpChangeDetected {
        record_name: String,
        old_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },

    /// The record now carries the resolved address
    UpdateSucceeded {
        record_name: String,
        old_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },

    /// The provider rejected the upsert; the loop keeps going
    UpdateFailed {
        record_name: String,
        old_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },

    /// Published address already matches
    UpToDate { record_name: String, ip: Ipv4Addr },

    /// An iteration failed before it could compare addresses
    IterationFailed { error: String },

    /// Polling ended
    Stopped { reason: String },
}

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    DependencyCheck,
    RecordInit,
    Polling,
    Stopped,
    Failed,
}

/// Result of one poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Record already matched the resolved address
    Unchanged(Ipv4Addr),
    /// Record was upserted
    Updated {
        old_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },
    /// Upsert was attempted and rejected
    UpdateFailed {
        old_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },
}

/// Dynamic DNS update controller
///
/// Drives one address record towards the machine's current public IP.
///
/// ## Lifecycle
///
/// 1. Create with [`UpdateController::new()`]
/// 2. Start with [`UpdateController::run()`] (usually on its own task)
/// 3. Call [`UpdateController::stop()`] from anywhere to end polling
///
/// ## Cancellation
///
/// `stop()` takes effect between iterations, or between startup phases
/// when it arrives before polling begins. Work already in flight (a
/// resolution round or provider call) is allowed to finish; a pending
/// inter-iteration sleep is cut short.
pub struct UpdateController {
    /// Public IP discovery
    resolver: Box<dyn IpResolver>,

    /// DNS record capability
    provider: Box<dyn DnsProvider>,

    /// Record kept in sync
    record_name: String,

    /// Target period between iteration starts
    interval: Duration,

    /// TTL for created and updated records
    ttl: u32,

    /// True only while polling
    running: AtomicBool,

    /// Set once by `stop()`; never cleared
    stop_requested: AtomicBool,

    /// Wakes the inter-iteration sleep on stop
    stop_signal: Notify,

    state: Mutex<ControllerState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ControllerEvent>,
}

impl UpdateController {
    /// Create a new controller
    ///
    /// # Parameters
    ///
    /// - `resolver`: IP resolver implementation
    /// - `provider`: DNS provider implementation
    /// - `config`: Validated configuration (record name, interval)
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields controller events
    pub fn new(
        resolver: Box<dyn IpResolver>,
        provider: Box<dyn DnsProvider>,
        config: &Config,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let controller = Self {
            resolver,
            provider,
            record_name: config.record_name.clone(),
            interval: config.refresh_interval(),
            ttl: config.record_ttl(),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            stop_signal: Notify::new(),
            state: Mutex::new(ControllerState::Init),
            event_tx: tx,
        };

        Ok((controller, rx))
    }

    /// Run startup checks, then poll until stopped
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean stop
    /// - `Err(Error)`: Startup failed (dependency check or record creation)
    pub async fn run(&self) -> Result<()> {
        let result = self.run_internal().await;
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => self.set_state(ControllerState::Stopped),
            Err(e) => {
                error!(
                    operation = "update_loop",
                    record_name = %self.record_name,
                    error = %e,
                    "Fatal error in update loop"
                );
                self.set_state(ControllerState::Failed);
            }
        }

        result
    }

    async fn run_internal(&self) -> Result<()> {
        if self.stop_pending("init") {
            return Ok(());
        }

        self.set_state(ControllerState::DependencyCheck);
        self.check_dependencies().await?;
        if self.stop_pending("dependency_check") {
            return Ok(());
        }

        self.set_state(ControllerState::RecordInit);
        self.initialize_record().await?;
        if self.stop_pending("record_init") {
            return Ok(());
        }

        debug!(
            operation = "update_loop",
            refresh_interval = self.interval.as_secs_f64(),
            "Starting update loop"
        );
        self.set_state(ControllerState::Polling);
        self.emit_event(ControllerEvent::Started {
            record_name: self.record_name.clone(),
        });

        self.running.store(true, Ordering::SeqCst);
        while !self.stop_requested.load(Ordering::SeqCst) {
            let started = Instant::now();

            if let Err(e) = self.check_and_update().await {
                warn!(
                    operation = "update_iteration",
                    error = %e,
                    "Update iteration failed"
                );
                self.emit_event(ControllerEvent::IterationFailed {
                    error: e.to_string(),
                });
            }

            let wait = self.interval.saturating_sub(started.elapsed());
            debug!(
                operation = "sleep",
                next_check_in = wait.as_secs_f64(),
                "Waiting for next check"
            );

            // Register for the wake-up before the flag check so a stop()
            // landing in between is not missed
            let stopped = self.stop_signal.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();

            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut stopped => {}
            }
        }

        self.emit_event(ControllerEvent::Stopped {
            reason: "Stop requested".to_string(),
        });
        Ok(())
    }

    /// Request the poll loop to end
    ///
    /// The loop exits at its next condition check; no further iterations
    /// start after this returns.
    pub fn stop(&self) {
        info!(operation = "shutdown", "Stopping updater");
        self.stop_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        // Wake only a sleep already registered; no permit is left behind
        self.stop_signal.notify_waiters();
    }

    /// End startup early when a stop arrived before polling began
    fn stop_pending(&self, phase: &'static str) -> bool {
        if !self.stop_requested.load(Ordering::SeqCst) {
            return false;
        }

        info!(
            operation = "shutdown",
            phase,
            "Stop requested during startup, not entering update loop"
        );
        self.emit_event(ControllerEvent::Stopped {
            reason: format!("Stop requested during {}", phase),
        });
        true
    }

    /// Whether the poll loop is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Verify the resolver and provider are usable
    ///
    /// Resolves the public IP and checks the record once each. Any resolver
    /// error, or an unspecified address, fails the check.
    pub async fn check_dependencies(&self) -> Result<()> {
        let ip = match self.resolver.get_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                error!(
                    operation = "dependency_check",
                    component = "ip_resolver",
                    error = %e,
                    "IP resolver check failed"
                );
                return Err(Error::DependencyCheck(format!("IP resolver: {}", e)));
            }
        };

        if ip.is_unspecified() {
            error!(
                operation = "dependency_check",
                component = "ip_resolver",
                ip = %ip,
                "IP resolver check failed"
            );
            return Err(Error::DependencyCheck(
                "IP resolver returned an unspecified address".to_string(),
            ));
        }

        debug!(
            operation = "dependency_check",
            component = "ip_resolver",
            ip = %ip,
            "IP resolver check successful"
        );

        let exists = self.provider.record_exists(&self.record_name).await;
        debug!(
            operation = "dependency_check",
            component = "dns_provider",
            provider = self.provider.provider_name(),
            record_exists = exists,
            "DNS provider check successful"
        );

        Ok(())
    }

    /// Create the record if it does not exist yet
    ///
    /// Idempotent: an existing record is left untouched.
    pub async fn initialize_record(&self) -> Result<()> {
        if self.provider.record_exists(&self.record_name).await {
            debug!(
                operation = "record_init",
                record_name = %self.record_name,
                "DNS record already exists"
            );
            return Ok(());
        }

        info!(
            operation = "record_init",
            record_name = %self.record_name,
            "Creating initial DNS record"
        );

        let ip = self.resolver.get_ip().await.map_err(|e| {
            error!(
                operation = "record_init",
                record_name = %self.record_name,
                error = %e,
                "Error initializing record"
            );
            Error::RecordInit(format!("could not resolve public IP: {}", e))
        })?;

        if !self.provider.create_record(&self.record_name, ip, self.ttl).await {
            error!(
                operation = "record_init",
                record_name = %self.record_name,
                "Failed to create initial record"
            );
            return Err(Error::RecordInit(format!(
                "provider {} rejected creation of {}",
                self.provider.provider_name(),
                self.record_name
            )));
        }

        info!(
            operation = "record_init",
            record_name = %self.record_name,
            ip = %ip,
            "Initial DNS record created successfully"
        );
        self.emit_event(ControllerEvent::RecordCreated {
            record_name: self.record_name.clone(),
            ip,
        });

        Ok(())
    }

    /// Perform a single check-and-update iteration
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateOutcome)`: The comparison ran (a rejected upsert is still `Ok`)
    /// - `Err(Error)`: The public IP could not be resolved
    pub async fn check_and_update(&self) -> Result<UpdateOutcome> {
        let local_ip = match self.resolver.get_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                error!(
                    operation = "update_check",
                    record_name = %self.record_name,
                    error = %e,
                    "Error in check and update"
                );
                return Err(e);
            }
        };
        debug!(operation = "ip_check", ip = %local_ip, "Current IP fetched");

        let published_ip = self.provider.get_record_ip(&self.record_name).await;
        debug!(
            operation = "dns_check",
            ip = ?published_ip,
            "DNS record IP fetched"
        );

        if published_ip == Some(local_ip) {
            info!(
                operation = "record_status",
                record_name = %self.record_name,
                ip = %local_ip,
                "Record [{}.] is already up to date",
                self.record_name
            );
            self.emit_event(ControllerEvent::UpToDate {
                record_name: self.record_name.clone(),
                ip: local_ip,
            });
            return Ok(UpdateOutcome::Unchanged(local_ip));
        }

        info!(
            operation = "ip_change",
            record_name = %self.record_name,
            old_ip = ?published_ip,
            new_ip = %local_ip,
            "IP change detected"
        );
        self.emit_event(ControllerEvent::IpChangeDetected {
            record_name: self.record_name.clone(),
            old_ip: published_ip,
            new_ip: local_ip,
        });

        if self
            .provider
            .update_record(&self.record_name, local_ip, self.ttl)
            .await
        {
            self.emit_event(ControllerEvent::UpdateSucceeded {
                record_name: self.record_name.clone(),
                old_ip: published_ip,
                new_ip: local_ip,
            });
            Ok(UpdateOutcome::Updated {
                old_ip: published_ip,
                new_ip: local_ip,
            })
        } else {
            error!(
                operation = "record_update",
                record_name = %self.record_name,
                old_ip = ?published_ip,
                new_ip = %local_ip,
                "Failed to update record"
            );
            self.emit_event(ControllerEvent::UpdateFailed {
                record_name: self.record_name.clone(),
                old_ip: published_ip,
                new_ip: local_ip,
            });
            Ok(UpdateOutcome::UpdateFailed {
                old_ip: published_ip,
                new_ip: local_ip,
            })
        }
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Emit a controller event
    fn emit_event(&self, event: ControllerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping controller event");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
