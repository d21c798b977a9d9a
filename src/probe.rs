//! Backend availability probe.
//!
//! The backend may be cold-starting, so the first health check can take a
//! long time or fail outright. The prober retries a bounded number of times
//! and publishes a status indicator through a watch channel:
//!
//! ```text
//! checking ──ok──▶ online ──(2s / 3s)──▶ hidden
//!    │
//!    └─fail─▶ (wait 10s, retry) ... ─last fail─▶ error
//! ```
//!
//! The probe runs on its own task. [`ProbeHandle`] owns that task: cancelling
//! or dropping it aborts any pending retry or dismiss timer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::BackendApi;
use crate::config::ClientConfig;

/// How often `elapsed_secs` is refreshed while waiting.
const TICK: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbePhase {
    Checking,
    Online,
    Error,
    /// Online and the indicator has been dismissed.
    Hidden,
}

impl ProbePhase {
    /// The probe has reached an outcome and will not check again.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Checking)
    }
}

/// Snapshot of the status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeState {
    pub phase: ProbePhase,
    pub message: String,
    /// Whole seconds since the probe started.
    pub elapsed_secs: u64,
    /// 1-based number of the current (or last) health check.
    pub attempt: u32,
}

impl ProbeState {
    fn initial() -> Self {
        Self {
            phase: ProbePhase::Checking,
            message: checking_message(1, 1),
            elapsed_secs: 0,
            attempt: 1,
        }
    }
}

/// Retry and display timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    /// Total health checks, including the first.
    pub max_attempts: u32,
    /// Pause between a failed check and the next one.
    pub retry_delay: Duration,
    /// Upper bound on a single health check.
    pub attempt_timeout: Duration,
    /// Readiness slower than this is reported as a cold start.
    pub cold_start_threshold: Duration,
    /// How long the "online" indicator stays up after a fast start.
    pub dismiss_after: Duration,
    /// How long it stays up after a cold start.
    pub dismiss_after_cold_start: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            attempt_timeout: crate::config::DEFAULT_TIMEOUT,
            cold_start_threshold: Duration::from_secs(15),
            dismiss_after: Duration::from_secs(2),
            dismiss_after_cold_start: Duration::from_secs(3),
        }
    }
}

impl ProbePolicy {
    /// Default timings, with each health check bounded by the configured
    /// request timeout.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            attempt_timeout: config.timeout(),
            ..Self::default()
        }
    }
}

fn checking_message(attempt: u32, max_attempts: u32) -> String {
    if attempt <= 1 {
        "Connecting to server...".to_string()
    } else {
        format!("Server is waking up, retrying (attempt {attempt}/{max_attempts})...")
    }
}

fn online_message(elapsed: Duration, cold: bool) -> String {
    if cold {
        format!("Server ready (woke up in {}s)", elapsed.as_secs())
    } else {
        "Server ready".to_string()
    }
}

const ERROR_MESSAGE: &str = "Server is unavailable. Please try again later.";

// ═══════════════════════════════════════════════════════════
// AvailabilityProber
// ═══════════════════════════════════════════════════════════

pub struct AvailabilityProber {
    backend: Arc<dyn BackendApi>,
    policy: ProbePolicy,
}

impl AvailabilityProber {
    pub fn new(backend: Arc<dyn BackendApi>) -> Self {
        Self {
            backend,
            policy: ProbePolicy::default(),
        }
    }

    /// Prober whose health checks honor the configured request timeout.
    pub fn from_config(backend: Arc<dyn BackendApi>, config: &ClientConfig) -> Self {
        Self::new(backend).with_policy(ProbePolicy::from_config(config))
    }

    pub fn with_policy(mut self, policy: ProbePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start probing on a new task.
    pub fn spawn(self) -> ProbeHandle {
        let (tx, rx) = watch::channel(ProbeState::initial());
        let task = tokio::spawn(async move {
            self.run(&tx).await;
        });
        ProbeHandle {
            state: rx,
            task: Some(task),
        }
    }

    /// Probe to completion on the current task, publishing every transition.
    pub async fn run(&self, tx: &watch::Sender<ProbeState>) -> ProbePhase {
        let policy = &self.policy;
        let started = Instant::now();
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            tx.send_replace(ProbeState {
                phase: ProbePhase::Checking,
                message: checking_message(attempt, max_attempts),
                elapsed_secs: started.elapsed().as_secs(),
                attempt,
            });

            let check = tokio::time::timeout(policy.attempt_timeout, self.backend.health());
            match tick_while(tx, started, check).await {
                Ok(Ok(())) => {
                    let elapsed = started.elapsed();
                    let cold = elapsed > policy.cold_start_threshold;
                    tracing::info!(
                        attempt,
                        elapsed_secs = elapsed.as_secs(),
                        cold_start = cold,
                        "Backend is online"
                    );
                    let online = ProbeState {
                        phase: ProbePhase::Online,
                        message: online_message(elapsed, cold),
                        elapsed_secs: elapsed.as_secs(),
                        attempt,
                    };
                    tx.send_replace(online.clone());

                    let linger = if cold {
                        policy.dismiss_after_cold_start
                    } else {
                        policy.dismiss_after
                    };
                    tokio::time::sleep(linger).await;
                    tx.send_replace(ProbeState {
                        phase: ProbePhase::Hidden,
                        ..online
                    });
                    return ProbePhase::Hidden;
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, max_attempts, error = %e, "Health check failed");
                }
                Err(_) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        timeout_secs = policy.attempt_timeout.as_secs(),
                        "Health check timed out"
                    );
                }
            }

            if attempt < max_attempts {
                tick_while(tx, started, tokio::time::sleep(policy.retry_delay)).await;
            }
        }

        tracing::error!(
            attempts = max_attempts,
            elapsed_secs = started.elapsed().as_secs(),
            "Backend unavailable, giving up"
        );
        tx.send_replace(ProbeState {
            phase: ProbePhase::Error,
            message: ERROR_MESSAGE.to_string(),
            elapsed_secs: started.elapsed().as_secs(),
            attempt: max_attempts,
        });
        ProbePhase::Error
    }
}

/// Drive `fut` to completion, refreshing the published elapsed time once a
/// second meanwhile.
async fn tick_while<F: std::future::Future>(
    tx: &watch::Sender<ProbeState>,
    started: Instant,
    fut: F,
) -> F::Output {
    tokio::pin!(fut);
    let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
    loop {
        tokio::select! {
            biased;
            output = &mut fut => return output,
            _ = ticker.tick() => {
                let secs = started.elapsed().as_secs();
                tx.send_if_modified(|state| {
                    let changed = state.elapsed_secs != secs;
                    state.elapsed_secs = secs;
                    changed
                });
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ProbeHandle
// ═══════════════════════════════════════════════════════════

/// Owner of a running probe.
///
/// Dropping the handle cancels the probe, including any retry or dismiss
/// timer it is waiting on.
pub struct ProbeHandle {
    state: watch::Receiver<ProbeState>,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Latest published state.
    pub fn state(&self) -> ProbeState {
        self.state.borrow().clone()
    }

    /// Independent receiver for rendering every transition.
    pub fn subscribe(&self) -> watch::Receiver<ProbeState> {
        self.state.clone()
    }

    /// Wait until the probe is online or has given up.
    pub async fn wait_settled(&mut self) -> ProbeState {
        self.wait_for(|s| s.phase.is_settled()).await
    }

    /// Wait until the published state satisfies `predicate`, or the probe
    /// stops; returns the last published state either way.
    pub async fn wait_for(&mut self, predicate: impl FnMut(&ProbeState) -> bool) -> ProbeState {
        let reached = self.state.wait_for(predicate).await.map(|s| s.clone());
        reached.unwrap_or_else(|_| self.state())
    }

    /// Stop the probe. Pending timers never fire; the published state is
    /// left as it was.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Availability probe cancelled");
        }
    }

    /// The probe task has finished or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
