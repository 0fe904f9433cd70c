//! Serialized reconciliation of desired network state.
//!
//! A [`Reconciler`] owns the snapshot of what it has confirmed on the OS and
//! moves it towards each desired state it is given, one mutation at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::applier::{ApplyResult, PlatformApplier};
use crate::config::{Mutation, NetworkConfig, Plan, diff};
use crate::error::{AppliedState, Error, Result};
use crate::registry;

/// Options for a [`Reconciler`].
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    timeout: Option<Duration>,
    preempt_superseded: bool,
    retry_transient: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            preempt_superseded: true,
            retry_transient: true,
        }
    }
}

impl ReconcilerOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default timeout for [`Reconciler::set_desired`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stop a running batch at the next mutation boundary once a newer
    /// desired state is queued (default: true).
    pub fn preempt_superseded(mut self, enabled: bool) -> Self {
        self.preempt_superseded = enabled;
        self
    }

    /// Retry a mutation once after a transient failure (default: true).
    pub fn retry_transient(mut self, enabled: bool) -> Self {
        self.retry_transient = enabled;
        self
    }
}

/// Whether a batch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilerState {
    Idle,
    Reconciling,
}

struct Request {
    seq: u64,
    config: NetworkConfig,
    deadline: Option<Instant>,
    /// Applied and total mutations of the run that was preempted, if any.
    progress: Option<(usize, usize)>,
}

struct Shared {
    current: NetworkConfig,
    last_seq: u64,
    /// Requests whose callers are still waiting. The newest runs next; the
    /// older ones are covered by it unless it is withdrawn.
    waiting: BTreeMap<u64, Request>,
    in_flight: Option<u64>,
    completed_seq: u64,
    outcome: Result<()>,
}

impl Shared {
    fn newest(&self) -> Option<u64> {
        self.waiting.last_key_value().map(|(seq, _)| *seq)
    }
}

enum Batch {
    Finished(Result<()>),
    Preempted { applied: usize },
    Expired { applied: usize },
}

enum Status {
    Done(Result<()>),
    Next,
    Superseded,
}

/// Drives the OS towards the most recent desired state.
///
/// Batches never overlap. Requests that arrive while a batch runs are
/// coalesced: only the newest is applied, and every caller it superseded
/// receives its outcome. A caller whose own deadline passes first gets
/// [`Error::Canceled`] instead, and if its request was the newest, the one
/// it replaced becomes next in line again.
///
/// # Example
///
/// ```ignore
/// use osrouter::{NetworkConfig, Reconciler};
///
/// let reconciler = Reconciler::for_platform("linux")?;
///
/// let desired = NetworkConfig::new()
///     .address("wg0", "100.64.0.1/32")?
///     .route("100.64.0.0/10", |r| r.dev("wg0"))?;
///
/// reconciler.set_desired(desired).await?;
/// ```
pub struct Reconciler {
    applier: Arc<dyn PlatformApplier>,
    options: ReconcilerOptions,
    shared: Mutex<Shared>,
    batch: tokio::sync::Mutex<()>,
    changed: Notify,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("applier", &self.applier.name())
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl Reconciler {
    /// Create a reconciler with default options.
    pub fn new(applier: impl PlatformApplier + 'static) -> Self {
        Self::with_options(applier, ReconcilerOptions::default())
    }

    /// Create a reconciler with custom options.
    pub fn with_options(applier: impl PlatformApplier + 'static, options: ReconcilerOptions) -> Self {
        Self {
            applier: Arc::new(applier),
            options,
            shared: Mutex::new(Shared {
                current: NetworkConfig::new(),
                last_seq: 0,
                waiting: BTreeMap::new(),
                in_flight: None,
                completed_seq: 0,
                outcome: Ok(()),
            }),
            batch: tokio::sync::Mutex::new(()),
            changed: Notify::new(),
        }
    }

    /// Create a reconciler for a platform in the process-wide registry.
    pub fn for_platform(id: &str) -> Result<Self> {
        let applier = registry::global()?.create(id)?;
        Ok(Self::new(applier))
    }

    /// Name of the platform applier.
    pub fn platform(&self) -> &str {
        self.applier.name()
    }

    /// Reconcile the OS to `config`.
    ///
    /// Uses the default timeout from [`ReconcilerOptions`], if any.
    pub async fn set_desired(&self, config: NetworkConfig) -> Result<()> {
        let deadline = self.options.timeout.map(|timeout| Instant::now() + timeout);
        self.submit(config, deadline).await
    }

    /// Reconcile the OS to `config`, giving up after `timeout`.
    ///
    /// The deadline is checked between mutations; a mutation that has
    /// started always runs to completion. On expiry the mutations already
    /// applied are kept and [`Error::Canceled`] is returned.
    pub async fn set_desired_with_timeout(
        &self,
        config: NetworkConfig,
        timeout: Duration,
    ) -> Result<()> {
        self.submit(config, Some(Instant::now() + timeout)).await
    }

    /// Tear down everything this reconciler has installed.
    pub async fn clear(&self) -> Result<()> {
        self.set_desired(NetworkConfig::new()).await
    }

    /// Preview the mutations needed to reach `config` from the current state.
    pub fn plan(&self, config: &NetworkConfig) -> Plan {
        Plan::between(&self.shared().current, config)
    }

    /// Snapshot of the state confirmed on the OS.
    pub fn current(&self) -> NetworkConfig {
        self.shared().current.clone()
    }

    /// Whether a batch is running.
    pub fn state(&self) -> ReconcilerState {
        match self.shared().in_flight {
            Some(_) => ReconcilerState::Reconciling,
            None => ReconcilerState::Idle,
        }
    }

    /// Number of desired states submitted so far.
    pub fn generation(&self) -> u64 {
        self.shared().last_seq
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_superseded(&self, seq: u64) -> bool {
        self.shared().newest().is_some_and(|newest| newest > seq)
    }

    async fn submit(&self, config: NetworkConfig, deadline: Option<Instant>) -> Result<()> {
        let ticket = {
            let mut shared = self.shared();
            shared.last_seq += 1;
            let seq = shared.last_seq;
            if let Some(superseded) = shared.newest() {
                debug!(seq, superseded, "coalesced queued desired state");
            }
            let request = Request {
                seq,
                config,
                deadline,
                progress: None,
            };
            shared.waiting.insert(seq, request);
            seq
        };
        let _ticket = Ticket(self, ticket);

        loop {
            let mut changed = pin!(self.changed.notified());
            changed.as_mut().enable();

            match self.status(ticket) {
                Status::Done(outcome) => return outcome,
                Status::Next => {
                    let _batch = match deadline {
                        Some(deadline) => {
                            match tokio::time::timeout_at(deadline, self.batch.lock()).await {
                                Ok(guard) => guard,
                                Err(_) => return self.expire(ticket),
                            }
                        }
                        None => self.batch.lock().await,
                    };
                    let request = {
                        let mut shared = self.shared();
                        if shared.newest() != Some(ticket) {
                            continue;
                        }
                        let Some((_, request)) = shared.waiting.pop_last() else {
                            continue;
                        };
                        shared.in_flight = Some(ticket);
                        request
                    };
                    if let Some(result) = self.run(request).await {
                        return result;
                    }
                }
                // Wait for the newer request to finish or be withdrawn.
                Status::Superseded => match deadline {
                    Some(deadline) => {
                        if tokio::time::timeout_at(deadline, changed).await.is_err() {
                            return self.expire(ticket);
                        }
                    }
                    None => changed.await,
                },
            }
        }
    }

    fn status(&self, ticket: u64) -> Status {
        let shared = self.shared();
        if shared.completed_seq >= ticket {
            Status::Done(shared.outcome.clone())
        } else if shared.newest() == Some(ticket) {
            Status::Next
        } else {
            Status::Superseded
        }
    }

    /// Deadline passed before the request finished: withdraw it.
    fn expire(&self, ticket: u64) -> Result<()> {
        let mut shared = self.shared();
        if shared.completed_seq >= ticket {
            return shared.outcome.clone();
        }
        let Some(request) = shared.waiting.remove(&ticket) else {
            return Err(Error::Canceled { applied: 0, total: 0 });
        };
        let (applied, total) = request
            .progress
            .unwrap_or_else(|| (0, diff(&shared.current, &request.config).len()));
        drop(shared);

        warn!(seq = ticket, applied, total, "desired state withdrawn");
        self.changed.notify_waiters();
        Err(Error::Canceled { applied, total })
    }

    /// Run one batch for `request`. Caller holds the batch lock.
    ///
    /// Returns the caller's result when it is not shared with anyone else.
    async fn run(&self, mut request: Request) -> Option<Result<()>> {
        let _flight = Flight(self);
        let seq = request.seq;
        let mutations = diff(&self.shared().current, &request.config);
        let total = mutations.len();
        info!(seq, mutations = total, platform = self.applier.name(), "reconciling");

        match self.apply_batch(&request, &mutations).await {
            Batch::Preempted { applied } => {
                info!(seq, applied, total, "superseded by a newer desired state");
                request.progress = Some((applied, total));
                self.shared().waiting.insert(seq, request);
                None
            }
            Batch::Expired { applied } => {
                warn!(seq, applied, total, "deadline passed, stopping");
                Some(Err(Error::Canceled { applied, total }))
            }
            Batch::Finished(outcome) => {
                match &outcome {
                    Ok(()) => info!(seq, total, "reconciled"),
                    Err(e) => error!(seq, error = %e, "reconciliation aborted"),
                }
                let mut shared = self.shared();
                if seq > shared.completed_seq {
                    shared.completed_seq = seq;
                    shared.outcome = outcome;
                    shared.waiting.retain(|&waiting, _| waiting > seq);
                }
                None
            }
        }
    }

    async fn apply_batch(&self, request: &Request, mutations: &[Mutation]) -> Batch {
        let total = mutations.len();
        for (index, mutation) in mutations.iter().enumerate() {
            if self.options.preempt_superseded && self.is_superseded(request.seq) {
                return Batch::Preempted { applied: index };
            }
            if request.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Batch::Expired { applied: index };
            }

            debug!(seq = request.seq, position = index + 1, total, %mutation, "applying");
            match self.apply_one(mutation).await {
                Ok(()) => self.shared().current.apply_mutation(mutation),
                Err(source) => {
                    if source.state() == AppliedState::Applied {
                        self.shared().current.apply_mutation(mutation);
                    }
                    return Batch::Finished(Err(Error::Apply {
                        position: index + 1,
                        total,
                        mutation: mutation.clone(),
                        source,
                    }));
                }
            }
        }
        Batch::Finished(Ok(()))
    }

    async fn apply_one(&self, mutation: &Mutation) -> ApplyResult {
        let mut result = self.applier.apply(mutation).await;

        let retry = self.options.retry_transient
            && matches!(&result, Err(e) if e.is_transient() && e.state() != AppliedState::Applied);
        if retry {
            warn!(%mutation, "transient failure, retrying");
            result = self.applier.apply(mutation).await;
        }

        match result {
            Err(e) if mutation.is_removal() && e.is_not_found() => {
                warn!(%mutation, "already absent");
                Ok(())
            }
            Err(e) if mutation.is_addition() && e.is_already_exists() => {
                warn!(%mutation, "already present");
                Ok(())
            }
            other => other,
        }
    }
}

/// Marks the reconciler idle when a batch ends, even if its caller is dropped.
struct Flight<'a>(&'a Reconciler);

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.0.shared().in_flight = None;
        self.0.changed.notify_waiters();
    }
}

/// Withdraws the request of a caller that stopped waiting.
struct Ticket<'a>(&'a Reconciler, u64);

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let abandoned = self.0.shared().waiting.remove(&self.1).is_some();
        if abandoned {
            self.0.changed.notify_waiters();
        }
    }
}
