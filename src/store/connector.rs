//! Connection Supervisor
//!
//! Owns the single long-lived connection to the store and drives the
//! reconnection state machine in a background task.
//!
//! Callers never block on connection setup directly: [`Connector::acquire`]
//! waits until the supervisor publishes either a live connection or a
//! terminal state (`Exhausted`, or `Stopped` after [`Connector::close`]).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::retry::{Backoff, Decision, FailureKind, RetryPolicy};
use super::{StoreError, StoreResult};

// == Dialer ==
/// Something that can open a fresh connection to the store.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Handle shared by every operation issued on one connection
    type Conn: Clone + Send + Sync + 'static;

    /// Human-readable target, used in log lines.
    fn describe(&self) -> String;

    async fn dial(&self) -> StoreResult<Self::Conn>;
}

// == Connection State ==
/// Externally observable state of the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no retry scheduled yet
    Disconnected,
    /// A live connection is available
    Connected,
    /// Waiting out a backoff delay before the next dial
    Retrying { attempt: u32 },
    /// Gave up; terminal until the process restarts
    Exhausted,
    /// Closed during shutdown; terminal
    Stopped,
}

impl ConnectionState {
    fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Exhausted | ConnectionState::Stopped)
    }
}

/// A connection handed out to one operation, tagged with the generation it
/// belongs to so late failure reports cannot tear down a newer connection.
#[derive(Debug, Clone)]
pub struct Lease<C> {
    pub conn: C,
    generation: u64,
}

impl<C> Lease<C> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct Link<C> {
    state: ConnectionState,
    lease: Option<Lease<C>>,
    /// Why the last live connection was dropped
    fault: Option<FailureKind>,
}

impl<C> Link<C> {
    fn with_state(state: ConnectionState) -> Self {
        Self {
            state,
            lease: None,
            fault: None,
        }
    }
}

struct Shared<C> {
    link: watch::Sender<Link<C>>,
    dropped: Notify,
}

impl<C> Shared<C> {
    /// Replaces the published link unless the connector was stopped.
    /// Returns `false` once stopped, which tells the supervisor to exit.
    fn publish(&self, next: Link<C>) -> bool {
        let mut next = Some(next);
        self.link.send_if_modified(|link| match next.take() {
            Some(next) if link.state != ConnectionState::Stopped => {
                *link = next;
                true
            }
            _ => false,
        });
        self.link.borrow().state != ConnectionState::Stopped
    }
}

// == Connector ==
/// Cloneable handle to the supervised connection.
///
/// Loss of a live connection is detected lazily: the supervisor only learns
/// about it when an operation on that connection fails and is passed to
/// [`Connector::report`]. An idle process keeps its dead connection until
/// the next request touches it, and that request fails before the retry
/// schedule starts.
pub struct Connector<D: Dialer> {
    shared: Arc<Shared<D::Conn>>,
}

impl<D: Dialer> Clone for Connector<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Starts the supervisor for `dialer` and returns immediately.
///
/// The task ends on its own once retries are exhausted or the connector is
/// closed; the returned `JoinHandle` can also be aborted during shutdown.
pub fn spawn_connector<D: Dialer>(dialer: D, policy: RetryPolicy) -> (Connector<D>, JoinHandle<()>) {
    let (link, _) = watch::channel(Link::with_state(ConnectionState::Disconnected));
    let shared = Arc::new(Shared {
        link,
        dropped: Notify::new(),
    });

    let handle = tokio::spawn(supervise(Arc::clone(&shared), dialer, policy));

    (Connector { shared }, handle)
}

impl<D: Dialer> Connector<D> {
    /// Current state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.shared.link.borrow().state
    }

    /// Waits for a usable connection.
    ///
    /// Operations issued while disconnected or retrying queue here. Once the
    /// connector is exhausted or stopped this fails immediately.
    pub async fn acquire(&self) -> StoreResult<Lease<D::Conn>> {
        let mut rx = self.shared.link.subscribe();
        let link = rx
            .wait_for(|link| link.state == ConnectionState::Connected || link.state.is_terminal())
            .await
            .map_err(|_| StoreError::Stopped)?;

        match (&link.state, &link.lease) {
            (ConnectionState::Connected, Some(lease)) => Ok(lease.clone()),
            (ConnectionState::Stopped, _) => Err(StoreError::Stopped),
            _ => Err(StoreError::Exhausted),
        }
    }

    /// Feeds the outcome of an operation back to the supervisor.
    ///
    /// Transport-class errors on the current connection drop it; the
    /// supervisor then runs the failure through the retry policy before
    /// dialing again. Everything else is ignored.
    pub fn report(&self, lease: &Lease<D::Conn>, err: &StoreError) {
        let Some(kind) = err.failure_kind() else {
            return;
        };

        let dropped = self.shared.link.send_if_modified(|link| {
            let current = matches!(
                (&link.state, &link.lease),
                (ConnectionState::Connected, Some(active)) if active.generation == lease.generation
            );
            if current {
                *link = Link {
                    fault: Some(kind),
                    ..Link::with_state(ConnectionState::Disconnected)
                };
            }
            current
        });

        if dropped {
            error!("store connection lost: {}", err);
            self.shared.dropped.notify_one();
        }
    }

    /// Stops the connector for good.
    ///
    /// Queued and future operations fail with [`StoreError::Stopped`] and the
    /// supervisor exits at its next step.
    pub fn close(&self) {
        self.shared
            .link
            .send_replace(Link::with_state(ConnectionState::Stopped));
        self.shared.dropped.notify_one();
    }
}

// == Supervisor Task ==
async fn supervise<D: Dialer>(shared: Arc<Shared<D::Conn>>, dialer: D, policy: RetryPolicy) {
    let target = dialer.describe();
    let mut backoff = policy.backoff();
    let mut generation: u64 = 0;
    // Failure still to be run through the policy before the next dial
    let mut pending: Option<(FailureKind, String)> = None;

    loop {
        if let Some((kind, reason)) = pending.take() {
            let Some(delay) = schedule_retry(&shared, &mut backoff, kind, &reason, &target) else {
                return;
            };
            tokio::time::sleep(delay).await;
        }

        match dialer.dial().await {
            Ok(conn) => {
                generation += 1;
                backoff.reset();
                let live = shared.publish(Link {
                    lease: Some(Lease { conn, generation }),
                    ..Link::with_state(ConnectionState::Connected)
                });
                if !live {
                    return;
                }
                info!("connected to redis: {}", target);

                // Park until an operation reports this connection as dead
                let fault = loop {
                    shared.dropped.notified().await;
                    let (state, fault) = {
                        let link = shared.link.borrow();
                        (link.state, link.fault)
                    };
                    match state {
                        ConnectionState::Connected => continue,
                        ConnectionState::Stopped => return,
                        _ => break fault.unwrap_or(FailureKind::Transient),
                    }
                };
                debug!("scheduling redial of {} after connection loss", target);
                pending = Some((fault, "connection lost".to_string()));
            }
            Err(err) => {
                let kind = err.failure_kind().unwrap_or(FailureKind::Transient);
                pending = Some((kind, err.to_string()));
            }
        }
    }
}

/// Runs one failure through the policy and publishes the outcome.
///
/// Returns the delay before the next dial, or `None` when the supervisor
/// should stop (retries exhausted or connector closed).
fn schedule_retry<C>(
    shared: &Shared<C>,
    backoff: &mut Backoff,
    kind: FailureKind,
    reason: &str,
    target: &str,
) -> Option<std::time::Duration> {
    match backoff.next(kind) {
        Decision::RetryAfter(delay) => {
            let live = shared.publish(Link::with_state(ConnectionState::Retrying {
                attempt: backoff.attempt(),
            }));
            if !live {
                return None;
            }
            match kind {
                FailureKind::Refused | FailureKind::Closed => {
                    error!("The server refused the connection. Retrying connection...")
                }
                FailureKind::Transient => warn!("{}", reason),
            }
            debug!(
                "retry {} for {} in {}ms (total {}ms)",
                backoff.attempt(),
                target,
                delay.as_millis(),
                backoff.total_retry_time().as_millis()
            );
            Some(delay)
        }
        Decision::Exhausted => {
            if shared.publish(Link::with_state(ConnectionState::Exhausted)) {
                error!(
                    "giving up on {} after {} attempts ({}ms of retries): {}",
                    target,
                    backoff.attempt() - 1,
                    backoff.total_retry_time().as_millis(),
                    reason
                );
            }
            None
        }
    }
}
