//! Channel session lifecycle.
//!
//! ```text
//! Uninitialized -> Bootstrapping -> AwaitingAuthentication -> Ready
//!                        |                    |
//!                        v                    v
//!                     Failed              TimedOut
//! ```
//!
//! Only [`SessionController`] mutates the state; everybody else reads it
//! through a [`SessionHandle`].

use std::{fmt, sync::Arc, time::Duration};

use {
    chrono::{DateTime, Utc},
    relay_channels::{ChannelConnector, ChannelSlot},
    relay_metrics::{counter, gauge, session as session_metrics},
    serde::Serialize,
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Bootstrapping,
    AwaitingAuthentication,
    Ready,
    /// Adapter construction failed. Absorbing.
    Failed,
    /// Login was not observed within the polling budget. Terminal.
    TimedOut,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Bootstrapping => "bootstrapping",
            Self::AwaitingAuthentication => "awaiting_authentication",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Numeric code for the state gauge.
    pub fn code(self) -> f64 {
        match self {
            Self::Uninitialized => 0.0,
            Self::Bootstrapping => 1.0,
            Self::AwaitingAuthentication => 2.0,
            Self::Ready => 3.0,
            Self::Failed => 4.0,
            Self::TimedOut => 5.0,
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Bootstrapping)
                | (Self::Bootstrapping, Self::AwaitingAuthentication)
                | (Self::Bootstrapping, Self::Failed)
                | (Self::AwaitingAuthentication, Self::Ready)
                | (Self::AwaitingAuthentication, Self::TimedOut)
        )
    }

    /// No further transitions are possible.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub state: SessionState,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Authentication probes issued so far.
    pub attempts: u32,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            state: SessionState::Uninitialized,
            last_error: None,
            started_at: now,
            updated_at: now,
            attempts: 0,
        }
    }
}

/// Authentication polling budget.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Read-only view of the session.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.rx.borrow().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Wait until the session enters `state`. Returns `None` if the
    /// controller went away first.
    pub async fn wait_for_state(&self, state: SessionState) -> Option<Session> {
        self.wait_until(|s| s.state == state).await
    }

    /// Wait until the session can no longer change.
    pub async fn wait_settled(&self) -> Option<Session> {
        self.wait_until(|s| s.state.is_settled()).await
    }

    async fn wait_until(&self, mut f: impl FnMut(&Session) -> bool) -> Option<Session> {
        let mut rx = self.rx.clone();
        rx.wait_for(|s| f(s)).await.ok().map(|s| s.clone())
    }
}

/// Owns the session state and drives bootstrap and authentication polling.
pub struct SessionController {
    tx: watch::Sender<Session>,
    connector: Arc<dyn ChannelConnector>,
    slot: ChannelSlot,
    poll: PollPolicy,
}

impl SessionController {
    pub fn new(connector: Arc<dyn ChannelConnector>, slot: ChannelSlot, poll: PollPolicy) -> Self {
        let (tx, _rx) = watch::channel(Session::new());
        Self {
            tx,
            connector,
            slot,
            poll,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }

    fn transition(&self, next: SessionState, error: Option<String>) -> bool {
        let changed = self.tx.send_if_modified(|session| {
            if !session.state.can_transition_to(next) {
                return false;
            }
            session.state = next;
            session.updated_at = Utc::now();
            if error.is_some() {
                session.last_error = error;
            }
            true
        });
        if changed {
            gauge!(session_metrics::STATE).set(next.code());
            debug!(state = %next, "session state changed");
        } else {
            warn!(
                from = %self.tx.borrow().state,
                to = %next,
                "ignoring invalid session transition"
            );
        }
        changed
    }

    /// Open the channel and publish it in the slot.
    ///
    /// On failure the session becomes `Failed` and stays there.
    pub async fn bootstrap(&self) -> Result<()> {
        if !self.transition(SessionState::Bootstrapping, None) {
            return Err(DispatchError::ChannelUnavailable);
        }
        info!(channel = self.connector.kind(), "bootstrapping channel");

        let adapter = match self.connector.connect().await {
            Ok(adapter) => adapter,
            Err(e) => {
                error!(channel = self.connector.kind(), error = %e, "channel bootstrap failed");
                self.transition(SessionState::Failed, Some(e.to_string()));
                return Err(e.into());
            },
        };

        if !self.slot.install(adapter) {
            let message = "channel already installed".to_string();
            self.transition(SessionState::Failed, Some(message));
            return Err(DispatchError::ChannelUnavailable);
        }
        self.transition(SessionState::AwaitingAuthentication, None);
        Ok(())
    }

    /// Probe until the remote client reports a login, the budget runs out,
    /// or `cancel` fires. Cancellation leaves the state untouched.
    pub async fn await_authentication(&self, cancel: &CancellationToken) -> SessionState {
        let Some(channel) = self.slot.get() else {
            return self.tx.borrow().state;
        };
        let max = self.poll.max_attempts;

        for attempt in 1..=max {
            let authenticated = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.tx.borrow().state,
                ok = async { channel.lock().await.is_authenticated().await } => ok,
            };
            counter!(session_metrics::AUTH_PROBES_TOTAL).increment(1);
            self.tx.send_modify(|s| s.attempts = attempt);

            if authenticated {
                info!(attempt, "channel authenticated, session ready");
                self.transition(SessionState::Ready, None);
                return SessionState::Ready;
            }
            if attempt == 1 {
                info!(
                    max_attempts = max,
                    interval_secs = self.poll.interval.as_secs(),
                    "waiting for channel login"
                );
            }
            if attempt == max {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.tx.borrow().state,
                _ = tokio::time::sleep(self.poll.interval) => {},
            }
        }

        warn!(attempts = max, "channel login not observed in time, sends will be rejected");
        let message = format!("authentication not observed after {max} attempts");
        self.transition(SessionState::TimedOut, Some(message));
        SessionState::TimedOut
    }

    /// Full lifecycle: bootstrap, then poll for authentication.
    pub async fn run(self, cancel: CancellationToken) -> SessionState {
        if self.bootstrap().await.is_err() {
            return self.tx.borrow().state;
        }
        self.await_authentication(&cancel).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        relay_channels::{MemoryChannel, MemoryConnector},
        rstest::rstest,
    };

    fn controller(channel: MemoryChannel, max_attempts: u32) -> SessionController {
        SessionController::new(
            Arc::new(MemoryConnector::new(channel)),
            ChannelSlot::new(),
            PollPolicy {
                interval: Duration::from_secs(5),
                max_attempts,
            },
        )
    }

    #[rstest]
    #[case(SessionState::Uninitialized, SessionState::Bootstrapping, true)]
    #[case(SessionState::Bootstrapping, SessionState::Failed, true)]
    #[case(SessionState::AwaitingAuthentication, SessionState::TimedOut, true)]
    #[case(SessionState::Uninitialized, SessionState::Ready, false)]
    #[case(SessionState::Failed, SessionState::Bootstrapping, false)]
    #[case(SessionState::TimedOut, SessionState::Ready, false)]
    #[case(SessionState::Ready, SessionState::AwaitingAuthentication, false)]
    fn transitions(
        #[case] from: SessionState,
        #[case] to: SessionState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_ready_after_login() {
        let channel = MemoryChannel::new().authenticate_after(3);
        let probe = channel.probe();
        let controller = controller(channel, 60);
        let handle = controller.handle();
        assert_eq!(handle.state(), SessionState::Uninitialized);

        let state = controller.run(CancellationToken::new()).await;
        assert_eq!(state, SessionState::Ready);
        assert!(handle.is_ready());
        assert_eq!(handle.snapshot().attempts, 4);
        assert_eq!(probe.probe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_budget() {
        let channel = MemoryChannel::new().never_authenticate();
        let probe = channel.probe();
        let controller = controller(channel, 3);
        let handle = controller.handle();

        let started = tokio::time::Instant::now();
        let state = controller.run(CancellationToken::new()).await;
        assert_eq!(state, SessionState::TimedOut);
        assert_eq!(probe.probe_count(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        let session = handle.snapshot();
        assert!(session.last_error.unwrap().contains("3 attempts"));
        assert!(!handle.is_ready());
    }

    #[tokio::test]
    async fn bootstrap_failure_is_absorbing() {
        let controller = SessionController::new(
            Arc::new(MemoryConnector::failing("chromium not found")),
            ChannelSlot::new(),
            PollPolicy::default(),
        );
        let handle = controller.handle();
        assert!(controller.bootstrap().await.is_err());
        let session = handle.snapshot();
        assert_eq!(session.state, SessionState::Failed);
        assert!(session.last_error.unwrap().contains("chromium not found"));

        assert!(controller.bootstrap().await.is_err());
        assert_eq!(handle.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_leaves_state_untouched() {
        let controller = controller(MemoryChannel::new().never_authenticate(), 60);
        let handle = controller.handle();
        controller.bootstrap().await.unwrap();

        let cancel = CancellationToken::new();
        let poller = {
            let cancel = cancel.clone();
            tokio::spawn(async move { controller.await_authentication(&cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();
        let state = poller.await.unwrap();
        assert_eq!(state, SessionState::AwaitingAuthentication);
        assert_eq!(handle.state(), SessionState::AwaitingAuthentication);
        assert_eq!(handle.snapshot().attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_waits_for_settled_state() {
        let controller = controller(MemoryChannel::new().authenticate_after(1), 60);
        let handle = controller.handle();
        tokio::spawn(controller.run(CancellationToken::new()));
        let session = handle.wait_settled().await.unwrap();
        assert_eq!(session.state, SessionState::Ready);
    }
}
