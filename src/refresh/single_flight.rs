use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::login::LoginProvider;
use crate::observability::metrics::get_metrics;
use crate::store::{Token, TokenStore};

static REJECTED_MSG: &str = "rejected";
static TIMEOUT_MSG: &str = "timeout";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("login failed: {0}")]
    Login(String),
    #[error("login timed out after {0:?}")]
    TimedOut(Duration),
    #[error("refresh cycle ended without a result")]
    Interrupted,
}

pub type RefreshResult = Result<Token, RefreshError>;

type Outcome = watch::Receiver<Option<RefreshResult>>;

enum RefreshState {
    Idle,
    /// `outcome` holds `None` until the login finishes, then the shared result
    /// until the grace window after it elapses.
    InFlight { generation: u64, outcome: Outcome },
}

struct Inner {
    state: Mutex<RefreshState>,
    generations: AtomicU64,
    login: Arc<dyn LoginProvider>,
    store: Arc<dyn TokenStore>,
    grace_window: Duration,
    login_timeout: Duration,
}

/// Collapses concurrent refresh demand into a single login.
///
/// The first caller that finds the state `Idle` starts a cycle: the login runs
/// on its own task, the token is written to the store, and only then is the
/// result published to every caller attached to the cycle. The cycle stays
/// attachable for `grace_window` after it finishes, so requests that failed
/// with the old token just before completion reuse the new one instead of
/// logging in again.
#[derive(Clone)]
pub struct SingleFlightRefresher {
    inner: Arc<Inner>,
}

impl SingleFlightRefresher {
    pub fn new(
        login: Arc<dyn LoginProvider>,
        store: Arc<dyn TokenStore>,
        grace_window: Duration,
        login_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                generations: AtomicU64::new(0),
                login,
                store,
                grace_window,
                login_timeout,
            }),
        }
    }

    pub async fn refresh(&self) -> RefreshResult {
        let (mut outcome, joined) = self.join_or_start();
        if joined {
            get_metrics().await.refresh_joins.inc();
        }

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(published) => Option::clone(&published).unwrap_or(Err(RefreshError::Interrupted)),
            Err(_) => Err(RefreshError::Interrupted),
        };
        result
    }

    /// Whether a cycle is running or still inside its grace window.
    pub fn in_flight(&self) -> bool {
        matches!(*self.inner.lock_state(), RefreshState::InFlight { .. })
    }

    fn join_or_start(&self) -> (Outcome, bool) {
        let mut state = self.inner.lock_state();

        if let RefreshState::InFlight { generation, outcome } = &*state {
            // a cycle whose task died before publishing can never complete
            let unpublished = outcome.borrow().is_none();
            let abandoned = unpublished && outcome.has_changed().is_err();
            if !abandoned {
                debug!(generation, "token refresh already in progress, waiting for it");
                return (outcome.clone(), true);
            }
            warn!(generation, "abandoned refresh cycle found, starting a new one");
        }

        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = watch::channel(None);
        *state = RefreshState::InFlight {
            generation,
            outcome: rx.clone(),
        };
        drop(state);

        tokio::spawn(self.inner.clone().run_cycle(generation, tx));
        (rx, false)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(self: Arc<Self>, generation: u64, tx: watch::Sender<Option<RefreshResult>>) {
        let result = self.mint(generation).await;
        tx.send_replace(Some(result));

        tokio::time::sleep(self.grace_window).await;

        let mut state = self.lock_state();
        if matches!(&*state, RefreshState::InFlight { generation: current, .. } if *current == generation) {
            *state = RefreshState::Idle;
            debug!(generation, "refresh cycle closed");
        }
    }

    async fn mint(&self, generation: u64) -> RefreshResult {
        let metrics = get_metrics().await;
        let start = Instant::now();
        metrics.login_attempts.inc();
        info!(generation, "refreshing vendor token");

        let login = tokio::time::timeout(self.login_timeout, self.login.perform_login()).await;
        metrics.login_duration.observe(start.elapsed().as_secs_f64());

        let token = match login {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                error!(generation, error = %e, "token refresh failed");
                metrics.login_failures.with_label_values(&[REJECTED_MSG]).inc();
                return Err(RefreshError::Login(e.to_string()));
            }
            Err(_) => {
                error!(generation, "token refresh timed out after {:?}", self.login_timeout);
                metrics.login_failures.with_label_values(&[TIMEOUT_MSG]).inc();
                return Err(RefreshError::TimedOut(self.login_timeout));
            }
        };

        // written before publishing so waiters re-reading the store see the new token
        if let Err(e) = self.store.replace(&token).await {
            warn!(generation, error = %e, "refreshed token could not be persisted");
            metrics.store_failures.with_label_values(&["replace"]).inc();
        }
        info!(generation, "token refreshed successfully");
        Ok(token)
    }
}
