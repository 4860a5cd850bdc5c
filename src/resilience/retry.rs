use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::observability::metrics::get_metrics;
use crate::refresh::SingleFlightRefresher;
use crate::resilience::outcome::{CallOutcome, FailureReason};
use crate::store::{Token, TokenStore};

/// Vendor call policy: present the stored token, and when the vendor rejects
/// it, refresh once and retry exactly once. Nothing else is retried.
#[derive(Clone)]
pub struct ResilientCaller {
    store: Arc<dyn TokenStore>,
    refresher: SingleFlightRefresher,
    call_timeout: Duration,
}

impl ResilientCaller {
    pub fn new(store: Arc<dyn TokenStore>, refresher: SingleFlightRefresher, call_timeout: Duration) -> Self {
        Self {
            store,
            refresher,
            call_timeout,
        }
    }

    pub fn refresher(&self) -> &SingleFlightRefresher {
        &self.refresher
    }

    /// Stored token, or a freshly minted one when the store has none.
    pub async fn current_token(&self) -> Option<Token> {
        self.acquire().await.map(|(token, _)| token)
    }

    /// Like `current_token`, also reporting whether the token came from a
    /// login made for this call.
    async fn acquire(&self) -> Option<(Token, bool)> {
        if let Some(token) = self.store.read().await {
            return Some((token, false));
        }

        info!("no token found in store, requesting a new one");
        match self.refresher.refresh().await {
            Ok(token) => Some((token, true)),
            Err(e) => {
                error!(error = %e, "failed to obtain a token");
                None
            }
        }
    }

    /// One invocation of `op`, bounded by the vendor call timeout.
    pub async fn call_once<T, F, Fut>(&self, endpoint: &'static str, op: &F, token: Token) -> CallOutcome<T>
    where
        F: Fn(Token) -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let metrics = get_metrics().await;
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.call_timeout, op(token)).await {
            Ok(outcome) => outcome,
            Err(_) => CallOutcome::OtherFailure(FailureReason::Timeout),
        };

        metrics
            .vendor_call_duration
            .with_label_values(&[endpoint])
            .observe(start.elapsed().as_secs_f64());
        metrics
            .vendor_calls
            .with_label_values(&[endpoint, outcome.label()])
            .inc();
        outcome
    }

    /// `op` runs at most twice and the login at most once per call.
    pub async fn call<T, F, Fut>(&self, endpoint: &'static str, op: F) -> CallOutcome<T>
    where
        F: Fn(Token) -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let Some((token, minted)) = self.acquire().await else {
            return CallOutcome::OtherFailure(FailureReason::TokenUnavailable);
        };

        let outcome = self.call_once(endpoint, &op, token).await;
        if !outcome.is_auth_failure() {
            return outcome;
        }
        if minted {
            warn!("{} rejected a token minted for this call, not logging in again", endpoint);
            return outcome;
        }

        warn!("{} rejected the token, refreshing and retrying once", endpoint);
        get_metrics().await.auth_retries.with_label_values(&[endpoint]).inc();
        match self.refresher.refresh().await {
            Ok(fresh) => self.call_once(endpoint, &op, fresh).await,
            Err(e) => {
                error!(error = %e, "token refresh failed, {} stays unauthorized", endpoint);
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::store::MemoryTokenStore;
    use crate::tests::common::ScriptedLogin;

    /// Vendor stand-in: hands out scripted outcomes and records the tokens it saw.
    struct ScriptedVendor {
        outcomes: Mutex<VecDeque<CallOutcome<&'static str>>>,
        seen: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedVendor {
        fn new(outcomes: Vec<CallOutcome<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        async fn invoke(&self, token: Token) -> CallOutcome<&'static str> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(token.as_str().to_owned());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(CallOutcome::OtherFailure(FailureReason::Status(599)))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn caller(store: Arc<MemoryTokenStore>, login: Arc<ScriptedLogin>) -> ResilientCaller {
        let refresher = SingleFlightRefresher::new(
            login,
            store.clone(),
            Duration::from_millis(20),
            Duration::from_secs(5),
        );
        ResilientCaller::new(store, refresher, Duration::from_secs(5))
    }

    async fn run(caller: &ResilientCaller, vendor: &Arc<ScriptedVendor>) -> CallOutcome<&'static str> {
        caller
            .call("test", |token| {
                let vendor = vendor.clone();
                async move { vendor.invoke(token).await }
            })
            .await
    }

    #[tokio::test]
    async fn stale_token_is_refreshed_and_retried_once() {
        let store = Arc::new(MemoryTokenStore::with_token(Token::new("tok-stale").unwrap()));
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-fresh")]));
        let vendor = ScriptedVendor::new(vec![CallOutcome::AuthFailure, CallOutcome::Success("ok")]);

        let outcome = run(&caller(store.clone(), login.clone()), &vendor).await;

        assert_eq!(outcome, CallOutcome::Success("ok"));
        assert_eq!(vendor.seen(), vec!["tok-stale", "tok-fresh"]);
        assert_eq!(login.calls(), 1);
        assert_eq!(store.read().await, Token::new("tok-fresh"));
    }

    #[tokio::test]
    async fn second_auth_failure_is_final() {
        let store = Arc::new(MemoryTokenStore::with_token(Token::new("tok-stale").unwrap()));
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-fresh"), Ok("tok-never")]));
        let vendor = ScriptedVendor::new(vec![CallOutcome::AuthFailure, CallOutcome::AuthFailure, CallOutcome::Success("late")]);

        let outcome = run(&caller(store, login.clone()), &vendor).await;

        assert_eq!(outcome, CallOutcome::AuthFailure);
        assert_eq!(vendor.calls(), 2);
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn other_failure_is_not_retried() {
        let store = Arc::new(MemoryTokenStore::with_token(Token::new("tok-A").unwrap()));
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-B")]));
        let vendor = ScriptedVendor::new(vec![
            CallOutcome::OtherFailure(FailureReason::Status(500)),
            CallOutcome::Success("never"),
        ]);

        let outcome = run(&caller(store, login.clone()), &vendor).await;

        assert_eq!(outcome, CallOutcome::OtherFailure(FailureReason::Status(500)));
        assert_eq!(vendor.calls(), 1);
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_surfaces_original_auth_failure() {
        let store = Arc::new(MemoryTokenStore::with_token(Token::new("tok-stale").unwrap()));
        let login = Arc::new(ScriptedLogin::new(&[Err("captcha")]));
        let vendor = ScriptedVendor::new(vec![CallOutcome::AuthFailure, CallOutcome::Success("never")]);

        let outcome = run(&caller(store, login.clone()), &vendor).await;

        assert_eq!(outcome, CallOutcome::AuthFailure);
        assert_eq!(vendor.calls(), 1);
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn missing_token_is_minted_before_the_first_call() {
        let store = Arc::new(MemoryTokenStore::new());
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-A")]));
        let vendor = ScriptedVendor::new(vec![CallOutcome::Success("ok")]);

        let outcome = run(&caller(store.clone(), login.clone()), &vendor).await;

        assert_eq!(outcome, CallOutcome::Success("ok"));
        assert_eq!(vendor.seen(), vec!["tok-A"]);
        assert_eq!(store.read().await, Token::new("tok-A"));
    }

    #[tokio::test]
    async fn no_obtainable_token_means_no_vendor_call() {
        let store = Arc::new(MemoryTokenStore::new());
        let login = Arc::new(ScriptedLogin::new(&[Err("down")]));
        let vendor = ScriptedVendor::new(vec![CallOutcome::Success("never")]);

        let outcome = run(&caller(store, login), &vendor).await;

        assert_eq!(outcome, CallOutcome::OtherFailure(FailureReason::TokenUnavailable));
        assert_eq!(vendor.calls(), 0);
    }

    #[tokio::test]
    async fn hanging_vendor_call_times_out_without_refresh() {
        let store = Arc::new(MemoryTokenStore::with_token(Token::new("tok-A").unwrap()));
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-B")]));
        let refresher = SingleFlightRefresher::new(login.clone(), store.clone(), Duration::from_millis(20), Duration::from_secs(5));
        let caller = ResilientCaller::new(store, refresher, Duration::from_millis(50));

        let outcome: CallOutcome<()> = caller
            .call("test", |_token| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                CallOutcome::Success(())
            })
            .await;

        assert_eq!(outcome, CallOutcome::OtherFailure(FailureReason::Timeout));
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn freshly_minted_token_rejected_after_grace_is_final() {
        let store = Arc::new(MemoryTokenStore::new());
        let login = Arc::new(ScriptedLogin::new(&[Ok("tok-A"), Ok("tok-B")]));
        let caller = caller(store.clone(), login.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        // the vendor answers after the 20ms grace window has closed
        let outcome: CallOutcome<()> = caller
            .call("test", |_token| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    CallOutcome::AuthFailure
                }
            })
            .await;

        assert_eq!(outcome, CallOutcome::AuthFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(login.calls(), 1);
        assert_eq!(store.read().await, Token::new("tok-A"));
    }
}
