//! Credential lifecycle management.
//!
//! # States
//! - Unauthenticated: no token yet, traffic must not be accepted
//! - Authenticated: token present
//! - Refreshing: token present, one refresh call in flight
//! - Fatal: initial authentication exhausted its attempts
//!
//! # State Transitions
//! ```text
//! Unauthenticated → Authenticated: initial attempt succeeds
//! Unauthenticated → Fatal: max_retries consecutive failures
//! Authenticated → Refreshing: 403 observed, lock free, cooldown elapsed
//! Refreshing → Authenticated: refresh call finished (success or failure)
//! ```
//!
//! # Design Decisions
//! - Single-flight via `try_lock`: a trigger that finds a refresh running is
//!   dropped, never queued
//! - Cooldown is measured from the last *attempt*, so a failing auth endpoint
//!   is contacted at most once per cooldown window
//! - The refresh lock guards only refresh bookkeeping; token readers go
//!   through the lock-free store and never wait on the network call

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::auth::authenticator::Authenticator;
use crate::auth::store::{Credential, CredentialStore};
use crate::auth::AuthError;
use crate::config::AuthPolicyConfig;
use crate::observability::metrics;

/// Lifecycle state of the gateway's credential.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated = 0,
    Authenticated = 1,
    Refreshing = 2,
    Fatal = 3,
}

impl From<u8> for AuthState {
    fn from(val: u8) -> Self {
        match val {
            1 => AuthState::Authenticated,
            2 => AuthState::Refreshing,
            3 => AuthState::Fatal,
            _ => AuthState::Unauthenticated,
        }
    }
}

/// Result of a single refresh trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh held the lock; nothing was done.
    InFlight,
    /// The previous attempt is too recent; the auth endpoint was not contacted.
    CoolingDown,
    /// A new token was stored.
    Refreshed,
    /// The auth call failed; the previous token is still in place.
    Failed,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::InFlight => "in_flight",
            RefreshOutcome::CoolingDown => "cooling_down",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Failed => "failed",
        }
    }
}

/// Initial authentication ran out of attempts.
#[derive(Debug, thiserror::Error)]
#[error("could not authenticate after {attempts} attempt(s): {last}")]
pub struct InitialAuthError {
    pub attempts: u32,
    #[source]
    pub last: AuthError,
}

#[derive(Debug, Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
}

/// Owns the credential store and decides when the authenticator is called.
pub struct CredentialManager {
    authenticator: Arc<dyn Authenticator>,
    store: CredentialStore,
    state: AtomicU8,
    refresh: Mutex<RefreshState>,
    policy: AuthPolicyConfig,
}

impl CredentialManager {
    pub fn new(authenticator: Arc<dyn Authenticator>, policy: AuthPolicyConfig) -> Self {
        Self {
            authenticator,
            store: CredentialStore::new(),
            state: AtomicU8::new(AuthState::Unauthenticated as u8),
            refresh: Mutex::new(RefreshState::default()),
            policy,
        }
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: AuthState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Current credential, if one has been acquired.
    pub fn current_token(&self) -> Option<Arc<Credential>> {
        self.store.read()
    }

    /// Acquire the first token, retrying up to `max_retries` times with
    /// `retry_interval` between attempts.
    pub async fn perform_initial_authentication(&self) -> Result<(), InitialAuthError> {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(attempt, max_attempts, "Attempting to authenticate");

            match self.authenticator.authenticate().await {
                Ok(credential) => {
                    self.store.write(credential);
                    self.set_state(AuthState::Authenticated);
                    tracing::info!(attempt, "Authenticated and retrieved initial token");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(attempt, max_attempts, error = %e, "Authentication failed");

                    if attempt >= max_attempts {
                        self.set_state(AuthState::Fatal);
                        tracing::error!(
                            attempts = attempt,
                            "Could not authenticate after multiple retries"
                        );
                        return Err(InitialAuthError {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    tracing::info!(
                        retry_in_ms = self.policy.retry_interval_ms,
                        "Retrying authentication"
                    );
                    tokio::time::sleep(self.policy.retry_interval()).await;
                }
            }
        }
    }

    /// Refresh the token unless a refresh is already running or the cooldown
    /// has not elapsed since the last attempt.
    pub async fn refresh_if_needed(&self) -> RefreshOutcome {
        let Ok(mut refresh) = self.refresh.try_lock() else {
            tracing::debug!("Token refresh already in flight, dropping trigger");
            metrics::record_token_refresh(RefreshOutcome::InFlight.as_str());
            return RefreshOutcome::InFlight;
        };

        let now = Instant::now();
        if let Some(last) = refresh.last_attempt {
            let elapsed = now.duration_since(last);
            if elapsed < self.policy.reauth_cooldown() {
                tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    cooldown_ms = self.policy.reauth_cooldown_ms,
                    "Re-authentication cooldown active"
                );
                metrics::record_token_refresh(RefreshOutcome::CoolingDown.as_str());
                return RefreshOutcome::CoolingDown;
            }
        }
        refresh.last_attempt = Some(now);

        self.set_state(AuthState::Refreshing);
        tracing::info!("Attempting to refresh token in background");

        let outcome = match self.authenticator.authenticate().await {
            Ok(credential) => {
                self.store.write(credential);
                tracing::info!("Successfully refreshed master token");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh token, keeping previous token");
                RefreshOutcome::Failed
            }
        };

        self.set_state(if self.store.is_empty() {
            AuthState::Unauthenticated
        } else {
            AuthState::Authenticated
        });
        metrics::record_token_refresh(outcome.as_str());
        outcome
    }

    /// Run [`Self::refresh_if_needed`] on a background task. Callers are free
    /// to drop the handle.
    pub fn trigger_refresh(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.refresh_if_needed().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::{join_all, BoxFuture};
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use std::time::Duration;

    /// Issues `token-N` for the N-th call, failing the first `fail_first`
    /// calls and every call while `always_fail` is set.
    struct ScriptedAuthenticator {
        calls: AtomicU32,
        fail_first: u32,
        always_fail: AtomicBool,
        delay: Duration,
    }

    impl ScriptedAuthenticator {
        fn new(fail_first: u32) -> Arc<Self> {
            Self::with_delay(fail_first, Duration::ZERO)
        }

        fn with_delay(fail_first: u32, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_first,
                always_fail: AtomicBool::new(false),
                delay,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Authenticator for ScriptedAuthenticator {
        fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if n <= self.fail_first || self.always_fail.load(Ordering::SeqCst) {
                    return Err(AuthError::EmptyToken);
                }
                Credential::new(format!("token-{n}"))
            })
        }
    }

    fn policy(cooldown_ms: u64, max_retries: u32) -> AuthPolicyConfig {
        AuthPolicyConfig {
            reauth_cooldown_ms: cooldown_ms,
            max_retries,
            retry_interval_ms: 2_000,
        }
    }

    fn token(manager: &CredentialManager) -> String {
        manager.current_token().unwrap().expose().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn initial_auth_retries_until_success() {
        let auth = ScriptedAuthenticator::new(2);
        let manager = CredentialManager::new(auth.clone(), policy(1_000, 5));
        assert_eq!(manager.state(), AuthState::Unauthenticated);

        let started = Instant::now();
        manager.perform_initial_authentication().await.unwrap();

        assert_eq!(auth.calls(), 3);
        assert_eq!(manager.state(), AuthState::Authenticated);
        assert_eq!(token(&manager), "token-3");
        // two sleeps between three attempts, none after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4_000));
        assert!(elapsed < Duration::from_millis(6_000));
    }

    #[tokio::test(start_paused = true)]
    async fn initial_auth_exhaustion_is_fatal() {
        let auth = ScriptedAuthenticator::new(u32::MAX);
        let manager = CredentialManager::new(auth.clone(), policy(1_000, 3));

        let err = manager.perform_initial_authentication().await.unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(auth.calls(), 3);
        assert_eq!(manager.state(), AuthState::Fatal);
        assert!(manager.current_token().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_triggers_make_one_call() {
        let auth = ScriptedAuthenticator::with_delay(0, Duration::from_millis(100));
        let manager = CredentialManager::new(auth.clone(), policy(0, 1));

        let outcomes = join_all((0..16).map(|_| manager.refresh_if_needed())).await;

        assert_eq!(auth.calls(), 1);
        let refreshed = outcomes
            .iter()
            .filter(|o| **o == RefreshOutcome::Refreshed)
            .count();
        let dropped = outcomes
            .iter()
            .filter(|o| **o == RefreshOutcome::InFlight)
            .count();
        assert_eq!(refreshed, 1);
        assert_eq!(dropped, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_gates_successive_attempts() {
        let auth = ScriptedAuthenticator::new(0);
        let manager = CredentialManager::new(auth.clone(), policy(1_000, 1));

        assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Refreshed);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::CoolingDown);
        assert_eq!(auth.calls(), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Refreshed);
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_token_and_still_counts_as_attempt() {
        let auth = ScriptedAuthenticator::new(0);
        let manager = CredentialManager::new(auth.clone(), policy(1_000, 1));
        manager.perform_initial_authentication().await.unwrap();
        assert_eq!(token(&manager), "token-1");

        auth.always_fail.store(true, Ordering::SeqCst);
        assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::Failed);
        assert_eq!(token(&manager), "token-1");
        assert_eq!(manager.state(), AuthState::Authenticated);

        assert_eq!(manager.refresh_if_needed().await, RefreshOutcome::CoolingDown);
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn trigger_refresh_runs_in_background() {
        let auth = ScriptedAuthenticator::new(0);
        let manager = Arc::new(CredentialManager::new(auth.clone(), policy(0, 1)));

        let outcome = manager.trigger_refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Refreshed);
        assert_eq!(token(&manager), "token-1");
    }
}
