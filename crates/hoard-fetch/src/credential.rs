//! Credential holder shared by every worker of a run.

use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use futures_util::future::BoxFuture;
use tracing::{info, warn};

/// An opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self { Self(token.into()) }

    /// Normalise a token copied out of browser developer tools.
    ///
    /// Accepts `token:"<t>"`, `{"token":"<t>", ...}` and bare tokens.
    pub fn from_pasted(pasted: &str) -> Self {
        let s = pasted.trim();
        if let Some(rest) = s.strip_prefix("token:\"") {
            return Self(rest.strip_suffix('"').unwrap_or(rest).to_string());
        }
        if s.starts_with("{\"token\":\"") {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(s)
                && let Some(serde_json::Value::String(token)) = map.get("token")
            {
                return Self(token.clone());
            }
            // Truncated paste: take what sits between the first `":"` and `","`.
            let after = s.split_once("\":\"").map(|(_, rest)| rest).unwrap_or(s);
            let token = after.split_once("\",\"").map(|(t, _)| t).unwrap_or(after);
            return Self(token.trim_end_matches(['"', '}']).to_string());
        }
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Credential(***)") }
}

/// Source of fresh credentials once the current one expires.
pub trait Refresh: Send + Sync {
    /// `None` means no new credential can be obtained.
    fn refresh(&self) -> BoxFuture<'_, Option<Credential>>;
}

impl<F, Fut> Refresh for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<Credential>> + Send + 'static,
{
    fn refresh(&self) -> BoxFuture<'_, Option<Credential>> { Box::pin(self()) }
}

struct State {
    credential: Credential,
    generation: u64,
    /// The refresh source already came back empty for this generation.
    exhausted:  bool,
}

/// The current credential plus a generation counter that increments on every
/// refresh. Workers report expiry with the generation they used, so a burst of
/// concurrent expiries triggers exactly one refresh.
pub struct CredentialHolder {
    state:      RwLock<State>,
    refreshing: tokio::sync::Mutex<()>,
    refresher:  Option<Box<dyn Refresh>>,
}

impl fmt::Debug for CredentialHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHolder")
            .field("generation", &self.generation())
            .field("refreshable", &self.refresher.is_some())
            .finish()
    }
}

impl CredentialHolder {
    pub fn new(credential: Credential) -> Self {
        Self {
            state:      RwLock::new(State {
                credential,
                generation: 0,
                exhausted: false,
            }),
            refreshing: tokio::sync::Mutex::new(()),
            refresher:  None,
        }
    }

    pub fn with_refresh(mut self, refresher: impl Refresh + 'static) -> Self {
        self.refresher = Some(Box::new(refresher));
        self
    }

    pub fn current(&self) -> (Credential, u64) {
        let state = self.read();
        (state.credential.clone(), state.generation)
    }

    pub fn generation(&self) -> u64 { self.read().generation }

    fn read(&self) -> RwLockReadGuard<'_, State> { self.state.read().unwrap_or_else(PoisonError::into_inner) }

    /// Replace the credential of generation `stale`.
    ///
    /// Returns the generation now in effect, or `None` when no fresh
    /// credential is available. Once the source has come back empty, later
    /// calls for the same generation return `None` without asking again.
    pub async fn refresh(&self, stale: u64) -> Option<u64> {
        let _serial = self.refreshing.lock().await;

        {
            let state = self.read();
            if state.generation != stale {
                return Some(state.generation);
            }
            if state.exhausted {
                return None;
            }
        }

        let Some(refresher) = self.refresher.as_ref() else {
            warn!("credential expired and no refresh source is configured");
            return None;
        };
        let Some(fresh) = refresher.refresh().await.filter(|c| !c.is_empty()) else {
            warn!(generation = stale, "no fresh credential supplied");
            self.state.write().unwrap_or_else(PoisonError::into_inner).exhausted = true;
            return None;
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.credential = fresh;
        state.generation += 1;
        state.exhausted = false;
        info!(generation = state.generation, "credential refreshed");
        Some(state.generation)
    }
}
