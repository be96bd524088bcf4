use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedIn,
    SignedOut,
}

#[derive(Clone)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        let initial = if token.is_some() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        };
        let (state, _) = watch::channel(initial);
        Self {
            token: Arc::new(RwLock::new(token)),
            state,
        }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn sign_in(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
        self.state.send_replace(SessionState::SignedIn);
    }

    /// Drops the credential and tells every subscriber to show the sign-in surface.
    pub async fn tear_down(&self) {
        let had_token = self.token.write().await.take().is_some();
        if had_token {
            warn!("session: credential rejected, signing out");
        }
        self.state.send_replace(SessionState::SignedOut);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
