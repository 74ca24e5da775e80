use super::*;
use crate::domain_model::AccessToken;
use crate::logger::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

type Waiter = oneshot::Sender<Result<AccessToken, RefreshError>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Result<AccessToken, RefreshError>>),
    AlreadyFresh(AccessToken),
    SignedOut,
}

/// Resets the state and rejects queued callers if the leader is dropped mid-refresh.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let waiters = self.coordinator.finish();
            warn!(waiters = waiters.len(), "refresh abandoned by its leader");
            for waiter in waiters {
                let _ = waiter.send(Err(RefreshError::Abandoned));
            }
        }
    }
}

/// Single-flight refresh shared by every request of one client.
///
/// The first caller to observe a rejected access token performs the refresh;
/// everyone arriving while it runs queues up and receives its outcome in
/// arrival order. The lock is never held across an await.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    storage: Arc<dyn TokenStorage>,
    refresher: Arc<dyn TokenRefresher>,
    listener: Arc<dyn SessionListener>,
}

impl RefreshCoordinator {
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        refresher: Arc<dyn TokenRefresher>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            storage,
            refresher,
            listener,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> RefreshPhase {
        match *self.lock() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
        }
    }

    /// Returns an access token newer than `rejected`, refreshing at most once
    /// across all concurrent callers.
    pub async fn fresh_access_token(
        &self,
        rejected: Option<&AccessToken>,
    ) -> Result<AccessToken, RefreshError> {
        let role = {
            let mut state = self.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    Role::Waiter(rx)
                }
                // an empty store means never signed in, or signed out by a failed refresh
                RefreshState::Idle => match self.storage.load() {
                    None => Role::SignedOut,
                    Some(current) if rejected.is_some_and(|r| current.access_token != *r) => {
                        Role::AlreadyFresh(current.access_token)
                    }
                    Some(_) => {
                        *state = RefreshState::Refreshing {
                            waiters: VecDeque::new(),
                        };
                        Role::Leader
                    }
                },
            }
        };

        match role {
            Role::AlreadyFresh(token) => Ok(token),
            Role::SignedOut => Err(RefreshError::NoRefreshToken),
            Role::Waiter(rx) => rx.await.unwrap_or(Err(RefreshError::Abandoned)),
            Role::Leader => self.lead().await,
        }
    }

    async fn lead(&self) -> Result<AccessToken, RefreshError> {
        let mut guard = LeaderGuard {
            coordinator: self,
            armed: true,
        };
        let outcome = match self.storage.load() {
            Some(tokens) => self.refresher.refresh(&tokens.refresh_token).await,
            None => Err(RefreshError::NoRefreshToken),
        };
        guard.armed = false;

        let result = match outcome {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                self.storage.store(tokens);
                Ok(access_token)
            }
            Err(e) => {
                self.storage.clear();
                Err(e)
            }
        };

        let waiters = self.finish();
        match &result {
            Ok(_) => debug!(waiters = waiters.len(), "refresh completed"),
            Err(e) => warn!(waiters = waiters.len(), error = %e, "refresh failed, signing out"),
        }
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        if let Err(e) = &result {
            self.listener.signed_out(e);
        }
        result
    }

    fn finish(&self) -> VecDeque<Waiter> {
        match std::mem::replace(&mut *self.lock(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        }
    }
}
