use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::principal::Principal;

/// Session state as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No notification has arrived yet.
    Unresolved,
    Resolved(Option<Principal>),
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::Resolved(p) => p.as_ref(),
            SessionState::Unresolved => None,
        }
    }
}

/// Tracks whether a principal is present for one session.
///
/// The provider side calls [`AuthGate::publish`] on every session change. Readers either take
/// the last known flag with [`AuthGate::is_signed_in`] or await the first resolution with
/// [`AuthGate::current_principal`]. The flag is updated before the change is sent, so anyone
/// woken by the notification already sees the new value.
#[derive(Clone)]
pub struct AuthGate {
    tx: Arc<watch::Sender<SessionState>>,
    signed_in: Arc<AtomicBool>,
}

impl Default for AuthGate {
    fn default() -> Self { Self::new() }
}

impl AuthGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Unresolved);
        Self { tx: Arc::new(tx), signed_in: Arc::new(AtomicBool::new(false)) }
    }

    /// A gate that is already resolved to the given state.
    pub fn resolved(principal: Option<Principal>) -> Self {
        let gate = Self::new();
        gate.publish(principal);
        gate
    }

    pub fn publish(&self, principal: Option<Principal>) {
        self.signed_in.store(principal.is_some(), Ordering::Release);
        self.tx.send_replace(SessionState::Resolved(principal));
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in.load(Ordering::Acquire)
    }

    /// Resolve the session, waiting for the first publish if none has happened.
    pub async fn current_principal(&self) -> Option<Principal> {
        let mut rx = self.tx.subscribe();
        let principal = match rx.wait_for(|s| !matches!(s, SessionState::Unresolved)).await {
            Ok(state) => state.principal().cloned(),
            // The sender lives in `self`, so the channel cannot close while we wait.
            Err(_) => None,
        };
        principal
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("state", &*self.tx.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn current_principal_waits_for_first_publish() {
        let gate = AuthGate::new();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.current_principal().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.publish(Some(Principal::new("alice")));
        let got = waiter.await.unwrap();
        assert_eq!(got.map(|p| p.user_id).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn flag_is_current_when_waiter_wakes() {
        let gate = AuthGate::new();
        let observer = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let principal = gate.current_principal().await;
                principal.is_some() && gate.is_signed_in()
            })
        };
        gate.publish(Some(Principal::new("bob")));
        assert!(observer.await.unwrap());
    }

    #[tokio::test]
    async fn sign_out_resolves_to_none() {
        let gate = AuthGate::resolved(Some(Principal::new("carol")));
        assert!(gate.is_signed_in());
        gate.publish(None);
        assert!(!gate.is_signed_in());
        assert_eq!(gate.current_principal().await, None);
    }
}
