use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::tprintln;

use super::context::SessionContext;
use super::principal::Principal;
use super::role::RoleStore;
use super::gate::AuthGate;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub user_id: String,
    pub context: SessionContext,
    pub expires_at: Instant,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
}

fn gen_id() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    if let Err(e) = getrandom::getrandom(&mut buf) {
        warn!(target: "session", "os rng unavailable, using uuid entropy: {e}");
        buf[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        buf[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Cookie token to session context map. Owned by the server state; nothing here is global.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, SessionEntry>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::with_ttl(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    /// Start a signed-in session and record `role` in its role slot.
    pub fn issue(&self, principal: Principal, role: &str) -> Session {
        let now = Instant::now();
        let context = SessionContext::new(AuthGate::new(), RoleStore::in_memory());
        let user_id = principal.user_id.clone();
        context.sign_in(principal, role);
        let sess = Session {
            session_id: gen_id(),
            token: gen_id(),
            user_id,
            context,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.token.clone(), SessionEntry { session: sess.clone() });
        tprintln!("session.issue user={} sid={} ttl_secs={}", sess.user_id, sess.session_id, self.ttl.as_secs());
        sess
    }

    /// Look up a live session. Expired entries are signed out and dropped.
    pub fn validate(&self, token: &str) -> Option<SessionContext> {
        let now = Instant::now();
        let mut expired = false;
        let out = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(ent) if ent.session.expires_at > now => Some(ent.session.context.clone()),
                Some(_) => { expired = true; None }
                None => None,
            }
        };
        if expired {
            if let Some(ent) = self.sessions.write().remove(token) {
                ent.session.context.sign_out();
                debug!(target: "session", user = %ent.session.user_id, "session expired");
            }
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let Some(ent) = self.sessions.write().remove(token) else { return false; };
        ent.session.context.sign_out();
        tprintln!("session.logout user={} sid={}", ent.session.user_id, ent.session.session_id);
        true
    }

    /// Drop every expired session; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write();
        let stale: Vec<SessionToken> = map
            .iter()
            .filter(|(_, e)| e.session.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale.iter() {
            if let Some(ent) = map.remove(k) {
                ent.session.context.sign_out();
            }
        }
        stale.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}
