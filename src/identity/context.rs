use super::gate::AuthGate;
use super::principal::Principal;
use super::role::RoleStore;

/// Per-session state handed explicitly to the route guard and the dispatcher.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub auth: AuthGate,
    pub roles: RoleStore,
    pub request_id: Option<String>,
}

impl SessionContext {
    pub fn new(auth: AuthGate, roles: RoleStore) -> Self {
        Self { auth, roles, request_id: None }
    }

    /// Resolved, signed-out session with an in-memory role slot.
    pub fn anonymous() -> Self {
        Self::new(AuthGate::resolved(None), RoleStore::in_memory())
    }

    pub fn with_request_id<S: Into<String>>(mut self, id: S) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Record the role, then publish the principal, so a waiter woken by the publish
    /// never sees the new principal with the previous role.
    pub fn sign_in(&self, principal: Principal, role: &str) {
        self.roles.set_role(role);
        self.auth.publish(Some(principal));
    }

    pub fn sign_out(&self) {
        self.auth.publish(None);
        self.roles.clear_role();
    }
}
