use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::identity::SessionContext;

use super::descriptor::{RouteTable, RETURN_PARAM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    SignInRequired,
    RoleMismatch,
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed { route: String, view: String },
    Redirect { to: String, reason: RedirectReason },
    NotFound,
}

/// Decides whether a navigation may proceed. Evaluated once per attempt; nothing is
/// re-checked later while the page stays open.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    table: Arc<RouteTable>,
}

impl RouteGuard {
    pub fn new(table: RouteTable) -> Self { Self { table: Arc::new(table) } }

    pub async fn check(&self, ctx: &SessionContext, full_path: &str) -> Navigation {
        let Some(route) = self.table.resolve(full_path) else { return Navigation::NotFound; };
        let request_id = ctx.request_id.as_deref().unwrap_or("-");

        if route.access.needs_principal() && ctx.auth.current_principal().await.is_none() {
            debug!(target: "guard", request_id, path = full_path, "no principal, redirecting to sign-in");
            return Navigation::Redirect {
                to: format!("{}?{}={}", self.table.sign_in, RETURN_PARAM, urlencoding::encode(full_path)),
                reason: RedirectReason::SignInRequired,
            };
        }

        if let Some(required) = route.access.role.as_deref() {
            let role = ctx.roles.get_role();
            if role != required {
                debug!(target: "guard", request_id, path = full_path, role = %role, required, "role mismatch, redirecting home");
                return Navigation::Redirect { to: self.table.home.clone(), reason: RedirectReason::RoleMismatch };
            }
        }

        Navigation::Proceed { route: route.name.clone(), view: route.view.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthGate, Principal, RoleStore};
    use crate::routing::{Access, RouteDescriptor};

    fn signed_in(role: &str) -> SessionContext {
        let ctx = SessionContext::new(AuthGate::new(), RoleStore::in_memory());
        ctx.sign_in(Principal::new("u1"), role);
        ctx
    }

    #[tokio::test]
    async fn anonymous_user_is_sent_to_sign_in_with_return_path() {
        let guard = RouteGuard::new(RouteTable::portal());
        let nav = guard.check(&SessionContext::anonymous(), "/admin?tab=users").await;
        assert_eq!(
            nav,
            Navigation::Redirect { to: "/FireLogin?redirect=%2Fadmin%3Ftab%3Dusers".into(), reason: RedirectReason::SignInRequired }
        );
    }

    #[tokio::test]
    async fn wrong_role_goes_home_and_matching_role_proceeds() {
        let guard = RouteGuard::new(RouteTable::portal());
        let nav = guard.check(&signed_in("user"), "/admin").await;
        assert_eq!(nav, Navigation::Redirect { to: "/".into(), reason: RedirectReason::RoleMismatch });

        let nav = guard.check(&signed_in("admin"), "/admin").await;
        assert_eq!(nav, Navigation::Proceed { route: "Admin".into(), view: "AdminView".into() });
    }

    #[tokio::test]
    async fn stale_role_without_principal_does_not_pass() {
        let table = RouteTable::new(vec![RouteDescriptor::new(
            "/reports",
            "Reports",
            "ReportsView",
            Access { requires_auth: false, role: Some("admin".into()) },
        )]);
        let guard = RouteGuard::new(table);
        let ctx = SessionContext::anonymous();
        ctx.roles.set_role("admin");
        match guard.check(&ctx, "/reports").await {
            Navigation::Redirect { reason, .. } => assert_eq!(reason, RedirectReason::SignInRequired),
            other => panic!("expected sign-in redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn signed_in_route_accepts_any_role() {
        let table = RouteTable::new(vec![RouteDescriptor::new("/journal", "Journal", "JournalView", Access::signed_in())]);
        let guard = RouteGuard::new(table);
        assert_eq!(
            guard.check(&SessionContext::anonymous(), "/journal").await,
            Navigation::Redirect { to: "/FireLogin?redirect=%2Fjournal".into(), reason: RedirectReason::SignInRequired }
        );
        assert_eq!(
            guard.check(&signed_in("counsellor"), "/journal").await,
            Navigation::Proceed { route: "Journal".into(), view: "JournalView".into() }
        );
    }

    #[tokio::test]
    async fn public_and_unknown_paths() {
        let guard = RouteGuard::new(RouteTable::portal());
        let ctx = SessionContext::anonymous();
        assert_eq!(guard.check(&ctx, "/Geo").await, Navigation::Proceed { route: "Geo".into(), view: "GeoLocationView".into() });
        assert_eq!(guard.check(&ctx, "/missing").await, Navigation::NotFound);
    }

    #[tokio::test]
    async fn guard_waits_for_unresolved_session() {
        let guard = RouteGuard::new(RouteTable::portal());
        let ctx = SessionContext::new(AuthGate::new(), RoleStore::in_memory());
        let pending = {
            let (guard, ctx) = (guard.clone(), ctx.clone());
            tokio::spawn(async move { guard.check(&ctx, "/admin").await })
        };
        ctx.sign_in(Principal::new("staff"), "admin");
        let nav = pending.await.unwrap();
        assert_eq!(nav, Navigation::Proceed { route: "Admin".into(), view: "AdminView".into() });
    }
}
