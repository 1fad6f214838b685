//! Page routes and the navigation guard that decides whether a page may be entered.

mod descriptor;
mod guard;

pub use descriptor::{Access, RouteDescriptor, RouteTable, HOME_ROUTE, SIGN_IN_ROUTE, RETURN_PARAM};
pub use guard::{Navigation, RedirectReason, RouteGuard};
