//! Identity, session state and role handling shared by the route guard and the dispatcher.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod role;
mod gate;
mod context;
mod session;
mod provider;

pub use principal::Principal;
pub use role::{RoleStore, SlotStore, SlotError, MemorySlots, FileSlots, ROLE_KEY, DEFAULT_ROLE};
pub use gate::{AuthGate, SessionState};
pub use context::SessionContext;
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{AuthProvider, AuthError, LocalAuthProvider, LoginRequest, LoginOutcome, hash_password, verify_password};
