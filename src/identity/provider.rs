use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use thiserror::Error;

use crate::config::UserRecord;
use crate::tprintln;

use super::principal::Principal;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
}

/// Principal plus the role to store for the new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub role: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid_credentials")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginOutcome, AuthError>;
}

/// Checks logins against the `auth.users` entries from configuration.
pub struct LocalAuthProvider {
    users: Vec<UserRecord>,
}

impl LocalAuthProvider {
    pub fn new(users: Vec<UserRecord>) -> Self { Self { users } }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self.users.iter().find(|u| u.username.eq_ignore_ascii_case(req.username.trim())) else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&user.password_hash, &req.password) {
            return Err(AuthError::InvalidCredentials);
        }
        tprintln!("auth.login user={} role={}", user.username, user.role);
        Ok(LoginOutcome {
            principal: Principal { user_id: user.username.clone(), ip: req.ip.clone() },
            role: user.role.clone(),
        })
    }
}

/// Produce an Argon2 PHC string for a configured user entry.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}
