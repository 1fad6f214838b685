use serde::{Deserialize, Serialize};

/// The signed-in identity. Absence is `Option<Principal>::None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub ip: Option<String>,
}

impl Principal {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self { user_id: user_id.into(), ip: None }
    }
}
