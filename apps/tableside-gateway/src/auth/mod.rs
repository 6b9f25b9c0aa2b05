pub mod middleware;
pub mod tokens;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use middleware::Authenticator;

/// Who is on the other end of a connection, fixed at handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Identity {
    /// Whether this identity carries one of the staff roles.
    pub fn is_staff(&self, staff_roles: &HashSet<String>) -> bool {
        staff_roles.contains(&self.role)
    }
}
