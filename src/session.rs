use std::fmt;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Lifetime of a device-issued token.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(4 * 60);

#[derive(Clone, Default)]
pub(crate) struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Blank credentials never reach the network.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.password.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "username or password is empty, check device credentials".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Bearer token plus the instant it was issued. Replaced wholesale on login.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    token: String,
    issued_at: Instant,
}

impl Session {
    pub fn new(token: String, issued_at: Instant) -> Self {
        Self { token, issued_at }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        !self.token.is_empty() && now.saturating_duration_since(self.issued_at) < ttl
    }
}
