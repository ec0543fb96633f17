//! Process configuration
//!
//! All configuration is read from the environment once at startup. The
//! session timeout is fixed for the process lifetime; changing it requires
//! a restart.

use anyhow::Context;

/// Default sliding-session timeout: 30 minutes.
const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 1800;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HMAC key for session cookie signatures.
    pub session_secret: String,
    /// Inactivity window after which an authenticated session is destroyed.
    pub session_timeout_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let session_secret =
            std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        if session_secret.len() < 32 {
            anyhow::bail!("SESSION_SECRET must be at least 32 bytes");
        }

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let session_timeout_secs = match std::env::var("SESSION_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<i64>()
                .context("SESSION_TIMEOUT_SECS must be an integer number of seconds")?,
            Err(_) => DEFAULT_SESSION_TIMEOUT_SECS,
        };
        if session_timeout_secs <= 0 {
            anyhow::bail!("SESSION_TIMEOUT_SECS must be positive");
        }

        Ok(Self {
            database_url,
            bind_address,
            session_secret,
            session_timeout_secs,
        })
    }

    /// The session timeout as a duration, for elapsed-time comparisons.
    pub fn session_timeout(&self) -> time::Duration {
        time::Duration::seconds(self.session_timeout_secs)
    }
}
